//! Maps [vibeman_client::Error] into an axum response body, per spec §6
//! / §7: `{error: {code, message, details?}, context?}` with the status
//! code `Error::http_status` assigns.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use vibeman_client::error::{Error, ErrorBody};

pub struct VibemanResponse(pub Error);

impl IntoResponse for VibemanResponse {
  fn into_response(self) -> Response {
    let status = StatusCode::from_u16(self.0.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let body: ErrorBody = (&self.0).into();
    (status, Json(body)).into_response()
  }
}

impl From<Error> for VibemanResponse {
  fn from(e: Error) -> Self {
    VibemanResponse(e)
  }
}

pub type ApiResult<T> = Result<Json<T>, VibemanResponse>;
