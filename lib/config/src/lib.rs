//! Config file loading (AMBIENT STACK / Configuration): `${VAR}`
//! interpolation and TOML/YAML/JSON dispatch by extension, reading
//! exactly one manifest per repository and one global config file,
//! never a directory of fragments to merge.

mod dirs;
mod error;
mod load;

pub use dirs::VibemanDirs;
pub use error::Error;
pub use load::load_config_file;

pub type Result<T> = ::core::result::Result<T, Error>;
