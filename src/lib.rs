pub mod archive;
pub mod error;
pub mod local;
pub mod model;
pub mod remote;
pub mod resolver;
pub mod store;
pub mod sync;
pub mod tree;

pub use self::error::{Error, NetworkError, Result, ValidationError};
