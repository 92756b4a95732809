mod error;

pub use error::{EngineError, ErrorKind, Result};
