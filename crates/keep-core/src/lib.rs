mod error;

pub use error::{ErrorKind, ExitCode, KeepError, KeepResult, status_message};
