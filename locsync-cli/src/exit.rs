//! Process exit codes.
//!
//! | code | meaning                                   |
//! |------|-------------------------------------------|
//! | 0    | success                                   |
//! | 1    | one or more sync pairs failed             |
//! | 2    | bad arguments, config or file format      |
//! | 3    | malformed source or target content        |
//! | 4    | source and target entries are incompatible|
//! | 5    | filesystem failure (read, backup, write)  |

use std::process::ExitCode;

use locsync::ErrorKind;

use crate::config::ConfigError;

pub const PAIRS_FAILED: u8 = 1;
pub const USAGE: u8 = 2;
pub const PARSE: u8 = 3;
pub const MERGE: u8 = 4;
pub const IO: u8 = 5;

/// A failed command: what to print and how to exit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub message: String,
    pub code: u8,
}

impl Failure {
    pub fn new(code: u8, message: impl Into<String>) -> Self {
        Failure {
            message: message.into(),
            code,
        }
    }

    pub fn exit_code(&self) -> ExitCode {
        ExitCode::from(self.code)
    }
}

impl From<String> for Failure {
    fn from(message: String) -> Self {
        Failure::new(USAGE, message)
    }
}

impl From<locsync::Error> for Failure {
    fn from(err: locsync::Error) -> Self {
        let code = match err.kind() {
            ErrorKind::Format => USAGE,
            ErrorKind::Parse => PARSE,
            ErrorKind::Merge => MERGE,
            ErrorKind::Io => IO,
        };
        Failure::new(code, err.to_string())
    }
}

impl From<ConfigError> for Failure {
    fn from(err: ConfigError) -> Self {
        let code = match err {
            ConfigError::Io { .. } => IO,
            _ => USAGE,
        };
        Failure::new(code, err.to_string())
    }
}
