// Copyright 2025 Adobe. All rights reserved.
// This file is licensed to you under the Apache License,
// Version 2.0 (http://www.apache.org/licenses/LICENSE-2.0)
// or the MIT license (http://opensource.org/licenses/MIT),
// at your option.
//
// Unless required by applicable law or agreed to in writing,
// this software is distributed on an "AS IS" BASIS, WITHOUT
// WARRANTIES OR REPRESENTATIONS OF ANY KIND, either express or
// implied. See the LICENSE-MIT and LICENSE-APACHE files for the
// specific language governing permissions and limitations under
// each license.

use thiserror::Error;

/// Errors that can occur during stage operations
#[derive(Error, Debug)]
pub enum StageError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Object not found: {name}")]
    NotFound { name: String },

    #[error("Stage is closed")]
    Closed,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Object store error: {0}")]
    ObjectStoreError(#[from] object_store::Error),
}

/// Coarse classification of a [`StageError`].
///
/// Pipelines branch on this rather than on concrete variants: `NotFound` is
/// usually benign ("nothing to read or delete"), `Io` is an operational
/// failure that needs alerting or a retry at the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidArgument,
    NotFound,
    Closed,
    Config,
    Io,
}

impl StageError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            StageError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            StageError::NotFound { .. } => ErrorKind::NotFound,
            StageError::Closed => ErrorKind::Closed,
            StageError::ConfigError(_) => ErrorKind::Config,
            StageError::IoError(e) if e.kind() == std::io::ErrorKind::NotFound => {
                ErrorKind::NotFound
            }
            StageError::IoError(_) => ErrorKind::Io,
            StageError::ObjectStoreError(object_store::Error::NotFound { .. }) => {
                ErrorKind::NotFound
            }
            StageError::ObjectStoreError(_) => ErrorKind::Io,
        }
    }

    /// `true` when the requested object does not exist.
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    /// `true` for transport, authentication or quota failures.
    pub fn is_io(&self) -> bool {
        self.kind() == ErrorKind::Io
    }
}

/// Result type for stage operations
pub type StageResult<T> = Result<T, StageError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_invalid_argument_error() {
        let error = StageError::InvalidArgument("object name must not be empty".to_string());
        assert_eq!(
            error.to_string(),
            "Invalid argument: object name must not be empty"
        );
        assert_eq!(error.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_not_found_error() {
        let error = StageError::NotFound {
            name: "report.csv".to_string(),
        };
        assert_eq!(error.to_string(), "Object not found: report.csv");
        assert!(error.is_not_found());
        assert!(!error.is_io());
    }

    #[test]
    fn test_closed_error() {
        let error = StageError::Closed;
        assert_eq!(error.to_string(), "Stage is closed");
        assert_eq!(error.kind(), ErrorKind::Closed);
        assert!(!error.is_io());
    }

    #[test]
    fn test_config_error() {
        let error = StageError::ConfigError("Invalid configuration".to_string());
        assert_eq!(
            error.to_string(),
            "Configuration error: Invalid configuration"
        );
        assert_eq!(error.kind(), ErrorKind::Config);
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = io::Error::new(io::ErrorKind::ConnectionReset, "connection reset");
        let stage_error: StageError = io_error.into();

        match stage_error {
            StageError::IoError(_) => {
                assert!(stage_error.to_string().contains("IO error"));
                assert!(stage_error.is_io());
            }
            _ => panic!("Expected IoError variant"),
        }
    }

    #[test]
    fn test_io_not_found_classifies_as_not_found() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "File not found");
        let stage_error: StageError = io_error.into();
        assert!(stage_error.is_not_found());
    }

    #[test]
    fn test_object_store_not_found_classifies_as_not_found() {
        let source: Box<dyn std::error::Error + Send + Sync> =
            Box::new(io::Error::new(io::ErrorKind::NotFound, "missing"));
        let stage_error: StageError = object_store::Error::NotFound {
            path: "stage/missing".to_string(),
            source,
        }
        .into();

        assert!(matches!(stage_error, StageError::ObjectStoreError(_)));
        assert!(stage_error.is_not_found());
    }

    #[test]
    fn test_object_store_generic_classifies_as_io() {
        let source: Box<dyn std::error::Error + Send + Sync> =
            Box::new(io::Error::other("403 Forbidden"));
        let stage_error: StageError = object_store::Error::Generic {
            store: "S3",
            source,
        }
        .into();

        assert_eq!(stage_error.kind(), ErrorKind::Io);
        assert!(stage_error.to_string().contains("Object store error"));
    }

    #[test]
    fn test_stage_result_err() {
        let result: StageResult<i32> = Err(StageError::Closed);
        assert!(result.is_err());
    }
}
