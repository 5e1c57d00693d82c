use std::path::PathBuf;
use thiserror::Error;

use crate::data::course::CourseError;
use crate::data::user::AccountError;
use crate::enrollment::EnrollmentError;

#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("configuration file not found in '{0}'")]
    NotFound(PathBuf),
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Failure to persist a collection.
///
/// Loading never produces this; missing or malformed data reads as an empty
/// collection instead.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unable to write collection '{collection}': {source}")]
    Io {
        collection: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("unable to serialize collection '{collection}': {source}")]
    Serialize {
        collection: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// Failure of a request-level operation: a rule refusing it, or the store
/// failing to persist its result.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Enrollment(#[from] EnrollmentError),
    #[error(transparent)]
    Course(#[from] CourseError),
    #[error(transparent)]
    Account(#[from] AccountError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("unable to prepare security directory: {0}")]
    Security(#[source] std::io::Error),
    #[error("unable to seed admin account: {0}")]
    Seed(#[source] ServiceError),
    #[error("unable to configure CORS: {0}")]
    Cors(#[from] rocket_cors::Error),
}
