use std::io;
use std::time::Duration;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    IO(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),

    #[error("Batch error: {0}")]
    Batch(#[from] BatchError),

    #[error("Server error: {0}")]
    Server(#[from] ServerError),

    #[error("Scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("Configuration parsing error: {0}")]
    Parse(#[from] config::ConfigError),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    #[error("Refusing unscoped destructive purge: {0}")]
    UnsafeScope(String),
}

/// Failure talking to a blob store or record tree.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("S3 config error: {0}")]
    S3Config(String),

    #[error("S3 listing error: {0}")]
    S3List(String),

    #[error("S3 delete error: {0}")]
    S3Delete(String),

    #[error("Local storage error: {0}")]
    Local(#[from] io::Error),

    #[error("Record tree request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Record tree returned {status} for {path}")]
    Status { status: u16, path: String },

    #[error("Malformed record tree payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("Store operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Store connection error: {0}")]
    ConnectionError(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid object name: {0}")]
    InvalidName(String),

    #[error("Batched update rejected: {0}")]
    BatchRejected(String),
}

/// Raised by the batch deleter when the store cannot be used at all, as
/// opposed to individual items failing.
#[derive(thiserror::Error, Debug)]
pub enum BatchError {
    #[error("Store {store} is unreachable: {source}")]
    Unreachable {
        store: String,
        #[source]
        source: StoreError,
    },
}

/// A single object or record that could not be deleted. Collected into
/// `DeletionOutcome::failed` and never propagated.
#[derive(thiserror::Error, Debug)]
#[error("Failed to delete {name}: {source}")]
pub struct ItemDeleteError {
    pub name: String,
    #[source]
    pub source: StoreError,
}

#[derive(thiserror::Error, Debug)]
pub enum ServerError {
    #[error("Server initialization error: {0}")]
    Init(String),

    #[error("Server error: {0}")]
    Serve(String),
}

#[derive(thiserror::Error, Debug)]
pub enum SchedulerError {
    #[error("Invalid cron expression '{expr}': {reason}")]
    InvalidCron { expr: String, reason: String },

    #[error("Cron expression '{0}' has no upcoming run")]
    NoUpcomingRun(String),
}

impl From<SchedulerError> for ConfigError {
    fn from(err: SchedulerError) -> Self {
        ConfigError::InvalidValue(err.to_string())
    }
}
