use std::path::PathBuf;

use crate::types::TaskState;

#[derive(Debug, thiserror::Error)]
pub enum TripoError {
    #[error("API key is missing. Please provide it or set the TRIPO_API_KEY environment variable.")]
    MissingApiKey,
    #[error("input file not found: {}", .path.display())]
    InputNotFound { path: PathBuf },
    #[error("upload failed: {message}")]
    UploadFailed { message: String },
    #[error("task creation failed: {message}")]
    TaskCreationFailed { message: String },
    #[error("status poll failed: {message}")]
    PollFailed { message: String },
    #[error("task {task_id} timed out after {timeout_secs}s")]
    TaskTimeout { task_id: String, timeout_secs: u64 },
    #[error("task {status}: {message}")]
    TaskFailed { status: TaskState, message: String },
    #[error("no model URL in task output (available: {})", .available.join(", "))]
    NoArtifact { available: Vec<String> },
    #[error("balance query failed: {message}")]
    BalanceQueryFailed { message: String },
    #[error("network request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),
    #[error("failed to parse API response: {0}")]
    ResponseParseFailed(#[from] serde_json::Error),
    #[error("URL parsing failed: {0}")]
    UrlParseFailed(#[from] url::ParseError),
    #[error("file I/O error: {0}")]
    IoError(#[from] std::io::Error),
}
