use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Output kinds checked, in order, when picking the artifact to download.
pub const MODEL_KEY_PRIORITY: [&str; 3] = ["pbr_model", "base_model", "model"];

/// A private struct for serializing the text-to-model request body.
#[derive(Serialize, Debug)]
pub(crate) struct TextTaskRequest<'a> {
    #[serde(rename = "type")]
    pub(crate) type_: &'static str,
    pub(crate) prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) model_version: Option<&'a str>,
}

/// A request to create an image-to-model task.
#[derive(Serialize, Debug)]
pub(crate) struct ImageTaskRequest<'a> {
    #[serde(rename = "type")]
    pub(crate) type_: &'static str,
    pub(crate) file: FileContent,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) model_version: Option<&'a str>,
}

/// Describes the input file for a generation task.
///
/// The file can be referenced in one of two ways:
/// 1. As a publicly accessible URL (`url`).
/// 2. As a token representing a previously uploaded file (`file_token`).
#[derive(Serialize, Debug, Default)]
pub struct FileContent {
    /// The file format, e.g., "png", "jpeg".
    #[serde(rename = "type")]
    pub type_: String,
    /// A direct URL to the image file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// A token representing a file uploaded via the multipart endpoint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_token: Option<String>,
}

/// (Internal) Holds the image token from a multipart upload.
#[derive(Deserialize, Debug)]
pub(crate) struct UploadData {
    pub(crate) image_token: String,
}

/// (Internal) Holds the task ID from a task-creation call.
#[derive(Deserialize, Debug)]
pub(crate) struct TaskCreated {
    pub(crate) task_id: String,
}

/// Represents the lifecycle state of a generation task.
///
/// The service vocabulary is open-ended; any status string outside the
/// variants below deserializes to [`TaskState::Other`], which the poll loop
/// treats as non-terminal and keeps retrying.
#[derive(Debug, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    /// The task has been submitted but has not yet started processing.
    Queued,
    /// The task is actively being processed.
    Running,
    /// The task completed successfully.
    Success,
    /// The task failed to complete.
    Failed,
    /// The task was cancelled before completion.
    Cancelled,
    /// The service lost track of the task.
    Unknown,
    /// A status string this client does not recognize.
    #[serde(other)]
    Other,
}

impl TaskState {
    /// Whether no further transition can occur from this state.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskState::Success | TaskState::Failed | TaskState::Cancelled | TaskState::Unknown
        )
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskState::Queued => "queued",
            TaskState::Running => "running",
            TaskState::Success => "success",
            TaskState::Failed => "failed",
            TaskState::Cancelled => "cancelled",
            TaskState::Unknown => "unknown",
            TaskState::Other => "unrecognized",
        };
        f.write_str(s)
    }
}

/// The detailed status and data of a generation task.
#[derive(Debug, Deserialize, Clone)]
pub struct Task {
    /// The unique identifier of the task.
    pub task_id: String,
    /// The current lifecycle state of the task.
    pub status: TaskState,
    /// The completion progress of the task, from 0 to 100.
    #[serde(default)]
    pub progress: u8,
    /// Output-kind name mapped to its download URL, populated on success.
    #[serde(default)]
    pub output: BTreeMap<String, serde_json::Value>,
    /// A human-readable failure message, if the service reported one.
    #[serde(default)]
    pub message: Option<String>,
}

impl Task {
    /// Selects the model download URL by fixed key priority.
    pub fn model_url(&self) -> Option<&str> {
        MODEL_KEY_PRIORITY.iter().find_map(|key| {
            self.output
                .get(*key)
                .and_then(|value| value.as_str())
                .filter(|url| !url.is_empty())
        })
    }

    /// The output kinds present on this task, for error reporting.
    pub fn output_kinds(&self) -> Vec<String> {
        self.output.keys().cloned().collect()
    }
}

/// The user's account balance.
#[derive(Deserialize, Debug)]
pub struct Balance {
    /// The available, usable balance.
    pub balance: f64,
    /// The amount of credits currently reserved for ongoing tasks.
    pub frozen: f64,
}

/// (Internal) The service envelope every endpoint responds with.
///
/// A non-zero `code` signals a service-level error even when the HTTP status
/// is 200; the failure detail is in `message`.
#[derive(Debug, Deserialize)]
pub(crate) struct ApiResponse<T> {
    #[serde(default)]
    pub(crate) code: i64,
    pub(crate) data: Option<T>,
    #[serde(default)]
    pub(crate) message: Option<String>,
}

impl<T> ApiResponse<T> {
    /// Unwraps the envelope, turning a non-zero `code` into its message.
    pub(crate) fn into_data(self) -> Result<T, String> {
        if self.code != 0 {
            return Err(self
                .message
                .unwrap_or_else(|| format!("service returned code {}", self.code)));
        }
        self.data
            .ok_or_else(|| "response missing data field".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn model_url_prefers_base_model_over_generic_model() {
        let task: Task = serde_json::from_value(json!({
            "task_id": "t1",
            "status": "success",
            "progress": 100,
            "output": { "base_model": "A", "model": "B" }
        }))
        .unwrap();

        assert_eq!(task.model_url(), Some("A"));
    }

    #[test]
    fn model_url_skips_empty_and_non_string_entries() {
        let task: Task = serde_json::from_value(json!({
            "task_id": "t1",
            "status": "success",
            "output": { "pbr_model": "", "base_model": 42, "model": "B" }
        }))
        .unwrap();

        assert_eq!(task.model_url(), Some("B"));
    }

    #[test]
    fn unrecognized_status_is_not_terminal() {
        let task: Task = serde_json::from_value(json!({
            "task_id": "t1",
            "status": "banned"
        }))
        .unwrap();

        assert_eq!(task.status, TaskState::Other);
        assert!(!task.status.is_terminal());
    }

    #[test]
    fn envelope_code_wins_over_http_success() {
        let response: ApiResponse<TaskCreated> = serde_json::from_value(json!({
            "code": 5,
            "message": "quota exceeded"
        }))
        .unwrap();

        assert_eq!(response.into_data().unwrap_err(), "quota exceeded");
    }
}
