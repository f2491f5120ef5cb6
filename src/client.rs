use std::env;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use futures_util::StreamExt;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::{HeaderMap, AUTHORIZATION};
use reqwest::multipart;
use tokio::fs;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::time::sleep;
use tokio_util::codec::{BytesCodec, FramedRead};
use tracing::debug;
use url::Url;

use crate::error::TripoError;
use crate::types::{
    ApiResponse, Balance, FileContent, ImageTaskRequest, Task, TaskCreated, TaskState,
    TextTaskRequest, UploadData,
};

/// Production endpoint; override per client with [`TripoClient::new_with_url`].
pub const DEFAULT_API_URL: &str = "https://api.tripo3d.ai/v2/openapi/";

static UUID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$").unwrap()
});

/// The main client for interacting with the Tripo3D API.
///
/// It holds the shared `reqwest::Client` and the base URL for all API requests.
/// It is designed to be cloneable and safe to share across threads.
#[derive(Clone)]
pub struct TripoClient {
    client: reqwest::Client,
    base_url: Url,
}

impl TripoClient {
    /// Creates a new `TripoClient` against the production endpoint.
    ///
    /// This method initializes the client with an API key. It first checks for the `api_key`
    /// parameter. If it's `None`, it falls back to the `TRIPO_API_KEY` environment variable.
    ///
    /// # Errors
    ///
    /// - `TripoError::MissingApiKey` if the API key is not provided in either way.
    /// - `TripoError::RequestFailed` if the internal HTTP client fails to build.
    /// - `TripoError::UrlParseFailed` if the base URL is invalid.
    pub fn new(api_key: Option<String>) -> Result<Self, TripoError> {
        Self::new_with_url(api_key, DEFAULT_API_URL)
    }

    /// Creates a new `TripoClient` with a custom base URL.
    ///
    /// This is useful for testing or for connecting to a different API endpoint.
    /// The same `TRIPO_API_KEY` environment fallback applies as in [`TripoClient::new`].
    pub fn new_with_url(api_key: Option<String>, base_url: &str) -> Result<Self, TripoError> {
        let api_key = api_key.or_else(|| env::var("TRIPO_API_KEY").ok());
        let Some(key) = api_key else {
            return Err(TripoError::MissingApiKey);
        };

        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            format!("Bearer {}", key).parse().unwrap(),
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        // join() treats the last path segment as a file unless it ends in '/'.
        let base_url = if base_url.ends_with('/') {
            Url::parse(base_url)?
        } else {
            Url::parse(&format!("{}/", base_url))?
        };

        Ok(Self { client, base_url })
    }

    /// Uploads a local file and returns the image token referencing it.
    ///
    /// The file is streamed to the upload endpoint as multipart/form-data
    /// (field `file`), never buffered whole in memory.
    ///
    /// # Errors
    ///
    /// - `TripoError::InputNotFound` if the path does not exist.
    /// - `TripoError::UploadFailed` on an HTTP error status or a non-zero
    ///   service code.
    pub async fn upload_file<P: AsRef<Path>>(&self, image_path: P) -> Result<String, TripoError> {
        let image_path = image_path.as_ref();
        if !image_path.exists() {
            return Err(TripoError::InputNotFound {
                path: image_path.to_path_buf(),
            });
        }

        let url = self.base_url.join("upload")?;

        let file = File::open(image_path).await?;
        let stream = FramedRead::new(file, BytesCodec::new());
        let file_body = reqwest::Body::wrap_stream(stream);

        let file_name = image_path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                TripoError::IoError(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "Could not determine file name",
                ))
            })?
            .to_string();

        let mime_type = mime_guess::from_path(image_path)
            .first_or_octet_stream()
            .to_string();

        let file_part = multipart::Part::stream(file_body)
            .file_name(file_name)
            .mime_str(&mime_type)?;

        let form = multipart::Form::new().part("file", file_part);

        debug!(path = %image_path.display(), "uploading input file");
        let response = self.client.post(url).multipart(form).send().await?;

        if !response.status().is_success() {
            let error_body: serde_json::Value = response.json().await.unwrap_or_default();
            return Err(TripoError::UploadFailed {
                message: error_body.to_string(),
            });
        }

        let api_response: ApiResponse<UploadData> = response.json().await?;
        let data = api_response
            .into_data()
            .map_err(|message| TripoError::UploadFailed { message })?;
        Ok(data.image_token)
    }

    /// Submits a new text-to-3D generation task.
    ///
    /// `model_version` is forwarded to the service only when given.
    ///
    /// # Returns
    ///
    /// The ID of the newly created task.
    pub async fn text_to_model(
        &self,
        prompt: &str,
        model_version: Option<&str>,
    ) -> Result<String, TripoError> {
        let request_body = TextTaskRequest {
            type_: "text_to_model",
            prompt,
            model_version,
        };
        self.create_task(&request_body).await
    }

    /// Submits a new image-to-3D generation task.
    ///
    /// The `image` parameter can be one of three things:
    /// 1. A URL string starting with `http://` or `https://`.
    /// 2. A file token (a UUID string) from a previous upload.
    /// 3. A path to a local file, which will be uploaded first.
    ///
    /// # Returns
    ///
    /// The ID of the newly created task.
    pub async fn image_to_model(
        &self,
        image: &str,
        model_version: Option<&str>,
    ) -> Result<String, TripoError> {
        let file_content = self.file_content_from_input(image).await?;
        let request_body = ImageTaskRequest {
            type_: "image_to_model",
            file: file_content,
            model_version,
        };
        self.create_task(&request_body).await
    }

    async fn create_task<B: serde::Serialize>(&self, body: &B) -> Result<String, TripoError> {
        let url = self.base_url.join("task")?;
        let response = self.client.post(url).json(body).send().await?;

        if !response.status().is_success() {
            let error_body: serde_json::Value = response.json().await.unwrap_or_default();
            return Err(TripoError::TaskCreationFailed {
                message: error_body.to_string(),
            });
        }

        let api_response: ApiResponse<TaskCreated> = response.json().await?;
        let data = api_response
            .into_data()
            .map_err(|message| TripoError::TaskCreationFailed { message })?;
        debug!(task_id = %data.task_id, "task created");
        Ok(data.task_id)
    }

    async fn file_content_from_input(&self, image: &str) -> Result<FileContent, TripoError> {
        if image.starts_with("http://") || image.starts_with("https://") {
            return Ok(FileContent {
                type_: "jpeg".to_string(),
                url: Some(image.to_string()),
                ..Default::default()
            });
        }

        if UUID_RE.is_match(image) {
            return Ok(FileContent {
                type_: "jpeg".to_string(),
                file_token: Some(image.to_string()),
                ..Default::default()
            });
        }

        let path = Path::new(image);
        let file_token = self.upload_file(path).await?;
        let type_ = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or("jpeg")
            .to_string();

        Ok(FileContent {
            type_,
            file_token: Some(file_token),
            ..Default::default()
        })
    }

    /// Retrieves the current state of a specific task.
    ///
    /// This is the primary method for polling the status of a long-running
    /// generation task.
    pub async fn get_task(&self, task_id: &str) -> Result<Task, TripoError> {
        let url = self.base_url.join(&format!("task/{}", task_id))?;
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            let error_body: serde_json::Value = response.json().await.unwrap_or_default();
            return Err(TripoError::PollFailed {
                message: error_body.to_string(),
            });
        }

        let api_response: ApiResponse<Task> = response.json().await?;
        api_response
            .into_data()
            .map_err(|message| TripoError::PollFailed { message })
    }

    /// Waits for a task to complete by polling its status at a fixed interval.
    ///
    /// `on_poll` observes every fetched [`Task`] (the CLI renders a progress
    /// bar from it); it has no effect on control flow. The deadline is checked
    /// before each fetch, so the loop fails no more than one interval past
    /// `timeout`.
    ///
    /// # Errors
    ///
    /// - `TripoError::TaskTimeout` once the elapsed wall-clock time exceeds `timeout`.
    /// - `TripoError::TaskFailed` if the service reports `failed`, `cancelled`,
    ///   or `unknown`.
    /// - `TripoError::PollFailed` on a transport or service error while polling.
    ///
    /// Statuses outside the known vocabulary are treated like `queued` and
    /// polled again.
    pub async fn wait_for_task<F>(
        &self,
        task_id: &str,
        poll_interval: Duration,
        timeout: Duration,
        mut on_poll: F,
    ) -> Result<Task, TripoError>
    where
        F: FnMut(&Task),
    {
        let start = Instant::now();

        loop {
            if start.elapsed() > timeout {
                return Err(TripoError::TaskTimeout {
                    task_id: task_id.to_string(),
                    timeout_secs: timeout.as_secs(),
                });
            }

            let task = self.get_task(task_id).await?;
            on_poll(&task);

            match task.status {
                TaskState::Success => return Ok(task),
                TaskState::Failed | TaskState::Cancelled | TaskState::Unknown => {
                    return Err(TripoError::TaskFailed {
                        status: task.status,
                        message: task
                            .message
                            .unwrap_or_else(|| "no details".to_string()),
                    });
                }
                _ => sleep(poll_interval).await,
            }
        }
    }

    /// Downloads the model artifact of a completed task to `output_path`.
    ///
    /// The URL is selected from the task output by fixed key priority
    /// (`pbr_model`, then `base_model`, then `model`). Missing parent
    /// directories are created. The body is streamed to disk chunk by chunk;
    /// `on_progress` receives the running byte count and the Content-Length,
    /// when the server sent one. A partially written file is left in place if
    /// the transfer aborts.
    ///
    /// # Errors
    ///
    /// - `TripoError::NoArtifact` if no usable output URL is present.
    /// - `TripoError::RequestFailed` / `TripoError::IoError` on transfer or
    ///   write failures.
    pub async fn download_model<F>(
        &self,
        task: &Task,
        output_path: &Path,
        on_progress: F,
    ) -> Result<PathBuf, TripoError>
    where
        F: FnMut(u64, Option<u64>),
    {
        let Some(model_url) = task.model_url() else {
            return Err(TripoError::NoArtifact {
                available: task.output_kinds(),
            });
        };

        debug!(url = model_url, "downloading model artifact");
        self.download_file(model_url, output_path, on_progress).await
    }

    /// Streams an arbitrary URL to a local file path.
    pub async fn download_file<F>(
        &self,
        url: &str,
        output_path: &Path,
        mut on_progress: F,
    ) -> Result<PathBuf, TripoError>
    where
        F: FnMut(u64, Option<u64>),
    {
        let response = self.client.get(url).send().await?.error_for_status()?;
        let total = response.content_length();

        if let Some(parent) = output_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let mut file = fs::File::create(output_path).await?;
        let mut downloaded: u64 = 0;
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            downloaded += chunk.len() as u64;
            on_progress(downloaded, total);
        }
        file.flush().await?;

        Ok(output_path.to_path_buf())
    }

    /// Queries the user's current account balance.
    pub async fn get_balance(&self) -> Result<Balance, TripoError> {
        let url = self.base_url.join("user/balance")?;
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            let error_body: serde_json::Value = response.json().await.unwrap_or_default();
            return Err(TripoError::BalanceQueryFailed {
                message: error_body.to_string(),
            });
        }

        let api_response: ApiResponse<Balance> = response.json().await?;
        api_response
            .into_data()
            .map_err(|message| TripoError::BalanceQueryFailed { message })
    }
}
