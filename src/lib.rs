//! Client library for the Tripo3D generation API.
//!
//! This crate backs the `tripo-gen` command-line tool: it submits a
//! generation task from a text prompt or an input image, polls the task until
//! it reaches a terminal state, and downloads the resulting model file.
//!
//! ## Features
//! - Text-to-3D and Image-to-3D task creation.
//! - Multipart upload of local input images.
//! - Task polling with a wall-clock timeout.
//! - Streaming artifact download with fixed output-kind priority.
//! - Typed error handling for robust applications.

mod client;
mod error;
mod types;

pub use client::{TripoClient, DEFAULT_API_URL};
pub use error::TripoError;
pub use types::{Balance, FileContent, Task, TaskState, MODEL_KEY_PRIORITY};
