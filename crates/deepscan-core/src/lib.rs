//! deepscan Core Library
//!
//! This crate provides the domain models, error types, configuration, upload
//! validation and the analysis workflow state machine shared by the API client
//! and the CLI.

pub mod config;
pub mod error;
pub mod models;
pub mod presentation;
pub mod upload;
pub mod validation;
pub mod workflow;

// Re-export commonly used types
pub use config::{Backend, ClientConfig};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use upload::{Preview, UploadControl};
pub use validation::{AcceptPolicy, UploadPolicy, ValidationError};
pub use workflow::{AnalysisRun, Workflow, WorkflowError, WorkflowState};
