use std::path::PathBuf;

use crate::types::{ImageRef, LaunchStage};

pub type Result<T> = std::result::Result<T, RunnerError>;

#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("build template not found: {}", path.display())]
    TemplateNotFound { path: PathBuf },

    #[error("template {template}: no value for placeholder `{name}`")]
    UnresolvedPlaceholder { template: String, name: String },

    #[error("template {template}: unterminated placeholder at byte {offset}")]
    MalformedTemplate { template: String, offset: usize },

    #[error("building image {reference} failed: {message}")]
    BuildFailed { reference: ImageRef, message: String },

    #[error("`{command}` in container {container} exited with code {code}")]
    ExecFailed {
        container: String,
        command: String,
        code: i64,
    },

    #[error("replica set launch failed {stage}: {source}")]
    LaunchFailed {
        stage: LaunchStage,
        #[source]
        source: Box<RunnerError>,
    },

    #[error("could not determine home directory (HOME is unset)")]
    NoHomeDir,

    #[error("config file {}: {source}", path.display())]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config file {} is malformed: {source}", path.display())]
    ConfigFormat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("value for config key `{key}` cannot be stored: {source}")]
    ConfigValue {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("container engine error: {0}")]
    Engine(#[from] bollard::errors::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
