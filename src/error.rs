use camino::Utf8PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum MirrorError {
    #[error("request to {url} failed: {body}")]
    RequestFailure { url: String, body: String },

    #[error("OSF request failed: {0}")]
    Http(String),

    #[error("unable to download file {0} with current token")]
    AccessDenied(String),

    #[error("{0} does not exist in dataset, skipping")]
    MissingTracker(Utf8PathBuf),

    #[error("{path} already mirrors \"{owner}\", leaving it untouched")]
    MirrorClaimed { path: Utf8PathBuf, owner: String },

    #[error("unexpected response from {url}: missing or invalid `{path}`")]
    MalformedResponse { url: String, path: String },

    #[error("failed to read config file at {0}")]
    ConfigRead(Utf8PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("required tool not found: {0}")]
    MissingTool(String),

    #[error("dataset store command failed: {0}")]
    StoreCommand(String),

    #[error("invalid archive: {0}")]
    Archive(String),
}

impl MirrorError {
    pub fn malformed(url: &str, path: &str) -> Self {
        MirrorError::MalformedResponse {
            url: url.to_string(),
            path: path.to_string(),
        }
    }

    /// Remote failures abort one dataset; everything else is local to this machine.
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            MirrorError::RequestFailure { .. }
                | MirrorError::Http(_)
                | MirrorError::AccessDenied(_)
                | MirrorError::MalformedResponse { .. }
        )
    }
}
