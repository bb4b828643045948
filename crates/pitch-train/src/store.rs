//! Artifact stores: where serialized checkpoints end up.
//!
//! Output roots are either local directories or `gs://bucket/prefix` URIs.
//! [`store_for`] picks the backend from the root's scheme.

use std::path::PathBuf;

const GCS_SCHEME: &str = "gs://";
const DEFAULT_GCS_ENDPOINT: &str = "https://storage.googleapis.com";

/// Errors from writing artifacts.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("output root must not be empty")]
    InvalidRoot,

    #[error("invalid GCS URI '{0}': expected gs://<bucket>/<object>")]
    InvalidGcsUri(String),

    #[error("GCS upload requires the {0} environment variable")]
    MissingCredentials(&'static str),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("upload to {uri} failed: {source}")]
    Http {
        uri: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("upload to {uri} rejected with status {status}: {body}")]
    Rejected {
        uri: String,
        status: u16,
        body: String,
    },
}

/// A destination that accepts whole artifacts by path.
pub trait ArtifactStore {
    /// Write `bytes` to `path`, replacing any existing artifact, and return
    /// the fully resolved location.
    fn put(&self, path: &str, bytes: &[u8]) -> Result<String, StoreError>;
}

/// Join `parts` onto `root` with `/`, ignoring a trailing slash on `root`.
pub fn join_paths(root: &str, parts: &[&str]) -> Result<String, StoreError> {
    let trimmed = root.trim_end_matches('/');
    if trimmed.is_empty() || trimmed == GCS_SCHEME.trim_end_matches('/') {
        return Err(StoreError::InvalidRoot);
    }
    let mut joined = trimmed.to_string();
    for part in parts {
        joined.push('/');
        joined.push_str(part.trim_matches('/'));
    }
    Ok(joined)
}

/// Plain filesystem store.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalArtifactStore;

impl ArtifactStore for LocalArtifactStore {
    fn put(&self, path: &str, bytes: &[u8]) -> Result<String, StoreError> {
        let path = PathBuf::from(path);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        std::fs::write(&path, bytes).map_err(|source| StoreError::Io {
            path: path.clone(),
            source,
        })?;
        Ok(path.display().to_string())
    }
}

/// Google Cloud Storage via the JSON API media upload.
pub struct GcsArtifactStore {
    endpoint: String,
    token: String,
    client: reqwest::blocking::Client,
}

impl GcsArtifactStore {
    pub const TOKEN_ENV: &'static str = "GCS_ACCESS_TOKEN";
    pub const ENDPOINT_ENV: &'static str = "GCS_ENDPOINT";

    pub fn new(endpoint: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            token: token.into(),
            client: reqwest::blocking::Client::new(),
        }
    }

    /// Build from `GCS_ACCESS_TOKEN` and optional `GCS_ENDPOINT`.
    pub fn from_env() -> Result<Self, StoreError> {
        let token = std::env::var(Self::TOKEN_ENV)
            .ok()
            .filter(|t| !t.is_empty())
            .ok_or(StoreError::MissingCredentials(Self::TOKEN_ENV))?;
        let endpoint = std::env::var(Self::ENDPOINT_ENV)
            .unwrap_or_else(|_| DEFAULT_GCS_ENDPOINT.to_string());
        Ok(Self::new(endpoint, token))
    }
}

/// Split `gs://bucket/object` into its bucket and object name.
pub fn parse_gcs_uri(uri: &str) -> Result<(&str, &str), StoreError> {
    let rest = uri
        .strip_prefix(GCS_SCHEME)
        .ok_or_else(|| StoreError::InvalidGcsUri(uri.to_string()))?;
    match rest.split_once('/') {
        Some((bucket, object)) if !bucket.is_empty() && !object.is_empty() => {
            Ok((bucket, object))
        }
        _ => Err(StoreError::InvalidGcsUri(uri.to_string())),
    }
}

impl ArtifactStore for GcsArtifactStore {
    fn put(&self, path: &str, bytes: &[u8]) -> Result<String, StoreError> {
        let (bucket, object) = parse_gcs_uri(path)?;
        let url = format!("{}/upload/storage/v1/b/{bucket}/o", self.endpoint);

        tracing::debug!(uri = path, bytes = bytes.len(), "Uploading artifact");
        let response = self
            .client
            .post(&url)
            .query(&[("uploadType", "media"), ("name", object)])
            .bearer_auth(&self.token)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(bytes.to_vec())
            .send()
            .map_err(|source| StoreError::Http {
                uri: path.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(StoreError::Rejected {
                uri: path.to_string(),
                status: status.as_u16(),
                body,
            });
        }
        Ok(path.to_string())
    }
}

/// Pick the store that can write under `root`.
pub fn store_for(root: &str) -> Result<Box<dyn ArtifactStore>, StoreError> {
    if root.starts_with(GCS_SCHEME) {
        Ok(Box::new(GcsArtifactStore::from_env()?))
    } else {
        Ok(Box::new(LocalArtifactStore))
    }
}
