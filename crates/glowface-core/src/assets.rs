//! Model asset resolution: local paths are used in place, remote URLs are
//! downloaded once into the model directory and reused afterwards.

use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AssetError {
    #[error("model asset not found: {0}")]
    NotFound(String),
    #[error("cannot derive a file name from model URL: {0}")]
    BadUrl(String),
    #[error("download of {url} failed: {reason}")]
    Download { url: String, reason: String },
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

/// Where the model comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelAsset {
    Local(PathBuf),
    Remote(String),
}

impl ModelAsset {
    /// Classify an asset reference. `http://` and `https://` are remote,
    /// everything else is a filesystem path.
    pub fn parse(reference: &str) -> Self {
        if reference.starts_with("https://") || reference.starts_with("http://") {
            ModelAsset::Remote(reference.to_string())
        } else {
            ModelAsset::Local(PathBuf::from(reference))
        }
    }

    /// Path the asset occupies once resolved.
    pub fn cache_path(&self, model_dir: &Path) -> Result<PathBuf, AssetError> {
        match self {
            ModelAsset::Local(path) => Ok(path.clone()),
            ModelAsset::Remote(url) => Ok(model_dir.join(file_name_from_url(url)?)),
        }
    }

    /// Make the asset available on disk and return its path.
    pub async fn resolve(&self, model_dir: &Path) -> Result<PathBuf, AssetError> {
        self.resolve_with(&reqwest::Client::new(), model_dir).await
    }

    /// [`resolve`](Self::resolve) with a caller-supplied HTTP client.
    pub async fn resolve_with(
        &self,
        client: &reqwest::Client,
        model_dir: &Path,
    ) -> Result<PathBuf, AssetError> {
        let path = self.cache_path(model_dir)?;
        match self {
            ModelAsset::Local(_) => {
                if !tokio::fs::try_exists(&path).await? {
                    return Err(AssetError::NotFound(path.display().to_string()));
                }
                Ok(path)
            }
            ModelAsset::Remote(url) => {
                if tokio::fs::try_exists(&path).await? {
                    tracing::debug!(path = %path.display(), "using cached model asset");
                    return Ok(path);
                }
                download(client, url, &path).await?;
                Ok(path)
            }
        }
    }
}

fn file_name_from_url(url: &str) -> Result<String, AssetError> {
    let without_query = url.split(['?', '#']).next().unwrap_or(url);
    let name = without_query
        .split("://")
        .nth(1)
        .and_then(|rest| rest.split_once('/'))
        .and_then(|(_, path)| path.rsplit('/').next())
        .filter(|name| !name.is_empty())
        .ok_or_else(|| AssetError::BadUrl(url.to_string()))?;
    Ok(name.to_string())
}

/// Fetch `url` into `dest` via a `.part` file so a partial download is never
/// mistaken for a model.
async fn download(client: &reqwest::Client, url: &str, dest: &Path) -> Result<(), AssetError> {
    let fail = |reason: String| AssetError::Download {
        url: url.to_string(),
        reason,
    };

    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    tracing::info!(url, dest = %dest.display(), "downloading model asset");

    let response = client.get(url).send().await.map_err(|e| fail(e.to_string()))?;
    let status = response.status();
    if !status.is_success() {
        return Err(fail(format!("HTTP {status}")));
    }
    let bytes = response.bytes().await.map_err(|e| fail(e.to_string()))?;

    let mut part = dest.as_os_str().to_owned();
    part.push(".part");
    let part = PathBuf::from(part);

    tokio::fs::write(&part, &bytes).await?;
    tokio::fs::rename(&part, dest).await?;

    tracing::info!(bytes = bytes.len(), dest = %dest.display(), "model asset downloaded");
    Ok(())
}
