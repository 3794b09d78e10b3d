// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Retrieval of raw asset bytes from the kit directory or over HTTP.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

/// Errors produced while retrieving asset bytes.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("unable to read {uri}: {source}")]
    Io {
        uri: String,
        #[source]
        source: std::io::Error,
    },

    #[error("request for {uri} failed: {source}")]
    Http {
        uri: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("request for {uri} returned status {status}")]
    Status { uri: String, status: u16 },

    #[error("asset {0} not found")]
    NotFound(String),
}

/// Retrieves the complete bytes behind an asset URI.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, uri: &str) -> Result<Vec<u8>, FetchError>;
}

/// Fetches http(s) URIs over the network and everything else from disk,
/// resolving relative paths against a base directory.
pub struct AssetFetcher {
    base_path: PathBuf,
    client: reqwest::Client,
}

impl AssetFetcher {
    pub fn new(base_path: &Path) -> AssetFetcher {
        AssetFetcher {
            base_path: base_path.to_path_buf(),
            client: reqwest::Client::new(),
        }
    }

    fn resolve(&self, uri: &str) -> PathBuf {
        let path = Path::new(uri.strip_prefix("file://").unwrap_or(uri));
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_path.join(path)
        }
    }
}

fn is_remote(uri: &str) -> bool {
    uri.starts_with("http://") || uri.starts_with("https://")
}

#[async_trait]
impl Fetcher for AssetFetcher {
    async fn fetch(&self, uri: &str) -> Result<Vec<u8>, FetchError> {
        if is_remote(uri) {
            debug!(uri, "Fetching remote asset");
            let http_err = |source| FetchError::Http {
                uri: uri.to_string(),
                source,
            };
            let response = self.client.get(uri).send().await.map_err(http_err)?;
            let status = response.status();
            if !status.is_success() {
                return Err(FetchError::Status {
                    uri: uri.to_string(),
                    status: status.as_u16(),
                });
            }
            return Ok(response.bytes().await.map_err(http_err)?.to_vec());
        }

        let path = self.resolve(uri);
        debug!(path = ?path, "Reading local asset");
        tokio::fs::read(&path).await.map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                FetchError::NotFound(uri.to_string())
            } else {
                FetchError::Io {
                    uri: uri.to_string(),
                    source,
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use super::*;

    #[tokio::test]
    async fn test_reads_relative_to_base() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        std::fs::write(dir.path().join("kick.wav"), b"abc")?;

        let fetcher = AssetFetcher::new(dir.path());
        assert_eq!(fetcher.fetch("kick.wav").await?, b"abc".to_vec());

        let absolute = format!("file://{}", dir.path().join("kick.wav").display());
        assert_eq!(fetcher.fetch(&absolute).await?, b"abc".to_vec());
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_file() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let fetcher = AssetFetcher::new(dir.path());
        let result = fetcher.fetch("nope.wav").await;
        assert!(matches!(result, Err(FetchError::NotFound(uri)) if uri == "nope.wav"));
        Ok(())
    }

    #[test]
    fn test_is_remote() {
        assert!(is_remote("https://example.com/kick.wav"));
        assert!(is_remote("http://example.com/kick.wav"));
        assert!(!is_remote("samples/kick.wav"));
        assert!(!is_remote("file:///tmp/kick.wav"));
    }
}
