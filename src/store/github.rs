use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use log::{debug, info};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::GitHubConfig;
use crate::document::BenchmarkData;
use crate::error::{BenchError, Result};

use super::backend::{Snapshot, Version, WriteOutcome};
use super::codec::{decode, encode, DataFormat};

/// Benchmark document kept in a repository branch (usually `gh-pages`) and
/// updated through the GitHub contents API.
///
/// Every update names the blob sha it replaces, so GitHub itself rejects a
/// write that lost a race with another CI job.
pub struct GitHubStore {
    client: reqwest::Client,
    api_url: Url,
    contents_url: Url,
    repo: String,
    branch: String,
    path: String,
}

#[derive(Deserialize)]
struct ContentsResponse {
    sha: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    encoding: String,
}

#[derive(Serialize)]
struct UpdateRequest<'a> {
    message: &'a str,
    content: String,
    branch: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
}

impl GitHubStore {
    /// Creates a store for `config.repo` (in `owner/name` form).
    ///
    /// # Errors
    ///
    /// Returns an error if the repository is missing or malformed, the token
    /// is not a valid header value, or the HTTP client cannot be built.
    pub fn from_config(config: &GitHubConfig) -> Result<Self> {
        let repo = config
            .repo
            .clone()
            .ok_or_else(|| BenchError::Config("github backend needs a repository".into()))?;
        if repo.split('/').count() != 2 || repo.starts_with('/') || repo.ends_with('/') {
            return Err(BenchError::Config(format!(
                "repository must be in 'owner/repo' form, got '{repo}'"
            )));
        }

        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("benchkeeper/", env!("CARGO_PKG_VERSION"))),
        );
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        if let Some(token) = &config.token {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|_| BenchError::Config("GitHub token is not a valid header".into()))?;
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        let path = config.path.trim_start_matches('/').to_string();
        let api_url = Url::parse(&format!("{}/", config.api_url.trim_end_matches('/')))
            .map_err(|e| BenchError::Config(format!("Invalid GitHub API URL: {e}")))?;
        let contents_url = api_url
            .join(&format!("repos/{repo}/contents/{path}"))
            .map_err(|e| BenchError::Config(format!("Invalid GitHub API URL: {e}")))?;

        Ok(Self {
            client,
            api_url,
            contents_url,
            repo,
            branch: config.branch.clone(),
            path,
        })
    }

    pub fn describe(&self) -> String {
        format!("github {}@{}:{}", self.repo, self.branch, self.path)
    }

    fn format(&self) -> DataFormat {
        DataFormat::for_path(std::path::Path::new(&self.path))
    }

    pub async fn read(&self) -> Result<Snapshot> {
        let response = self
            .client
            .get(self.contents_url.clone())
            .query(&[("ref", self.branch.as_str())])
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!("No benchmark data at {}", self.describe());
            return Ok(Snapshot {
                data: None,
                format: self.format(),
                version: Version::Missing,
            });
        }
        let response = check_status(response).await?;
        let contents: ContentsResponse = response.json().await?;

        let text = match contents.encoding.as_str() {
            "base64" => {
                let packed: String = contents.content.split_whitespace().collect();
                let bytes = STANDARD.decode(packed).map_err(|e| {
                    BenchError::StoreCorruption(format!("invalid base64 content: {e}"))
                })?;
                String::from_utf8(bytes).map_err(|e| {
                    BenchError::StoreCorruption(format!("content is not UTF-8: {e}"))
                })?
            }
            // Files over 1 MB come without inline content
            "none" => self.read_blob(&contents.sha).await?,
            other => {
                return Err(BenchError::Api(format!(
                    "{} is returned with encoding '{other}'",
                    self.path
                )))
            }
        };

        let (data, format) = decode(&text)?;
        debug!("Loaded {} suites from {}", data.entries.len(), self.describe());

        Ok(Snapshot {
            data: Some(data),
            format,
            version: Version::Blob(contents.sha),
        })
    }

    /// Raw content of a blob, for files too large for the contents API.
    async fn read_blob(&self, sha: &str) -> Result<String> {
        let url = self
            .api_url
            .join(&format!("repos/{}/git/blobs/{sha}", self.repo))
            .map_err(|e| BenchError::Config(format!("Invalid GitHub API URL: {e}")))?;
        debug!("Fetching blob {sha} of {}", self.describe());

        let response = self
            .client
            .get(url)
            .header(ACCEPT, HeaderValue::from_static("application/vnd.github.raw"))
            .send()
            .await?;
        Ok(check_status(response).await?.text().await?)
    }

    pub async fn write(
        &self,
        expected: &Version,
        data: &BenchmarkData,
        format: DataFormat,
        message: &str,
    ) -> Result<WriteOutcome> {
        let sha = match expected {
            Version::Blob(sha) => Some(sha.as_str()),
            Version::Missing => None,
            Version::Content(_) => {
                return Err(BenchError::Config(
                    "a file snapshot cannot be written to GitHub".into(),
                ))
            }
        };

        let request = UpdateRequest {
            message,
            content: STANDARD.encode(encode(data, format)?),
            branch: &self.branch,
            sha,
        };

        let response = self
            .client
            .put(self.contents_url.clone())
            .json(&request)
            .send()
            .await?;

        match response.status() {
            // 409: sha is stale, 422: file appeared although we sent no sha
            StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => {
                debug!("{} changed since it was read", self.describe());
                Ok(WriteOutcome::Conflict)
            }
            _ => {
                check_status(response).await?;
                info!("Benchmark data written to: {}", self.describe());
                Ok(WriteOutcome::Committed)
            }
        }
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(BenchError::Api(format!("GitHub returned {status}: {body}")))
}
