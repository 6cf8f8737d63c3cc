use std::time::Duration;

use reqwest::blocking::{Client, Response, multipart};

use super::{RemoteStore, UploadEntry};
use crate::error::{Error, NetworkError, Result};
use crate::model::{ListResponse, RemoteConfig, RemoteListing, RepoPath, RepoRef};

/// Retry `f` on transient failures (transport errors and 5xx), backing off
/// 200ms, 400ms, ... between attempts.
pub(super) fn with_retries<T>(
    label: &str,
    attempts: usize,
    mut f: impl FnMut() -> Result<T>,
) -> Result<T> {
    let attempts = attempts.max(1);
    let mut attempt = 0;
    loop {
        match f() {
            Ok(v) => return Ok(v),
            Err(err) if attempt + 1 < attempts && is_transient(&err) => {
                tracing::debug!(label, attempt, error = %err, "retrying remote call");
                std::thread::sleep(Duration::from_millis(200 * (1 << attempt)));
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

fn is_transient(err: &Error) -> bool {
    match err {
        Error::Network(NetworkError::Transport(_)) => true,
        Error::Network(NetworkError::Status { status, .. }) => *status >= 500,
        _ => false,
    }
}

fn transport(err: reqwest::Error) -> Error {
    NetworkError::Transport(format!("{:#}", err)).into()
}

/// Remote store over the repository host's REST endpoints.
pub struct HttpRemoteStore {
    remote: RemoteConfig,
    client: Client,
}

impl HttpRemoteStore {
    pub fn new(remote: RemoteConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent("repotree")
            .build()
            .map_err(transport)?;
        Ok(Self { remote, client })
    }

    pub fn remote(&self) -> &RemoteConfig {
        &self.remote
    }

    fn url(&self, route: &str, repo: &RepoRef) -> Result<reqwest::Url> {
        let mut url = reqwest::Url::parse(&self.remote.base_url)
            .map_err(|e| NetworkError::Transport(format!("invalid base url: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| NetworkError::Transport("base url cannot carry a path".to_string()))?
            .pop_if_empty()
            .extend(["repo", route, repo.owner_id.as_str(), repo.repo_id.as_str()]);
        Ok(url)
    }

    fn ensure_ok(&self, resp: Response, label: &str) -> Result<Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().unwrap_or_default();
        let message = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
            .unwrap_or(body);
        Err(NetworkError::Status {
            status: status.as_u16(),
            message: format!("{}: {}", label, message),
        }
        .into())
    }
}

impl RemoteStore for HttpRemoteStore {
    fn list_tree(&self, repo: &RepoRef) -> Result<RemoteListing> {
        let url = self.url("list-upload", repo)?;
        let fetched = with_retries(&format!("list {}", repo), self.remote.retries, || {
            let resp = self.client.get(url.clone()).send().map_err(transport)?;
            let resp = self.ensure_ok(resp, "list tree")?;
            Ok(resp.bytes().map_err(transport)?.to_vec())
        });
        match fetched {
            Ok(bytes) => ListResponse::decode(&bytes),
            // Nothing uploaded yet.
            Err(Error::Network(err)) if err.is_not_found() => Ok(RemoteListing::default()),
            Err(err) => Err(err),
        }
    }

    fn upload_batch(&self, repo: &RepoRef, entries: &[UploadEntry]) -> Result<()> {
        let url = self.url("upload", repo)?;
        with_retries(&format!("upload {}", repo), self.remote.retries, || {
            let mut form = multipart::Form::new();
            for entry in entries {
                let part = multipart::Part::bytes(entry.bytes.clone())
                    .file_name(entry.path.to_slash_string());
                form = form.part("files", part);
            }
            let resp = self
                .client
                .post(url.clone())
                .multipart(form)
                .send()
                .map_err(transport)?;
            self.ensure_ok(resp, "upload batch")?;
            Ok(())
        })
    }

    fn fetch_object(&self, repo: &RepoRef, path: &RepoPath) -> Result<Vec<u8>> {
        let url = self.url("get-uploaded-file", repo)?;
        with_retries(&format!("fetch {}", path), self.remote.retries, || {
            let resp = self
                .client
                .get(url.clone())
                .query(&[("filePath", path.to_slash_string())])
                .send()
                .map_err(transport)?;
            let resp = self.ensure_ok(resp, "fetch object")?;
            let is_json = resp
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .is_some_and(|v| v.starts_with("application/json"));
            let bytes = resp.bytes().map_err(transport)?.to_vec();
            if is_json {
                // Some hosts wrap text content as `{"content": "..."}`.
                if let Ok(serde_json::Value::Object(body)) =
                    serde_json::from_slice::<serde_json::Value>(&bytes)
                    && let Some(serde_json::Value::String(content)) = body.get("content")
                {
                    return Ok(content.clone().into_bytes());
                }
            }
            Ok(bytes)
        })
    }
}

#[cfg(test)]
#[path = "../tests/remote/http_client_tests.rs"]
mod tests;
