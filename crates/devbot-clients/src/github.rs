use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use devbot_core::services::{ChangeRequest, CodeHost, RepoFile};
use devbot_core::{DevbotError, Result};

use crate::error::{check, decode, transport};

const SERVICE: &str = "github";

// ─── Wire types ───────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct RepoInfo {
    default_branch: String,
}

#[derive(Deserialize)]
struct GitRef {
    object: GitObject,
}

#[derive(Deserialize)]
struct GitObject {
    sha: String,
}

#[derive(Deserialize)]
struct ContentFile {
    #[serde(rename = "type")]
    kind: String,
    path: String,
    sha: String,
    #[serde(default)]
    content: String,
}

#[derive(Deserialize)]
struct PullRequest {
    html_url: String,
}

// ─── GitHub ───────────────────────────────────────────────────────────────

/// GitHub REST client for one access token.
#[derive(Clone)]
pub struct GitHub {
    client: Client,
    api_url: String,
    token: String,
}

impl GitHub {
    pub fn new(client: Client, api_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.api_url)
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, path: &str, what: &str) -> Result<T> {
        let response = self
            .authed(self.client.get(self.url(path)))
            .send()
            .await
            .map_err(|e| transport(SERVICE, e))?;
        check(SERVICE, response)
            .await?
            .json()
            .await
            .map_err(|e| decode(SERVICE, what, e))
    }

    async fn default_branch(&self, repo: &str) -> Result<String> {
        let info: RepoInfo = self.get_json(&format!("/repos/{repo}"), "repository").await?;
        Ok(info.default_branch)
    }

    async fn head_sha(&self, repo: &str, branch: &str) -> Result<String> {
        let git_ref: GitRef = self
            .get_json(&format!("/repos/{repo}/git/ref/heads/{branch}"), "ref")
            .await?;
        Ok(git_ref.object.sha)
    }

    async fn create_branch(&self, repo: &str, branch: &str, sha: &str) -> Result<()> {
        let response = self
            .authed(self.client.post(self.url(&format!("/repos/{repo}/git/refs"))))
            .json(&json!({ "ref": format!("refs/heads/{branch}"), "sha": sha }))
            .send()
            .await
            .map_err(|e| transport(SERVICE, e))?;
        check(SERVICE, response).await?;
        Ok(())
    }

    /// Create `path` on `branch`, or update it when `sha` of the existing
    /// blob is given.
    async fn put_file(&self, change: &ChangeRequest, sha: Option<&str>) -> Result<()> {
        let mut body = json!({
            "message": change.commit_message,
            "content": STANDARD.encode(change.content.as_bytes()),
            "branch": change.branch,
        });
        if let Some(sha) = sha {
            body["sha"] = json!(sha);
        }
        let response = self
            .authed(
                self.client
                    .put(self.url(&format!("/repos/{}/contents/{}", change.repo, change.path))),
            )
            .json(&body)
            .send()
            .await
            .map_err(|e| transport(SERVICE, e))?;
        check(SERVICE, response).await?;
        Ok(())
    }

    async fn create_pull(&self, change: &ChangeRequest, base: &str) -> Result<String> {
        let response = self
            .authed(self.client.post(self.url(&format!("/repos/{}/pulls", change.repo))))
            .json(&json!({
                "title": change.title,
                "body": change.body,
                "head": change.branch,
                "base": base,
            }))
            .send()
            .await
            .map_err(|e| transport(SERVICE, e))?;
        let pr: PullRequest = check(SERVICE, response)
            .await?
            .json()
            .await
            .map_err(|e| decode(SERVICE, "pull request", e))?;
        Ok(pr.html_url)
    }
}

#[async_trait]
impl CodeHost for GitHub {
    async fn fetch_file(&self, repo: &str, path: &str, reference: Option<&str>) -> Result<RepoFile> {
        let mut request = self.authed(
            self.client
                .get(self.url(&format!("/repos/{repo}/contents/{path}"))),
        );
        if let Some(reference) = reference {
            request = request.query(&[("ref", reference)]);
        }
        let response = request.send().await.map_err(|e| transport(SERVICE, e))?;
        let response = check(SERVICE, response).await?;

        // Directories come back as a JSON array.
        let value: serde_json::Value = response
            .json()
            .await
            .map_err(|e| decode(SERVICE, "contents", e))?;
        if value.is_array() {
            return Err(DevbotError::service(SERVICE, format!("{repo}/{path} is a directory")));
        }
        let file: ContentFile =
            serde_json::from_value(value).map_err(|e| decode(SERVICE, "contents", e))?;
        if file.kind != "file" {
            return Err(DevbotError::service(
                SERVICE,
                format!("{repo}/{path} is a {}, not a file", file.kind),
            ));
        }

        // Content is base64 wrapped at 60 columns.
        let packed: String = file.content.split_whitespace().collect();
        let bytes = STANDARD
            .decode(packed)
            .map_err(|e| decode(SERVICE, "file content", e))?;
        debug!(repo = %repo, path = %path, bytes = bytes.len(), "fetched file");
        Ok(RepoFile {
            path: file.path,
            content: String::from_utf8_lossy(&bytes).into_owned(),
            sha: file.sha,
        })
    }

    async fn open_change(&self, change: &ChangeRequest) -> Result<String> {
        let base = self.default_branch(&change.repo).await?;
        let head = self.head_sha(&change.repo, &base).await?;
        self.create_branch(&change.repo, &change.branch, &head).await?;
        info!(repo = %change.repo, branch = %change.branch, base = %base, "branch created");

        match self
            .fetch_file(&change.repo, &change.path, Some(&change.branch))
            .await
        {
            Ok(existing) => self.put_file(change, Some(&existing.sha)).await?,
            Err(e) if e.is_not_found() => self.put_file(change, None).await?,
            Err(e) => return Err(e),
        }

        let url = self.create_pull(change, &base).await?;
        info!(repo = %change.repo, url = %url, "pull request opened");
        Ok(url)
    }
}
