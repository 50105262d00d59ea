use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{self, HeaderMap, HeaderValue};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::error::{LcError, LcResult};
use crate::lcapi::RepositorySource;
use crate::models::Repository;

pub const GITHUB_API: &str = "https://api.github.com";
const REPOS_PER_PAGE: u32 = 100;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Deserialize)]
struct GitHubUser {
    login: String,
}

/// Minimal GitHub REST client, authenticated with a personal or OAuth token.
pub struct GitHubClient {
    client: Client,
    headers: HeaderMap,
    base_url: String,
}

impl GitHubClient {
    pub fn new(token: &str) -> LcResult<Self> {
        let token = token.trim();
        if token.is_empty() {
            return Err(LcError::config("GitHub token is empty"));
        }

        let auth = HeaderValue::from_str(&format!("token {token}"))
            .map_err(|_| LcError::config("GitHub token contains invalid characters"))?;

        let headers = HeaderMap::from_iter([
            (header::AUTHORIZATION, auth),
            (header::ACCEPT, HeaderValue::from_static("application/vnd.github.v3+json")),
            (header::USER_AGENT, HeaderValue::from_static(concat!("leekcoach/", env!("CARGO_PKG_VERSION")))),
        ]);

        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Self { client, headers, base_url: String::from(GITHUB_API) })
    }

    /// Points the client at a different API root (GitHub Enterprise, test servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub async fn fetch_login(&self) -> LcResult<String> {
        Ok(self.get_json::<GitHubUser>("/user").await?.login)
    }

    pub async fn fetch_repositories(&self) -> LcResult<Vec<Repository>> {
        self.get_json(&format!("/user/repos?per_page={REPOS_PER_PAGE}")).await
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> LcResult<T> {
        let url = format!("{}{}", self.base_url, path);
        log::trace!("[GitHubClient::get_json] GET {url}");

        let response = self.client
            .get(&url)
            .headers(self.headers.clone())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            log::warn!("[GitHubClient::get_json] {url} returned {status}");
            return Err(LcError::Upstream { status: status.as_u16(), body });
        }

        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl RepositorySource for GitHubClient {
    async fn login(&self) -> anyhow::Result<String> {
        Ok(self.fetch_login().await?)
    }

    async fn list_repositories(&self) -> anyhow::Result<Vec<Repository>> {
        Ok(self.fetch_repositories().await?)
    }
}
