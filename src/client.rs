//! HTTP client for the Overseerr v1 REST API.
//!
//! [`OverseerrClient`] wraps `reqwest::Client` and implements [`Backend`],
//! one method per Overseerr capability the tools need. Responses are decoded
//! into the typed records in [`crate::models`].
//!
//! ## Authentication
//!
//! Every request carries the static API key in the `X-Api-Key` header.
//!
//! ## Error handling
//!
//! Each call is a single attempt. Transport failures become
//! [`ClientError::Unavailable`], non-2xx responses become
//! [`ClientError::Upstream`] with the raw body kept for diagnostics, and bodies
//! that do not match the expected shape become [`ClientError::Decode`].

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::config::BackendConfig;
use crate::models::{
    LibraryEntry, MediaKind, PageInfo, PagedResponse, PaginationFilter, RawServerSettings, RawUser,
    RequestRecord, RequestSpec, SearchResponse, SearchResult, UserEntry,
};

/// Page size used when walking the user list.
const USER_PAGE_SIZE: u32 = 100;

/// Operations the tools perform against Overseerr.
///
/// [`OverseerrClient`] is the production implementation; tests substitute an
/// in-memory fake.
#[async_trait]
pub trait Backend: Send + Sync {
    /// `GET /status` — version and update information.
    async fn get_status(&self) -> Result<Value, ClientError>;

    /// `GET /request` — one page of requests of the given kind, in backend order.
    async fn list_requests(
        &self,
        kind: MediaKind,
        filter: &PaginationFilter,
    ) -> Result<Vec<RequestRecord>, ClientError>;

    /// `POST /request` — submit a new request.
    async fn create_request(&self, spec: &RequestSpec) -> Result<RequestRecord, ClientError>;

    /// `GET /search` — movies, shows and people matching `query`.
    async fn search(&self, query: &str, page: u32) -> Result<Vec<SearchResult>, ClientError>;

    /// Radarr servers (movie libraries) followed by Sonarr servers (TV libraries).
    async fn list_libraries(&self) -> Result<Vec<LibraryEntry>, ClientError>;

    /// Every user, across all pages of `GET /user`.
    async fn list_users(&self) -> Result<Vec<UserEntry>, ClientError>;
}

/// HTTP client for one Overseerr instance.
pub struct OverseerrClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl OverseerrClient {
    /// Create a client for the instance described by `config`.
    pub fn new(config: &BackendConfig) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(ClientError::Unavailable)?;
        Ok(Self {
            http,
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v1{}", self.base_url, path)
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ClientError> {
        tracing::debug!(path, "GET");
        let resp = self
            .http
            .get(self.url(path))
            .header("X-Api-Key", &self.api_key)
            .header(reqwest::header::ACCEPT, "application/json")
            .query(query)
            .send()
            .await
            .map_err(ClientError::Unavailable)?;
        Self::handle_response(resp).await
    }

    async fn post<T: DeserializeOwned>(&self, path: &str, body: &Value) -> Result<T, ClientError> {
        tracing::debug!(path, "POST");
        let resp = self
            .http
            .post(self.url(path))
            .header("X-Api-Key", &self.api_key)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(body)
            .send()
            .await
            .map_err(ClientError::Unavailable)?;
        Self::handle_response(resp).await
    }

    /// Read the body and hand it to [`decode_body`].
    async fn handle_response<T: DeserializeOwned>(
        resp: reqwest::Response,
    ) -> Result<T, ClientError> {
        let status = resp.status();
        let body = resp.text().await.map_err(ClientError::Unavailable)?;
        decode_body(status.as_u16(), &body)
    }
}

/// Turn an HTTP status and body into a typed value or a [`ClientError`].
pub fn decode_body<T: DeserializeOwned>(status: u16, body: &str) -> Result<T, ClientError> {
    if !(200..300).contains(&status) {
        return Err(ClientError::Upstream {
            status,
            body: body.to_string(),
        });
    }
    serde_json::from_str(body).map_err(|e| ClientError::Decode(e.to_string()))
}

#[async_trait]
impl Backend for OverseerrClient {
    async fn get_status(&self) -> Result<Value, ClientError> {
        self.get("/status", &[]).await
    }

    async fn list_requests(
        &self,
        kind: MediaKind,
        filter: &PaginationFilter,
    ) -> Result<Vec<RequestRecord>, ClientError> {
        let mut query = vec![
            ("take", filter.take.to_string()),
            ("skip", filter.skip.to_string()),
            ("mediaType", kind.as_str().to_string()),
        ];
        if let Some(status) = filter.upstream_filter() {
            query.push(("filter", status.to_string()));
        }

        let page: PagedResponse<RequestRecord> = self.get("/request", &query).await?;
        Ok(keep_matching(page.results, kind, filter))
    }

    async fn create_request(&self, spec: &RequestSpec) -> Result<RequestRecord, ClientError> {
        self.post("/request", &spec.to_body()).await
    }

    async fn search(&self, query: &str, page: u32) -> Result<Vec<SearchResult>, ClientError> {
        let resp: SearchResponse = self
            .get(
                "/search",
                &[("query", query.to_string()), ("page", page.to_string())],
            )
            .await?;
        Ok(resp.results.into_iter().map(SearchResult::from).collect())
    }

    async fn list_libraries(&self) -> Result<Vec<LibraryEntry>, ClientError> {
        let radarr: Vec<RawServerSettings> = self.get("/settings/radarr", &[]).await?;
        let sonarr: Vec<RawServerSettings> = self.get("/settings/sonarr", &[]).await?;
        Ok(radarr
            .into_iter()
            .map(|s| s.into_entry(MediaKind::Movie))
            .chain(sonarr.into_iter().map(|s| s.into_entry(MediaKind::Tv)))
            .collect())
    }

    async fn list_users(&self) -> Result<Vec<UserEntry>, ClientError> {
        let mut users = Vec::new();
        loop {
            let query = [
                ("take", USER_PAGE_SIZE.to_string()),
                ("skip", users.len().to_string()),
                ("sort", "created".to_string()),
            ];
            let page: PagedResponse<RawUser> = self.get("/user", &query).await?;
            let fetched = page.results.len();
            users.extend(page.results.into_iter().map(UserEntry::from));

            if user_walk_done(users.len(), fetched, page.page_info.as_ref()) {
                break;
            }
        }
        Ok(users)
    }
}

/// Records from one `/request` page that match `kind` and the `startDate`
/// bound. Releases that ignore `mediaType` return both kinds.
fn keep_matching(
    records: Vec<RequestRecord>,
    kind: MediaKind,
    filter: &PaginationFilter,
) -> Vec<RequestRecord> {
    records
        .into_iter()
        .filter(|r| r.media_kind() == kind)
        .filter(|r| filter.admits(r.created_at.as_deref()))
        .collect()
}

/// The `/user` walk stops on an empty page or once `pageInfo.results` users
/// are collected. A missing `pageInfo` ends it after the first page.
fn user_walk_done(collected: usize, fetched: usize, page_info: Option<&PageInfo>) -> bool {
    let total = page_info.map_or(0, |p| p.results as usize);
    fetched == 0 || collected >= total
}

/// Errors returned by [`Backend`] methods.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Connection refused, DNS failure, timeout, or a body that could not be read.
    #[error("Overseerr is unreachable: {0}")]
    Unavailable(#[source] reqwest::Error),
    /// Overseerr answered with a non-2xx status.
    #[error("Overseerr returned HTTP {status}: {}", upstream_message(.body))]
    Upstream { status: u16, body: String },
    /// The response body did not match the expected shape.
    #[error("unexpected response from Overseerr: {0}")]
    Decode(String),
}

/// Overseerr error bodies look like `{"message": "..."}`; fall back to the
/// raw text for anything else.
fn upstream_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(String::from))
        .unwrap_or_else(|| {
            if body.is_empty() {
                "<empty body>".to_string()
            } else {
                body.to_string()
            }
        })
}
