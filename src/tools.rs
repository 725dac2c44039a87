//! MCP tool definitions and handlers.
//!
//! Each tool is defined as a JSON schema (returned by [`tool_definitions`])
//! and handled by an async method of [`Dispatcher`], dispatched from
//! [`Dispatcher::call`].
//!
//! ## Tools
//!
//! - `status` — Overseerr version/update information
//! - `movie_requests`, `tv_requests` — paginated request listings
//! - `request_movie_to_library`, `request_tv_to_library` — request by
//!   library name and user display name
//! - `request_movie`, `request_tv` — request by numeric ids, with the
//!   requesting user defaulting to `REQUEST_USER_ID`
//! - `search_media` — movie/TV/person search
//! - `get_available_libraries`, `get_users` — the startup directory
//!
//! Library and user names known at startup are embedded in the argument
//! descriptions of the request tools. They are hints only; the
//! [`resolver`](crate::resolver) decides what is valid.
//!
//! All arguments are validated before any request leaves the process.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::{json, Value};

use crate::client::{Backend, ClientError};
use crate::config::BackendConfig;
use crate::defaults;
use crate::directory::{Directory, Enumerations};
use crate::models::{MediaKind, PaginationFilter, RequestSpec, DEFAULT_TAKE, REQUEST_FILTERS};
use crate::resolver::{self, ResolveError};

/// Builds tool definitions once and routes calls to their handlers.
///
/// Holds only immutable state, so concurrent calls need no locking.
pub struct Dispatcher {
    backend: Arc<dyn Backend>,
    directory: Arc<Directory>,
    config: Arc<BackendConfig>,
    definitions: Vec<Value>,
}

impl Dispatcher {
    pub fn new(
        backend: Arc<dyn Backend>,
        directory: Arc<Directory>,
        config: Arc<BackendConfig>,
    ) -> Self {
        let definitions = tool_definitions(&directory.enumerations());
        Self {
            backend,
            directory,
            config,
            definitions,
        }
    }

    pub fn definitions(&self) -> &[Value] {
        &self.definitions
    }

    /// Handle a tool call and return MCP content.
    pub async fn call(&self, name: &str, args: &Value) -> ToolResult {
        tracing::debug!(tool = name, "tool call");
        let outcome = match name {
            "status" => self.status().await,
            "movie_requests" => self.list_requests(MediaKind::Movie, args).await,
            "tv_requests" => self.list_requests(MediaKind::Tv, args).await,
            "request_movie_to_library" => self.request_to_library(MediaKind::Movie, args).await,
            "request_tv_to_library" => self.request_to_library(MediaKind::Tv, args).await,
            "request_movie" => self.request_by_id(MediaKind::Movie, args).await,
            "request_tv" => self.request_by_id(MediaKind::Tv, args).await,
            "search_media" => self.search(args).await,
            "get_available_libraries" => Ok(json!({ "libraries": self.directory.libraries() })),
            "get_users" => Ok(json!({ "users": self.directory.users() })),
            _ => Err(ToolError::UnknownTool(name.to_string())),
        };

        match outcome {
            Ok(value) => ToolResult::success(value),
            Err(e) => {
                tracing::warn!(tool = name, error = %e, "tool call failed");
                ToolResult::failure(&e)
            }
        }
    }

    async fn status(&self) -> Result<Value, ToolError> {
        Ok(self.backend.get_status().await?)
    }

    async fn list_requests(&self, kind: MediaKind, args: &Value) -> Result<Value, ToolError> {
        let filter = pagination_filter(args)?;
        let records = self.backend.list_requests(kind, &filter).await?;
        let requests: Vec<Value> = records
            .iter()
            .map(|r| json!(r.summarize()))
            .collect();
        Ok(json!({
            "requests": requests,
            "count": requests.len(),
            "take": filter.take,
            "skip": filter.skip,
        }))
    }

    async fn request_to_library(&self, kind: MediaKind, args: &Value) -> Result<Value, ToolError> {
        let tmdb_id = tmdb_id_param(args)?;
        let seasons = seasons_param(args, kind)?;
        let library_name = required_str(args, "libraryName")?;
        let user_name = required_str(args, "userDisplayName")?;

        let library = resolver::resolve_library(&self.directory, library_name, kind)?;
        let user_id = resolver::resolve_user(&self.directory, user_name)?;

        let spec = new_spec(kind, tmdb_id, seasons, user_id).with_library(library.id, library.is_4k);
        self.submit(spec).await
    }

    async fn request_by_id(&self, kind: MediaKind, args: &Value) -> Result<Value, ToolError> {
        let tmdb_id = tmdb_id_param(args)?;
        let seasons = seasons_param(args, kind)?;
        let explicit_user = optional_int(args, "userId")?;
        if let Some(id) = explicit_user.filter(|id| *id <= 0) {
            return Err(invalid("userId", format!("must be a positive integer, got {id}")));
        }
        let library_id = optional_int(args, "libraryId")?;
        if let Some(id) = library_id.filter(|id| *id < 0) {
            return Err(invalid("libraryId", format!("must be non-negative, got {id}")));
        }

        let user = defaults::resolve_user_id(explicit_user, self.config.request_user_id);
        tracing::debug!(user_id = user.value, source = user.source, "requesting user");

        let mut spec = new_spec(kind, tmdb_id, seasons, user.value);
        if let Some(id) = library_id {
            let is_4k = self
                .directory
                .libraries()
                .iter()
                .any(|lib| lib.id == id && lib.media_kind == kind && lib.is_4k);
            spec = spec.with_library(id, is_4k);
        }
        self.submit(spec).await
    }

    async fn submit(&self, spec: RequestSpec) -> Result<Value, ToolError> {
        tracing::info!(
            tmdb_id = spec.tmdb_id,
            kind = %spec.media_kind,
            library = ?spec.target_library_id,
            user_id = spec.requesting_user_id,
            "submitting request"
        );
        let record = self.backend.create_request(&spec).await?;
        Ok(json!({ "request": record.summarize() }))
    }

    async fn search(&self, args: &Value) -> Result<Value, ToolError> {
        let query = required_str(args, "query")?;
        let page = match optional_int(args, "page")? {
            None => 1,
            Some(p) if p >= 1 => to_u32("page", p)?,
            Some(p) => return Err(invalid("page", format!("must be at least 1, got {p}"))),
        };

        let results = self.backend.search(query, page).await?;
        if results.is_empty() {
            return Ok(json!({
                "message": format!("No results found for query '{query}' on page {page}.")
            }));
        }
        Ok(json!({
            "results": results,
            "page": page,
        }))
    }
}

fn new_spec(kind: MediaKind, tmdb_id: i64, seasons: Option<Vec<u32>>, user_id: i64) -> RequestSpec {
    match kind {
        MediaKind::Movie => RequestSpec::movie(tmdb_id, user_id),
        MediaKind::Tv => RequestSpec::tv(tmdb_id, seasons, user_id),
    }
}

/// Result of an MCP tool call, ready to be serialized into a JSON-RPC response.
#[derive(Debug)]
pub struct ToolResult {
    /// MCP content blocks (a single `{"type":"text","text":"..."}` entry).
    pub content: Vec<Value>,
    /// Whether the tool call failed (maps to `isError` in the MCP response).
    pub is_error: bool,
}

impl ToolResult {
    fn success(value: Value) -> Self {
        Self::text(serde_json::to_string_pretty(&value).unwrap_or_default(), false)
    }

    fn failure(err: &ToolError) -> Self {
        Self::text(
            serde_json::to_string_pretty(&err.to_json()).unwrap_or_default(),
            true,
        )
    }

    fn text(text: String, is_error: bool) -> Self {
        Self {
            content: vec![json!({ "type": "text", "text": text })],
            is_error,
        }
    }
}

/// Why a tool call failed. Every variant is reported back to the agent as a
/// structured error; none of them ends the process.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// Caller-supplied data failed validation. Nothing was sent upstream.
    #[error("invalid argument '{field}': {reason}")]
    InvalidArgument { field: &'static str, reason: String },
    #[error("unknown tool '{0}'")]
    UnknownTool(String),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error(transparent)]
    Client(#[from] ClientError),
}

impl ToolError {
    pub fn kind(&self) -> &'static str {
        match self {
            ToolError::InvalidArgument { .. } => "invalid_argument",
            ToolError::UnknownTool(_) => "unknown_tool",
            ToolError::Resolve(ResolveError::NotFound { .. }) => "not_found",
            ToolError::Resolve(ResolveError::Ambiguous { .. }) => "ambiguous_name",
            ToolError::Client(ClientError::Unavailable(_)) => "upstream_unavailable",
            ToolError::Client(ClientError::Upstream { .. }) => "upstream_error",
            ToolError::Client(ClientError::Decode(_)) => "decode_error",
        }
    }

    /// Structured body returned to the agent.
    pub fn to_json(&self) -> Value {
        let mut error = json!({
            "kind": self.kind(),
            "message": self.to_string(),
        });
        match self {
            ToolError::InvalidArgument { field, .. } => {
                error["field"] = json!(field);
            }
            ToolError::UnknownTool(name) => {
                error["tool"] = json!(name);
            }
            ToolError::Resolve(ResolveError::NotFound { kind, name }) => {
                error["lookup"] = json!(kind.as_str());
                error["name"] = json!(name);
            }
            ToolError::Resolve(ResolveError::Ambiguous {
                kind,
                name,
                candidates,
            }) => {
                error["lookup"] = json!(kind.as_str());
                error["name"] = json!(name);
                error["candidates"] = json!(candidates);
            }
            ToolError::Client(ClientError::Upstream { status, body }) => {
                error["status"] = json!(status);
                error["body"] = json!(body);
            }
            ToolError::Client(_) => {}
        }
        json!({ "error": error })
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ToolError {
    ToolError::InvalidArgument {
        field,
        reason: reason.into(),
    }
}

// --- Argument extraction ---

/// Absent and `null` both mean "not given".
fn param<'a>(args: &'a Value, field: &str) -> Option<&'a Value> {
    args.get(field).filter(|v| !v.is_null())
}

fn optional_int(args: &Value, field: &'static str) -> Result<Option<i64>, ToolError> {
    match param(args, field) {
        None => Ok(None),
        Some(v) => v
            .as_i64()
            .map(Some)
            .ok_or_else(|| invalid(field, format!("must be an integer, got {v}"))),
    }
}

fn optional_str<'a>(args: &'a Value, field: &'static str) -> Result<Option<&'a str>, ToolError> {
    match param(args, field) {
        None => Ok(None),
        Some(v) => v
            .as_str()
            .map(Some)
            .ok_or_else(|| invalid(field, format!("must be a string, got {v}"))),
    }
}

fn required_str<'a>(args: &'a Value, field: &'static str) -> Result<&'a str, ToolError> {
    match optional_str(args, field)? {
        None => Err(invalid(field, "is required")),
        Some(s) if s.trim().is_empty() => Err(invalid(field, "must not be empty")),
        Some(s) => Ok(s),
    }
}

fn to_u32(field: &'static str, value: i64) -> Result<u32, ToolError> {
    u32::try_from(value).map_err(|_| invalid(field, format!("out of range: {value}")))
}

fn tmdb_id_param(args: &Value) -> Result<i64, ToolError> {
    match optional_int(args, "tmdbId")? {
        None => Err(invalid("tmdbId", "is required")),
        Some(id) if id <= 0 => Err(invalid("tmdbId", format!("must be a positive integer, got {id}"))),
        Some(id) => Ok(id),
    }
}

/// `seasons` is TV-only; when present it must be a non-empty list of
/// positive season numbers.
fn seasons_param(args: &Value, kind: MediaKind) -> Result<Option<Vec<u32>>, ToolError> {
    let Some(value) = param(args, "seasons") else {
        return Ok(None);
    };
    if kind != MediaKind::Tv {
        return Err(invalid("seasons", "only accepted for TV requests"));
    }
    let items = value
        .as_array()
        .ok_or_else(|| invalid("seasons", "must be an array of season numbers"))?;
    if items.is_empty() {
        return Err(invalid("seasons", "must not be empty; omit it to request all seasons"));
    }
    items
        .iter()
        .map(|item| match item.as_i64() {
            Some(n) if n > 0 => to_u32("seasons", n),
            _ => Err(invalid(
                "seasons",
                format!("season numbers must be positive integers, got {item}"),
            )),
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Some)
}

fn non_negative(args: &Value, field: &'static str, default: u32) -> Result<u32, ToolError> {
    match optional_int(args, field)? {
        None => Ok(default),
        Some(n) if n < 0 => Err(invalid(field, format!("must be non-negative, got {n}"))),
        Some(n) => to_u32(field, n),
    }
}

fn pagination_filter(args: &Value) -> Result<PaginationFilter, ToolError> {
    let take = non_negative(args, "take", DEFAULT_TAKE)?;
    let skip = non_negative(args, "skip", 0)?;

    let status = match optional_str(args, "status")? {
        Some(s) if REQUEST_FILTERS.contains(&s) => Some(s.to_string()),
        Some(s) => {
            tracing::warn!(status = s, "unknown request status filter, listing all");
            None
        }
        None => None,
    };

    let start_date = match optional_str(args, "startDate")? {
        None => None,
        Some(s) => Some(parse_start_date(s).ok_or_else(|| {
            invalid(
                "startDate",
                format!("expected an ISO-8601 timestamp such as 2024-05-01T00:00:00.000Z, got '{s}'"),
            )
        })?),
    };

    Ok(PaginationFilter {
        take,
        skip,
        status,
        start_date,
    })
}

/// Accepts a full RFC 3339 timestamp or a bare `YYYY-MM-DD` date (midnight UTC).
fn parse_start_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

// --- Tool definitions ---

/// Build every tool definition, embedding the directory's name lists.
pub fn tool_definitions(names: &Enumerations) -> Vec<Value> {
    let listing_schema = json!({
        "type": "object",
        "properties": {
            "status": {
                "type": "string",
                "description": format!(
                    "Filter by request/media status: {}. Unknown values list everything.",
                    REQUEST_FILTERS.join(", ")
                )
            },
            "startDate": {
                "type": "string",
                "description": "Only requests created on or after this time, e.g. '2024-05-01T00:00:00.000Z' or '2024-05-01'."
            },
            "take": {
                "type": "integer",
                "minimum": 0,
                "description": "Page size. Default 7."
            },
            "skip": {
                "type": "integer",
                "minimum": 0,
                "description": "Number of requests to skip. Default 0."
            }
        },
        "additionalProperties": false
    });

    let seasons_schema = json!({
        "type": "array",
        "items": { "type": "integer", "minimum": 1 },
        "minItems": 1,
        "description": "Season numbers to request. Omit to request every season."
    });

    vec![
        json!({
            "name": "status",
            "description": "Get the status of the Overseerr server (version, available updates). No arguments required.",
            "inputSchema": {
                "type": "object",
                "properties": {},
                "additionalProperties": false
            }
        }),
        json!({
            "name": "movie_requests",
            "description": "List movie requests, newest first as returned by Overseerr, with approval status and availability.",
            "inputSchema": listing_schema
        }),
        json!({
            "name": "tv_requests",
            "description": "List TV show requests, as returned by Overseerr, with approval status, availability and requested seasons.",
            "inputSchema": listing_schema
        }),
        json!({
            "name": "request_movie_to_library",
            "description": "Request a movie by TMDB ID, routed to a named movie library and made on behalf of a named user.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "tmdbId": {
                        "type": "integer",
                        "minimum": 1,
                        "description": "The Movie Database ID of the movie (see search_media)."
                    },
                    "libraryName": {
                        "type": "string",
                        "description": format!("Exact name of the movie library. Configured: {}.", names.movie_libraries)
                    },
                    "userDisplayName": {
                        "type": "string",
                        "description": format!("Exact display name of the requesting user. Known users: {}.", names.users)
                    }
                },
                "required": ["tmdbId", "libraryName", "userDisplayName"],
                "additionalProperties": false
            }
        }),
        json!({
            "name": "request_tv_to_library",
            "description": "Request a TV show by TMDB ID, routed to a named TV library and made on behalf of a named user.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "tmdbId": {
                        "type": "integer",
                        "minimum": 1,
                        "description": "The Movie Database ID of the show (see search_media)."
                    },
                    "libraryName": {
                        "type": "string",
                        "description": format!("Exact name of the TV library. Configured: {}.", names.tv_libraries)
                    },
                    "userDisplayName": {
                        "type": "string",
                        "description": format!("Exact display name of the requesting user. Known users: {}.", names.users)
                    },
                    "seasons": seasons_schema
                },
                "required": ["tmdbId", "libraryName", "userDisplayName"],
                "additionalProperties": false
            }
        }),
        json!({
            "name": "request_movie",
            "description": "Request a movie by TMDB ID using numeric ids. The requesting user defaults to REQUEST_USER_ID (or 1); the default library is used unless libraryId is given.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "tmdbId": {
                        "type": "integer",
                        "minimum": 1,
                        "description": "The Movie Database ID of the movie."
                    },
                    "userId": {
                        "type": "integer",
                        "minimum": 1,
                        "description": "Overseerr user id to request as (see get_users)."
                    },
                    "libraryId": {
                        "type": "integer",
                        "minimum": 0,
                        "description": "Movie library (Radarr server) id (see get_available_libraries)."
                    }
                },
                "required": ["tmdbId"],
                "additionalProperties": false
            }
        }),
        json!({
            "name": "request_tv",
            "description": "Request a TV show by TMDB ID using numeric ids. The requesting user defaults to REQUEST_USER_ID (or 1); the default library is used unless libraryId is given.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "tmdbId": {
                        "type": "integer",
                        "minimum": 1,
                        "description": "The Movie Database ID of the show."
                    },
                    "seasons": seasons_schema,
                    "userId": {
                        "type": "integer",
                        "minimum": 1,
                        "description": "Overseerr user id to request as (see get_users)."
                    },
                    "libraryId": {
                        "type": "integer",
                        "minimum": 0,
                        "description": "TV library (Sonarr server) id (see get_available_libraries)."
                    }
                },
                "required": ["tmdbId"],
                "additionalProperties": false
            }
        }),
        json!({
            "name": "search_media",
            "description": "Search Overseerr for movies, TV shows and people. Results include the TMDB ID needed to request media.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Search term, e.g. a title."
                    },
                    "page": {
                        "type": "integer",
                        "minimum": 1,
                        "description": "Result page. Default 1."
                    }
                },
                "required": ["query"],
                "additionalProperties": false
            }
        }),
        json!({
            "name": "get_available_libraries",
            "description": "List the movie and TV libraries (Radarr/Sonarr servers) requests can be routed to, with their ids.",
            "inputSchema": {
                "type": "object",
                "properties": {},
                "additionalProperties": false
            }
        }),
        json!({
            "name": "get_users",
            "description": "List Overseerr users with their ids and display names.",
            "inputSchema": {
                "type": "object",
                "properties": {},
                "additionalProperties": false
            }
        }),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::tests::sample;
    use crate::models::{RequestRecord, SearchResult};
    use crate::testing::{Call, FakeBackend};
    use pretty_assertions::assert_eq;

    fn config(request_user_id: Option<i64>) -> Arc<BackendConfig> {
        Arc::new(BackendConfig {
            api_key: "key".into(),
            base_url: "http://overseerr:5055".into(),
            request_user_id,
        })
    }

    fn dispatcher(backend: Arc<FakeBackend>) -> Dispatcher {
        Dispatcher::new(backend, Arc::new(sample()), config(None))
    }

    fn body(result: &ToolResult) -> Value {
        let text = result.content[0]["text"].as_str().unwrap();
        serde_json::from_str(text).unwrap()
    }

    async fn expect_error(d: &Dispatcher, tool: &str, args: Value) -> Value {
        let result = d.call(tool, &args).await;
        assert!(result.is_error, "{tool} should fail");
        body(&result)["error"].clone()
    }

    #[tokio::test]
    async fn listing_defaults_to_take_7_skip_0() {
        let backend = Arc::new(FakeBackend::default());
        let d = dispatcher(backend.clone());

        let result = d.call("movie_requests", &json!({})).await;
        assert!(!result.is_error);
        assert_eq!(
            backend.calls(),
            vec![Call::ListRequests(MediaKind::Movie, PaginationFilter::default())]
        );
        assert_eq!(body(&result)["take"], json!(7));
        assert_eq!(body(&result)["skip"], json!(0));
    }

    #[tokio::test]
    async fn listing_preserves_backend_order() {
        let requests: Vec<RequestRecord> = [9, 3, 7]
            .into_iter()
            .map(|id| {
                serde_json::from_value(json!({ "id": id, "type": "tv", "status": 1 })).unwrap()
            })
            .collect();
        let backend = Arc::new(FakeBackend {
            requests,
            ..FakeBackend::default()
        });
        let d = dispatcher(backend);

        let out = body(&d.call("tv_requests", &json!({ "take": 3 })).await);
        let ids: Vec<i64> = out["requests"]
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["id"].as_i64().unwrap())
            .collect();
        assert_eq!(ids, vec![9, 3, 7]);
        assert_eq!(out["requests"][0]["requestStatus"], json!("PENDING_APPROVAL"));
    }

    #[tokio::test]
    async fn listing_passes_filters_through() {
        let backend = Arc::new(FakeBackend::default());
        let d = dispatcher(backend.clone());

        d.call(
            "tv_requests",
            &json!({ "status": "pending", "startDate": "2024-05-01", "take": 20, "skip": 40 }),
        )
        .await;
        let expected = PaginationFilter {
            take: 20,
            skip: 40,
            status: Some("pending".into()),
            start_date: Some("2024-05-01T00:00:00Z".parse().unwrap()),
        };
        assert_eq!(backend.calls(), vec![Call::ListRequests(MediaKind::Tv, expected)]);
    }

    #[tokio::test]
    async fn unknown_status_filter_lists_everything() {
        let backend = Arc::new(FakeBackend::default());
        let d = dispatcher(backend.clone());

        let result = d.call("movie_requests", &json!({ "status": "bogus" })).await;
        assert!(!result.is_error);
        assert_eq!(
            backend.calls(),
            vec![Call::ListRequests(MediaKind::Movie, PaginationFilter::default())]
        );
    }

    #[tokio::test]
    async fn negative_take_is_rejected_without_network() {
        let backend = Arc::new(FakeBackend::default());
        let d = dispatcher(backend.clone());

        let err = expect_error(&d, "movie_requests", json!({ "take": -1 })).await;
        assert_eq!(err["kind"], json!("invalid_argument"));
        assert_eq!(err["field"], json!("take"));

        let err = expect_error(&d, "tv_requests", json!({ "startDate": "last week" })).await;
        assert_eq!(err["field"], json!("startDate"));
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn tv_request_to_library_resolves_names() {
        let backend = Arc::new(FakeBackend::default());
        let d = dispatcher(backend.clone());

        let result = d
            .call(
                "request_tv_to_library",
                &json!({
                    "tmdbId": 1396,
                    "libraryName": "TV Shows 4K",
                    "userDisplayName": "Jane Smith",
                    "seasons": [1, 2]
                }),
            )
            .await;
        assert!(!result.is_error);

        let expected = RequestSpec {
            tmdb_id: 1396,
            media_kind: MediaKind::Tv,
            seasons: Some(vec![1, 2]),
            target_library_id: Some(1),
            is_4k: true,
            requesting_user_id: 2,
        };
        assert_eq!(backend.calls(), vec![Call::CreateRequest(expected)]);
        assert_eq!(body(&result)["request"]["seasons"], json!([1, 2]));
    }

    #[tokio::test]
    async fn seasons_on_movie_request_rejected_before_network() {
        let backend = Arc::new(FakeBackend::default());
        let d = dispatcher(backend.clone());

        let err = expect_error(
            &d,
            "request_movie_to_library",
            json!({
                "tmdbId": 603,
                "libraryName": "Movies",
                "userDisplayName": "Admin",
                "seasons": [1]
            }),
        )
        .await;
        assert_eq!(err["kind"], json!("invalid_argument"));
        assert_eq!(err["field"], json!("seasons"));

        let err = expect_error(&d, "request_movie", json!({ "tmdbId": 603, "seasons": [1] })).await;
        assert_eq!(err["field"], json!("seasons"));
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn malformed_seasons_rejected() {
        let d = dispatcher(Arc::new(FakeBackend::default()));
        for seasons in [json!([]), json!([0]), json!([1, -2]), json!("1"), json!([1.5])] {
            let err = expect_error(
                &d,
                "request_tv",
                json!({ "tmdbId": 1396, "seasons": seasons }),
            )
            .await;
            assert_eq!(err["field"], json!("seasons"));
        }
    }

    #[tokio::test]
    async fn tmdb_id_must_be_positive_integer() {
        let backend = Arc::new(FakeBackend::default());
        let d = dispatcher(backend.clone());
        for tmdb_id in [json!(0), json!(-5), json!("603"), json!(null)] {
            let err = expect_error(&d, "request_movie", json!({ "tmdbId": tmdb_id })).await;
            assert_eq!(err["field"], json!("tmdbId"));
        }
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn ambiguous_user_aborts_request() {
        let backend = Arc::new(FakeBackend::default());
        let d = dispatcher(backend.clone());

        let err = expect_error(
            &d,
            "request_movie_to_library",
            json!({ "tmdbId": 603, "libraryName": "Movies", "userDisplayName": "Alex" }),
        )
        .await;
        assert_eq!(err["kind"], json!("ambiguous_name"));
        assert_eq!(err["candidates"], json!([3, 4]));
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn library_of_wrong_kind_is_not_found() {
        let backend = Arc::new(FakeBackend::default());
        let d = dispatcher(backend.clone());

        let err = expect_error(
            &d,
            "request_tv_to_library",
            json!({ "tmdbId": 1396, "libraryName": "Movies", "userDisplayName": "Admin" }),
        )
        .await;
        assert_eq!(err["kind"], json!("not_found"));
        assert_eq!(err["lookup"], json!("TV library"));
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn request_by_id_uses_user_precedence() {
        let backend = Arc::new(FakeBackend::default());
        let d = Dispatcher::new(backend.clone(), Arc::new(sample()), config(Some(7)));

        d.call("request_movie", &json!({ "tmdbId": 603 })).await;
        d.call("request_movie", &json!({ "tmdbId": 603, "userId": 5 })).await;
        let users: Vec<i64> = backend
            .calls()
            .into_iter()
            .map(|c| match c {
                Call::CreateRequest(spec) => spec.requesting_user_id,
                other => panic!("unexpected call {other:?}"),
            })
            .collect();
        assert_eq!(users, vec![7, 5]);

        let backend = Arc::new(FakeBackend::default());
        let d = dispatcher(backend.clone());
        d.call("request_tv", &json!({ "tmdbId": 1396 })).await;
        assert_eq!(
            backend.calls(),
            vec![Call::CreateRequest(RequestSpec::tv(1396, None, 1))]
        );
    }

    #[tokio::test]
    async fn request_by_library_id_carries_4k_flag() {
        let backend = Arc::new(FakeBackend::default());
        let d = dispatcher(backend.clone());

        d.call("request_movie", &json!({ "tmdbId": 603, "libraryId": 1 })).await;
        assert_eq!(
            backend.calls(),
            vec![Call::CreateRequest(
                RequestSpec::movie(603, 1).with_library(1, true)
            )]
        );
    }

    #[tokio::test]
    async fn upstream_401_is_reported_not_raised() {
        let backend = Arc::new(FakeBackend::failing(401));
        let d = dispatcher(backend);

        for (tool, args) in [
            ("status", json!({})),
            ("movie_requests", json!({})),
            ("search_media", json!({ "query": "Heat" })),
            ("request_movie", json!({ "tmdbId": 949 })),
        ] {
            let err = expect_error(&d, tool, args).await;
            assert_eq!(err["kind"], json!("upstream_error"));
            assert_eq!(err["status"], json!(401));
        }
    }

    #[tokio::test]
    async fn search_reports_empty_results() {
        let backend = Arc::new(FakeBackend::default());
        let d = dispatcher(backend.clone());

        let out = body(&d.call("search_media", &json!({ "query": "zzzz", "page": 2 })).await);
        assert_eq!(
            out["message"],
            json!("No results found for query 'zzzz' on page 2.")
        );
        assert_eq!(backend.calls(), vec![Call::Search("zzzz".into(), 2)]);
    }

    #[tokio::test]
    async fn search_returns_normalized_results() {
        let backend = Arc::new(FakeBackend {
            search_results: vec![SearchResult {
                media_kind: "movie".into(),
                title: "Heat".into(),
                year: Some("1995".into()),
                tmdb_id: 949,
                original_language: Some("en".into()),
                overview: None,
                original_title: Some("Heat".into()),
                origin_country: None,
            }],
            ..FakeBackend::default()
        });
        let d = dispatcher(backend.clone());

        let out = body(&d.call("search_media", &json!({ "query": "Heat" })).await);
        assert_eq!(out["page"], json!(1));
        assert_eq!(out["results"][0]["tmdbId"], json!(949));
        assert_eq!(out["results"][0]["mediaKind"], json!("movie"));

        let err = expect_error(&d, "search_media", json!({ "query": "  " })).await;
        assert_eq!(err["field"], json!("query"));
        let err = expect_error(&d, "search_media", json!({ "query": "x", "page": 0 })).await;
        assert_eq!(err["field"], json!("page"));
        assert_eq!(backend.calls().len(), 1);
    }

    #[tokio::test]
    async fn directory_tools_return_snapshot_without_network() {
        let backend = Arc::new(FakeBackend::default());
        let d = dispatcher(backend.clone());

        let libs = body(&d.call("get_available_libraries", &json!({})).await);
        assert_eq!(libs["libraries"].as_array().unwrap().len(), 6);
        assert_eq!(
            libs["libraries"][1],
            json!({ "id": 1, "name": "Movies 4K", "mediaKind": "movie", "is4k": true, "isDefault": false })
        );

        let users = body(&d.call("get_users", &json!({})).await);
        assert_eq!(users["users"][1]["displayName"], json!("Jane Smith"));
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn unknown_tool_is_a_structured_error() {
        let backend = Arc::new(FakeBackend::default());
        let d = dispatcher(backend.clone());
        let err = expect_error(&d, "delete_everything", json!({})).await;
        assert_eq!(err["kind"], json!("unknown_tool"));
        assert_eq!(err["tool"], json!("delete_everything"));
        assert_eq!(err["message"], json!("unknown tool 'delete_everything'"));
        assert!(backend.calls().is_empty());
    }

    #[test]
    fn status_filter_is_described_not_enforced() {
        let d = dispatcher(Arc::new(FakeBackend::default()));
        for tool in &d.definitions()[1..3] {
            let status = &tool["inputSchema"]["properties"]["status"];
            assert!(status.get("enum").is_none());
            let desc = status["description"].as_str().unwrap();
            for value in REQUEST_FILTERS {
                assert!(desc.contains(value), "{value} missing from {desc}");
            }
        }
    }

    #[test]
    fn definitions_embed_directory_names() {
        let d = dispatcher(Arc::new(FakeBackend::default()));
        let names: Vec<&str> = d
            .definitions()
            .iter()
            .map(|t| t["name"].as_str().unwrap())
            .collect();
        assert_eq!(
            names,
            vec![
                "status",
                "movie_requests",
                "tv_requests",
                "request_movie_to_library",
                "request_tv_to_library",
                "request_movie",
                "request_tv",
                "search_media",
                "get_available_libraries",
                "get_users",
            ]
        );

        let tv = &d.definitions()[4];
        let lib_desc = tv["inputSchema"]["properties"]["libraryName"]["description"]
            .as_str()
            .unwrap();
        assert!(lib_desc.contains("\"TV Shows 4K\""));
        assert!(!lib_desc.contains("\"Movies\""));
        // Names are hints, not an enforced enum.
        assert!(tv["inputSchema"]["properties"]["libraryName"]
            .get("enum")
            .is_none());
    }

    #[test]
    fn start_date_accepts_timestamp_or_date() {
        assert_eq!(
            parse_start_date("2024-05-01T10:30:00.000Z"),
            Some("2024-05-01T10:30:00Z".parse().unwrap())
        );
        assert_eq!(
            parse_start_date("2024-05-01"),
            Some("2024-05-01T00:00:00Z".parse().unwrap())
        );
        assert_eq!(parse_start_date("yesterday"), None);
    }
}
