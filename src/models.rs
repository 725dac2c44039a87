//! Typed records exchanged with Overseerr.
//!
//! Two families of types live here:
//!
//! - **Upstream shapes** (`Raw*`, [`RequestRecord`], [`PagedResponse`]) mirror
//!   the JSON that Overseerr returns. Fields the tools never read are left out;
//!   serde ignores them.
//! - **Normalized records** ([`LibraryEntry`], [`UserEntry`], [`RequestSummary`],
//!   [`SearchResult`]) are what the tools hand back to the agent.
//!
//! This module is pure data — no I/O.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Page size used when none is given to a request-listing tool.
pub const DEFAULT_TAKE: u32 = 7;

/// Values accepted by Overseerr's `filter` query parameter on `/request`.
pub const REQUEST_FILTERS: &[&str] = &[
    "all",
    "approved",
    "available",
    "pending",
    "processing",
    "unavailable",
    "failed",
];

/// Kind of media a library serves or a request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Movie,
    Tv,
}

impl MediaKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MediaKind::Movie => "movie",
            MediaKind::Tv => "tv",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Human-readable name for a media availability code (`media.status`).
pub fn media_availability(code: i64) -> &'static str {
    match code {
        2 => "PENDING",
        3 => "PROCESSING",
        4 => "PARTIALLY_AVAILABLE",
        5 => "AVAILABLE",
        _ => "UNKNOWN",
    }
}

/// Human-readable name for a request approval code (`request.status`).
pub fn request_status(code: i64) -> &'static str {
    match code {
        1 => "PENDING_APPROVAL",
        2 => "APPROVED",
        3 => "DECLINED",
        _ => "UNKNOWN",
    }
}

// --- Libraries ---

/// A Radarr or Sonarr server configured in Overseerr. Requests are routed to
/// one of these via `serverId`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryEntry {
    pub id: i64,
    pub name: String,
    pub media_kind: MediaKind,
    #[serde(rename = "is4k")]
    pub is_4k: bool,
    pub is_default: bool,
}

/// Entry of `GET /settings/radarr` or `GET /settings/sonarr`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawServerSettings {
    pub id: i64,
    pub name: String,
    #[serde(default, rename = "is4k")]
    pub is_4k: bool,
    #[serde(default)]
    pub is_default: bool,
}

impl RawServerSettings {
    pub fn into_entry(self, media_kind: MediaKind) -> LibraryEntry {
        LibraryEntry {
            id: self.id,
            name: self.name,
            media_kind,
            is_4k: self.is_4k,
            is_default: self.is_default,
        }
    }
}

// --- Users ---

/// An Overseerr user, as exposed to the agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserEntry {
    pub id: i64,
    pub display_name: String,
    pub username: String,
    pub email: String,
}

/// User object as returned by `/user` and embedded in requests.
///
/// Plex-imported users often have no local `username`; Overseerr then fills
/// `displayName` from the Plex name.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawUser {
    pub id: i64,
    pub display_name: Option<String>,
    pub username: Option<String>,
    pub plex_username: Option<String>,
    pub email: Option<String>,
}

impl RawUser {
    /// Best available display name: `displayName`, then local or Plex
    /// username, then email.
    pub fn best_display_name(&self) -> String {
        [
            &self.display_name,
            &self.username,
            &self.plex_username,
            &self.email,
        ]
        .into_iter()
        .flatten()
        .find(|s| !s.is_empty())
        .cloned()
        .unwrap_or_default()
    }
}

impl From<RawUser> for UserEntry {
    fn from(raw: RawUser) -> Self {
        let display_name = raw.best_display_name();
        UserEntry {
            id: raw.id,
            display_name,
            username: raw.username.or(raw.plex_username).unwrap_or_default(),
            email: raw.email.unwrap_or_default(),
        }
    }
}

// --- Paging ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    /// Total number of records across all pages.
    #[serde(default)]
    pub results: u32,
}

/// Paged envelope used by `/user` and `/request`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PagedResponse<T> {
    pub page_info: Option<PageInfo>,
    #[serde(default = "Vec::new")]
    pub results: Vec<T>,
}

/// Per-call pagination and filtering for the request-listing tools.
#[derive(Debug, Clone, PartialEq)]
pub struct PaginationFilter {
    pub take: u32,
    pub skip: u32,
    /// One of [`REQUEST_FILTERS`], or `None` for no filter.
    pub status: Option<String>,
    /// Only requests created at or after this instant are kept.
    pub start_date: Option<DateTime<Utc>>,
}

impl Default for PaginationFilter {
    fn default() -> Self {
        Self {
            take: DEFAULT_TAKE,
            skip: 0,
            status: None,
            start_date: None,
        }
    }
}

impl PaginationFilter {
    /// The value for Overseerr's `filter` query parameter (`all` sends none).
    pub fn upstream_filter(&self) -> Option<&str> {
        self.status.as_deref().filter(|s| *s != "all")
    }

    /// Whether a request created at `created_at` passes the `start_date` bound.
    /// Records with a missing or unparseable timestamp are kept.
    pub fn admits(&self, created_at: Option<&str>) -> bool {
        let (Some(start), Some(created)) = (self.start_date, created_at) else {
            return true;
        };
        match DateTime::parse_from_rfc3339(created) {
            Ok(created) => created.with_timezone(&Utc) >= start,
            Err(_) => true,
        }
    }
}

// --- Requests ---

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestMedia {
    pub tmdb_id: Option<i64>,
    pub tvdb_id: Option<i64>,
    pub status: Option<i64>,
    pub media_type: Option<MediaKind>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestSeason {
    pub season_number: u32,
}

/// A media request as returned by `/request` and `POST /request`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestRecord {
    pub id: i64,
    #[serde(default)]
    pub status: i64,
    #[serde(rename = "type")]
    pub kind: Option<MediaKind>,
    pub created_at: Option<String>,
    pub media: Option<RequestMedia>,
    pub requested_by: Option<RawUser>,
    #[serde(default)]
    pub seasons: Vec<RequestSeason>,
    #[serde(default, rename = "is4k")]
    pub is_4k: bool,
}

impl RequestRecord {
    /// Media kind of the request. Older Overseerr releases omit `type`; those
    /// fall back to the media record, and finally to whether a TVDB id exists.
    pub fn media_kind(&self) -> MediaKind {
        if let Some(kind) = self.kind {
            return kind;
        }
        match &self.media {
            Some(RequestMedia {
                media_type: Some(kind),
                ..
            }) => *kind,
            Some(RequestMedia {
                tvdb_id: Some(_), ..
            }) => MediaKind::Tv,
            _ => MediaKind::Movie,
        }
    }

    pub fn summarize(&self) -> RequestSummary {
        let media = self.media.as_ref();
        RequestSummary {
            id: self.id,
            tmdb_id: media.and_then(|m| m.tmdb_id),
            media_kind: self.media_kind(),
            request_status: request_status(self.status),
            media_availability: media_availability(media.and_then(|m| m.status).unwrap_or(1)),
            requested_by: self.requested_by.as_ref().map(RawUser::best_display_name),
            seasons: self.seasons.iter().map(|s| s.season_number).collect(),
            created_at: self.created_at.clone(),
            is_4k: self.is_4k,
        }
    }
}

/// Agent-facing view of a request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestSummary {
    pub id: i64,
    pub tmdb_id: Option<i64>,
    pub media_kind: MediaKind,
    pub request_status: &'static str,
    pub media_availability: &'static str,
    pub requested_by: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub seasons: Vec<u32>,
    pub created_at: Option<String>,
    #[serde(rename = "is4k", skip_serializing_if = "is_false")]
    pub is_4k: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Payload for `POST /request`, built from resolved tool arguments.
///
/// Construct through [`RequestSpec::movie`] or [`RequestSpec::tv`] so that
/// seasons can only be attached to TV requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestSpec {
    pub tmdb_id: i64,
    pub media_kind: MediaKind,
    pub seasons: Option<Vec<u32>>,
    pub target_library_id: Option<i64>,
    pub is_4k: bool,
    pub requesting_user_id: i64,
}

impl RequestSpec {
    pub fn movie(tmdb_id: i64, requesting_user_id: i64) -> Self {
        Self {
            tmdb_id,
            media_kind: MediaKind::Movie,
            seasons: None,
            target_library_id: None,
            is_4k: false,
            requesting_user_id,
        }
    }

    pub fn tv(tmdb_id: i64, seasons: Option<Vec<u32>>, requesting_user_id: i64) -> Self {
        Self {
            tmdb_id,
            media_kind: MediaKind::Tv,
            seasons,
            target_library_id: None,
            is_4k: false,
            requesting_user_id,
        }
    }

    /// Route the request to a specific library.
    pub fn with_library(mut self, library_id: i64, is_4k: bool) -> Self {
        self.target_library_id = Some(library_id);
        self.is_4k = is_4k;
        self
    }

    /// JSON body for `POST /request`. A TV request without explicit seasons
    /// asks for all of them.
    pub fn to_body(&self) -> Value {
        let mut body = json!({
            "mediaType": self.media_kind,
            "mediaId": self.tmdb_id,
            "userId": self.requesting_user_id,
        });
        if self.media_kind == MediaKind::Tv {
            body["seasons"] = match &self.seasons {
                Some(seasons) => json!(seasons),
                None => json!("all"),
            };
        }
        if let Some(server_id) = self.target_library_id {
            body["serverId"] = json!(server_id);
        }
        if self.is_4k {
            body["is4k"] = json!(true);
        }
        body
    }
}

// --- Search ---

/// Envelope of `GET /search`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    #[serde(default)]
    pub results: Vec<RawSearchResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSearchResult {
    pub id: i64,
    #[serde(default)]
    pub media_type: String,
    pub title: Option<String>,
    pub name: Option<String>,
    pub original_title: Option<String>,
    pub original_name: Option<String>,
    pub release_date: Option<String>,
    pub first_air_date: Option<String>,
    pub overview: Option<String>,
    pub original_language: Option<String>,
    #[serde(default)]
    pub origin_country: Vec<String>,
}

/// One search hit, normalized across movies, shows and people.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub media_kind: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<String>,
    pub tmdb_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overview: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin_country: Option<String>,
}

impl From<RawSearchResult> for SearchResult {
    fn from(raw: RawSearchResult) -> Self {
        let is_movie = raw.media_type == "movie";
        let title = if is_movie { raw.title } else { raw.name };
        let title = title.unwrap_or_else(|| "Unknown Title".to_string());
        let date = if is_movie {
            raw.release_date
        } else {
            raw.first_air_date
        };
        let year = date.and_then(|d| d.get(..4).map(str::to_string));
        let original_title = if is_movie {
            raw.original_title
        } else {
            raw.original_name
        };
        let origin_country = if raw.media_type == "tv" && !raw.origin_country.is_empty() {
            Some(raw.origin_country.join(", "))
        } else {
            None
        };

        SearchResult {
            media_kind: raw.media_type,
            title,
            year,
            tmdb_id: raw.id,
            original_language: raw.original_language,
            overview: raw.overview.filter(|o| !o.is_empty()),
            original_title,
            origin_country,
        }
    }
}
