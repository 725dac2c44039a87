//! In-memory [`Backend`] used by unit tests. Records every call so tests can
//! assert exactly which requests would have reached Overseerr.

use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::client::{Backend, ClientError};
use crate::models::{
    LibraryEntry, MediaKind, PaginationFilter, RequestRecord, RequestSpec, SearchResult, UserEntry,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Status,
    ListRequests(MediaKind, PaginationFilter),
    CreateRequest(RequestSpec),
    Search(String, u32),
    ListLibraries,
    ListUsers,
}

#[derive(Default)]
pub struct FakeBackend {
    pub calls: Mutex<Vec<Call>>,
    /// When set, every call fails with this HTTP status.
    pub fail_status: Option<u16>,
    pub libraries: Vec<LibraryEntry>,
    pub users: Vec<UserEntry>,
    pub requests: Vec<RequestRecord>,
    pub search_results: Vec<SearchResult>,
}

impl FakeBackend {
    pub fn failing(status: u16) -> Self {
        Self {
            fail_status: Some(status),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: Call) -> Result<(), ClientError> {
        self.calls.lock().unwrap().push(call);
        match self.fail_status {
            Some(status) => Err(ClientError::Upstream {
                status,
                body: json!({ "message": "Unauthorized" }).to_string(),
            }),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn get_status(&self) -> Result<Value, ClientError> {
        self.record(Call::Status)?;
        Ok(json!({ "version": "1.33.2", "updateAvailable": false }))
    }

    async fn list_requests(
        &self,
        kind: MediaKind,
        filter: &PaginationFilter,
    ) -> Result<Vec<RequestRecord>, ClientError> {
        self.record(Call::ListRequests(kind, filter.clone()))?;
        Ok(self.requests.clone())
    }

    async fn create_request(&self, spec: &RequestSpec) -> Result<RequestRecord, ClientError> {
        self.record(Call::CreateRequest(spec.clone()))?;
        let record = json!({
            "id": 42,
            "status": 1,
            "type": spec.media_kind,
            "createdAt": "2024-05-01T12:00:00.000Z",
            "media": { "tmdbId": spec.tmdb_id, "status": 2 },
            "requestedBy": { "id": spec.requesting_user_id, "displayName": "Requester" },
            "seasons": spec
                .seasons
                .iter()
                .flatten()
                .map(|n| json!({ "seasonNumber": n }))
                .collect::<Vec<_>>(),
        });
        Ok(serde_json::from_value(record).unwrap())
    }

    async fn search(&self, query: &str, page: u32) -> Result<Vec<SearchResult>, ClientError> {
        self.record(Call::Search(query.to_string(), page))?;
        Ok(self.search_results.clone())
    }

    async fn list_libraries(&self) -> Result<Vec<LibraryEntry>, ClientError> {
        self.record(Call::ListLibraries)?;
        Ok(self.libraries.clone())
    }

    async fn list_users(&self) -> Result<Vec<UserEntry>, ClientError> {
        self.record(Call::ListUsers)?;
        Ok(self.users.clone())
    }
}
