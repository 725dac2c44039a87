//! Name → id resolution against the startup [`Directory`].
//!
//! Matching is exact and case-sensitive on the name Overseerr reports. A
//! name with no match is [`ResolveError::NotFound`]; a name with several
//! matches is [`ResolveError::Ambiguous`] and lists every candidate id. No
//! candidate is ever picked on the caller's behalf.

use std::fmt;

use crate::directory::Directory;
use crate::models::{LibraryEntry, MediaKind};

/// What was being looked up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupKind {
    MovieLibrary,
    TvLibrary,
    User,
}

impl LookupKind {
    pub fn as_str(self) -> &'static str {
        match self {
            LookupKind::MovieLibrary => "movie library",
            LookupKind::TvLibrary => "TV library",
            LookupKind::User => "user",
        }
    }
}

impl fmt::Display for LookupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("no {kind} named '{name}'")]
    NotFound { kind: LookupKind, name: String },
    #[error("{kind} name '{name}' is ambiguous: it matches ids {candidates:?}")]
    Ambiguous {
        kind: LookupKind,
        name: String,
        candidates: Vec<i64>,
    },
}

/// Resolve a library name among libraries serving `media_kind`.
pub fn resolve_library<'a>(
    dir: &'a Directory,
    name: &str,
    media_kind: MediaKind,
) -> Result<&'a LibraryEntry, ResolveError> {
    let kind = match media_kind {
        MediaKind::Movie => LookupKind::MovieLibrary,
        MediaKind::Tv => LookupKind::TvLibrary,
    };
    let matches: Vec<&LibraryEntry> = dir
        .libraries_named(name)
        .filter(|lib| lib.media_kind == media_kind)
        .collect();
    exactly_one(matches, |lib| lib.id, kind, name)
}

/// Resolve a user display name to a user id.
pub fn resolve_user(dir: &Directory, display_name: &str) -> Result<i64, ResolveError> {
    let matches: Vec<i64> = dir.users_named(display_name).map(|u| u.id).collect();
    exactly_one(matches, |&id| id, LookupKind::User, display_name)
}

fn exactly_one<T>(
    mut matches: Vec<T>,
    id_of: impl Fn(&T) -> i64,
    kind: LookupKind,
    name: &str,
) -> Result<T, ResolveError> {
    match matches.len() {
        0 => Err(ResolveError::NotFound {
            kind,
            name: name.to_string(),
        }),
        1 => Ok(matches.remove(0)),
        _ => Err(ResolveError::Ambiguous {
            kind,
            name: name.to_string(),
            candidates: matches.iter().map(id_of).collect(),
        }),
    }
}
