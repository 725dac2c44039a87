//! Startup snapshot of Overseerr libraries and users.
//!
//! [`Directory::build`] runs once before the stdio server starts. It fetches
//! every Radarr/Sonarr server and every user, then indexes them by name so
//! tool calls can refer to "Movies 4K" or "Jane Smith" instead of numeric ids.
//!
//! Each index maps a name to *all* entries carrying it. Overseerr does not
//! enforce unique names, so collisions are kept and surfaced by
//! [`crate::resolver`] instead of being collapsed here.
//!
//! The snapshot is never refreshed. Libraries or users added after startup
//! are unknown until the process restarts.

use indexmap::IndexMap;

use crate::client::{Backend, ClientError};
use crate::models::{LibraryEntry, MediaKind, UserEntry};

/// Read-only index of libraries and users, built once at startup.
#[derive(Debug, Default)]
pub struct Directory {
    libraries: Vec<LibraryEntry>,
    users: Vec<UserEntry>,
    /// Library name → positions in `libraries`.
    library_index: IndexMap<String, Vec<usize>>,
    /// User display name → positions in `users`.
    user_index: IndexMap<String, Vec<usize>>,
}

/// Human-readable name lists embedded into tool descriptions.
///
/// Purely descriptive: resolution goes through the indexes, never through
/// these strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enumerations {
    pub movie_libraries: String,
    pub tv_libraries: String,
    pub users: String,
}

impl Directory {
    /// Fetch libraries and users from Overseerr and index them.
    pub async fn build(backend: &dyn Backend) -> Result<Self, DirectoryError> {
        let (libraries, users) = tokio::try_join!(
            async {
                backend
                    .list_libraries()
                    .await
                    .map_err(|source| DirectoryError::BuildFailed {
                        what: "libraries",
                        source,
                    })
            },
            async {
                backend
                    .list_users()
                    .await
                    .map_err(|source| DirectoryError::BuildFailed {
                        what: "users",
                        source,
                    })
            },
        )?;
        Ok(Self::from_entries(libraries, users))
    }

    /// Index already-fetched entries, preserving backend order.
    pub fn from_entries(libraries: Vec<LibraryEntry>, users: Vec<UserEntry>) -> Self {
        let mut library_index: IndexMap<String, Vec<usize>> = IndexMap::new();
        for (pos, lib) in libraries.iter().enumerate() {
            library_index.entry(lib.name.clone()).or_default().push(pos);
        }

        let mut user_index: IndexMap<String, Vec<usize>> = IndexMap::new();
        for (pos, user) in users.iter().enumerate() {
            user_index
                .entry(user.display_name.clone())
                .or_default()
                .push(pos);
        }

        Self {
            libraries,
            users,
            library_index,
            user_index,
        }
    }

    pub fn libraries(&self) -> &[LibraryEntry] {
        &self.libraries
    }

    pub fn users(&self) -> &[UserEntry] {
        &self.users
    }

    /// All libraries whose name is exactly `name`.
    pub fn libraries_named<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a LibraryEntry> {
        self.library_index
            .get(name)
            .into_iter()
            .flatten()
            .map(move |&pos| &self.libraries[pos])
    }

    /// All users whose display name is exactly `display_name`.
    pub fn users_named<'a>(&'a self, display_name: &str) -> impl Iterator<Item = &'a UserEntry> {
        self.user_index
            .get(display_name)
            .into_iter()
            .flatten()
            .map(move |&pos| &self.users[pos])
    }

    /// Render the distinct names of each index for tool descriptions.
    pub fn enumerations(&self) -> Enumerations {
        Enumerations {
            movie_libraries: self.library_names(MediaKind::Movie),
            tv_libraries: self.library_names(MediaKind::Tv),
            users: join_names(self.user_index.keys().map(String::as_str)),
        }
    }

    fn library_names(&self, kind: MediaKind) -> String {
        join_names(
            self.library_index
                .iter()
                .filter(|(_, positions)| {
                    positions
                        .iter()
                        .any(|&pos| self.libraries[pos].media_kind == kind)
                })
                .map(|(name, _)| name.as_str()),
        )
    }
}

/// Empty names cannot be passed to a tool, so they are left out.
fn join_names<'a>(names: impl Iterator<Item = &'a str>) -> String {
    let joined = names
        .filter(|n| !n.is_empty())
        .map(|n| format!("\"{n}\""))
        .collect::<Vec<_>>()
        .join(", ");
    if joined.is_empty() {
        "(none configured)".to_string()
    } else {
        joined
    }
}

/// The startup snapshot could not be taken. Fatal: tools that enumerate
/// libraries and users cannot be advertised without it.
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("failed to load {what} from Overseerr: {source}")]
    BuildFailed {
        what: &'static str,
        #[source]
        source: ClientError,
    },
}
