//! Layered default resolution.
//!
//! A field that may come from the caller, from process configuration, or from
//! a hardcoded fallback is resolved by a [`Precedence`] chain: an ordered list
//! of lookups tried in sequence, the first `Some` winning. The requesting
//! user of a media request is the one field resolved this way:
//!
//! 1. explicit `userId` tool argument
//! 2. `REQUEST_USER_ID` from the environment
//! 3. [`FALLBACK_USER_ID`]
//!
//! The resolved id is not checked against the user list; Overseerr rejects
//! unknown ids itself.

/// User id used when neither the caller nor the environment names one.
pub const FALLBACK_USER_ID: i64 = 1;

/// Outcome of a [`Precedence`] chain, with the name of the layer that supplied it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolved<T> {
    pub value: T,
    pub source: &'static str,
}

struct Layer<'a, T> {
    name: &'static str,
    lookup: Box<dyn Fn() -> Option<T> + 'a>,
}

/// Ordered list of lookups with a terminal fallback.
pub struct Precedence<'a, T> {
    layers: Vec<Layer<'a, T>>,
    fallback: T,
}

impl<'a, T: Copy> Precedence<'a, T> {
    pub fn new(fallback: T) -> Self {
        Self {
            layers: Vec::new(),
            fallback,
        }
    }

    /// Append a layer; earlier layers take precedence over later ones.
    pub fn layer(mut self, name: &'static str, lookup: impl Fn() -> Option<T> + 'a) -> Self {
        self.layers.push(Layer {
            name,
            lookup: Box::new(lookup),
        });
        self
    }

    pub fn resolve(&self) -> Resolved<T> {
        self.layers
            .iter()
            .find_map(|layer| {
                (layer.lookup)().map(|value| Resolved {
                    value,
                    source: layer.name,
                })
            })
            .unwrap_or(Resolved {
                value: self.fallback,
                source: "fallback",
            })
    }
}

/// Resolve the requesting user id from an optional tool argument and the
/// configured `REQUEST_USER_ID`.
pub fn resolve_user_id(explicit: Option<i64>, configured: Option<i64>) -> Resolved<i64> {
    Precedence::new(FALLBACK_USER_ID)
        .layer("argument", || explicit)
        .layer("REQUEST_USER_ID", || configured)
        .resolve()
}

/// Parse a raw `REQUEST_USER_ID` value. Anything that is not an integer is
/// ignored so that resolution falls through to the fallback.
pub fn parse_user_id(raw: Option<&str>) -> Option<i64> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }
    match raw.parse() {
        Ok(id) => Some(id),
        Err(_) => {
            tracing::warn!(value = raw, "REQUEST_USER_ID is not an integer, ignoring");
            None
        }
    }
}
