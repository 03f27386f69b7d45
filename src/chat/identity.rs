//! Display-name registry for live connections.

use indexmap::IndexMap;

use super::message::ConnectionId;

/// Maps each identified connection to its display name.
///
/// Names are unique among live identities only; a released name can be
/// claimed again. Iteration order is the order of `assign` calls.
#[derive(Debug)]
pub struct IdentityRegistry {
    names: IndexMap<ConnectionId, String>,
    placeholder: String,
}

impl IdentityRegistry {
    /// Create an empty registry that substitutes `placeholder` for blank names.
    pub fn new(placeholder: impl Into<String>) -> Self {
        Self {
            names: IndexMap::new(),
            placeholder: placeholder.into(),
        }
    }

    /// Bind a display name to a connection and return it.
    ///
    /// The requested name is trimmed; a blank or missing name becomes the
    /// placeholder. Collisions get a `#N` suffix starting at 2. The caller
    /// must not assign twice for the same connection.
    pub fn assign(&mut self, connection: ConnectionId, requested: Option<&str>) -> String {
        let base = requested
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(self.placeholder.as_str())
            .to_string();

        let mut name = base.clone();
        let mut count = 1;
        while self.is_taken(&name) {
            count += 1;
            name = format!("{base}#{count}");
        }

        self.names.insert(connection, name.clone());
        name
    }

    /// Remove a binding, returning the freed name.
    pub fn release(&mut self, connection: ConnectionId) -> Option<String> {
        self.names.shift_remove(&connection)
    }

    /// Display name of a connection, if it has joined.
    pub fn get(&self, connection: ConnectionId) -> Option<&str> {
        self.names.get(&connection).map(String::as_str)
    }

    /// Whether the connection has an identity.
    pub fn contains(&self, connection: ConnectionId) -> bool {
        self.names.contains_key(&connection)
    }

    /// Whether a display name is held by a live identity.
    pub fn is_taken(&self, name: &str) -> bool {
        self.names.values().any(|n| n == name)
    }

    /// All live display names in assignment order.
    pub fn snapshot(&self) -> Vec<String> {
        self.names.values().cloned().collect()
    }

    /// Number of live identities.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether no identities are registered.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
