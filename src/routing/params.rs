//! Captured path variables.

use std::collections::HashMap;

/// Owned variables handed to request handlers.
pub type Vars = HashMap<String, String>;

/// Variables captured by one lookup.
///
/// Names borrow from the tree and values from the request path, so a lookup
/// allocates at most once: when the first variable is pushed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params<'t, 'p> {
    entries: Vec<(&'t str, &'p str)>,
}

impl<'t, 'p> Params<'t, 'p> {
    pub const fn new() -> Self {
        Self { entries: Vec::new() }
    }

    pub(crate) fn push(&mut self, name: &'t str, value: &'p str) {
        self.entries.push((name, value));
    }

    /// Value captured for `name`.
    pub fn get(&self, name: &str) -> Option<&'p str> {
        self.entries
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| *v)
    }

    /// Captures in path order.
    pub fn iter(&self) -> impl Iterator<Item = (&'t str, &'p str)> + '_ {
        self.entries.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Copy the captures into an owned map.
    pub fn to_vars(&self) -> Vars {
        self.entries
            .iter()
            .map(|(n, v)| (n.to_string(), v.to_string()))
            .collect()
    }
}
