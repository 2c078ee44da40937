//! Per-node method bindings.
//!
//! A path rarely carries more than a handful of methods, so the bindings are
//! kept in a short association list in registration order instead of a map.

use axum::http::Method;

/// Handlers bound at one node, keyed by request method.
#[derive(Clone)]
pub struct MethodMap<H> {
    entries: Vec<(Method, H)>,
}

impl<H> MethodMap<H> {
    /// Create an empty map. Does not allocate.
    pub const fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Handler bound to `method`, if any.
    pub fn get(&self, method: &Method) -> Option<&H> {
        self.entries
            .iter()
            .find(|(m, _)| m == method)
            .map(|(_, h)| h)
    }

    pub fn contains(&self, method: &Method) -> bool {
        self.get(method).is_some()
    }

    /// Bind `handler` to `method`.
    ///
    /// Returns the method back if it is already bound; the existing binding
    /// is left untouched.
    pub fn insert(&mut self, method: Method, handler: H) -> Result<(), Method> {
        if self.contains(&method) {
            return Err(method);
        }
        self.entries.push((method, handler));
        Ok(())
    }

    /// Bound methods in registration order.
    pub fn methods(&self) -> impl Iterator<Item = &Method> {
        self.entries.iter().map(|(m, _)| m)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<H> Default for MethodMap<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H> std::fmt::Debug for MethodMap<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.methods()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_get() {
        let mut map = MethodMap::new();
        assert!(map.is_empty());

        map.insert(Method::GET, 1).unwrap();
        map.insert(Method::POST, 2).unwrap();

        assert_eq!(map.get(&Method::GET), Some(&1));
        assert_eq!(map.get(&Method::POST), Some(&2));
        assert_eq!(map.get(&Method::PUT), None);
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_duplicate_keeps_first_binding() {
        let mut map = MethodMap::new();
        map.insert(Method::GET, "first").unwrap();

        let rejected = map.insert(Method::GET, "second");
        assert_eq!(rejected, Err(Method::GET));
        assert_eq!(map.get(&Method::GET), Some(&"first"));
    }

    #[test]
    fn test_methods_keep_registration_order() {
        let mut map = MethodMap::new();
        map.insert(Method::DELETE, ()).unwrap();
        map.insert(Method::GET, ()).unwrap();
        map.insert(Method::PATCH, ()).unwrap();

        let methods: Vec<_> = map.methods().cloned().collect();
        assert_eq!(methods, vec![Method::DELETE, Method::GET, Method::PATCH]);
    }
}
