//! Radix tree storage and route insertion.
//!
//! # Responsibilities
//! - Own the trie nodes (fragments, indexed children, method bindings)
//! - Insert routes, splitting shared prefixes and attaching wildcards
//! - Reject structurally ambiguous routes at registration time
//! - Keep siblings ordered by priority (handlers reachable below them)
//!
//! # Design Decisions
//! - Children are owned; there are no parent pointers. Insertion recurses and
//!   bumps priorities on the way back up, so a failed insert leaves them as
//!   they were.
//! - `indices` and `children` are only changed together (`push_child`,
//!   `split`, `increment_child_priority`).
//! - Wildcard syntax is checked for the whole route before the tree is
//!   touched.
//!
//! # Catch-all encoding
//! `/src/*filepath` is stored as three nodes: `/src`, an empty-fragment
//! holder indexed by `/`, and the value node `/*filepath` that carries the
//! method bindings. The holder lets a lookup of `/src` find the catch-all
//! through the regular `/` index when deciding on a trailing-slash redirect.

use std::borrow::Cow;
use std::fmt;

use axum::http::Method;

use crate::routing::error::RouteError;
use crate::routing::methods::MethodMap;

/// Matching semantics of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NodeKind {
    /// Literal bytes.
    #[default]
    Static,
    /// `:name`, one path segment.
    Param,
    /// `*name` value node or its holder; the rest of the path.
    CatchAll,
}

/// A node of the routing tree. The root node is the tree.
pub struct Node<H> {
    pub(super) fragment: Vec<u8>,
    pub(super) indices: Vec<u8>,
    pub(super) children: Vec<Node<H>>,
    pub(super) kind: NodeKind,
    pub(super) wild_child: bool,
    pub(super) handlers: MethodMap<H>,
    pub(super) priority: u32,
}

impl<H> Node<H> {
    /// Create an empty tree.
    pub const fn new() -> Self {
        Self {
            fragment: Vec::new(),
            indices: Vec::new(),
            children: Vec::new(),
            kind: NodeKind::Static,
            wild_child: false,
            handlers: MethodMap::new(),
            priority: 0,
        }
    }

    fn with_fragment(kind: NodeKind, fragment: &[u8]) -> Self {
        Self {
            fragment: fragment.to_vec(),
            kind,
            ..Self::new()
        }
    }

    /// Register `handler` for `method` on `path`.
    ///
    /// Not safe for concurrent use; all routes are expected to be added
    /// before the tree is shared for lookups.
    ///
    /// # Panics
    /// If `path` does not begin with `/`.
    pub fn add_route(&mut self, method: Method, path: &str, handler: H) -> Result<(), RouteError> {
        assert!(
            path.starts_with('/'),
            "path must begin with '/' in path '{path}'"
        );
        check_wildcards(path)?;

        if self.fragment.is_empty() && self.children.is_empty() {
            self.insert_child(path.as_bytes(), path, method, handler)?;
        } else {
            self.insert(path.as_bytes(), path, method, handler)?;
        }
        self.priority += 1;
        Ok(())
    }

    fn insert(&mut self, path: &[u8], route: &str, method: Method, handler: H) -> Result<(), RouteError> {
        let i = common_prefix(path, &self.fragment);
        if i < self.fragment.len() {
            self.split(i);
        }

        if i == path.len() {
            return self.bind(method, handler, route);
        }
        let rest = &path[i..];

        if self.wild_child {
            let child = &mut self.children[0];
            if !child.accepts_wildcard(rest) {
                return Err(RouteError::WildcardConflict {
                    path: route.to_string(),
                    wildcard: child.fragment_str().into_owned(),
                });
            }
            child.insert(rest, route, method, handler)?;
            self.increment_child_priority(0);
            return Ok(());
        }

        let c = rest[0];

        // slash after param
        if self.kind == NodeKind::Param && c == b'/' && self.children.len() == 1 {
            self.children[0].insert(rest, route, method, handler)?;
            self.increment_child_priority(0);
            return Ok(());
        }

        if let Some(pos) = self.child_position(c) {
            self.children[pos].insert(rest, route, method, handler)?;
            self.increment_child_priority(pos);
            return Ok(());
        }

        if c == b':' || c == b'*' {
            return self.insert_child(rest, route, method, handler);
        }

        let mut child = Node::new();
        child.insert_child(rest, route, method, handler)?;
        let pos = self.push_child(c, child);
        self.increment_child_priority(pos);
        Ok(())
    }

    /// Attach the wildcard-bearing tail `path` below (or onto) this node.
    ///
    /// Called on fresh nodes, and on existing nodes when `path` starts with a
    /// wildcard.
    fn insert_child(&mut self, path: &[u8], route: &str, method: Method, handler: H) -> Result<(), RouteError> {
        let Some((start, end)) = find_wildcard(path) else {
            self.fragment = path.to_vec();
            return self.bind(method, handler, route);
        };
        let wildcard = &path[start..end];

        // static children would become unreachable
        if !self.children.is_empty() {
            return Err(RouteError::ChildConflict {
                path: route.to_string(),
                wildcard: String::from_utf8_lossy(wildcard).into_owned(),
            });
        }

        if path[start] == b':' {
            if start > 0 {
                self.fragment = path[..start].to_vec();
            }

            let mut param = Node::with_fragment(NodeKind::Param, wildcard);
            param.priority = 1;
            if end < path.len() {
                let mut next = Node::new();
                next.priority = 1;
                next.insert_child(&path[end..], route, method, handler)?;
                param.push_child(b'/', next);
            } else {
                param.bind(method, handler, route)?;
            }

            self.push_child(b':', param);
            self.wild_child = true;
            return Ok(());
        }

        // An existing node reached with `*` next already ends in '/'.
        if start == 0 {
            return Err(RouteError::CatchAllRootConflict {
                path: route.to_string(),
            });
        }

        let slash = start - 1;
        let mut value = Node::with_fragment(NodeKind::CatchAll, &path[slash..]);
        value.priority = 1;
        value.bind(method, handler, route)?;

        if slash == 0 {
            // Nothing static left in front of the '/': become the holder.
            self.kind = NodeKind::CatchAll;
            self.fragment.clear();
            self.wild_child = true;
            self.push_child(b'/', value);
        } else {
            self.fragment = path[..slash].to_vec();
            let mut holder = Node::with_fragment(NodeKind::CatchAll, b"");
            holder.priority = 1;
            holder.wild_child = true;
            holder.push_child(b'/', value);
            self.push_child(b'/', holder);
        }
        Ok(())
    }

    fn bind(&mut self, method: Method, handler: H, route: &str) -> Result<(), RouteError> {
        self.handlers
            .insert(method, handler)
            .map_err(|method| RouteError::DuplicatePath {
                method,
                path: route.to_string(),
            })
    }

    /// Move everything after `at` into a new static child.
    fn split(&mut self, at: usize) {
        let child = Node {
            fragment: self.fragment.split_off(at),
            indices: std::mem::take(&mut self.indices),
            children: std::mem::take(&mut self.children),
            kind: NodeKind::Static,
            wild_child: std::mem::replace(&mut self.wild_child, false),
            handlers: std::mem::take(&mut self.handlers),
            priority: self.priority,
        };
        let index = child.fragment[0];
        self.push_child(index, child);
    }

    fn push_child(&mut self, index: u8, child: Node<H>) -> usize {
        debug_assert!(!self.indices.contains(&index));
        self.indices.push(index);
        self.children.push(child);
        self.children.len() - 1
    }

    /// Bump the priority of the child at `pos` and move it in front of
    /// siblings with a strictly lower priority. Returns its new position.
    fn increment_child_priority(&mut self, pos: usize) -> usize {
        self.children[pos].priority += 1;
        let priority = self.children[pos].priority;

        let mut new_pos = pos;
        while new_pos > 0 && self.children[new_pos - 1].priority < priority {
            self.children.swap(new_pos - 1, new_pos);
            self.indices.swap(new_pos - 1, new_pos);
            new_pos -= 1;
        }
        new_pos
    }

    fn accepts_wildcard(&self, rest: &[u8]) -> bool {
        let len = self.fragment.len();
        if !rest.starts_with(&self.fragment) {
            return false;
        }
        match self.kind {
            // nothing may hang below a catch-all
            NodeKind::CatchAll => rest.len() == len,
            // :name must not be a prefix of :names
            _ => rest.len() == len || rest[len] == b'/',
        }
    }

    pub(super) fn child_position(&self, index: u8) -> Option<usize> {
        self.indices.iter().position(|&b| b == index)
    }

    /// Child indexed by `index`.
    pub(super) fn child_by_index(&self, index: u8) -> Option<&Node<H>> {
        self.child_position(index).map(|pos| &self.children[pos])
    }

    /// The bytes this node contributes to the path.
    pub fn fragment(&self) -> &[u8] {
        &self.fragment
    }

    pub fn fragment_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.fragment)
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn children(&self) -> &[Node<H>] {
        &self.children
    }

    /// First byte of each child's fragment, in child order.
    pub fn indices(&self) -> &[u8] {
        &self.indices
    }

    pub fn has_wildcard_child(&self) -> bool {
        self.wild_child
    }

    /// Handler registrations reachable through this node.
    pub fn priority(&self) -> u32 {
        self.priority
    }

    /// Handler bound to `method` at this node.
    pub fn handler(&self, method: &Method) -> Option<&H> {
        self.handlers.get(method)
    }

    /// Methods bound at this node.
    pub fn methods(&self) -> impl Iterator<Item = &Method> {
        self.handlers.methods()
    }

    /// Number of routes in the tree (for the root node).
    pub fn route_count(&self) -> usize {
        self.priority as usize
    }

    fn fmt_tree(&self, f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
        write!(
            f,
            "{:indent$}{} [{}] ({}) priority={}",
            "",
            self.fragment_str(),
            self.children.len(),
            String::from_utf8_lossy(&self.indices),
            self.priority,
            indent = indent
        )?;
        if !self.handlers.is_empty() {
            let methods: Vec<&str> = self.handlers.methods().map(Method::as_str).collect();
            write!(f, " {}", methods.join(","))?;
        }
        writeln!(f)?;

        let indent = indent + self.fragment.len();
        for child in &self.children {
            child.fmt_tree(f, indent)?;
        }
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn reverse_children(&mut self) {
        self.children.reverse();
        self.indices.reverse();
        for child in &mut self.children {
            child.reverse_children();
        }
    }
}

impl<H> Default for Node<H> {
    fn default() -> Self {
        Self::new()
    }
}

/// Indented dump of the tree, one node per line.
impl<H> fmt::Display for Node<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_tree(f, 0)
    }
}

impl<H> fmt::Debug for Node<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("fragment", &self.fragment_str())
            .field("indices", &String::from_utf8_lossy(&self.indices))
            .field("kind", &self.kind)
            .field("wild_child", &self.wild_child)
            .field("handlers", &self.handlers)
            .field("priority", &self.priority)
            .field("children", &self.children)
            .finish()
    }
}

fn common_prefix(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count()
}

/// Position of the first wildcard in `path` and the end of its segment.
fn find_wildcard(path: &[u8]) -> Option<(usize, usize)> {
    let start = path.iter().position(|&c| c == b':' || c == b'*')?;
    let end = path[start + 1..]
        .iter()
        .position(|&c| c == b'/')
        .map_or(path.len(), |offset| start + 1 + offset);
    Some((start, end))
}

/// Reject malformed wildcards before the tree is modified.
fn check_wildcards(route: &str) -> Result<(), RouteError> {
    let bytes = route.as_bytes();
    let mut offset = 0;

    while let Some((start, end)) = find_wildcard(&bytes[offset..]) {
        let (start, end) = (start + offset, end + offset);

        if bytes[start + 1..end].iter().any(|&c| c == b':' || c == b'*') {
            return Err(RouteError::MultipleWildcards { path: route.to_string() });
        }
        if end - start < 2 {
            return Err(RouteError::EmptyWildcardName { path: route.to_string() });
        }
        if bytes[start] == b'*' {
            if end != bytes.len() {
                return Err(RouteError::CatchAllConflict { path: route.to_string() });
            }
            if bytes[start - 1] != b'/' {
                return Err(RouteError::MissingCatchAllSlash { path: route.to_string() });
            }
        }
        offset = end;
    }
    Ok(())
}
