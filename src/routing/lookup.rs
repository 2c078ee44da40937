//! Route lookup.
//!
//! # Responsibilities
//! - Walk the tree for a (method, path) pair
//! - Capture `:param` and `*catch-all` values
//! - Recommend a trailing-slash redirect when the path misses by one `/`
//!
//! # Design Decisions
//! - Lookup never fails; a miss is `handler == None` plus the `tsr` flag
//! - Captures borrow from the tree and the request path
//! - Catch-all captures keep their leading `/` (`/src/*filepath` on
//!   `/src/a.png` yields `/a.png`)

use axum::http::Method;

use crate::routing::methods::MethodMap;
use crate::routing::params::Params;
use crate::routing::tree::{Node, NodeKind};

/// Outcome of [`Node::get_value`].
#[derive(Debug)]
pub struct Lookup<'t, 'p, H> {
    /// Handler bound to the requested method, if the path matched.
    pub handler: Option<&'t H>,
    /// Variables captured along the way.
    pub params: Params<'t, 'p>,
    /// The path would match with a trailing slash added or removed.
    pub tsr: bool,
    bindings: Option<&'t MethodMap<H>>,
}

impl<'t, 'p, H> Lookup<'t, 'p, H> {
    fn new(params: Params<'t, 'p>) -> Self {
        Self {
            handler: None,
            params,
            tsr: false,
            bindings: None,
        }
    }

    fn at(node: &'t Node<H>, method: &Method, params: Params<'t, 'p>) -> Self {
        Self {
            handler: node.handlers.get(method),
            params,
            tsr: false,
            bindings: Some(&node.handlers),
        }
    }

    fn redirect(params: Params<'t, 'p>, tsr: bool) -> Self {
        Self {
            tsr,
            ..Self::new(params)
        }
    }

    /// Methods bound at the node the path resolved to, whether or not the
    /// requested method is among them. Empty when the path matched nothing.
    pub fn allowed_methods(&self) -> impl Iterator<Item = &'t Method> {
        self.bindings.into_iter().flat_map(|map| map.methods())
    }
}

impl<H> Node<H> {
    /// Find the handler registered for `method` on `path`.
    pub fn get_value<'t, 'p>(&'t self, method: &Method, path: &'p str) -> Lookup<'t, 'p, H> {
        let bytes = path.as_bytes();
        let mut node = self;
        let mut parent: Option<&Node<H>> = None;
        let mut params = Params::new();
        let mut pos = 0;

        loop {
            let rest = &bytes[pos..];
            let fragment = node.fragment.as_slice();

            if rest.len() > fragment.len() {
                if rest.starts_with(fragment) {
                    pos += fragment.len();
                    let rest = &bytes[pos..];

                    if !node.wild_child {
                        if let Some(child) = node.child_by_index(rest[0]) {
                            parent = Some(node);
                            node = child;
                            continue;
                        }

                        // Nothing found. The route may exist without the
                        // trailing slash.
                        let tsr = rest == b"/" && node.handler(method).is_some();
                        return Lookup::redirect(params, tsr);
                    }

                    let child = &node.children[0];
                    match child.kind {
                        NodeKind::Param => {
                            let end = rest.iter().position(|&c| c == b'/').unwrap_or(rest.len());
                            params.push(child.wildcard_name(), path.get(pos..pos + end).unwrap_or_default());

                            if end < rest.len() {
                                if let Some(next) = child.children.first() {
                                    pos += end;
                                    parent = Some(child);
                                    node = next;
                                    continue;
                                }
                                // only a missing trailing slash away
                                return Lookup::redirect(params, rest.len() == end + 1);
                            }

                            if child.handler(method).is_some() {
                                return Lookup::at(child, method, params);
                            }

                            // a collapsed catch-all holder below the param does not count
                            let tsr = child.children.len() == 1
                                && child.children[0].fragment == b"/"
                                && child.children[0].handler(method).is_some();
                            let mut lookup = Lookup::at(child, method, params);
                            lookup.tsr = tsr;
                            return lookup;
                        }
                        NodeKind::CatchAll => {
                            params.push(child.wildcard_name(), path.get(pos..).unwrap_or_default());
                            return Lookup::at(child, method, params);
                        }
                        NodeKind::Static => unreachable!("wildcard child is always a param or catch-all"),
                    }
                }
            } else if rest == fragment {
                if node.handler(method).is_some() {
                    return Lookup::at(node, method, params);
                }

                // `/` in front of a wildcard: the route may exist without it.
                let without_slash = rest == b"/"
                    && node.wild_child
                    && parent.is_some_and(|p| p.handler(method).is_some());

                // The route may exist with a trailing slash.
                let with_slash = node.child_by_index(b'/').is_some_and(|child| {
                    (child.fragment == b"/" && child.handler(method).is_some())
                        || (child.kind == NodeKind::CatchAll
                            && child.fragment.is_empty()
                            && child.children[0].handler(method).is_some())
                });
                let tsr = without_slash || with_slash;
                let mut lookup = Lookup::at(node, method, params);
                lookup.tsr = tsr;
                return lookup;
            }

            // Nothing found. The route may exist with a trailing slash.
            let tsr = rest == b"/"
                || (fragment.len() == rest.len() + 1
                    && fragment[rest.len()] == b'/'
                    && fragment.starts_with(rest)
                    && node.handler(method).is_some());
            return Lookup::redirect(params, tsr);
        }
    }

    /// Name declared by a param or catch-all value node.
    fn wildcard_name(&self) -> &str {
        let skip = match self.kind {
            NodeKind::Param => 1,
            _ => 2,
        };
        std::str::from_utf8(self.fragment.get(skip..).unwrap_or_default()).unwrap_or_default()
    }
}
