//! HTTP dispatcher on top of the routing tree.
//!
//! # Responsibilities
//! - Register handlers per method and path
//! - Turn a lookup into a response: call the handler, redirect, 405 or 404
//! - Recover from handler panics
//! - Serve static files below a catch-all mount
//!
//! # Data Flow
//! ```text
//! Request (method, path)
//!     → Node::get_value
//!     → handler found: call with owned vars (panics caught)
//!     → tsr / cleaned path resolves: 301 (GET) or 308 redirect
//!     → other methods bound: 405 + Allow
//!     → not_found handler or 404
//! ```
//!
//! # Design Decisions
//! - Redirects are never issued for CONNECT or for `/`
//! - The query string is carried over to redirect targets

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use futures_util::FutureExt;
use thiserror::Error;
use tower::ServiceExt;
use tower_http::services::ServeDir;

use crate::config::schema::{FilesConfig, RouteConfig, ServerConfig};
use crate::http::handler::{Handler, SharedHandler};
use crate::http::response::{self, Outcome};
use crate::routing::{clean_path, Lookup, Node, RouteError, Vars};

/// Catch-all a static file mount has to end with.
pub const FILEPATH_WILDCARD: &str = "/*filepath";

/// What a panic handler is told about the request that panicked.
#[derive(Debug, Clone)]
pub struct PanicReport {
    pub method: Method,
    pub uri: Uri,
    /// The panic payload, when it was a string.
    pub message: String,
}

/// Builds the response for a request whose handler panicked.
pub type PanicHandler = Arc<dyn Fn(PanicReport) -> Response + Send + Sync>;

/// Errors building a router from configuration.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("invalid method '{method}' for route '{path}'")]
    InvalidMethod { method: String, path: String },

    #[error("invalid status {status} for route '{path}'")]
    InvalidStatus { status: u16, path: String },

    #[error("path must begin with '/' in path '{path}'")]
    MissingLeadingSlash { path: String },

    #[error("file mount must end with '/*filepath' in path '{path}'")]
    InvalidFileMount { path: String },

    #[error(transparent)]
    Route(#[from] RouteError),
}

/// Request dispatcher.
pub struct Router {
    tree: Node<SharedHandler>,

    /// Redirect when the path only misses (or has an extra) trailing slash.
    pub redirect_trailing_slash: bool,

    /// Redirect to the cleaned path (see [`clean_path`]) when that matches.
    pub redirect_fixed_path: bool,

    /// Answer 405 instead of 404 when the path exists for other methods.
    pub handle_method_not_allowed: bool,

    /// Called when nothing matched. A plain 404 when unset.
    pub not_found: Option<SharedHandler>,

    /// Called when a handler panics. A plain 500 when unset.
    pub panic_handler: Option<PanicHandler>,
}

impl Router {
    pub fn new() -> Self {
        Self {
            tree: Node::new(),
            redirect_trailing_slash: true,
            redirect_fixed_path: true,
            handle_method_not_allowed: true,
            not_found: None,
            panic_handler: None,
        }
    }

    /// Build a router from the `[router]`, `[[routes]]` and `[[files]]`
    /// sections of `config`.
    pub fn from_config(config: &ServerConfig) -> Result<Self, BuildError> {
        let mut router = Self::new();
        router.redirect_trailing_slash = config.router.redirect_trailing_slash;
        router.redirect_fixed_path = config.router.redirect_fixed_path;
        router.handle_method_not_allowed = config.router.handle_method_not_allowed;

        for route in &config.routes {
            let method = route.parse_method().ok_or_else(|| BuildError::InvalidMethod {
                method: route.method.clone(),
                path: route.path.clone(),
            })?;
            if !route.path.starts_with('/') {
                return Err(BuildError::MissingLeadingSlash { path: route.path.clone() });
            }
            let handler = canned_handler(route)?;
            router.insert(method, &route.path, handler)?;
        }

        for mount in &config.files {
            if !mount.path.starts_with('/') || !mount.path.ends_with(FILEPATH_WILDCARD) {
                return Err(BuildError::InvalidFileMount { path: mount.path.clone() });
            }
            router.mount_files(mount)?;
        }

        tracing::debug!(routes = router.tree.route_count(), "Router built from config");
        Ok(router)
    }

    /// Register `handler` for `method` on `path`.
    ///
    /// # Panics
    /// If `path` does not begin with `/`.
    pub fn handle(&mut self, method: Method, path: &str, handler: impl Handler) -> Result<(), RouteError> {
        self.insert(method, path, Arc::new(handler))
    }

    fn insert(&mut self, method: Method, path: &str, handler: SharedHandler) -> Result<(), RouteError> {
        self.tree.add_route(method, path, handler)
    }

    pub fn get(&mut self, path: &str, handler: impl Handler) -> Result<(), RouteError> {
        self.handle(Method::GET, path, handler)
    }

    pub fn head(&mut self, path: &str, handler: impl Handler) -> Result<(), RouteError> {
        self.handle(Method::HEAD, path, handler)
    }

    pub fn options(&mut self, path: &str, handler: impl Handler) -> Result<(), RouteError> {
        self.handle(Method::OPTIONS, path, handler)
    }

    pub fn post(&mut self, path: &str, handler: impl Handler) -> Result<(), RouteError> {
        self.handle(Method::POST, path, handler)
    }

    pub fn put(&mut self, path: &str, handler: impl Handler) -> Result<(), RouteError> {
        self.handle(Method::PUT, path, handler)
    }

    pub fn patch(&mut self, path: &str, handler: impl Handler) -> Result<(), RouteError> {
        self.handle(Method::PATCH, path, handler)
    }

    pub fn delete(&mut self, path: &str, handler: impl Handler) -> Result<(), RouteError> {
        self.handle(Method::DELETE, path, handler)
    }

    /// Serve the files below `root` for GET and HEAD on `path`, which must
    /// end with `/*filepath`. `/src/*filepath` maps `/src/a/b.css` to
    /// `{root}/a/b.css`.
    ///
    /// # Panics
    /// If `path` does not end with `/*filepath`.
    pub fn serve_files(&mut self, path: &str, root: impl AsRef<Path>) -> Result<(), RouteError> {
        assert!(
            path.ends_with(FILEPATH_WILDCARD),
            "path must end with {FILEPATH_WILDCARD} in path '{path}'"
        );

        let dir = ServeDir::new(root.as_ref());
        let handler: SharedHandler = Arc::new(move |request: Request<Body>, vars: Vars| {
            let dir = dir.clone();
            async move {
                let filepath = vars.get("filepath").map(String::as_str).unwrap_or("/");
                let request = match with_path(request, filepath) {
                    Ok(request) => request,
                    Err(_) => return StatusCode::BAD_REQUEST.into_response(),
                };
                match dir.oneshot(request).await {
                    Ok(response) => response.map(Body::new),
                    Err(never) => match never {},
                }
            }
        });

        self.insert(Method::GET, path, handler.clone())?;
        self.insert(Method::HEAD, path, handler)
    }

    fn mount_files(&mut self, mount: &FilesConfig) -> Result<(), RouteError> {
        tracing::debug!(path = %mount.path, root = ?mount.root, "Mounting static files");
        self.serve_files(&mount.path, &mount.root)
    }

    /// Resolve `method` and `path` without dispatching.
    pub fn lookup<'t, 'p>(&'t self, method: &Method, path: &'p str) -> Lookup<'t, 'p, SharedHandler> {
        self.tree.get_value(method, path)
    }

    /// The routing tree.
    pub fn tree(&self) -> &Node<SharedHandler> {
        &self.tree
    }

    /// Route `request` and produce its response.
    ///
    /// The response carries an [`Outcome`] extension.
    pub async fn dispatch(&self, request: Request<Body>) -> Response {
        let method = request.method().clone();

        let resolved = {
            let lookup = self.tree.get_value(&method, request.uri().path());
            match lookup.handler {
                Some(handler) => Ok((Arc::clone(handler), lookup.params.to_vars())),
                None => Err((lookup.tsr, lookup.allowed_methods().cloned().collect::<Vec<_>>())),
            }
        };
        let (tsr, allowed) = match resolved {
            Ok((handler, vars)) => return self.call(&handler, request, vars).await,
            Err(miss) => miss,
        };

        let path = request.uri().path();
        if method != Method::CONNECT && path != "/" {
            let status = if method == Method::GET {
                StatusCode::MOVED_PERMANENTLY
            } else {
                StatusCode::PERMANENT_REDIRECT
            };

            if tsr && self.redirect_trailing_slash {
                let target = match path.strip_suffix('/') {
                    Some(trimmed) => trimmed.to_string(),
                    None => format!("{path}/"),
                };
                return redirect_to(&target, request.uri(), status);
            }

            if self.redirect_fixed_path {
                let fixed = clean_path(path);
                if fixed != path && self.tree.get_value(&method, &fixed).handler.is_some() {
                    return redirect_to(&fixed, request.uri(), status);
                }
            }
        }

        if self.handle_method_not_allowed && !allowed.is_empty() {
            return response::with_outcome(response::method_not_allowed(&allowed), Outcome::MethodNotAllowed);
        }

        let response = match &self.not_found {
            Some(handler) => match call_guarded(handler, request, Vars::new()).await {
                Ok(response) => response,
                Err(_) => response::internal_error(),
            },
            None => response::not_found(),
        };
        response::with_outcome(response, Outcome::NotFound)
    }

    async fn call(&self, handler: &SharedHandler, request: Request<Body>, vars: Vars) -> Response {
        let method = request.method().clone();
        let uri = request.uri().clone();

        match call_guarded(handler, request, vars).await {
            Ok(response) => response::with_outcome(response, Outcome::Handled),
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::error!(method = %method, uri = %uri, panic = %message, "Handler panicked");

                let response = match &self.panic_handler {
                    Some(panic_handler) => panic_handler(PanicReport { method, uri, message }),
                    None => response::internal_error(),
                };
                response::with_outcome(response, Outcome::Panic)
            }
        }
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("routes", &self.tree.route_count())
            .field("redirect_trailing_slash", &self.redirect_trailing_slash)
            .field("redirect_fixed_path", &self.redirect_fixed_path)
            .field("handle_method_not_allowed", &self.handle_method_not_allowed)
            .finish()
    }
}

/// Run `handler`, catching panics both while building its future and while
/// polling it.
async fn call_guarded(
    handler: &SharedHandler,
    request: Request<Body>,
    vars: Vars,
) -> Result<Response, Box<dyn Any + Send>> {
    let fut = std::panic::catch_unwind(AssertUnwindSafe(|| handler.call(request, vars)))?;
    AssertUnwindSafe(fut).catch_unwind().await
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn redirect_to(path: &str, uri: &Uri, status: StatusCode) -> Response {
    let location = match uri.query() {
        Some(query) => format!("{path}?{query}"),
        None => path.to_string(),
    };
    response::with_outcome(response::redirect(&location, status), Outcome::Redirect)
}

/// Replace the path of `request`, keeping its query.
fn with_path(mut request: Request<Body>, path: &str) -> Result<Request<Body>, axum::http::Error> {
    let path_and_query = match request.uri().query() {
        Some(query) => format!("{path}?{query}"),
        None => path.to_string(),
    };
    let uri = Uri::builder().path_and_query(path_and_query).build()?;
    *request.uri_mut() = uri;
    Ok(request)
}

/// Handler answering with the fixed response configured for `route`.
///
/// `{name}` in the body is replaced by the value captured for `name`. Without
/// a body the handler echoes the match as JSON.
fn canned_handler(route: &RouteConfig) -> Result<SharedHandler, BuildError> {
    let status = StatusCode::from_u16(route.status).map_err(|_| BuildError::InvalidStatus {
        status: route.status,
        path: route.path.clone(),
    })?;
    let pattern = route.path.clone();
    let body = route.body.clone();
    let content_type = route
        .content_type
        .clone()
        .unwrap_or_else(|| "text/plain; charset=utf-8".to_string());

    Ok(Arc::new(move |request: Request<Body>, vars: Vars| {
        let pattern = pattern.clone();
        let body = body.clone();
        let content_type = content_type.clone();
        async move {
            match body {
                Some(template) => {
                    let text = vars.iter().fold(template, |text, (name, value)| {
                        text.replace(&format!("{{{name}}}"), value)
                    });
                    (status, [(axum::http::header::CONTENT_TYPE, content_type)], text).into_response()
                }
                None => {
                    let echo = serde_json::json!({
                        "route": pattern,
                        "method": request.method().as_str(),
                        "path": request.uri().path(),
                        "params": vars,
                    });
                    (status, axum::Json(echo)).into_response()
                }
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::RouterConfig;
    use axum::http::header;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn request(method: Method, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    async fn body_string(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn flag_handler(flag: &Arc<AtomicBool>) -> impl Handler {
        let flag = Arc::clone(flag);
        move |_request: Request<Body>, _vars: Vars| {
            flag.store(true, Ordering::SeqCst);
            async { StatusCode::OK }
        }
    }

    #[tokio::test]
    async fn test_router() {
        let mut router = Router::new();
        let routed = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&routed);

        router
            .handle(Method::GET, "/user/:name", move |_request: Request<Body>, vars: Vars| {
                flag.store(true, Ordering::SeqCst);
                async move {
                    assert_eq!(vars.len(), 1);
                    assert_eq!(vars.get("name").map(String::as_str), Some("gopher"));
                    StatusCode::OK
                }
            })
            .unwrap();

        let response = router.dispatch(request(Method::GET, "/user/gopher")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response::outcome_of(&response), Some(Outcome::Handled));
        assert!(routed.load(Ordering::SeqCst), "routing failed");
    }

    #[tokio::test]
    async fn test_router_api() {
        let flags: Vec<Arc<AtomicBool>> = (0..7).map(|_| Arc::new(AtomicBool::new(false))).collect();

        let mut router = Router::new();
        router.get("/GET", flag_handler(&flags[0])).unwrap();
        router.head("/GET", flag_handler(&flags[1])).unwrap();
        router.options("/GET", flag_handler(&flags[2])).unwrap();
        router.post("/POST", flag_handler(&flags[3])).unwrap();
        router.put("/PUT", flag_handler(&flags[4])).unwrap();
        router.patch("/PATCH", flag_handler(&flags[5])).unwrap();
        router.delete("/DELETE", flag_handler(&flags[6])).unwrap();

        let requests = [
            (Method::GET, "/GET"),
            (Method::HEAD, "/GET"),
            (Method::OPTIONS, "/GET"),
            (Method::POST, "/POST"),
            (Method::PUT, "/PUT"),
            (Method::PATCH, "/PATCH"),
            (Method::DELETE, "/DELETE"),
        ];
        for ((method, path), flag) in requests.into_iter().zip(&flags) {
            router.dispatch(request(method.clone(), path)).await;
            assert!(flag.load(Ordering::SeqCst), "routing {method} failed");
        }
    }

    #[test]
    #[should_panic(expected = "path must begin with '/'")]
    fn test_router_root() {
        let mut router = Router::new();
        let _ = router.get("noSlashRoot", |_request: Request<Body>, _vars: Vars| async {});
    }

    #[tokio::test]
    async fn test_router_not_found() {
        let mut router = Router::new();
        router.get("/path", |_request: Request<Body>, _vars: Vars| async {}).unwrap();
        router.get("/dir/", |_request: Request<Body>, _vars: Vars| async {}).unwrap();
        router.get("/", |_request: Request<Body>, _vars: Vars| async {}).unwrap();

        for (uri, status, location) in [
            ("/path/", StatusCode::MOVED_PERMANENTLY, Some("/path")),
            ("/dir", StatusCode::MOVED_PERMANENTLY, Some("/dir/")),
            ("/../path", StatusCode::MOVED_PERMANENTLY, Some("/path")),
            ("/dir//", StatusCode::MOVED_PERMANENTLY, Some("/dir/")),
            ("/dir?x=1", StatusCode::MOVED_PERMANENTLY, Some("/dir/?x=1")),
            ("/nope", StatusCode::NOT_FOUND, None),
        ] {
            let response = router.dispatch(request(Method::GET, uri)).await;
            assert_eq!(response.status(), status, "wrong status for '{uri}'");
            let got = response.headers().get(header::LOCATION).map(|v| v.to_str().unwrap());
            assert_eq!(got, location, "wrong location for '{uri}'");
        }

        // non-GET requests keep their method across the redirect
        let response = router.dispatch(request(Method::POST, "/path/")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        router.post("/path", |_request: Request<Body>, _vars: Vars| async {}).unwrap();
        let response = router.dispatch(request(Method::POST, "/path/")).await;
        assert_eq!(response.status(), StatusCode::PERMANENT_REDIRECT);
    }

    #[tokio::test]
    async fn test_router_not_found_handler() {
        let mut router = Router::new();
        router.not_found = Some(Arc::new(|_request: Request<Body>, _vars: Vars| async {
            (StatusCode::NOT_FOUND, "custom")
        }));

        let response = router.dispatch(request(Method::GET, "/nope")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response::outcome_of(&response), Some(Outcome::NotFound));
        assert_eq!(body_string(response).await, "custom");
    }

    #[tokio::test]
    async fn test_router_redirects_can_be_disabled() {
        let mut router = Router::new();
        router.redirect_trailing_slash = false;
        router.redirect_fixed_path = false;
        router.get("/path", |_request: Request<Body>, _vars: Vars| async {}).unwrap();

        for uri in ["/path/", "/../path"] {
            let response = router.dispatch(request(Method::GET, uri)).await;
            assert_eq!(response.status(), StatusCode::NOT_FOUND, "'{uri}' was redirected");
        }
    }

    #[tokio::test]
    async fn test_router_method_not_allowed() {
        let mut router = Router::new();
        router.get("/user/:name", |_request: Request<Body>, _vars: Vars| async {}).unwrap();
        router.delete("/user/:name", |_request: Request<Body>, _vars: Vars| async {}).unwrap();

        let response = router.dispatch(request(Method::POST, "/user/gopher")).await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers()[header::ALLOW], "GET, DELETE");

        router.handle_method_not_allowed = false;
        let response = router.dispatch(request(Method::POST, "/user/gopher")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_router_panic_handler() {
        let mut router = Router::new();
        let handled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&handled);

        router.panic_handler = Some(Arc::new(move |report: PanicReport| {
            flag.store(true, Ordering::SeqCst);
            assert_eq!(report.method, Method::PUT);
            assert_eq!(report.message, "oops!");
            (StatusCode::SERVICE_UNAVAILABLE, "recovered").into_response()
        }));
        router
            .put("/user/:name", |_request: Request<Body>, _vars: Vars| async {
                panic!("oops!") as ()
            })
            .unwrap();

        let response = router.dispatch(request(Method::PUT, "/user/gopher")).await;
        assert!(handled.load(Ordering::SeqCst), "panic handler not called");
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response::outcome_of(&response), Some(Outcome::Panic));
    }

    #[tokio::test]
    async fn test_router_panic_without_handler_is_500() {
        let mut router = Router::new();
        router
            .get("/boom", |_request: Request<Body>, _vars: Vars| -> std::future::Ready<StatusCode> {
                panic!("before the future exists")
            })
            .unwrap();

        let response = router.dispatch(request(Method::GET, "/boom")).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_router_files() {
        let root = std::env::temp_dir().join(format!("radix-router-files-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(root.join("css")).unwrap();
        std::fs::write(root.join("favicon.ico"), b"icon").unwrap();
        std::fs::write(root.join("css/site.css"), b"body {}").unwrap();

        let mut router = Router::new();
        router.serve_files("/*filepath", &root).unwrap();

        let response = router.dispatch(request(Method::GET, "/favicon.ico")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "icon");

        let response = router.dispatch(request(Method::GET, "/css/site.css")).await;
        assert_eq!(body_string(response).await, "body {}");

        let response = router.dispatch(request(Method::HEAD, "/css/site.css")).await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = router.dispatch(request(Method::GET, "/missing.txt")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        std::fs::remove_dir_all(&root).ok();
    }

    #[test]
    #[should_panic(expected = "path must end with /*filepath")]
    fn test_router_files_requires_filepath() {
        let mut router = Router::new();
        let _ = router.serve_files("/noFilepath", std::env::temp_dir());
    }

    #[tokio::test]
    async fn test_from_config() {
        let config = ServerConfig {
            router: RouterConfig {
                redirect_fixed_path: false,
                ..RouterConfig::default()
            },
            routes: vec![
                RouteConfig {
                    method: "GET".to_string(),
                    path: "/hello/:name".to_string(),
                    status: 200,
                    body: Some("hello, {name}!".to_string()),
                    content_type: None,
                },
                RouteConfig {
                    method: "post".to_string(),
                    path: "/echo/*rest".to_string(),
                    status: 201,
                    body: None,
                    content_type: None,
                },
            ],
            ..ServerConfig::default()
        };

        let router = Router::from_config(&config).unwrap();
        assert!(!router.redirect_fixed_path);
        assert_eq!(router.tree().route_count(), 2);

        let response = router.dispatch(request(Method::GET, "/hello/gopher")).await;
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/plain; charset=utf-8");
        assert_eq!(body_string(response).await, "hello, gopher!");

        let response = router.dispatch(request(Method::POST, "/echo/a/b")).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let echo: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(echo["route"], "/echo/*rest");
        assert_eq!(echo["params"]["rest"], "/a/b");
    }

    #[test]
    fn test_from_config_rejects_conflicts() {
        let route = |path: &str| RouteConfig {
            path: path.to_string(),
            ..RouteConfig::default()
        };
        let config = ServerConfig {
            routes: vec![route("/user/:name"), route("/user/admin")],
            ..ServerConfig::default()
        };

        match Router::from_config(&config) {
            Err(BuildError::Route(RouteError::WildcardConflict { path, .. })) => assert_eq!(path, "/user/admin"),
            other => panic!("expected a wildcard conflict, got {other:?}"),
        }

        let config = ServerConfig {
            routes: vec![RouteConfig {
                method: "GE T".to_string(),
                ..route("/x")
            }],
            ..ServerConfig::default()
        };
        assert!(matches!(Router::from_config(&config), Err(BuildError::InvalidMethod { .. })));
    }
}
