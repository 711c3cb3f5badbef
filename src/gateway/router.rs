//! Route dispatcher: one handler per (input, output) pair

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    extract::{DefaultBodyLimit, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{any, get},
};
use serde::Serialize;
use tower_http::{
    catch_panic::CatchPanicLayer,
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{debug, error, warn};

use crate::config::Config;
use crate::input::{Input, InputAdapter};
use crate::output::{Output, OutputAdapter};
use crate::registry::{AdapterDeclaration, build_input, build_output};
use crate::{Error, Result};

/// Liveness endpoint, mounted unless a route claims the path
pub const HEALTH_PATH: &str = "/healthz";

/// An installed (input, output) pair
#[derive(Debug, Clone)]
pub struct Route {
    /// Cleaned URL path
    pub path: String,
    /// Input label for logs
    pub input_name: String,
    /// Output label for logs
    pub output_name: String,
    input: Arc<Input>,
    output: Arc<Output>,
}

/// Printable view of a [`Route`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteSummary {
    /// Cleaned URL path
    pub path: String,
    /// Input as `name (type)`
    pub input: String,
    /// Output as `name (type)`
    pub output: String,
}

impl Route {
    /// Input adapter of this route
    #[must_use]
    pub fn input(&self) -> &Input {
        &self.input
    }

    /// Output adapter of this route
    #[must_use]
    pub fn output(&self) -> &Output {
        &self.output
    }

    /// Printable view
    #[must_use]
    pub fn summary(&self) -> RouteSummary {
        RouteSummary {
            path: self.path.clone(),
            input: format!("{} ({})", self.input_name, self.input.type_name()),
            output: format!("{} ({})", self.output_name, self.output.type_name()),
        }
    }

    /// Run the pipeline for one request.
    ///
    /// System errors are logged and answered with an empty `500`; their
    /// detail never reaches the caller. A body over the size limit is `413`.
    pub async fn handle(&self, request: Request) -> Response {
        let validation = match self.input.authenticate(request).await {
            Ok(validation) => validation,
            Err(Error::PayloadTooLarge) => {
                warn!(route = %self.path, input = %self.input_name, "Request body too large");
                return StatusCode::PAYLOAD_TOO_LARGE.into_response();
            }
            Err(e) => {
                error!(route = %self.path, input = %self.input_name, error = %e, "Input handler failed");
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        };

        debug!(
            route = %self.path,
            valid = validation.valid,
            id = %validation.claims.id,
            subject = %validation.claims.subject,
            groups = ?validation.claims.groups,
            error = %validation.error,
            "Authentication result"
        );

        match self.output.render(&validation) {
            Ok(response) => response,
            Err(e) => {
                error!(route = %self.path, output = %self.output_name, error = %e, "Output handler failed");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}

/// Lexically clean a slash-separated path.
///
/// Collapses repeated slashes, drops `.` segments, resolves `..` against the
/// preceding segment (never above root) and removes any trailing slash.
/// The result is always rooted.
#[must_use]
pub fn clean_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    format!("/{}", segments.join("/"))
}

fn check_literal_path(path: &str) -> Result<()> {
    let capture = path.contains(['{', '}'])
        || path
            .split('/')
            .any(|segment| segment.starts_with(':') || segment.starts_with('*'));
    if capture {
        return Err(Error::Config(format!(
            "Route path {path:?} contains capture syntax"
        )));
    }
    Ok(())
}

/// Resolve every declaration and pair each input with each output.
///
/// Each adapter is built once and shared by all its routes, so an issuer key
/// cache is shared across the outputs an input is paired with.
pub fn build_routes(
    inputs: &[AdapterDeclaration],
    outputs: &[AdapterDeclaration],
) -> Result<Vec<Route>> {
    let built_inputs = inputs
        .iter()
        .map(|d| build_input(d).map(Arc::new))
        .collect::<Result<Vec<_>>>()?;
    let built_outputs = outputs
        .iter()
        .map(|d| build_output(d).map(Arc::new))
        .collect::<Result<Vec<_>>>()?;

    let mut seen: HashMap<String, (String, String)> = HashMap::new();
    let mut routes = Vec::with_capacity(inputs.len() * outputs.len());

    for (input_decl, input) in inputs.iter().zip(&built_inputs) {
        for (output_decl, output) in outputs.iter().zip(&built_outputs) {
            let path = clean_path(&format!("/{}/{}", input_decl.path, output_decl.path));
            check_literal_path(&path)?;

            let pair = (
                input_decl.label().to_string(),
                output_decl.label().to_string(),
            );
            if let Some((first_input, first_output)) = seen.get(&path) {
                return Err(Error::Config(format!(
                    "Duplicate route path {path:?}: {first_input} → {first_output} and {} → {}",
                    pair.0, pair.1
                )));
            }
            seen.insert(path.clone(), pair.clone());

            routes.push(Route {
                path,
                input_name: pair.0,
                output_name: pair.1,
                input: Arc::clone(input),
                output: Arc::clone(output),
            });
        }
    }

    Ok(routes)
}

/// Create the router
pub fn create_router(routes: &[Route], config: &Config) -> Router {
    let mut router = Router::new();
    let mut health_claimed = false;

    for route in routes {
        health_claimed |= route.path == HEALTH_PATH;
        let route = Arc::new(route.clone());
        let path = route.path.clone();
        router = router.route(
            &path,
            any(move |request: Request| {
                let route = Arc::clone(&route);
                async move { route.handle(request).await }
            }),
        );
    }

    if !health_claimed {
        router = router.route(HEALTH_PATH, get(|| async { "ok" }));
    }

    // max_body_size replaces axum's extractor default
    router
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(config.max_body_size))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            config.request_timeout,
        ))
        .layer(CatchPanicLayer::new())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("-");
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    path = %request.uri().path(),
                    request_id = %request_id,
                )
            }),
        )
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::{Value, json};

    fn declaration(type_name: &str, name: &str, path: &str, config: Value) -> AdapterDeclaration {
        AdapterDeclaration {
            type_name: type_name.to_string(),
            name: name.to_string(),
            path: path.to_string(),
            config,
        }
    }

    fn bearer(name: &str, path: &str) -> AdapterDeclaration {
        declaration(
            "Bearer",
            name,
            path,
            json!({"validator": {"type": "JWT", "config": {
                "claims": {"id": "uid", "subject": "sub", "groups": "groups"}
            }}}),
        )
    }

    #[test]
    fn clean_path_cases() {
        for (raw, cleaned) in [
            ("//bearer/identity", "/bearer/identity"),
            ("/bearer//", "/bearer"),
            ("/./a/./b", "/a/b"),
            ("/a/../b", "/b"),
            ("/../../a", "/a"),
            ("//", "/"),
            ("/", "/"),
            ("/a/b/..", "/a"),
        ] {
            assert_eq!(clean_path(raw), cleaned, "{raw}");
        }
    }

    #[test]
    fn pairs_every_input_with_every_output() {
        // GIVEN: two inputs and two outputs
        let inputs = vec![bearer("a", "/bearer"), bearer("b", "review")];
        let outputs = vec![
            declaration("Identity", "id", "identity", Value::Null),
            declaration("KubernetesTokenReview", "k8s", "/k8s/", Value::Null),
        ];

        // WHEN: routes are built
        let routes = build_routes(&inputs, &outputs).unwrap();

        // THEN: four cleaned paths in input-major order
        let paths: Vec<&str> = routes.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(
            paths,
            vec!["/bearer/identity", "/bearer/k8s", "/review/identity", "/review/k8s"]
        );
        assert_eq!(
            routes[3].summary(),
            RouteSummary {
                path: "/review/k8s".to_string(),
                input: "b (Bearer)".to_string(),
                output: "k8s (KubernetesTokenReview)".to_string(),
            }
        );
    }

    #[test]
    fn routes_of_one_input_share_the_adapter() {
        let inputs = vec![bearer("a", "/bearer")];
        let outputs = vec![
            declaration("Identity", "", "identity", Value::Null),
            declaration("KubernetesTokenReview", "", "k8s", Value::Null),
        ];

        let routes = build_routes(&inputs, &outputs).unwrap();
        assert!(Arc::ptr_eq(&routes[0].input, &routes[1].input));
    }

    #[test]
    fn duplicate_paths_are_rejected() {
        let inputs = vec![bearer("a", "/x"), bearer("b", "/x/")];
        let outputs = vec![declaration("Identity", "id", "", Value::Null)];

        let err = build_routes(&inputs, &outputs).unwrap_err();
        assert!(err.to_string().contains("Duplicate route path \"/x\""), "{err}");
    }

    #[test]
    fn capture_syntax_is_rejected() {
        for path in ["/{id}", "/:id", "/*rest"] {
            let inputs = vec![bearer("a", path)];
            let outputs = vec![declaration("Identity", "id", "", Value::Null)];
            assert!(
                matches!(build_routes(&inputs, &outputs), Err(Error::Config(_))),
                "{path}"
            );
        }
    }

    #[test]
    fn unknown_output_fails_route_build() {
        let inputs = vec![bearer("a", "/x")];
        let outputs = vec![declaration("Saml", "saml", "", Value::Null)];
        assert!(matches!(
            build_routes(&inputs, &outputs),
            Err(Error::UnknownAdapterType { .. })
        ));
    }
}
