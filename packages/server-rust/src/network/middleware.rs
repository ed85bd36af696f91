//! HTTP middleware stack for the server.
//!
//! Builds the Tower middleware pipeline applied to every HTTP request.
//! The first layer listed is the outermost (it sees the request first on
//! the way in and the response last on the way out).

use axum::http::header::HeaderName;
use axum::http::{Method, StatusCode};
use tower::layer::util::{Identity, Stack};
use tower::ServiceBuilder;
use tower_http::classify::{ServerErrorsAsFailures, SharedClassifier};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use super::config::NetworkConfig;

/// The composed layer type produced by [`build_http_layers`], outermost last.
type HttpLayers = Stack<
    PropagateRequestIdLayer,
    Stack<
        TimeoutLayer,
        Stack<
            RequestBodyLimitLayer,
            Stack<
                CorsLayer,
                Stack<
                    TraceLayer<SharedClassifier<ServerErrorsAsFailures>>,
                    Stack<SetRequestIdLayer<MakeRequestUuid>, Identity>,
                >,
            >,
        >,
    >,
>;

/// Builds the HTTP-level middleware stack.
///
/// **Ordering (outermost to innermost):**
/// 1. `SetRequestId`: assigns a UUID v4 `X-Request-Id` to every request
/// 2. `Tracing`: request/response spans
/// 3. `CORS`: based on configured origins
/// 4. `RequestBodyLimit`: answers 413 for bodies over `max_body_bytes`
/// 5. `Timeout`: bounds total request processing time
/// 6. `PropagateRequestId`: copies `X-Request-Id` onto the response
///
/// Call-level concerns (load shedding, per-call timeouts) are plugins on the
/// service, not layers here.
#[must_use]
pub fn build_http_layers(config: &NetworkConfig, max_body_bytes: usize) -> HttpLayers {
    let x_request_id = HeaderName::from_static("x-request-id");

    ServiceBuilder::new()
        .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer(&config.cors_origins))
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            config.request_timeout,
        ))
        .layer(PropagateRequestIdLayer::new(x_request_id))
        .into_inner()
}

/// A wildcard `"*"` allows any origin; otherwise only the parseable entries.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        let parsed: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
        AllowOrigin::list(parsed)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_http_layers_with_defaults() {
        let _layers = build_http_layers(&NetworkConfig::default(), 102_400);
    }

    #[test]
    fn build_cors_layer_specific_origins() {
        let origins = vec![
            "http://localhost:3000".to_string(),
            "not a header\u{0}".to_string(),
        ];
        let _cors = build_cors_layer(&origins);
    }
}
