//! Operation endpoint: every request path not claimed by another route.

use axum::extract::State;
use axum::http::{header, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;

use super::AppState;
use crate::service::Reply;

impl IntoResponse for Reply {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status.code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, [(header::CONTENT_TYPE, self.content_type)], self.body).into_response()
    }
}

/// Matches the request path against the endpoint template and dispatches
/// the body to the named operation.
///
/// Paths outside the template get the unknown-operation reply; matched paths
/// accept `POST` only. Once shutdown starts every new call gets 503.
pub async fn operation_handler(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    body: Bytes,
) -> Response {
    if state.shutdown.is_draining() {
        return (StatusCode::SERVICE_UNAVAILABLE, [(header::RETRY_AFTER, "1")]).into_response();
    }
    let _guard = state.shutdown.in_flight_guard();

    let Some(operation) = state.service.route(uri.path()) else {
        return state.service.unknown_operation(uri.path()).into_response();
    };
    if method != Method::POST {
        return (StatusCode::METHOD_NOT_ALLOWED, [(header::ALLOW, "POST")]).into_response();
    }
    state.service.handle(operation, body).await.into_response()
}
