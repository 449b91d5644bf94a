//! Request handling
//!
//! Routes each request and turns relay outcomes into HTTP responses.

use super::http_tracing::{header_str, record_response, request_span};
use crate::relay::{ErrorEnvelope, LaunchReport, Relay, RelayError, ERROR_KIND_HEADER};
use crate::router::{Route, RouterError};
use bytes::Bytes;
use futures::TryStreamExt;
use http_body_util::{BodyStream, Full};
use hyper::body::Incoming;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{Request, Response, StatusCode};
use std::convert::Infallible;
use std::sync::Arc;
use tracing::Instrument;

/// Browser client served at `/`
const INDEX_HTML: &str = include_str!("../../assets/index.html");

const JOBS_NOT_IMPLEMENTED: &str = "Job tracking is not implemented";

/// Per-server state shared by all connections
pub struct RelayState {
    pub relay: Relay,
}

/// Handle one HTTP request
///
/// # Supported Endpoints
///
/// * `GET /health` - Health check (returns "ok")
/// * `GET /` - Browser upload client
/// * `POST /api/beyblade-detection` - Passthrough relay (`file` field)
/// * `POST /api/upload` - Envelope relay (`video` field)
/// * `POST /api/process`, `GET /api/status/{id}` - 501 Not Implemented
pub async fn handle_request(
    req: Request<Incoming>,
    state: Arc<RelayState>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let method = req.method().to_string();
    let path = req.uri().path().to_string();
    let span = request_span(&method, &path, req.headers());

    let response = route_request(req, &method, &path, state)
        .instrument(span.clone())
        .await;

    record_response(&span, response.status().as_u16());
    Ok(response)
}

async fn route_request(
    req: Request<Incoming>,
    method: &str,
    path: &str,
    state: Arc<RelayState>,
) -> Response<Full<Bytes>> {
    let route = match Route::parse(method, path) {
        Ok(route) => route,
        Err(e) => return router_error_response(&e),
    };
    tracing::Span::current().record("relay.route", route.label());

    match route {
        Route::Health => text_response(StatusCode::OK, "text/plain", Bytes::from_static(b"ok")),
        Route::Index => text_response(
            StatusCode::OK,
            "text/html; charset=utf-8",
            Bytes::from_static(INDEX_HTML.as_bytes()),
        ),
        Route::Detect | Route::Upload => relay_request(req, &route, &state.relay).await,
        Route::ProcessJob | Route::JobStatus { .. } => {
            tracing::warn!(route = route.label(), "Job endpoint called");
            json_response(
                StatusCode::NOT_IMPLEMENTED,
                &ErrorEnvelope {
                    error: JOBS_NOT_IMPLEMENTED.to_string(),
                },
            )
        }
    }
}

async fn relay_request(req: Request<Incoming>, route: &Route, relay: &Relay) -> Response<Full<Bytes>> {
    let Some(field_name) = route.file_field() else {
        return relay_error_response(&RelayError::InternalFailure);
    };

    let content_type = header_str(req.headers(), CONTENT_TYPE.as_str()).map(|s| s.to_string());
    let body = BodyStream::new(req.into_body())
        .try_filter_map(|frame| async move { Ok(frame.into_data().ok()) });

    let (file, reply) = match relay
        .relay(route.label(), content_type.as_deref(), body, field_name)
        .await
    {
        Ok(relayed) => relayed,
        Err(e) => return relay_error_response(&e),
    };

    match route {
        Route::Upload => json_response(StatusCode::OK, &LaunchReport::new(&file, &reply)),
        _ => {
            let status = StatusCode::from_u16(reply.status).unwrap_or(StatusCode::OK);
            let mut response = Response::new(Full::new(reply.body));
            *response.status_mut() = status;
            if let Some(value) = reply
                .content_type
                .as_deref()
                .and_then(|ct| HeaderValue::from_str(ct).ok())
            {
                response.headers_mut().insert(CONTENT_TYPE, value);
            }
            response
        }
    }
}

fn relay_error_response(err: &RelayError) -> Response<Full<Bytes>> {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut response = json_response(status, &err.envelope());
    response
        .headers_mut()
        .insert(ERROR_KIND_HEADER, HeaderValue::from_static(err.kind()));
    response
}

fn router_error_response(err: &RouterError) -> Response<Full<Bytes>> {
    let status = StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::NOT_FOUND);
    json_response(
        status,
        &ErrorEnvelope {
            error: err.to_string(),
        },
    )
}

fn json_response<T: serde::Serialize>(status: StatusCode, value: &T) -> Response<Full<Bytes>> {
    match serde_json::to_vec(value) {
        Ok(body) => text_response(status, "application/json", Bytes::from(body)),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode JSON response");
            text_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "text/plain",
                Bytes::from_static(b"Internal Server Error"),
            )
        }
    }
}

fn text_response(status: StatusCode, content_type: &'static str, body: Bytes) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}
