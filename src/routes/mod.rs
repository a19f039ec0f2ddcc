//! HTTP routes for Alianca
//!
//! Handlers work on an [`ApiRequest`] whose body has already been read, so
//! the whole REST surface can be driven without a socket.

pub mod auth_routes;
pub mod dashboard;
pub mod health;
pub mod members;

use std::collections::HashMap;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::{Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, error};

use crate::server::AppState;
use crate::types::{AliancaError, FieldError, Result};

pub use health::health_check;

pub type BoxBody = http_body_util::combinators::BoxBody<Bytes, hyper::Error>;

/// A request after its body has been collected
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub authorization: Option<String>,
    pub body: Bytes,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: None,
            authorization: None,
            body: Bytes::new(),
        }
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn with_token(mut self, token: &str) -> Self {
        self.authorization = Some(format!("Bearer {token}"));
        self
    }

    pub fn with_json<T: Serialize>(mut self, body: &T) -> Self {
        self.body = serde_json::to_vec(body).map(Bytes::from).unwrap_or_default();
        self
    }

    /// Decode the JSON body
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        if self.body.is_empty() {
            return Err(AliancaError::BadRequest("Request body is required".into()));
        }
        serde_json::from_slice(&self.body)
            .map_err(|e| AliancaError::BadRequest(format!("Invalid JSON: {e}")))
    }

    /// Query string as decoded key/value pairs; later keys win
    pub fn query_params(&self) -> HashMap<String, String> {
        parse_query(self.query.as_deref())
    }
}

pub fn parse_query(query: Option<&str>) -> HashMap<String, String> {
    let Some(query) = query else {
        return HashMap::new();
    };

    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .filter_map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let key = urlencoding::decode(&key.replace('+', " ")).ok()?.into_owned();
            let value = urlencoding::decode(&value.replace('+', " ")).ok()?.into_owned();
            Some((key, value))
        })
        .collect()
}

/// Parse an optional query parameter, reporting failures against its name
pub fn query_value<T: std::str::FromStr>(
    params: &HashMap<String, String>,
    key: &str,
    errors: &mut Vec<FieldError>,
) -> Option<T> {
    let raw = params.get(key).filter(|v| !v.is_empty())?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            errors.push(FieldError::new(key, format!("Invalid value: {raw}")));
            None
        }
    }
}

// =============================================================================
// Response Helpers
// =============================================================================

pub fn full_body(data: impl Into<Bytes>) -> BoxBody {
    Full::new(data.into())
        .map_err(|never| match never {})
        .boxed()
}

pub fn empty_body() -> BoxBody {
    full_body(Bytes::new())
}

fn build(status: StatusCode, content_type: Option<&str>, body: BoxBody) -> Response<BoxBody> {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    if let Some(content_type) = content_type {
        if let Ok(value) = hyper::header::HeaderValue::from_str(content_type) {
            response
                .headers_mut()
                .insert(hyper::header::CONTENT_TYPE, value);
        }
    }
    response
}

pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<BoxBody> {
    match serde_json::to_vec(body) {
        Ok(json) => build(status, Some("application/json"), full_body(json)),
        Err(e) => {
            error!("Failed to serialize response: {}", e);
            build(
                StatusCode::INTERNAL_SERVER_ERROR,
                Some("application/json"),
                full_body(r#"{"status":"error","code":"INTERNAL","message":"Internal server error"}"#),
            )
        }
    }
}

pub fn no_content() -> Response<BoxBody> {
    build(StatusCode::NO_CONTENT, None, empty_body())
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    status: &'static str,
    code: &'a str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<&'a [FieldError]>,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Map an error to its response; internal details stay hidden outside dev mode
pub fn error_response(err: &AliancaError, dev_mode: bool) -> Response<BoxBody> {
    let message = if err.is_internal() {
        error!("Request failed: {}", err);
        if dev_mode {
            err.message()
        } else {
            "Internal server error".to_string()
        }
    } else {
        debug!("Request rejected: {}", err);
        err.message()
    };

    json_response(
        err.status_code(),
        &ErrorBody {
            status: "error",
            code: err.code(),
            message,
            errors: err.field_errors(),
        },
    )
}

pub fn method_not_allowed() -> Response<BoxBody> {
    json_response(
        StatusCode::METHOD_NOT_ALLOWED,
        &ErrorBody {
            status: "error",
            code: "METHOD_NOT_ALLOWED",
            message: "Method not allowed".into(),
            errors: None,
        },
    )
}

// =============================================================================
// Dispatch
// =============================================================================

/// Route a collected request to its handler
pub async fn dispatch(state: &AppState, req: ApiRequest) -> Response<BoxBody> {
    let path = req.path.trim_end_matches('/').to_string();

    let result = match path.as_str() {
        "/health" | "/healthz" => return health_check(state),
        p if p.starts_with("/api/auth") => {
            auth_routes::handle_auth_request(state, &req, &p["/api/auth".len()..]).await
        }
        p if p.starts_with("/api/members") => {
            members::handle_members_request(state, &req, &p["/api/members".len()..]).await
        }
        p if p.starts_with("/api/dashboard") => {
            dashboard::handle_dashboard_request(state, &req, &p["/api/dashboard".len()..]).await
        }
        _ => Err(AliancaError::NotFound(format!("No route for {}", req.path))),
    };

    match result {
        Ok(response) => response,
        Err(err) => error_response(&err, state.args.dev_mode),
    }
}

/// Split `/a/b` into `["a", "b"]`
pub(crate) fn segments(rest: &str) -> Result<Vec<&str>> {
    if !rest.is_empty() && !rest.starts_with('/') {
        return Err(AliancaError::NotFound("No such route".into()));
    }
    Ok(rest.split('/').filter(|s| !s.is_empty()).collect())
}
