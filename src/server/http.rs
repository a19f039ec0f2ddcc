//! HTTP server
//!
//! One task per connection. Each request body is read up to the configured
//! limit, then handed to the route dispatcher; CORS headers are added on the
//! way out.

use http_body_util::{BodyExt, Limited};
use hyper::body::Incoming;
use hyper::header::{self, HeaderValue};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::auth::JwtValidator;
use crate::config::Args;
use crate::network::{MemberStore, NetworkService};
use crate::routes::{self, empty_body, error_response, ApiRequest, BoxBody};
use crate::types::{AliancaError, Result};

/// Shared application state
pub struct AppState {
    pub args: Args,
    pub service: NetworkService,
}

impl AppState {
    pub fn new(args: Args, store: Arc<dyn MemberStore>, jwt: JwtValidator) -> Self {
        Self {
            service: NetworkService::new(store, jwt),
            args,
        }
    }
}

/// Run the HTTP server until the listener fails
pub async fn run(state: Arc<AppState>) -> Result<()> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!(
        "Alianca listening on {} (store: {})",
        state.args.listen,
        state.service.store().kind()
    );

    if state.args.dev_mode {
        warn!("Development mode enabled - internal error details are exposed");
    }

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                let io = TokioIo::new(stream);

                tokio::spawn(async move {
                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, addr, req).await }
                    });

                    if let Err(err) = http1::Builder::new()
                        .serve_connection(io, service)
                        .await
                    {
                        error!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {:?}", e);
            }
        }
    }
}

/// Route incoming HTTP requests
async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> std::result::Result<Response<BoxBody>, hyper::Error> {
    info!("[{}] {} {}", addr, req.method(), req.uri().path());

    let response = if req.method() == Method::OPTIONS {
        preflight_response()
    } else {
        match read_request(req, state.args.max_body_bytes).await {
            Ok(api_request) => routes::dispatch(&state, api_request).await,
            Err(err) => error_response(&err, state.args.dev_mode),
        }
    };

    Ok(with_cors(response, &state.args.cors_origin))
}

/// Collect the body and keep only what the routes need
async fn read_request(req: Request<Incoming>, max_body_bytes: usize) -> Result<ApiRequest> {
    let (parts, body) = req.into_parts();

    let body = Limited::new(body, max_body_bytes)
        .collect()
        .await
        .map_err(|e| AliancaError::BadRequest(format!("Failed to read body: {e}")))?
        .to_bytes();

    Ok(ApiRequest {
        method: parts.method,
        path: parts.uri.path().to_string(),
        query: parts.uri.query().map(str::to_string),
        authorization: parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        body,
    })
}

fn preflight_response() -> Response<BoxBody> {
    let mut response = Response::new(empty_body());
    *response.status_mut() = StatusCode::NO_CONTENT;
    response
        .headers_mut()
        .insert(header::ACCESS_CONTROL_MAX_AGE, HeaderValue::from_static("86400"));
    response
}

fn with_cors(mut response: Response<BoxBody>, origin: &str) -> Response<BoxBody> {
    let headers = response.headers_mut();
    let origin = HeaderValue::from_str(origin).unwrap_or_else(|_| HeaderValue::from_static("*"));
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin);
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, PUT, PATCH, DELETE, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type, Authorization"),
    );
    response
}
