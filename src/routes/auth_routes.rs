//! HTTP routes for authentication
//!
//! - POST /api/auth/login  - Exchange email and password for a JWT
//! - GET  /api/auth/me     - Current member with supervisor and disciples
//! - POST /api/auth/logout - Acknowledge logout; tokens are dropped client-side

use hyper::{Method, Response, StatusCode};

use crate::network::input::LoginRequest;
use crate::routes::{
    json_response, method_not_allowed, segments, ApiRequest, BoxBody, MessageResponse,
};
use crate::server::AppState;
use crate::types::{AliancaError, Result};

pub async fn handle_auth_request(
    state: &AppState,
    req: &ApiRequest,
    rest: &str,
) -> Result<Response<BoxBody>> {
    match (&req.method, segments(rest)?.as_slice()) {
        (&Method::POST, ["login"]) => {
            let login: LoginRequest = req.json()?;
            let response = state.service.login(login).await?;
            Ok(json_response(StatusCode::OK, &response))
        }
        (&Method::GET, ["me"]) => {
            let actor = state.service.authenticate(req.authorization.as_deref()).await?;
            let me = state.service.me(&actor).await?;
            Ok(json_response(StatusCode::OK, &me))
        }
        (&Method::POST, ["logout"]) => {
            state.service.authenticate(req.authorization.as_deref()).await?;
            Ok(json_response(
                StatusCode::OK,
                &MessageResponse::new("Logged out"),
            ))
        }
        (_, ["login"] | ["me"] | ["logout"]) => Ok(method_not_allowed()),
        _ => Err(AliancaError::NotFound(format!("No route for {}", req.path))),
    }
}
