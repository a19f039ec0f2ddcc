//! HTTP routes for members
//!
//! - GET    /api/members                 - Scoped, filtered, paginated listing
//! - POST   /api/members                 - Register a member
//! - GET    /api/members/{id}            - Member with supervisor and disciples
//! - PUT    /api/members/{id}            - Update profile fields
//! - DELETE /api/members/{id}            - Deactivate
//! - PATCH  /api/members/{id}/promote    - Change role
//! - PATCH  /api/members/{id}/password   - Change password
//! - GET    /api/members/{id}/promotions - Promotion history

use hyper::{Method, Response, StatusCode};

use crate::auth::Role;
use crate::db::Gender;
use crate::network::input::{NewMember, PasswordChange, PromoteRequest, UpdateMember};
use crate::network::store::{MemberQuery, PageRequest, DEFAULT_PAGE_SIZE};
use crate::routes::{
    json_response, method_not_allowed, no_content, query_value, segments, ApiRequest, BoxBody,
    MessageResponse,
};
use crate::server::AppState;
use crate::types::{AliancaError, Result};

/// Listing filters and page from the query string
fn list_params(req: &ApiRequest) -> Result<(MemberQuery, PageRequest)> {
    let params = req.query_params();
    let mut errors = Vec::new();

    let page: Option<u32> = query_value(&params, "page", &mut errors);
    let limit: Option<u32> = query_value(&params, "limit", &mut errors);
    let query = MemberQuery {
        ids: None,
        role: query_value::<Role>(&params, "role", &mut errors),
        gender: query_value::<Gender>(&params, "gender", &mut errors),
        supervisor_id: params.get("supervisor_id").filter(|v| !v.is_empty()).cloned(),
        ministry_id: params.get("ministry_id").filter(|v| !v.is_empty()).cloned(),
        baptized: query_value::<bool>(&params, "baptized", &mut errors),
    };

    if !errors.is_empty() {
        return Err(AliancaError::Validation(errors));
    }

    let page = PageRequest::new(page.unwrap_or(1), limit.unwrap_or(DEFAULT_PAGE_SIZE));
    Ok((query, page))
}

pub async fn handle_members_request(
    state: &AppState,
    req: &ApiRequest,
    rest: &str,
) -> Result<Response<BoxBody>> {
    let segments = segments(rest)?;
    let known = matches!(
        segments.as_slice(),
        [] | [_] | [_, "promote"] | [_, "password"] | [_, "promotions"]
    );
    if !known {
        return Err(AliancaError::NotFound(format!("No route for {}", req.path)));
    }

    let actor = state.service.authenticate(req.authorization.as_deref()).await?;
    let service = &state.service;

    match (&req.method, segments.as_slice()) {
        (&Method::GET, []) => {
            let (query, page) = list_params(req)?;
            let list = service.list(&actor, query, page).await?;
            Ok(json_response(StatusCode::OK, &list))
        }
        (&Method::POST, []) => {
            let input: NewMember = req.json()?;
            let created = service.create(&actor, input).await?;
            Ok(json_response(StatusCode::CREATED, &created))
        }
        (&Method::GET, [id]) => {
            let detail = service.get(&actor, id).await?;
            Ok(json_response(StatusCode::OK, &detail))
        }
        (&Method::PUT, [id]) => {
            let input: UpdateMember = req.json()?;
            let updated = service.update(&actor, id, input).await?;
            Ok(json_response(StatusCode::OK, &updated))
        }
        (&Method::DELETE, [id]) => {
            service.deactivate(&actor, id).await?;
            Ok(no_content())
        }
        (&Method::PATCH, [id, "promote"]) => {
            let input: PromoteRequest = req.json()?;
            let promoted = service.promote(&actor, id, input).await?;
            Ok(json_response(StatusCode::OK, &promoted))
        }
        (&Method::PATCH, [id, "password"]) => {
            let input: PasswordChange = req.json()?;
            service.change_password(&actor, id, input).await?;
            Ok(json_response(
                StatusCode::OK,
                &MessageResponse::new("Password updated"),
            ))
        }
        (&Method::GET, [id, "promotions"]) => {
            let history = service.promotion_history(&actor, id).await?;
            Ok(json_response(StatusCode::OK, &history))
        }
        _ => Ok(method_not_allowed()),
    }
}
