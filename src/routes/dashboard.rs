//! HTTP routes for the dashboard
//!
//! - GET /api/dashboard/stats     - Statistics over the actor's scope
//! - GET /api/dashboard/hierarchy - Actor and its direct reports

use hyper::{Method, Response, StatusCode};

use crate::db::Gender;
use crate::network::StatsFilter;
use crate::routes::{json_response, method_not_allowed, query_value, segments, ApiRequest, BoxBody};
use crate::server::AppState;
use crate::types::{AliancaError, Result};

fn stats_filter(req: &ApiRequest) -> Result<StatsFilter> {
    let params = req.query_params();
    let mut errors = Vec::new();

    let filter = StatsFilter {
        gender: query_value::<Gender>(&params, "gender", &mut errors),
        min_age: query_value(&params, "min_age", &mut errors),
        max_age: query_value(&params, "max_age", &mut errors),
    };

    if errors.is_empty() {
        Ok(filter)
    } else {
        Err(AliancaError::Validation(errors))
    }
}

pub async fn handle_dashboard_request(
    state: &AppState,
    req: &ApiRequest,
    rest: &str,
) -> Result<Response<BoxBody>> {
    let segments = segments(rest)?;
    if !matches!(segments.as_slice(), ["stats"] | ["hierarchy"]) {
        return Err(AliancaError::NotFound(format!("No route for {}", req.path)));
    }
    if req.method != Method::GET {
        return Ok(method_not_allowed());
    }

    let actor = state.service.authenticate(req.authorization.as_deref()).await?;

    match segments.as_slice() {
        ["stats"] => {
            let filter = stats_filter(req)?;
            let report = state.service.dashboard(&actor, filter).await?;
            Ok(json_response(StatusCode::OK, &report))
        }
        _ => {
            let hierarchy = state.service.hierarchy(&actor).await?;
            Ok(json_response(StatusCode::OK, &hierarchy))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_filter_from_query() {
        let req = ApiRequest::new(Method::GET, "/api/dashboard/stats")
            .with_query("gender=M&min_age=18&max_age=30");
        let filter = stats_filter(&req).unwrap();
        assert_eq!(filter.gender, Some(Gender::Male));
        assert_eq!(filter.min_age, Some(18));
        assert_eq!(filter.max_age, Some(30));
    }

    #[test]
    fn test_stats_filter_rejects_garbage() {
        let req = ApiRequest::new(Method::GET, "/api/dashboard/stats")
            .with_query("gender=X&min_age=-3");
        let err = stats_filter(&req).unwrap_err();
        assert_eq!(err.field_errors().unwrap().len(), 2);
    }
}
