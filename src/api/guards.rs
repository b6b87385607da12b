use axum::http::{header, HeaderMap};

use crate::api::errors::ApiError;
use crate::core::security::{self, Claims};
use crate::core::state::AppState;

const RATE_LIMIT_WINDOW_SECONDS: u64 = 60;

/// Verifies the bearer token on a request. Identity itself lives elsewhere.
pub(crate) fn require_bearer(headers: &HeaderMap, state: &AppState) -> Result<Claims, ApiError> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(ApiError::Unauthorized("Invalid authentication credentials"))?;

    security::verify_token(token, state.settings()).map_err(|err| {
        tracing::debug!(error = %err, "Bearer token rejected");
        ApiError::Unauthorized("Invalid authentication credentials")
    })
}

/// Per-subject limit on generation calls. Redis trouble lets the request through.
pub(crate) async fn enforce_ai_rate_limit(state: &AppState, claims: &Claims) -> Result<(), ApiError> {
    let limit = state.settings().rate_limit().ai_requests_per_minute;
    let key = format!("ai:{}", claims.sub);

    match state.redis().count_hit(&key, RATE_LIMIT_WINDOW_SECONDS).await {
        Ok(Some(hits)) if hits > limit => {
            tracing::warn!(subject = %claims.sub, hits, limit, "AI rate limit exceeded");
            metrics::counter!("rate_limited_total").increment(1);
            Err(ApiError::TooManyRequests("Too many generation requests, try again shortly"))
        }
        Ok(_) => Ok(()),
        Err(err) => {
            tracing::warn!(error = %err, "Rate limiter unavailable; allowing request");
            Ok(())
        }
    }
}
