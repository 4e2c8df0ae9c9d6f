//! CORS for browser clients of the patient API.

use crate::domain::config::CorsConfig;
use axum::http::{HeaderName, HeaderValue, Method};
use std::str::FromStr;
use std::time::Duration;
use tower_http::cors::{AllowHeaders, AllowOrigin, CorsLayer};
use tracing::warn;

/// CORS layer for `config`, or `None` when CORS is disabled and responses
/// should carry no CORS headers at all.
pub fn create_cors_layer(config: &CorsConfig) -> Option<CorsLayer> {
    if !config.enabled {
        return None;
    }

    let origin = if is_wildcard(&config.allowed_origins) {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(parse_all::<HeaderValue>("origin", &config.allowed_origins))
    };
    let headers = if is_wildcard(&config.allowed_headers) {
        AllowHeaders::any()
    } else {
        AllowHeaders::list(parse_all::<HeaderName>("header", &config.allowed_headers))
    };

    Some(
        CorsLayer::new()
            .allow_origin(origin)
            .allow_methods(parse_all::<Method>("method", &config.allowed_methods))
            .allow_headers(headers)
            .max_age(Duration::from_secs(config.max_age)),
    )
}

fn is_wildcard(values: &[String]) -> bool {
    values.iter().any(|v| v == "*")
}

/// Parse every entry, skipping (and logging) the ones that do not parse.
fn parse_all<T: FromStr>(what: &'static str, values: &[String]) -> Vec<T> {
    values
        .iter()
        .filter_map(|value| match value.parse() {
            Ok(parsed) => Some(parsed),
            Err(_) => {
                warn!(value = %value, "Ignoring invalid CORS {what}");
                None
            }
        })
        .collect()
}
