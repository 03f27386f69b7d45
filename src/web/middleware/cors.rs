//! CORS configuration for the relay endpoints.

use axum::http::{HeaderValue, Method};
use tower_http::cors::{Any, CorsLayer};

/// Methods the relay answers: the WebSocket upgrade and the health check.
const ALLOWED_METHODS: [Method; 2] = [Method::GET, Method::OPTIONS];

/// Create a CORS layer from the configured origins.
///
/// An empty list, or a list where no entry parses as a header value, allows
/// any origin.
pub fn create_cors_layer(origins: &[String]) -> CorsLayer {
    let parsed_origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    let layer = CorsLayer::new()
        .allow_methods(ALLOWED_METHODS)
        .allow_headers(Any);

    if parsed_origins.is_empty() {
        layer.allow_origin(Any)
    } else {
        layer.allow_origin(parsed_origins)
    }
}
