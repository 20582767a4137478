use http::{HeaderValue, Method, header};
use tower_http::cors::{AllowOrigin, CorsLayer};

/// CORS for the broker's origins plus any local development origin.
pub fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let allowed: Vec<String> = allowed_origins
        .iter()
        .map(|o| o.trim().trim_end_matches('/').to_string())
        .filter(|o| !o.is_empty())
        .collect();

    CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
        .allow_origin(AllowOrigin::predicate(move |origin: &HeaderValue, _| {
            origin
                .to_str()
                .map(|origin| is_allowed_origin(origin, &allowed))
                .unwrap_or(false)
        }))
}

fn is_allowed_origin(origin: &str, allowed: &[String]) -> bool {
    is_localhost_origin(origin) || allowed.iter().any(|a| a == origin)
}

/// `http://localhost` or `http://127.0.0.1`, on any port.
fn is_localhost_origin(origin: &str) -> bool {
    let Some(rest) = origin.strip_prefix("http://") else {
        return false;
    };
    let (host, port) = match rest.split_once(':') {
        Some((host, port)) => (host, Some(port)),
        None => (rest, None),
    };
    let port_ok = port.is_none_or(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()));
    (host == "localhost" || host == "127.0.0.1") && port_ok
}
