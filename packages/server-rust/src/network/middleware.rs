//! Transport-level middleware shared by every route.
//!
//! Invocation-level concerns (concurrency cap, per-invocation timeout,
//! timing) belong to the dispatch pipeline in `service::middleware`; the
//! layers here only see HTTP requests.

use axum::http::header::{self, HeaderName};
use axum::http::{Method, StatusCode};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use super::config::NetworkConfig;

const REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Wraps `router` in the HTTP middleware stack, outermost first:
///
/// 1. `SetRequestId` -- UUID `x-request-id` unless the caller sent one
/// 2. `Trace` -- one span per request, tagged with the request id
/// 3. `Compression` -- gzip when the client accepts it
/// 4. `CORS` -- configured origins; `Location` is exposed so browser
///    clients can follow the poll protocol
/// 5. `Timeout` -- 408 once `request_timeout` elapses
/// 6. `PropagateRequestId` -- echoes `x-request-id` on the response
pub fn with_http_layers<S>(router: Router<S>, config: &NetworkConfig) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    let layers = ServiceBuilder::new()
        .layer(SetRequestIdLayer::new(REQUEST_ID, MakeRequestUuid))
        .layer(TraceLayer::new_for_http().make_span_with(
            |request: &axum::http::Request<axum::body::Body>| {
                let request_id = request
                    .headers()
                    .get(&REQUEST_ID)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("-");
                tracing::info_span!(
                    "http",
                    method = %request.method(),
                    path = %request.uri().path(),
                    request_id = %request_id,
                )
            },
        ))
        .layer(CompressionLayer::new())
        .layer(cors_layer(&config.cors_origins))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            config.request_timeout,
        ))
        .layer(PropagateRequestIdLayer::new(REQUEST_ID));

    router.layer(layers)
}

/// `"*"` anywhere in `origins` allows every origin; otherwise only the
/// parseable entries are allowed.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(origins.iter().filter_map(|o| o.parse().ok()))
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any)
        .expose_headers([header::LOCATION, REQUEST_ID])
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::Request;
    use axum::routing::get;
    use tower::ServiceExt;

    use super::*;

    fn app(config: &NetworkConfig) -> Router {
        let router = Router::new()
            .route("/", get(|| async { "ok" }))
            .route(
                "/slow",
                get(|| async {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    "late"
                }),
            );
        with_http_layers(router, config)
    }

    #[tokio::test]
    async fn request_id_is_assigned_or_echoed() {
        let config = NetworkConfig::default();

        let response = app(&config)
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(&REQUEST_ID));

        let response = app(&config)
            .oneshot(
                Request::get("/")
                    .header(&REQUEST_ID, "caller-123")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.headers()[&REQUEST_ID], "caller-123");
    }

    #[tokio::test]
    async fn cors_exposes_location_to_allowed_origins() {
        let config = NetworkConfig {
            cors_origins: vec!["https://app.example.com".to_string()],
            ..NetworkConfig::default()
        };
        let request = Request::get("/")
            .header(header::ORIGIN, "https://app.example.com")
            .body(Body::empty())
            .unwrap();

        let response = app(&config).oneshot(request).await.unwrap();
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "https://app.example.com"
        );
        let exposed = response.headers()[header::ACCESS_CONTROL_EXPOSE_HEADERS]
            .to_str()
            .unwrap()
            .to_ascii_lowercase();
        assert!(exposed.contains("location"));
    }

    #[tokio::test]
    async fn unlisted_origin_gets_no_cors_grant() {
        let config = NetworkConfig {
            cors_origins: vec!["https://app.example.com".to_string()],
            ..NetworkConfig::default()
        };
        let request = Request::get("/")
            .header(header::ORIGIN, "https://evil.example.com")
            .body(Body::empty())
            .unwrap();

        let response = app(&config).oneshot(request).await.unwrap();
        assert!(!response
            .headers()
            .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_requests_time_out_with_408() {
        let config = NetworkConfig {
            request_timeout: Duration::from_millis(100),
            ..NetworkConfig::default()
        };

        let response = app(&config)
            .oneshot(Request::get("/slow").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
    }
}
