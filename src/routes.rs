/* src/routes.rs */

use axum::{
    Json, Router,
    extract::State,
    response::{IntoResponse, Response},
    routing::get,
};
use chrono::{Local, SecondsFormat};
use tracing::{error, info};

use crate::config::{Config, LogConfig, ResponseMode};
use crate::error::Error;
use crate::lookup::{GeoLocator, PublicIp, PublicIpClient, build_client};
use crate::middleware::{ClientIp, ClientIpLayer};

/// Everything the handlers need, built once at startup.
#[derive(Debug, Clone)]
pub struct AppState {
    pub mode: ResponseMode,
    pub log: LogConfig,
    pub geo: GeoLocator,
    pub public_ip: PublicIpClient,
}

impl AppState {
    /// Build the state and its shared outbound client from `config`.
    pub fn new(config: &Config) -> crate::Result<Self> {
        let client = build_client(config.http_timeout)?;

        Ok(Self {
            mode: config.mode,
            log: config.log.clone(),
            geo: GeoLocator::new(client.clone(), config.geo_url.clone()),
            public_ip: PublicIpClient::new(client, config.public_ip_url.clone()),
        })
    }

    fn timestamp(&self) -> String {
        let precision = if self.log.micros {
            SecondsFormat::Micros
        } else {
            SecondsFormat::Secs
        };
        Local::now().to_rfc3339_opts(precision, false)
    }
}

/// Router serving `/ip` and `/log-ip` behind [`ClientIpLayer`].
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/ip", get(public_ip))
        .route("/log-ip", get(log_ip))
        .layer(ClientIpLayer::new())
        .with_state(state)
}

/// Reports the caller's address, plain or with geolocation details.
async fn log_ip(State(state): State<AppState>, ClientIp(ip): ClientIp) -> Response {
    match state.mode {
        ResponseMode::Plain => {
            info!(client_ip = %ip, time = %state.timestamp(), "client ip logged");
            format!("Your IP: {}", ip).into_response()
        }
        ResponseMode::Enriched => match state.geo.lookup(&ip).await {
            Ok(details) => {
                info!(
                    client_ip = %ip,
                    city = %details.city,
                    country = %details.country,
                    isp = %details.isp,
                    time = %state.timestamp(),
                    "client ip enriched"
                );
                Json(details).into_response()
            }
            Err(e) => {
                error!(client_ip = %ip, error = %e, "failed to get IP details");
                (
                    axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to get IP details",
                )
                    .into_response()
            }
        },
    }
}

/// Reports this server's own public address.
async fn public_ip(State(state): State<AppState>) -> Result<Json<PublicIp>, Error> {
    match state.public_ip.fetch().await {
        Ok(ip) => {
            info!(ip = %ip, "public ip fetched");
            Ok(Json(PublicIp { ip }))
        }
        Err(e) => {
            error!(error = %e, "failed to get public IP");
            Err(e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, extract::ConnectInfo, http::Request, http::StatusCode};
    use http_body_util::BodyExt;
    use std::net::SocketAddr;
    use tower::ServiceExt;
    use tracing_test::traced_test;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn state(mode: ResponseMode, server: &MockServer) -> AppState {
        let config = Config {
            mode,
            geo_url: format!("{}/json", server.uri()),
            public_ip_url: format!("{}/?format=json", server.uri()),
            ..Config::default()
        };
        AppState::new(&config).unwrap()
    }

    fn get_request(uri: &str, headers: &[(&str, &str)]) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let mut req = builder.body(Body::empty()).unwrap();
        req.extensions_mut()
            .insert(ConnectInfo("203.0.113.5:54321".parse::<SocketAddr>().unwrap()));
        req
    }

    async fn send(app: Router, req: Request<Body>) -> (StatusCode, String) {
        let response = app.oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    fn geo_body() -> serde_json::Value {
        serde_json::json!({
            "status": "success",
            "country": "Australia",
            "countryCode": "AU",
            "region": "QLD",
            "regionName": "Queensland",
            "city": "South Brisbane",
            "zip": "4101",
            "lat": -27.4766,
            "lon": 153.0166,
            "timezone": "Australia/Brisbane",
            "isp": "Cloudflare, Inc",
            "org": "APNIC and Cloudflare DNS Resolver project",
            "as": "AS13335 Cloudflare, Inc.",
            "query": "1.1.1.1"
        })
    }

    #[tokio::test]
    #[traced_test]
    async fn test_plain_mode() {
        let server = MockServer::start().await;
        let app = create_router(state(ResponseMode::Plain, &server));

        let req = get_request("/log-ip", &[("x-forwarded-for", "198.51.100.9, 10.0.0.1")]);
        let (status, body) = send(app, req).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "Your IP: 198.51.100.9");
        assert!(logs_contain("client ip logged"));
        assert!(logs_contain("client_ip=198.51.100.9"));
    }

    #[tokio::test]
    async fn test_plain_mode_uses_peer_address() {
        let server = MockServer::start().await;
        let app = create_router(state(ResponseMode::Plain, &server));

        let (_, body) = send(app, get_request("/log-ip", &[])).await;
        assert_eq!(body, "Your IP: 203.0.113.5");
    }

    #[tokio::test]
    #[traced_test]
    async fn test_enriched_mode_returns_record_verbatim() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/json/1.1.1.1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(geo_body()))
            .expect(1)
            .mount(&server)
            .await;

        let app = create_router(state(ResponseMode::Enriched, &server));
        let req = get_request("/log-ip", &[("x-real-ip", "1.1.1.1")]);
        let (status, body) = send(app, req).await;

        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json, geo_body());

        logs_assert(|lines: &[&str]| {
            let matching: Vec<_> = lines
                .iter()
                .filter(|line| line.contains("client ip enriched"))
                .collect();
            if matching.len() != 1 {
                return Err(format!("expected one log line, got {}", matching.len()));
            }
            let line = matching[0];
            for needle in ["South Brisbane", "Australia", "Cloudflare, Inc", "1.1.1.1"] {
                if !line.contains(needle) {
                    return Err(format!("log line is missing {needle}: {line}"));
                }
            }
            Ok(())
        });
    }

    #[tokio::test]
    #[traced_test]
    async fn test_enriched_mode_upstream_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .expect(1)
            .mount(&server)
            .await;

        let app = create_router(state(ResponseMode::Enriched, &server));
        let (status, body) = send(app, get_request("/log-ip", &[])).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, "Failed to get IP details");
        assert!(logs_contain("failed to get IP details"));
        assert!(logs_contain("unexpected status 502"));
    }

    #[tokio::test]
    async fn test_enriched_mode_malformed_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"status\":"))
            .mount(&server)
            .await;

        let app = create_router(state(ResponseMode::Enriched, &server));
        let (status, _) = send(app, get_request("/log-ip", &[])).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    #[traced_test]
    async fn test_public_ip() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"ip": "192.0.2.200"})),
            )
            .mount(&server)
            .await;

        let app = create_router(state(ResponseMode::Plain, &server));
        let (status, body) = send(app, get_request("/ip", &[("x-real-ip", "8.8.8.8")])).await;

        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json, serde_json::json!({"ip": "192.0.2.200"}));
        assert!(logs_contain("public ip fetched"));
    }

    #[tokio::test]
    async fn test_public_ip_upstream_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let app = create_router(state(ResponseMode::Plain, &server));
        let (status, body) = send(app, get_request("/ip", &[])).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, "unexpected status 500: boom");
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let server = MockServer::start().await;
        let app = create_router(state(ResponseMode::Plain, &server));

        let (status, _) = send(app, get_request("/nope", &[])).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
