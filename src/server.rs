//! HTTP hosting for the SOAP endpoint.
//!
//! `POST {path}` carries SOAP requests, `GET {path}` returns the WSDL.
//! `/health` and `/metrics` report liveness and endpoint counters as JSON.

use crate::config::ServerConfig;
use crate::contract::SampleContract;
use crate::endpoint::{EndpointMetrics, SoapEndpoint, SoapRequest, SoapResponse};
use crate::error::SoapError;
use crate::wsdl::generate_wsdl;
use axum::body::Bytes;
use axum::extract::rejection::BytesRejection;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::header::{CONTENT_TYPE, HOST};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

const RESERVED_PATHS: [&str; 2] = ["/health", "/metrics"];

impl IntoResponse for SoapResponse {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut response = (status, [(CONTENT_TYPE, self.content_type)], self.body).into_response();
        for (name, value) in self.headers {
            if let (Ok(name), Ok(value)) = (HeaderName::try_from(name), HeaderValue::try_from(value)) {
                response.headers_mut().insert(name, value);
            }
        }
        response
    }
}

/// Build the router for an endpoint.
pub fn router<S>(endpoint: Arc<SoapEndpoint<S>>) -> Result<Router, SoapError>
where
    S: SampleContract + 'static,
{
    let path = endpoint.config().server.path.clone();
    if !path.starts_with('/') {
        return Err(SoapError::Config(format!(
            "endpoint path '{}' must start with '/'",
            path
        )));
    }
    if RESERVED_PATHS.contains(&path.as_str()) {
        return Err(SoapError::Config(format!(
            "endpoint path '{}' is reserved",
            path
        )));
    }
    let max_body_size = endpoint.config().settings.max_body_size;

    Ok(Router::new()
        .route(&path, post(handle_soap::<S>).get(handle_wsdl::<S>))
        .route("/health", get(health))
        .route("/metrics", get(metrics::<S>))
        .layer(DefaultBodyLimit::max(max_body_size))
        .layer(TraceLayer::new_for_http())
        .with_state(endpoint))
}

/// Bind the configured address and serve until `shutdown` resolves.
pub async fn serve<S, F>(endpoint: Arc<SoapEndpoint<S>>, shutdown: F) -> Result<(), SoapError>
where
    S: SampleContract + 'static,
    F: Future<Output = ()> + Send + 'static,
{
    let listen = endpoint.config().server.listen.clone();
    let path = endpoint.config().server.path.clone();
    let app = router(endpoint)?;

    let listener = TcpListener::bind(&listen).await?;
    info!(address = %listener.local_addr()?, path = %path, "SOAP endpoint listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("SOAP endpoint stopped");
    Ok(())
}

async fn handle_soap<S: SampleContract>(
    State(endpoint): State<Arc<SoapEndpoint<S>>>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let content_type = header_str(&headers, CONTENT_TYPE.as_str());

    let body = match body {
        Ok(body) => body,
        Err(rejection) if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => {
            let error = SoapError::BodyTooLarge {
                max: endpoint.config().settings.max_body_size,
            };
            return endpoint.reject(&error, content_type).into_response();
        }
        Err(rejection) => return rejection.into_response(),
    };

    let request = SoapRequest {
        content_type,
        soap_action: header_str(&headers, "soapaction"),
        body: &body,
    };
    endpoint.handle(request).await.into_response()
}

async fn handle_wsdl<S: SampleContract>(
    State(endpoint): State<Arc<SoapEndpoint<S>>>,
    headers: HeaderMap,
) -> Response {
    let address = endpoint_address(&endpoint.config().server, header_str(&headers, HOST.as_str()));
    let wsdl = generate_wsdl(endpoint.contract(), &address);
    ([(CONTENT_TYPE, "text/xml; charset=utf-8")], wsdl).into_response()
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn metrics<S: SampleContract>(
    State(endpoint): State<Arc<SoapEndpoint<S>>>,
) -> Json<EndpointMetrics> {
    Json(endpoint.metrics())
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Address advertised in the WSDL.
fn endpoint_address(server: &ServerConfig, host: Option<&str>) -> String {
    match (&server.public_url, host) {
        (Some(url), _) => url.clone(),
        (None, Some(host)) => format!("http://{}{}", host, server.path),
        (None, None) => format!("http://{}{}", server.listen, server.path),
    }
}
