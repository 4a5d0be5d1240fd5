//! Direct calls to owning services for the synchronous dispatch path.

use async_trait::async_trait;
use bastion_types::{ForwardedRequest, GatewayError, GatewayResponse, ServiceRoute};
use reqwest::Method;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

#[async_trait]
pub trait DownstreamClient: Send + Sync {
    /// Call the owning service.
    ///
    /// 2xx/3xx resolve to the passthrough response, 4xx to
    /// [`GatewayError::ClientError`], and 5xx, timeouts and transport errors to
    /// breaker-eligible failures.
    async fn call(
        &self,
        route: &ServiceRoute,
        request: &ForwardedRequest,
    ) -> Result<GatewayResponse, GatewayError>;
}

pub struct HttpDownstream {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpDownstream {
    pub fn new(timeout: Duration) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .tcp_keepalive(Duration::from_secs(30))
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| GatewayError::Internal { message: format!("HTTP client: {e}") })?;
        Ok(Self { client, timeout })
    }

    fn transport_error(&self, route: &ServiceRoute, e: &reqwest::Error) -> GatewayError {
        if e.is_timeout() {
            GatewayError::Timeout {
                dependency: route.service.clone(),
                duration_ms: self.timeout.as_millis() as u64,
            }
        } else {
            GatewayError::DependencyFailure {
                dependency: route.service.clone(),
                message: e.to_string(),
            }
        }
    }
}

/// JSON when it parses, the raw text otherwise, null when empty.
fn decode_body(text: String) -> Value {
    if text.is_empty() {
        return Value::Null;
    }
    serde_json::from_str(&text).unwrap_or(Value::String(text))
}

#[async_trait]
impl DownstreamClient for HttpDownstream {
    async fn call(
        &self,
        route: &ServiceRoute,
        request: &ForwardedRequest,
    ) -> Result<GatewayResponse, GatewayError> {
        let method = Method::from_bytes(request.method.to_ascii_uppercase().as_bytes())
            .map_err(|_| GatewayError::ClientError {
                status: 405,
                body: serde_json::json!({"message": format!("unsupported method {}", request.method)}),
            })?;
        let url = format!("{}{}", route.base_url.trim_end_matches('/'), request.path);

        let mut builder = self.client.request(method, &url).query(&request.query);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(raw) = &request.raw_body {
            builder = builder.body(raw.clone());
        } else if !request.body.is_null() {
            builder = builder.json(&request.body);
        }

        debug!(service = %route.service, url = %url, "Forwarding request");
        let response = builder.send().await.map_err(|e| self.transport_error(route, &e))?;
        let status = response.status();
        let text = response.text().await.map_err(|e| self.transport_error(route, &e))?;
        let body = decode_body(text);

        if status.is_client_error() {
            return Err(GatewayError::ClientError { status: status.as_u16(), body });
        }
        if status.is_server_error() {
            return Err(GatewayError::DependencyFailure {
                dependency: route.service.clone(),
                message: format!("HTTP {}", status.as_u16()),
            });
        }
        Ok(GatewayResponse::passthrough(status.as_u16(), body))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_bytes, body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn route(server: &MockServer) -> ServiceRoute {
        ServiceRoute::new("rooms", "resources", server.uri())
    }

    fn request(method: &str, path: &str) -> ForwardedRequest {
        ForwardedRequest {
            path: path.to_string(),
            method: method.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_success_passes_body_through() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rooms/7"))
            .and(query_param("expand", "owner"))
            .and(header("authorization", "Bearer t"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": 7})))
            .mount(&server)
            .await;

        let client = HttpDownstream::new(Duration::from_secs(5)).unwrap();
        let mut req = request("GET", "/rooms/7");
        req.query.insert("expand".to_string(), "owner".to_string());
        req.headers.insert("authorization".to_string(), "Bearer t".to_string());

        let response = client.call(&route(&server), &req).await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.body["id"], 7);
    }

    #[tokio::test]
    async fn test_client_error_keeps_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rooms"))
            .and(body_json(serde_json::json!({"name": ""})))
            .respond_with(
                ResponseTemplate::new(422).set_body_json(serde_json::json!({"message": "name required"})),
            )
            .mount(&server)
            .await;

        let client = HttpDownstream::new(Duration::from_secs(5)).unwrap();
        let mut req = request("POST", "/rooms");
        req.body = serde_json::json!({"name": ""});

        let err = client.call(&route(&server), &req).await.unwrap_err();
        assert_eq!(
            err,
            GatewayError::ClientError {
                status: 422,
                body: serde_json::json!({"message": "name required"}),
            }
        );
    }

    #[tokio::test]
    async fn test_form_body_is_forwarded_verbatim() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/login"))
            .and(header("content-type", "application/x-www-form-urlencoded"))
            .and(body_bytes(b"user=a&pass=b".to_vec()))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        let client = HttpDownstream::new(Duration::from_secs(5)).unwrap();
        let mut req = request("POST", "/auth/login");
        req.raw_body = Some(b"user=a&pass=b".to_vec());
        req.headers.insert(
            "content-type".to_string(),
            "application/x-www-form-urlencoded".to_string(),
        );

        let response = client.call(&route(&server), &req).await.unwrap();
        assert_eq!(response.status, 200);
    }

    #[tokio::test]
    async fn test_binary_body_is_not_reencoded() {
        let server = MockServer::start().await;
        let payload = vec![0xff, 0xfe, 0x00, 0x41];
        Mock::given(method("PUT"))
            .and(path("/rooms/7/photo"))
            .and(body_bytes(payload.clone()))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let client = HttpDownstream::new(Duration::from_secs(5)).unwrap();
        let mut req = request("PUT", "/rooms/7/photo");
        req.raw_body = Some(payload);

        let response = client.call(&route(&server), &req).await.unwrap();
        assert_eq!(response.status, 204);
    }

    #[tokio::test]
    async fn test_server_error_is_dependency_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).set_body_string("down"))
            .mount(&server)
            .await;

        let client = HttpDownstream::new(Duration::from_secs(5)).unwrap();
        let err = client.call(&route(&server), &request("GET", "/rooms")).await.unwrap_err();
        assert!(err.should_trip_circuit());
        assert!(matches!(err, GatewayError::DependencyFailure { ref message, .. } if message == "HTTP 503"));
    }

    #[tokio::test]
    async fn test_slow_dependency_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;

        let client = HttpDownstream::new(Duration::from_millis(50)).unwrap();
        let err = client.call(&route(&server), &request("GET", "/rooms")).await.unwrap_err();
        assert_eq!(
            err,
            GatewayError::Timeout { dependency: "resources".to_string(), duration_ms: 50 }
        );
    }

    #[test]
    fn test_decode_body() {
        assert_eq!(decode_body(String::new()), Value::Null);
        assert_eq!(decode_body("{\"a\":1}".to_string())["a"], 1);
        assert_eq!(decode_body("plain".to_string()), Value::String("plain".to_string()));
    }
}
