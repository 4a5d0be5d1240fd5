//! Catch-all proxy handler: `/api/:prefix/*rest`.

use std::collections::{BTreeMap, HashMap};
use std::net::{IpAddr, SocketAddr};

use axum::{
    body::Bytes,
    extract::{ConnectInfo, Path, Query, State},
    http::{HeaderMap, Method, StatusCode},
    response::{IntoResponse, Json, Response},
};
use bastion_types::{GatewayResponse, InboundRequest};

use super::error::ApiError;
use crate::state::AppState;

/// Set by the authentication layer in front of the gateway. Only honoured,
/// like `x-forwarded-for`, when the socket peer is a trusted proxy.
const PRINCIPAL_HEADER: &str = "x-user-id";
const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

pub async fn proxy_request(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Path(params): Path<HashMap<String, String>>,
    Query(query): Query<BTreeMap<String, String>>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let trusted = state.is_trusted_proxy(peer.ip());
    let (body, raw_body) = decode_body(&body);
    let request = InboundRequest {
        service_prefix: params.get("prefix").cloned().unwrap_or_default(),
        path: params.get("rest").cloned().unwrap_or_default(),
        method: method.as_str().to_string(),
        body,
        raw_body,
        principal_id: if trusted { header_value(&headers, PRINCIPAL_HEADER) } else { None },
        client_ip: Some(client_ip(&headers, peer.ip(), trusted)),
        headers: header_map(&headers),
        query,
    };

    let response = state.gateway().route(request).await?;
    Ok(render(response))
}

pub(crate) fn render(response: GatewayResponse) -> Response {
    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::BAD_GATEWAY);
    (status, Json(response.body)).into_response()
}

/// JSON bodies are parsed; anything else is kept as raw bytes.
fn decode_body(body: &Bytes) -> (serde_json::Value, Option<Vec<u8>>) {
    if body.is_empty() {
        return (serde_json::Value::Null, None);
    }
    match serde_json::from_slice(body) {
        Ok(value) => (value, None),
        Err(_) => (serde_json::Value::Null, Some(body.to_vec())),
    }
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// First hop of `x-forwarded-for` when the peer is trusted, else the peer.
fn client_ip(headers: &HeaderMap, peer: IpAddr, trusted: bool) -> String {
    trusted
        .then(|| header_value(headers, FORWARDED_FOR_HEADER))
        .flatten()
        .and_then(|list| list.split(',').next().map(|ip| ip.trim().to_string()))
        .filter(|ip| !ip.is_empty())
        .unwrap_or_else(|| peer.to_string())
}

fn header_map(headers: &HeaderMap) -> BTreeMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value.to_str().ok().map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect()
}
