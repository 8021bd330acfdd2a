//! Minimal handlers mounted by the serve options.

use axum::{
    extract::{Path, Request, State},
    http::{header, StatusCode, Uri},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::node::NodeHandle;

/// Paths of the bundled web UI, newest first.
pub const WEBUI_PATHS: &[&str] = &[
    "/ipfs/QmR9MzChjp1MdFWik7NjEjqKQMzVmBkdK3dz14A6B5Cupm",
    "/ipfs/QmXX7YRpU7nNBKfw75VG7Y1c3GwpSAGHRev67XVPgZFv9R",
    "/ipfs/QmctngrQAt9fjpQUZr7Bx3BsXvBRQ8WKXeWmeUJcMVXuUj",
];

/// Wire protocol version reported by `/version`.
pub const PROTOCOL_VERSION: &str = "ipfs/0.1.0";

#[derive(Serialize)]
struct IdOutput {
    #[serde(rename = "ID")]
    id: String,
    #[serde(rename = "Addresses")]
    addresses: Vec<String>,
    #[serde(rename = "AgentVersion")]
    agent_version: String,
    #[serde(rename = "ProtocolVersion")]
    protocol_version: &'static str,
}

#[derive(Serialize)]
struct CommandError {
    #[serde(rename = "Message")]
    message: String,
    #[serde(rename = "Code")]
    code: u16,
}

#[derive(Serialize)]
struct DebugVars {
    peer_id: String,
    state: String,
    uptime_secs: u64,
    online: bool,
    routing: &'static str,
    transport_encrypted: bool,
    services: BTreeMap<String, String>,
    blocks: usize,
}

fn agent_version() -> String {
    format!("node-daemon/{}", env!("CARGO_PKG_VERSION"))
}

/// `/api/v0/...` command routes.
pub fn command_routes(node: NodeHandle) -> Router {
    Router::new()
        .route("/api/v0/{*command}", get(commands).post(commands))
        .with_state(node)
}

async fn commands(State(node): State<NodeHandle>, Path(command): Path<String>) -> Response {
    match command.trim_end_matches('/') {
        "id" => {
            let addresses = node
                .swarm_addrs()
                .iter()
                .map(|addr| format!("{}/ipfs/{}", addr, node.peer_id()))
                .collect();
            Json(IdOutput {
                id: node.peer_id().to_string(),
                addresses,
                agent_version: agent_version(),
                protocol_version: PROTOCOL_VERSION,
            })
            .into_response()
        }
        "version" => Json(serde_json::json!({
            "Version": env!("CARGO_PKG_VERSION"),
            "Agent": agent_version(),
        }))
        .into_response(),
        "swarm/addrs" => {
            let addrs: Vec<String> = node.swarm_addrs().iter().map(ToString::to_string).collect();
            Json(serde_json::json!({ "Addrs": addrs })).into_response()
        }
        "config/show" => Json(node.config().clone()).into_response(),
        other => (
            StatusCode::NOT_FOUND,
            Json(CommandError {
                message: format!("unknown command {:?}", other),
                code: StatusCode::NOT_FOUND.as_u16(),
            }),
        )
            .into_response(),
    }
}

/// `/webui` sends the browser to the current web UI.
pub async fn webui() -> Redirect {
    Redirect::to(WEBUI_PATHS[0])
}

/// `/version` in plain text.
pub async fn version() -> String {
    format!(
        "Client Version:   {}\nProtocol Version: {}\n",
        agent_version(),
        PROTOCOL_VERSION
    )
}

/// `/debug/vars` introspection.
pub async fn debug_vars(State(node): State<NodeHandle>) -> impl IntoResponse {
    let vars = DebugVars {
        peer_id: node.peer_id().to_string(),
        state: format!("{:?}", node.state()),
        uptime_secs: node.uptime().as_secs(),
        online: node.is_online(),
        routing: node.routing().name(),
        transport_encrypted: node.transport().encrypted,
        services: node.services().into_iter().collect(),
        blocks: node.content().len(),
    };
    Json(vars)
}

/// `/` redirect to a configured location.
pub async fn redirect(State(target): State<Arc<str>>) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, target.to_string())]).into_response()
}

/// Route requests for a published name to `/ipns/<name><path>`.
pub async fn ipns_hostname(
    State(node): State<NodeHandle>,
    mut request: Request,
    next: Next,
) -> Response {
    let host = request
        .headers()
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(|host| host.split(':').next().unwrap_or(host).to_string());

    if let Some(host) = host {
        if node.content().resolve(&host).is_some() {
            let rest = request
                .uri()
                .path_and_query()
                .map(|pq| pq.as_str())
                .unwrap_or("/");
            match format!("/ipns/{}{}", host, rest).parse::<Uri>() {
                Ok(uri) => {
                    tracing::trace!(host = %host, uri = %uri, "Rewriting IPNS hostname request");
                    *request.uri_mut() = uri;
                }
                Err(e) => tracing::debug!(host = %host, error = %e, "Unusable IPNS rewrite"),
            }
        }
    }

    next.run(request).await
}
