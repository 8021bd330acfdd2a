//! Content gateway: `/ipfs/<key>` and `/ipns/<name>`.
//!
//! # Responsibilities
//! - Parse the key (or resolve the name) at the head of the path
//! - Enforce the deny-list, then the allow-list
//! - Serve reads from the node's content store
//! - Accept writes only when the gateway is writable
//!
//! Unregistered methods fall through to axum's 405.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, HeaderName, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use std::sync::Arc;

use crate::keys::{Key, KeySet};
use crate::node::NodeHandle;

/// Header naming the content path a response was served from.
pub const X_IPFS_PATH: HeaderName = HeaderName::from_static("x-ipfs-path");

/// Gateway behavior.
#[derive(Debug, Clone, Default)]
pub struct GatewayOptions {
    /// Allow PUT and DELETE.
    pub writable: bool,
    /// When set, only these keys are served.
    pub allow_list: Option<KeySet>,
    /// Keys that are never served.
    pub deny_list: Option<KeySet>,
}

#[derive(Clone)]
struct GatewayState {
    node: NodeHandle,
    options: Arc<GatewayOptions>,
}

impl GatewayState {
    fn authorize(&self, key: &Key) -> Result<(), Response> {
        if let Some(deny) = &self.options.deny_list {
            if deny.contains(key) {
                tracing::debug!(key = %key, "Key is on the deny list");
                return Err((StatusCode::FORBIDDEN, format!("{} is blocked\n", key)).into_response());
            }
        }
        if let Some(allow) = &self.options.allow_list {
            if !allow.contains(key) {
                tracing::debug!(key = %key, "Key is not on the allow list");
                return Err(
                    (StatusCode::FORBIDDEN, format!("{} is not allowed\n", key)).into_response(),
                );
            }
        }
        Ok(())
    }

    fn serve(&self, key: &Key) -> Response {
        if let Err(denied) = self.authorize(key) {
            return denied;
        }
        match self.node.content().get(key) {
            Some(data) => (
                [
                    (header::CONTENT_TYPE, "application/octet-stream".to_string()),
                    (X_IPFS_PATH, format!("/ipfs/{}", key)),
                ],
                data,
            )
                .into_response(),
            None => (StatusCode::NOT_FOUND, format!("{} not found\n", key)).into_response(),
        }
    }
}

/// Gateway routes for the given options.
pub fn routes(node: NodeHandle, options: GatewayOptions) -> Router {
    let writable = options.writable;
    let state = GatewayState {
        node,
        options: Arc::new(options),
    };

    let mut ipfs = get(get_ipfs);
    let mut ipns = get(get_ipns);
    if writable {
        ipfs = ipfs.put(put_ipfs).delete(delete_ipfs);
        ipns = ipns.put(put_ipns);
    }

    Router::new()
        .route("/ipfs/{*path}", ipfs)
        .route("/ipns/{*path}", ipns)
        .with_state(state)
}

fn head_segment(path: &str) -> &str {
    path.split('/').next().unwrap_or_default()
}

fn parse_key(path: &str) -> Result<Key, Response> {
    let segment = head_segment(path);
    segment.parse().map_err(|_| {
        (StatusCode::BAD_REQUEST, format!("invalid key {:?}\n", segment)).into_response()
    })
}

async fn get_ipfs(State(state): State<GatewayState>, Path(path): Path<String>) -> Response {
    match parse_key(&path) {
        Ok(key) => state.serve(&key),
        Err(response) => response,
    }
}

async fn get_ipns(State(state): State<GatewayState>, Path(path): Path<String>) -> Response {
    let name = head_segment(&path);
    match state.node.content().resolve(name) {
        Some(key) => state.serve(&key),
        None => (StatusCode::NOT_FOUND, format!("no published name {:?}\n", name)).into_response(),
    }
}

async fn put_ipfs(
    State(state): State<GatewayState>,
    Path(path): Path<String>,
    body: Bytes,
) -> Response {
    let key = match parse_key(&path) {
        Ok(key) => key,
        Err(response) => return response,
    };
    if let Err(denied) = state.authorize(&key) {
        return denied;
    }

    let status = if state.node.content().put(key.clone(), body) {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    tracing::debug!(key = %key, "Content stored");
    (status, [(X_IPFS_PATH, format!("/ipfs/{}", key))]).into_response()
}

async fn delete_ipfs(State(state): State<GatewayState>, Path(path): Path<String>) -> Response {
    let key = match parse_key(&path) {
        Ok(key) => key,
        Err(response) => return response,
    };
    if let Err(denied) = state.authorize(&key) {
        return denied;
    }

    if state.node.content().remove(&key) {
        StatusCode::NO_CONTENT.into_response()
    } else {
        (StatusCode::NOT_FOUND, format!("{} not found\n", key)).into_response()
    }
}

/// Publish `name` as a pointer to the key in the request body.
async fn put_ipns(
    State(state): State<GatewayState>,
    Path(path): Path<String>,
    body: String,
) -> Response {
    let name = head_segment(&path).to_string();
    let key = match body.trim().parse::<Key>() {
        Ok(key) => key,
        Err(e) => return (StatusCode::BAD_REQUEST, format!("{}\n", e)).into_response(),
    };
    if let Err(denied) = state.authorize(&key) {
        return denied;
    }

    state.node.content().publish(name.clone(), key.clone());
    tracing::debug!(name = %name, key = %key, "Name published");
    (StatusCode::CREATED, [(X_IPFS_PATH, format!("/ipns/{}", name))]).into_response()
}
