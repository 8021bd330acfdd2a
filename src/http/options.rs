//! Serve options: the ordered pipeline a service's router is built from.
//!
//! Options are applied in order. Route options add routes; layer options
//! wrap every route added before them. [`ServeOption::IpnsHostname`] is
//! special: everything after it is built into a separate router that only
//! sees requests the earlier routes did not match, after hostname rewriting.

use axum::{
    middleware,
    routing::{any, get, MethodRouter},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;

use crate::http::gateway::{self, GatewayOptions};
use crate::http::{handlers, request};
use crate::node::NodeHandle;
use crate::observability::metrics;
use crate::service::ServiceKind;

/// One step of a service's HTTP pipeline.
#[derive(Debug, Clone)]
pub enum ServeOption {
    /// `/api/v0/{*command}`.
    Commands,
    /// `/webui` redirect.
    WebUi,
    /// `/ipfs/..` and `/ipns/..` content routes.
    Gateway(GatewayOptions),
    /// `/version`.
    Version,
    /// `/debug/vars`.
    Debug,
    /// Request IDs and trace spans around the routes so far.
    Logging,
    /// Request metrics around the routes so far, plus the exposition route.
    Metrics,
    /// Rewrite published hostnames into `/ipns/` paths for later options.
    IpnsHostname,
    /// Redirect `/`, and anything no earlier option answered, to the given URL.
    Redirect(String),
}

/// Build the router for a service from its options.
pub fn build_router(node: &NodeHandle, kind: ServiceKind, options: Vec<ServeOption>) -> Router {
    apply(Router::new(), node, kind, options.into_iter())
}

fn apply(
    mut router: Router,
    node: &NodeHandle,
    kind: ServiceKind,
    mut options: std::vec::IntoIter<ServeOption>,
) -> Router {
    while let Some(option) = options.next() {
        router = match option {
            ServeOption::Commands => router.merge(handlers::command_routes(node.clone())),
            ServeOption::WebUi => router.route("/webui", get(handlers::webui)),
            ServeOption::Gateway(gateway_options) => {
                router.merge(gateway::routes(node.clone(), gateway_options))
            }
            ServeOption::Version => router.route("/version", get(handlers::version)),
            ServeOption::Debug => router.route(
                "/debug/vars",
                get(handlers::debug_vars).with_state(node.clone()),
            ),
            ServeOption::Logging => request::with_request_logging(router),
            ServeOption::Metrics => {
                // recorder must exist before the first request is counted
                metrics::prometheus_handle();
                let path = node.config().observability.metrics_path.clone();
                router
                    .layer(middleware::from_fn_with_state(
                        kind.name(),
                        metrics::track_metrics,
                    ))
                    .route(&path, get(metrics::render_metrics))
            }
            ServeOption::IpnsHostname => {
                let rest = apply(Router::new(), node, kind, options);
                let rewriting = ServiceBuilder::new()
                    .layer(middleware::from_fn_with_state(
                        node.clone(),
                        handlers::ipns_hostname,
                    ))
                    .service(rest);
                return router.fallback_service(rewriting);
            }
            ServeOption::Redirect(url) => {
                // catch-all: every path nothing else matched
                let target: Arc<str> = Arc::from(url);
                let redirect: MethodRouter = any(handlers::redirect).with_state(target);
                router.fallback_service(redirect)
            }
        };
    }
    router
}
