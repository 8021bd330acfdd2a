//! Control API service.

use crate::http::handlers::WEBUI_PATHS;
use crate::http::{build_router, GatewayOptions, ServeOption};
use crate::keys::{Key, KeySet};
use crate::node::{Node, NodeHandle};
use crate::service::{bind, serve_http, LaunchError, ServiceHandle, ServiceKind};

/// Launches the control API on `addresses.api`.
#[derive(Debug, Clone, Default)]
pub struct ApiLauncher {
    /// Serve any content, not just the web UI.
    pub unrestricted: bool,
}

impl ApiLauncher {
    pub fn new(unrestricted: bool) -> Self {
        Self { unrestricted }
    }

    /// Keys the control API's gateway may serve when restricted.
    pub fn webui_allow_list() -> KeySet {
        WEBUI_PATHS
            .iter()
            .filter_map(|path| path.strip_prefix("/ipfs/"))
            .filter_map(|key| key.parse::<Key>().ok())
            .collect()
    }

    /// The control API pipeline.
    pub fn serve_options(&self, node: &NodeHandle) -> Vec<ServeOption> {
        let allow_list = if self.unrestricted {
            None
        } else {
            Some(Self::webui_allow_list())
        };

        let mut options = vec![
            ServeOption::Commands,
            ServeOption::WebUi,
            ServeOption::Gateway(GatewayOptions {
                writable: true,
                allow_list,
                deny_list: None,
            }),
            ServeOption::Version,
            ServeOption::Debug,
            ServeOption::Logging,
            ServeOption::Metrics,
        ];
        if let Some(target) = &node.config().gateway.root_redirect {
            options.push(ServeOption::Redirect(target.clone()));
        }
        options
    }

    pub async fn launch(self, node: &Node) -> Result<ServiceHandle, LaunchError> {
        let handle = node.handle();
        let listener = bind(ServiceKind::Api, &handle.config().addresses.api).await?;
        let address = listener.local_multiaddr().clone();

        let router = build_router(&handle, ServiceKind::Api, self.serve_options(&handle));

        println!("API server listening on {}", address);
        tracing::info!(
            address = %address,
            unrestricted = self.unrestricted,
            "API server listening"
        );
        Ok(serve_http(node, ServiceKind::Api, listener, router))
    }
}
