//! Public gateway service.

use crate::http::{build_router, GatewayOptions, ServeOption};
use crate::keys::{load_keyset_from_url, KeySet};
use crate::node::Node;
use crate::service::{bind, serve_http, LaunchError, ServiceHandle, ServiceKind};

/// Launches the gateway on `addresses.gateway`.
#[derive(Debug, Clone, Default)]
pub struct GatewayLauncher {
    /// Overrides `gateway.writable` when set.
    pub writable: Option<bool>,
    client: reqwest::Client,
}

impl GatewayLauncher {
    pub fn new(writable: Option<bool>) -> Self {
        Self {
            writable,
            client: reqwest::Client::new(),
        }
    }

    /// Use `client` to fetch the allow and deny lists.
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub async fn launch(self, node: &Node) -> Result<ServiceHandle, LaunchError> {
        let handle = node.handle();
        let config = handle.config();
        let Some(addr) = config.addresses.gateway_address() else {
            return Err(LaunchError::NotConfigured {
                kind: ServiceKind::Gateway,
            });
        };

        let listener = bind(ServiceKind::Gateway, addr).await?;
        let address = listener.local_multiaddr().clone();

        let writable = self.writable.unwrap_or(config.gateway.writable);
        let mode = if writable { "writable" } else { "readonly" };
        println!("Gateway ({}) server listening on {}", mode, address);
        tracing::info!(address = %address, writable, "Gateway server listening");

        let allow_list =
            load_list(&self.client, "allow list", config.gateway.allow_list.as_deref()).await?;
        let deny_list =
            load_list(&self.client, "deny list", config.gateway.deny_list.as_deref()).await?;

        let mut options = vec![
            ServeOption::Version,
            ServeOption::IpnsHostname,
            ServeOption::Gateway(GatewayOptions {
                writable,
                allow_list,
                deny_list,
            }),
        ];
        if let Some(target) = &config.gateway.root_redirect {
            options.push(ServeOption::Redirect(target.clone()));
        }
        let router = build_router(&handle, ServiceKind::Gateway, options);
        Ok(serve_http(node, ServiceKind::Gateway, listener, router))
    }
}

async fn load_list(
    client: &reqwest::Client,
    list: &'static str,
    url: Option<&str>,
) -> Result<Option<KeySet>, LaunchError> {
    let Some(url) = url else {
        return Ok(None);
    };
    load_keyset_from_url(client, url)
        .await
        .map(Some)
        .map_err(|source| LaunchError::KeySet { list, source })
}
