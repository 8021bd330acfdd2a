//! TCP listener bound from a multiaddr.
//!
//! # Responsibilities
//! - Parse the configured multiaddr
//! - Bind to it, surfacing failures before any background work starts
//! - Read back the actually bound address (ephemeral `tcp/0` requests)

use std::net::SocketAddr;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};

use crate::net::multiaddr::{AddrError, Multiaddr};

/// Error type for listener operations.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// The configured address could not be parsed.
    #[error("invalid address {value:?}: {source}")]
    InvalidAddress {
        value: String,
        #[source]
        source: AddrError,
    },

    /// Failed to bind to address.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: Multiaddr,
        #[source]
        source: std::io::Error,
    },

    /// Failed to accept connection.
    #[error("failed to accept: {0}")]
    Accept(#[source] std::io::Error),
}

/// A bound TCP listener that remembers the multiaddr it resolved to.
#[derive(Debug)]
pub struct Listener {
    inner: TcpListener,
    local: Multiaddr,
}

impl Listener {
    /// Parse `value` as a multiaddr and bind to it.
    pub async fn bind_str(value: &str) -> Result<Self, ListenerError> {
        let addr: Multiaddr = value.parse().map_err(|source| ListenerError::InvalidAddress {
            value: value.to_string(),
            source,
        })?;
        Self::bind(&addr).await
    }

    /// Bind to the given multiaddr.
    pub async fn bind(addr: &Multiaddr) -> Result<Self, ListenerError> {
        let bind_err = |source| ListenerError::Bind {
            addr: addr.clone(),
            source,
        };

        let listener = TcpListener::bind(addr.socket_addr())
            .await
            .map_err(bind_err)?;

        // we might have listened on tcp/0, read back what we got
        let local = listener.local_addr().map_err(bind_err)?;

        tracing::debug!(
            requested = %addr,
            address = %local,
            "Listener bound"
        );

        Ok(Self {
            inner: listener,
            local: Multiaddr::from_socket_addr(local),
        })
    }

    /// Accept a new connection.
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr), ListenerError> {
        self.inner.accept().await.map_err(ListenerError::Accept)
    }

    /// The address this listener is bound to.
    pub fn local_multiaddr(&self) -> &Multiaddr {
        &self.local
    }

    /// Hand the underlying listener to a server.
    pub fn into_inner(self) -> TcpListener {
        self.inner
    }
}
