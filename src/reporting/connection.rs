//! Reconnect-aware metric transport
//!
//! A [`Connection`] owns at most one live [`Sender`]. Connecting to a new
//! address closes the previous sender before the next one is built;
//! connecting to the current address again does nothing.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::http_sender::HttpSender;
use super::metric::Metric;
use crate::error::Result;

/// A transport that ships metrics to one address
#[async_trait]
pub trait Sender: Send {
    /// Queue or send one metric
    async fn send(&mut self, metric: &Metric) -> Result<()>;

    async fn flush(&mut self) -> Result<()>;

    /// Flush pending metrics and release the transport
    async fn close(&mut self) -> Result<()>;
}

/// Builds a sender for a normalized address
pub type SenderFactory = Arc<dyn Fn(&str) -> Result<Box<dyn Sender>> + Send + Sync>;

/// Prefix `http://` when the address has no scheme
pub fn normalize_address(address: &str) -> String {
    let address = address.trim();
    if address.contains("://") {
        address.to_string()
    } else {
        format!("http://{address}")
    }
}

pub struct Connection {
    factory: SenderFactory,
    address: Option<String>,
    sender: Option<Box<dyn Sender>>,
}

impl Connection {
    pub fn new(factory: SenderFactory) -> Self {
        Self {
            factory,
            address: None,
            sender: None,
        }
    }

    /// Connection whose senders POST to the proxy over HTTP
    pub fn http() -> Self {
        Self::new(Arc::new(|address: &str| -> Result<Box<dyn Sender>> {
            Ok(Box::new(HttpSender::new(address)?))
        }))
    }

    pub fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }

    pub fn is_connected(&self) -> bool {
        self.sender.is_some()
    }

    /// Point the connection at `address`
    ///
    /// If the factory fails the connection is left disconnected.
    pub async fn connect(&mut self, address: &str) -> Result<()> {
        let address = normalize_address(address);
        if self.sender.is_some() && self.address.as_deref() == Some(address.as_str()) {
            return Ok(());
        }

        if let Some(mut old) = self.sender.take() {
            if let Err(e) = old.close().await {
                warn!(
                    "Failed to close sender for {}: {}",
                    self.address.as_deref().unwrap_or_default(),
                    e
                );
            }
        }
        self.address = None;

        let sender = (self.factory)(&address)?;
        debug!("Connected metric transport to {}", address);
        self.sender = Some(sender);
        self.address = Some(address);
        Ok(())
    }

    /// Send a batch and flush; the first failure aborts the batch
    pub async fn send(&mut self, metrics: &[Metric]) -> Result<()> {
        let Some(sender) = self.sender.as_mut() else {
            return Ok(());
        };
        for metric in metrics {
            sender.send(metric).await?;
        }
        sender.flush().await
    }

    pub async fn close(&mut self) -> Result<()> {
        self.address = None;
        match self.sender.take() {
            Some(mut sender) => sender.close().await,
            None => Ok(()),
        }
    }
}
