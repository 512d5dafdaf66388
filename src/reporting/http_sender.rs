//! HTTP metric sender
//!
//! Buffers wire lines and POSTs them to the proxy's report endpoint.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use tracing::debug;

use super::connection::Sender;
use super::metric::{format_line, Metric};
use crate::error::{Error, Result};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub struct HttpSender {
    client: Client,
    url: Url,
    buffer: Vec<String>,
}

impl HttpSender {
    /// Sender for a normalized address such as `http://proxy:2878`
    pub fn new(address: &str) -> Result<Self> {
        let url = Url::parse(&format!(
            "{}/report?f=wavefront",
            address.trim_end_matches('/')
        ))
        .map_err(|e| Error::TransportError(format!("invalid proxy address {address:?}: {e}")))?;

        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Self {
            client,
            url,
            buffer: Vec::new(),
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}

#[async_trait]
impl Sender for HttpSender {
    async fn send(&mut self, metric: &Metric) -> Result<()> {
        self.buffer.push(format_line(metric));
        Ok(())
    }

    async fn flush(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        // Dropped on failure; the next pass reports fresh values
        let lines = std::mem::take(&mut self.buffer);
        let mut body = lines.join("\n");
        body.push('\n');

        let response = self
            .client
            .post(self.url.clone())
            .header(reqwest::header::CONTENT_TYPE, "text/plain")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::TransportError(format!(
                "proxy at {} returned {}",
                self.url, status
            )));
        }
        debug!("Reported {} metrics to {}", lines.len(), self.url);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.flush().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn metric(name: &str, value: f64) -> Metric {
        let mut metric = Metric::new(name, value).with_tag("cluster", "dev");
        metric.source = "dev".to_string();
        metric
    }

    #[tokio::test]
    async fn test_flush_posts_buffered_lines() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/report"))
            .and(query_param("f", "wavefront"))
            .and(body_string(
                "a 1 source=\"dev\" cluster=\"dev\"\nb 0.5 source=\"dev\" cluster=\"dev\"\n",
            ))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&mock_server)
            .await;

        let mut sender = HttpSender::new(&mock_server.uri()).unwrap();
        sender.send(&metric("a", 1.0)).await.unwrap();
        sender.send(&metric("b", 0.5)).await.unwrap();
        assert_eq!(sender.pending(), 2);

        sender.flush().await.unwrap();
        assert_eq!(sender.pending(), 0);
    }

    #[tokio::test]
    async fn test_empty_flush_sends_nothing() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(202))
            .expect(0)
            .mount(&mock_server)
            .await;

        let mut sender = HttpSender::new(&mock_server.uri()).unwrap();
        sender.flush().await.unwrap();
        sender.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_close_flushes_pending_lines() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/report"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&mock_server)
            .await;

        let mut sender = HttpSender::new(&mock_server.uri()).unwrap();
        sender.send(&metric("a", 1.0)).await.unwrap();
        sender.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_server_error_is_transport_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&mock_server)
            .await;

        let mut sender = HttpSender::new(&mock_server.uri()).unwrap();
        sender.send(&metric("a", 1.0)).await.unwrap();
        assert!(matches!(
            sender.flush().await,
            Err(Error::TransportError(_))
        ));
    }

    #[test]
    fn test_report_url() {
        let sender = HttpSender::new("http://metrics-proxy:2878/").unwrap();
        assert_eq!(
            sender.url().as_str(),
            "http://metrics-proxy:2878/report?f=wavefront"
        );
    }
}
