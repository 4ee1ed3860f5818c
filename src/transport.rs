//! Wire client for the OTLP trace service.
//!
//! [`TraceTransport`] is the seam between the pipeline and the network;
//! [`GrpcTransport`] is the production implementation over tonic.

use crate::core::config::CollectorConfig;
use crate::core::{TraceRecord, TransportError};
use opentelemetry_proto::tonic::collector::trace::v1::{
    trace_service_client::TraceServiceClient, ExportTraceServiceRequest,
};
use prost::Message;
use std::time::Duration;
use tokio::time::Instant;
use tonic::transport::{Channel, Endpoint};

/// Session with a trace collector.
#[async_trait::async_trait]
pub trait TraceTransport: Send {
    /// Establish the session, giving up after `deadline`.
    async fn start(&mut self, deadline: Duration) -> Result<(), TransportError>;

    /// Send one export request carrying `records`.
    async fn upload(&mut self, records: Vec<TraceRecord>) -> Result<(), TransportError>;

    /// Tear the session down.
    async fn stop(&mut self) -> Result<(), TransportError>;
}

/// OTLP/gRPC client over a plaintext HTTP/2 channel.
pub struct GrpcTransport {
    endpoint: String,
    request_timeout: Option<Duration>,
    client: Option<TraceServiceClient<Channel>>,
}

impl GrpcTransport {
    /// Create an unconnected client for `config.endpoint`.
    pub fn new(config: &CollectorConfig) -> Self {
        Self {
            endpoint: normalize_endpoint(&config.endpoint),
            request_timeout: config.request_timeout,
            client: None,
        }
    }

    /// Endpoint URI this client dials.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn build_endpoint(&self, deadline: Duration) -> Result<Endpoint, TransportError> {
        let mut endpoint = Endpoint::from_shared(self.endpoint.clone())
            .map_err(|e| TransportError::InvalidEndpoint {
                endpoint: self.endpoint.clone(),
                message: e.to_string(),
            })?
            .connect_timeout(deadline);
        if let Some(timeout) = self.request_timeout {
            endpoint = endpoint.timeout(timeout);
        }
        Ok(endpoint)
    }
}

/// Bare `host:port` endpoints get the plaintext `http://` scheme.
fn normalize_endpoint(endpoint: &str) -> String {
    let endpoint = endpoint.trim();
    if endpoint.contains("://") {
        endpoint.to_string()
    } else {
        format!("http://{}", endpoint)
    }
}

#[async_trait::async_trait]
impl TraceTransport for GrpcTransport {
    async fn start(&mut self, deadline: Duration) -> Result<(), TransportError> {
        let endpoint = self.build_endpoint(deadline)?;
        let give_up = Instant::now() + deadline;
        let mut backoff = Duration::from_millis(50);

        // Keep dialing until the collector accepts or the deadline passes,
        // so a collector that is still starting up is not a failure.
        let channel = loop {
            match endpoint.connect().await {
                Ok(channel) => break channel,
                Err(e) => {
                    if Instant::now() + backoff >= give_up {
                        return Err(TransportError::Connect(e));
                    }
                    tracing::debug!(endpoint = %self.endpoint, error = %e, "Dial failed, retrying");
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(Duration::from_secs(1));
                },
            }
        };

        tracing::debug!(endpoint = %self.endpoint, "Connected to collector");
        self.client = Some(TraceServiceClient::new(channel));
        Ok(())
    }

    async fn upload(&mut self, records: Vec<TraceRecord>) -> Result<(), TransportError> {
        let client = self.client.as_mut().ok_or(TransportError::NotConnected)?;
        let request = ExportTraceServiceRequest {
            resource_spans: records,
        };
        tracing::trace!(bytes = request.encoded_len(), "Sending export request");

        let response = client.export(request).await?.into_inner();

        if let Some(partial) = response.partial_success {
            if partial.rejected_spans != 0 || !partial.error_message.is_empty() {
                tracing::warn!(
                    rejected_spans = partial.rejected_spans,
                    message = %partial.error_message,
                    "Collector partially rejected export"
                );
            }
        }
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), TransportError> {
        // Dropping the client releases the channel and its connection.
        match self.client.take() {
            Some(_) => Ok(()),
            None => Err(TransportError::NotConnected),
        }
    }
}
