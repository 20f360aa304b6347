//! Carrier API client.
//!
//! Issues the five carrier calls and applies the retry policy: one retry on a
//! transient network failure, none on any HTTP response. Responses come back
//! raw; classifying them is the job of [`crate::translate`].

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{error, warn, Span};
use uuid::Uuid;

use crate::config::{CarrierConfig, ConfigError, DEFAULT_RETRY_DELAY};
use crate::error::{ShippingError, Violation};
use crate::http::{
    CarrierRequest, CarrierResponse, HttpTransport, Transport, TransportError, TransportErrorKind,
};
use crate::model::{OrderRequest, QuotationRequest};

const MAX_ATTEMPTS: u32 = 2;

/// Carrier call being made, for retry decisions and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    CreateQuotation,
    CreateOrder,
    GetQuotation,
    GetOrder,
    PrintLabels,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::CreateQuotation => "create_quotation",
            Operation::CreateOrder => "create_order",
            Operation::GetQuotation => "get_quotation",
            Operation::GetOrder => "get_order",
            Operation::PrintLabels => "print_labels",
        }
    }

    /// Whether `err` may be retried for this call.
    ///
    /// Creating an order is not idempotent, so it is only retried when the
    /// request never left this process.
    pub fn may_retry(&self, err: &TransportError) -> bool {
        match self {
            Operation::CreateOrder => err.kind == TransportErrorKind::Connect,
            _ => err.is_transient(),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shared, stateless handle on the carrier API.
#[derive(Clone)]
pub struct CarrierClient {
    transport: Arc<dyn Transport>,
    retry_delay: Duration,
}

impl fmt::Debug for CarrierClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CarrierClient")
            .field("retry_delay", &self.retry_delay)
            .finish_non_exhaustive()
    }
}

impl CarrierClient {
    /// HTTP client for the configured carrier endpoint.
    pub fn new(config: &CarrierConfig) -> Result<Self, ConfigError> {
        let transport = Arc::new(HttpTransport::new(config)?);
        Ok(Self::with_transport(transport, config.retry_delay()))
    }

    pub fn with_transport(transport: Arc<dyn Transport>, retry_delay: Duration) -> Self {
        Self {
            transport,
            retry_delay,
        }
    }

    /// Client over `transport` with the default retry delay.
    pub fn from_transport(transport: Arc<dyn Transport>) -> Self {
        Self::with_transport(transport, DEFAULT_RETRY_DELAY)
    }

    /// `POST /quotations`
    pub async fn create_quotation(
        &self,
        request: &QuotationRequest,
    ) -> Result<CarrierResponse, ShippingError> {
        let body = to_body(request)?;
        self.exchange(
            Operation::CreateQuotation,
            CarrierRequest::post(["quotations"], Some(body)),
        )
        .await
    }

    /// `POST /orders`
    pub async fn create_order(
        &self,
        request: &OrderRequest,
    ) -> Result<CarrierResponse, ShippingError> {
        let body = to_body(request)?;
        self.exchange(
            Operation::CreateOrder,
            CarrierRequest::post(["orders"], Some(body)),
        )
        .await
    }

    /// `GET /quotations/{id}`
    pub async fn get_quotation(&self, id: &str) -> Result<CarrierResponse, ShippingError> {
        self.exchange(
            Operation::GetQuotation,
            CarrierRequest::get(["quotations", id]),
        )
        .await
    }

    /// `GET /orders/{id}`
    pub async fn get_order(&self, id: &str) -> Result<CarrierResponse, ShippingError> {
        self.exchange(Operation::GetOrder, CarrierRequest::get(["orders", id]))
            .await
    }

    /// `POST /orders/{id}/labels`
    pub async fn print_labels(&self, order_id: &str) -> Result<CarrierResponse, ShippingError> {
        self.exchange(
            Operation::PrintLabels,
            CarrierRequest::post(["orders", order_id, "labels"], None),
        )
        .await
    }

    async fn exchange(
        &self,
        operation: Operation,
        request: CarrierRequest,
    ) -> Result<CarrierResponse, ShippingError> {
        let request_id = Uuid::new_v4().to_string();
        Span::current().record("request_id", request_id.as_str());
        let request = request.with_request_id(request_id);

        let mut attempts = 0;
        loop {
            attempts += 1;
            let err = match self.transport.send(&request).await {
                Ok(response) => return Ok(response),
                Err(err) => err,
            };

            if attempts < MAX_ATTEMPTS && operation.may_retry(&err) {
                warn!(
                    %operation,
                    path = %request.path(),
                    error = %err,
                    attempt = attempts,
                    delay_ms = self.retry_delay.as_millis() as u64,
                    "Transient carrier failure, will retry"
                );
                tokio::time::sleep(self.retry_delay).await;
                continue;
            }

            error!(
                %operation,
                path = %request.path(),
                error = %err,
                attempts,
                "Carrier request failed"
            );
            return Err(ShippingError::TransportFailure {
                attempts,
                message: err.to_string(),
            });
        }
    }
}

fn to_body<T: Serialize>(request: &T) -> Result<serde_json::Value, ShippingError> {
    serde_json::to_value(request)
        .map_err(|e| ShippingError::validation(vec![Violation::new("request", e.to_string())]))
}
