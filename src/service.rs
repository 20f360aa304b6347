//! The five shipping operations.
//!
//! Each one validates its input, makes at most one carrier call (plus the
//! client's single retry) and translates the result. Validation failures
//! return before anything is sent.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{info, instrument, warn};

use crate::client::CarrierClient;
use crate::config::{CarrierConfig, ConfigError};
use crate::error::{ShippingError, Violation};
use crate::model::{LabelSet, Order, Quotation};
use crate::translate;
use crate::validate::{validate_id, validate_order, validate_quotation};

/// Tool dispatcher over a shared [`CarrierClient`].
#[derive(Debug, Clone)]
pub struct ShippingService {
    client: CarrierClient,
}

impl ShippingService {
    pub fn new(config: Arc<CarrierConfig>) -> Result<Self, ConfigError> {
        Ok(Self::with_client(CarrierClient::new(&config)?))
    }

    pub fn with_client(client: CarrierClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &CarrierClient {
        &self.client
    }

    /// Request a non-binding price estimate.
    #[instrument(
        skip_all,
        fields(operation = "create_quotation", request_id = tracing::field::Empty)
    )]
    pub async fn create_quotation(
        &self,
        raw: &Map<String, Value>,
    ) -> Result<Quotation, ShippingError> {
        let request = validate_quotation(raw).map_err(rejected)?;
        let response = self.client.create_quotation(&request).await?;
        let quotation = translate::quotation(&response).inspect_err(carrier_failed)?;

        info!(
            quotation_id = %quotation.id,
            product = %request.product,
            price = ?quotation.price(),
            "Quotation created"
        );
        Ok(quotation)
    }

    /// Book a binding shipment.
    #[instrument(skip_all, fields(operation = "create_order", request_id = tracing::field::Empty))]
    pub async fn create_order(&self, raw: &Map<String, Value>) -> Result<Order, ShippingError> {
        let request = validate_order(raw).map_err(rejected)?;
        let response = self.client.create_order(&request).await?;
        let order = translate::order(&response).inspect_err(carrier_failed)?;

        info!(
            order_id = %order.id,
            product = %request.product,
            status = ?order.status(),
            "Order created"
        );
        Ok(order)
    }

    #[instrument(skip_all, fields(operation = "get_quotation", request_id = tracing::field::Empty))]
    pub async fn get_quotation(&self, quotation_id: &str) -> Result<Quotation, ShippingError> {
        let id = validate_id("quotationId", quotation_id).map_err(rejected)?;
        let response = self.client.get_quotation(&id).await?;
        let quotation = translate::quotation(&response).inspect_err(carrier_failed)?;

        info!(quotation_id = %quotation.id, "Quotation retrieved");
        Ok(quotation)
    }

    #[instrument(skip_all, fields(operation = "get_order", request_id = tracing::field::Empty))]
    pub async fn get_order(&self, order_id: &str) -> Result<Order, ShippingError> {
        let id = validate_id("orderId", order_id).map_err(rejected)?;
        let response = self.client.get_order(&id).await?;
        let order = translate::order(&response).inspect_err(carrier_failed)?;

        info!(order_id = %order.id, status = ?order.status(), "Order retrieved");
        Ok(order)
    }

    /// Generate the printable labels of a confirmed order.
    #[instrument(
        skip_all,
        fields(operation = "print_shipment_labels", request_id = tracing::field::Empty)
    )]
    pub async fn print_shipment_labels(&self, order_id: &str) -> Result<LabelSet, ShippingError> {
        let id = validate_id("orderId", order_id).map_err(rejected)?;
        let response = self.client.print_labels(&id).await?;
        let labels = translate::labels(&id, &response).inspect_err(carrier_failed)?;

        info!(order_id = %id, labels = labels.labels.len(), "Labels printed");
        Ok(labels)
    }
}

fn rejected(violations: Vec<Violation>) -> ShippingError {
    warn!(violations = violations.len(), "Request failed validation");
    ShippingError::validation(violations)
}

fn carrier_failed(err: &ShippingError) {
    warn!(kind = %err.kind(), status = ?err.status(), error = %err, "Carrier call failed");
}
