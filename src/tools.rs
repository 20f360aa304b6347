//! MCP tool server exposing the shipping operations.
//!
//! Tool arguments are handed to [`ShippingService`] untouched; its results and
//! errors come back as structured content.

use std::borrow::Cow;
use std::sync::Arc;

use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{CallToolResult, Implementation, JsonObject, ServerCapabilities, ServerInfo};
use rmcp::{tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler};
use schemars::{JsonSchema, Schema, SchemaGenerator};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ShippingError;
use crate::model::{Address, OrderRequest, Party, QuotationRequest};
use crate::service::ShippingService;

/// Raw quotation arguments, advertised with the [`QuotationRequest`] schema.
#[derive(Debug, Clone, Deserialize)]
#[serde(transparent)]
pub struct QuotationArgs(pub JsonObject);

impl JsonSchema for QuotationArgs {
    fn schema_name() -> Cow<'static, str> {
        QuotationRequest::schema_name()
    }

    fn json_schema(generator: &mut SchemaGenerator) -> Schema {
        QuotationRequest::json_schema(generator)
    }
}

/// Raw order arguments, advertised with the [`OrderRequest`] schema.
///
/// Parties are inlined with the fields only orders require: `name`,
/// `address.street` and `address.city`.
#[derive(Debug, Clone, Deserialize)]
#[serde(transparent)]
pub struct OrderArgs(pub JsonObject);

impl JsonSchema for OrderArgs {
    fn schema_name() -> Cow<'static, str> {
        OrderRequest::schema_name()
    }

    fn json_schema(generator: &mut SchemaGenerator) -> Schema {
        let mut schema = OrderRequest::json_schema(generator);
        let party = order_party_schema(generator);
        if let Some(properties) = schema
            .as_object_mut()
            .and_then(|obj| obj.get_mut("properties"))
            .and_then(Value::as_object_mut)
        {
            properties.insert("shipper".to_string(), party.clone());
            properties.insert("consignee".to_string(), party);
        }
        schema
    }
}

fn order_party_schema(generator: &mut SchemaGenerator) -> Value {
    let mut address = Address::json_schema(generator);
    require(&mut address, &["street", "city"]);

    let mut party = Party::json_schema(generator);
    require(&mut party, &["name"]);
    if let Some(properties) = party
        .as_object_mut()
        .and_then(|obj| obj.get_mut("properties"))
        .and_then(Value::as_object_mut)
    {
        properties.insert("address".to_string(), address.to_value());
    }
    party.to_value()
}

fn require(schema: &mut Schema, fields: &[&str]) {
    let Some(obj) = schema.as_object_mut() else {
        return;
    };
    let required = obj
        .entry("required")
        .or_insert_with(|| Value::Array(Vec::new()));
    if let Value::Array(list) = required {
        for field in fields {
            if !list.iter().any(|v| v.as_str() == Some(*field)) {
                list.push(Value::from(*field));
            }
        }
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct QuotationIdArgs {
    #[schemars(description = "Identifier returned by create_quotation")]
    pub quotation_id: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct OrderIdArgs {
    #[schemars(description = "Identifier returned by create_order")]
    pub order_id: String,
}

/// The `cargoboard` MCP server.
#[derive(Debug, Clone)]
pub struct CargoboardServer {
    service: Arc<ShippingService>,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl CargoboardServer {
    pub fn new(service: Arc<ShippingService>) -> Self {
        Self {
            service,
            tool_router: Self::tool_router(),
        }
    }

    #[tool(
        description = "Request a non-binding price quotation. Needs product, shipper and consignee \
                       (reference, address.postCode, address.countryCode) and at least one line \
                       (content, unitQuantity, unitPackageType, unitLength/Width/Height in cm, \
                       unitWeight in kg)."
    )]
    async fn create_quotation(
        &self,
        Parameters(QuotationArgs(args)): Parameters<QuotationArgs>,
    ) -> Result<CallToolResult, McpError> {
        respond(self.service.create_quotation(&args).await)
    }

    #[tool(
        description = "Create a binding shipment order. Needs everything a quotation needs plus \
                       party name and address street and city. wantsClimateNeutralShipment \
                       defaults to true, wantsInsurance to false."
    )]
    async fn create_order(
        &self,
        Parameters(OrderArgs(args)): Parameters<OrderArgs>,
    ) -> Result<CallToolResult, McpError> {
        respond(self.service.create_order(&args).await)
    }

    #[tool(description = "Fetch a quotation by its identifier.")]
    async fn get_quotation(
        &self,
        Parameters(QuotationIdArgs { quotation_id }): Parameters<QuotationIdArgs>,
    ) -> Result<CallToolResult, McpError> {
        respond(self.service.get_quotation(&quotation_id).await)
    }

    #[tool(description = "Fetch an order, including its current status, by its identifier.")]
    async fn get_order(
        &self,
        Parameters(OrderIdArgs { order_id }): Parameters<OrderIdArgs>,
    ) -> Result<CallToolResult, McpError> {
        respond(self.service.get_order(&order_id).await)
    }

    #[tool(description = "Generate the printable shipping labels (base64 documents) for an order.")]
    async fn print_shipment_labels(
        &self,
        Parameters(OrderIdArgs { order_id }): Parameters<OrderIdArgs>,
    ) -> Result<CallToolResult, McpError> {
        respond(self.service.print_shipment_labels(&order_id).await)
    }
}

#[tool_handler]
impl ServerHandler for CargoboardServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "cargoboard".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            instructions: Some(
                "Quote, book and label freight shipments with Cargoboard. \
                 Quotations need post code and country only; orders need full addresses."
                    .into(),
            ),
            ..Default::default()
        }
    }
}

/// Carrier errors are tool results, not protocol errors.
fn respond<T: Serialize>(result: Result<T, ShippingError>) -> Result<CallToolResult, McpError> {
    match result {
        Ok(value) => {
            let value = serde_json::to_value(value)
                .map_err(|e| McpError::internal_error(e.to_string(), None))?;
            Ok(CallToolResult::structured(value))
        }
        Err(err) => Ok(CallToolResult::structured_error(err.to_value())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn required(schema: &Value) -> Vec<&str> {
        let mut fields: Vec<&str> = schema["required"]
            .as_array()
            .map(|list| list.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();
        fields.sort();
        fields
    }

    #[test]
    fn order_schema_requires_full_parties() {
        let schema = schemars::schema_for!(OrderArgs).to_value();

        assert_eq!(required(&schema), vec!["consignee", "lines", "product", "shipper"]);
        assert_eq!(
            schema["properties"]["wantsClimateNeutralShipment"]["default"],
            Value::Bool(true)
        );
        for party in ["shipper", "consignee"] {
            let party = &schema["properties"][party];
            assert_eq!(required(party), vec!["address", "name", "reference"]);
            assert_eq!(
                required(&party["properties"]["address"]),
                vec!["city", "countryCode", "postCode", "street"]
            );
        }
    }

    #[test]
    fn quotation_schema_keeps_short_addresses() {
        let schema = schemars::schema_for!(QuotationArgs).to_value();

        assert_eq!(required(&schema["$defs"]["Address"]), vec!["countryCode", "postCode"]);
        assert_eq!(required(&schema["$defs"]["Party"]), vec!["address", "reference"]);
    }
}
