//! # cargoboard - Cargoboard freight tools
//!
//! Quotation, order and label operations for the Cargoboard carrier API,
//! with the field rules checked before anything is sent and every carrier
//! reply mapped onto a closed set of failure kinds.
//!
//! ## Features
//! - Async-first, tokio compatible
//! - Different completeness rules for quotations and orders
//! - One automatic retry on transient network failures
//! - Structured, serializable errors
//! - MCP tool server over stdio (`cargoboard-mcp` binary)
//!
//! ## Architecture
//!
//! Each operation flows through the same stages:
//!
//! 1. **Validation** turns a raw argument map into a typed request, or lists
//!    every violated field.
//! 2. **The client** sends it over a [`Transport`](http::Transport), retrying
//!    once on network failure.
//! 3. **Translation** turns the carrier reply into a domain value or a
//!    [`ShippingError`].
//!
//! [`ShippingService`] composes the three; [`CargoboardServer`] exposes it as
//! MCP tools.
//!
//! ## Example
//! ```no_run
//! use std::sync::Arc;
//!
//! use cargoboard::{CarrierConfig, ShippingService};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Arc::new(CarrierConfig::new("your-api-key"));
//!     let service = ShippingService::new(config)?;
//!
//!     let args = json!({
//!         "product": "STANDARD",
//!         "shipper": {"reference": "S-1", "address": {"postCode": "10115", "countryCode": "DE"}},
//!         "consignee": {"reference": "C-1", "address": {"postCode": "20095", "countryCode": "DE"}},
//!         "lines": [{
//!             "content": "Books", "unitQuantity": 2, "unitPackageType": "EP",
//!             "unitLength": 120, "unitWidth": 80, "unitHeight": 100, "unitWeight": 15.5
//!         }]
//!     });
//!
//!     if let Some(args) = args.as_object() {
//!         let quotation = service.create_quotation(args).await?;
//!         println!("{} costs {:?}", quotation.id, quotation.price());
//!     }
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod model;
pub mod service;
pub mod tools;
pub mod translate;
pub mod validate;

pub use client::CarrierClient;
pub use config::{AuthScheme, CarrierConfig, ConfigError};
pub use error::{ErrorKind, ShippingError, Violation};
pub use model::{
    Incoterm, Label, LabelSet, Order, OrderRequest, Product, Quotation, QuotationRequest,
    RequestKind, ShipmentRequest,
};
pub use service::ShippingService;
pub use tools::CargoboardServer;

// Re-export rmcp for convenience
pub use rmcp;
