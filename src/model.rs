//! Domain values exchanged with the carrier.
//!
//! Request types are only ever built by [`crate::validate`] from a raw argument
//! mapping, so every instance in this module already satisfies the completeness
//! rules of its kind. Response types keep whatever the carrier returned beyond
//! the identifier, untouched.

use std::fmt;
use std::str::FromStr;

use base64::Engine;
use nonempty::NonEmpty;
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use serde_with::skip_serializing_none;

/// Delivery-speed product offered by the carrier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum Product {
    #[serde(rename = "STANDARD")]
    Standard,
    #[serde(rename = "EXPRESS")]
    Express,
    #[serde(rename = "EXPRESS_8")]
    Express8,
    #[serde(rename = "EXPRESS_10")]
    Express10,
    #[serde(rename = "EXPRESS_12")]
    Express12,
    #[serde(rename = "EXPRESS_16")]
    Express16,
    #[serde(rename = "FIX")]
    Fix,
    #[serde(rename = "FIX_8")]
    Fix8,
    #[serde(rename = "FIX_10")]
    Fix10,
    #[serde(rename = "FIX_12")]
    Fix12,
    #[serde(rename = "FIX_16")]
    Fix16,
    #[serde(rename = "DIRECT")]
    Direct,
}

impl Product {
    pub const ALL: [Product; 12] = [
        Product::Standard,
        Product::Express,
        Product::Express8,
        Product::Express10,
        Product::Express12,
        Product::Express16,
        Product::Fix,
        Product::Fix8,
        Product::Fix10,
        Product::Fix12,
        Product::Fix16,
        Product::Direct,
    ];

    /// Wire code of the product, e.g. `EXPRESS_10`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Product::Standard => "STANDARD",
            Product::Express => "EXPRESS",
            Product::Express8 => "EXPRESS_8",
            Product::Express10 => "EXPRESS_10",
            Product::Express12 => "EXPRESS_12",
            Product::Express16 => "EXPRESS_16",
            Product::Fix => "FIX",
            Product::Fix8 => "FIX_8",
            Product::Fix10 => "FIX_10",
            Product::Fix12 => "FIX_12",
            Product::Fix16 => "FIX_16",
            Product::Direct => "DIRECT",
        }
    }
}

impl fmt::Display for Product {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Product {
    type Err = UnknownCode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Product::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| UnknownCode(s.to_string()))
    }
}

/// Incoterm agreed for the shipment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Incoterm {
    Exw,
    Standard,
    Ddp,
    InvoiceToRecipient,
    DapCleared,
    DapUncleared,
    Fob,
}

impl Incoterm {
    pub const ALL: [Incoterm; 7] = [
        Incoterm::Exw,
        Incoterm::Standard,
        Incoterm::Ddp,
        Incoterm::InvoiceToRecipient,
        Incoterm::DapCleared,
        Incoterm::DapUncleared,
        Incoterm::Fob,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Incoterm::Exw => "EXW",
            Incoterm::Standard => "STANDARD",
            Incoterm::Ddp => "DDP",
            Incoterm::InvoiceToRecipient => "INVOICE_TO_RECIPIENT",
            Incoterm::DapCleared => "DAP_CLEARED",
            Incoterm::DapUncleared => "DAP_UNCLEARED",
            Incoterm::Fob => "FOB",
        }
    }
}

impl fmt::Display for Incoterm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Incoterm {
    type Err = UnknownCode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Incoterm::ALL
            .into_iter()
            .find(|i| i.as_str() == s)
            .ok_or_else(|| UnknownCode(s.to_string()))
    }
}

/// A code outside one of the closed enumerations above.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown code `{0}`")]
pub struct UnknownCode(pub String);

/// Which completeness rules a request is held to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    Quotation,
    Order,
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestKind::Quotation => f.write_str("quotation"),
            RequestKind::Order => f.write_str("order"),
        }
    }
}

/// Postal address of a party.
///
/// Quotations only need `postCode` and `countryCode`; orders additionally need
/// `street` and `city`.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    /// Postal code, e.g. "10115".
    pub post_code: String,
    /// ISO 3166-1 alpha-2 country code, e.g. "DE".
    pub country_code: String,
    /// Street and house number (required for orders).
    pub street: Option<String>,
    /// City (required for orders).
    pub city: Option<String>,
    /// Additional address line.
    pub name: Option<String>,
}

#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ContactPerson {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

/// Shipper or consignee.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Party {
    /// Caller-assigned reference, echoed back by the carrier.
    pub reference: String,
    /// Company name (required for orders).
    pub name: Option<String>,
    pub address: Address,
    pub contact_person: Option<ContactPerson>,
}

/// One line of identical handling units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ShipmentLine {
    /// Description of the goods.
    pub content: String,
    /// Number of units, at least 1.
    pub unit_quantity: u32,
    /// Package type code (PA = package, FP = flat pallet, EP = euro pallet, ...).
    pub unit_package_type: String,
    /// Unit length in centimeters.
    pub unit_length: f64,
    /// Unit width in centimeters.
    pub unit_width: f64,
    /// Unit height in centimeters.
    pub unit_height: f64,
    /// Unit weight in kilograms.
    pub unit_weight: f64,
}

/// Optional settings shared by quotations and orders.
#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ShipmentOptions {
    /// Coupon code for special actions or discounts.
    pub coupon_code: Option<String>,
    pub uit_code: Option<String>,
    /// Declare the shipment for customs.
    #[serde(default)]
    pub wants_export_declaration: bool,
    pub customs_tariff_quantity: Option<f64>,
    pub incoterm: Option<Incoterm>,
    pub is_supplying_company_or_receiving_customer: Option<bool>,
    /// Value of goods for insurance and customs.
    pub value_of_goods_amount: Option<f64>,
    /// ISO 4217 currency of `valueOfGoodsAmount`, e.g. "EUR".
    pub value_of_goods_currency: Option<String>,
    pub lines_pallet_bays: Option<f64>,
}

/// Request for a non-binding price estimate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuotationRequest {
    pub product: Product,
    pub shipper: Party,
    pub consignee: Party,
    #[schemars(with = "Vec<ShipmentLine>")]
    pub lines: NonEmpty<ShipmentLine>,
    #[serde(flatten)]
    pub options: ShipmentOptions,
}

/// Request for a binding shipment.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    pub product: Product,
    pub shipper: Party,
    pub consignee: Party,
    #[schemars(with = "Vec<ShipmentLine>")]
    pub lines: NonEmpty<ShipmentLine>,
    #[serde(flatten)]
    pub options: ShipmentOptions,
    /// Offset the shipment's emissions. Defaults to true.
    #[serde(default = "default_true")]
    pub wants_climate_neutral_shipment: bool,
    /// Insure the shipment. Defaults to false.
    #[serde(default)]
    pub wants_insurance: bool,
    /// Customer order code printed on the shipping documents.
    pub customer_order_code: Option<String>,
    /// Tax declaration, needed for shipments to Hungary and Romania.
    pub tax_declaration: Option<String>,
}

/// A validated request, tagged by the rules it passed.
#[derive(Debug, Clone, PartialEq)]
pub enum ShipmentRequest {
    Quotation(QuotationRequest),
    Order(OrderRequest),
}

impl ShipmentRequest {
    pub fn kind(&self) -> RequestKind {
        match self {
            ShipmentRequest::Quotation(_) => RequestKind::Quotation,
            ShipmentRequest::Order(_) => RequestKind::Order,
        }
    }
}

/// Carrier-side quotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quotation {
    #[serde(deserialize_with = "identifier")]
    pub id: String,
    /// Everything else the carrier returned (echoed request, prices, ...).
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

impl Quotation {
    /// Price, when the carrier reports it as a plain number.
    pub fn price(&self) -> Option<f64> {
        self.details.get("price").and_then(Value::as_f64)
    }
}

/// Carrier-side order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    #[serde(deserialize_with = "identifier")]
    pub id: String,
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

impl Order {
    pub fn status(&self) -> Option<&str> {
        self.details.get("status").and_then(Value::as_str)
    }
}

/// Printable labels generated for an order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelSet {
    pub order_id: String,
    pub labels: NonEmpty<Label>,
}

#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Label {
    pub name: Option<String>,
    #[serde(default = "default_label_mime_type")]
    pub mime_type: String,
    /// Base64-encoded document.
    pub content: String,
}

impl Label {
    /// Decode the label document.
    pub fn decode(&self) -> Result<Vec<u8>, base64::DecodeError> {
        base64::engine::general_purpose::STANDARD.decode(&self.content)
    }
}

fn default_true() -> bool {
    true
}

fn default_label_mime_type() -> String {
    "application/pdf".to_string()
}

/// Carrier ids arrive as strings or as integers; both are kept as strings.
fn identifier<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(serde_json::Number),
    }

    match RawId::deserialize(deserializer)? {
        RawId::Text(s) => Ok(s),
        RawId::Number(n) => Ok(n.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn product_codes_parse_and_print() {
        for product in Product::ALL {
            assert_eq!(product.as_str().parse::<Product>(), Ok(product));
        }
        assert_eq!(
            serde_json::to_value(Product::Express10).unwrap(),
            json!("EXPRESS_10")
        );
        assert!("EXPRESS10".parse::<Product>().is_err());
        assert!("standard".parse::<Product>().is_err());
    }

    #[test]
    fn incoterm_serializes_as_wire_code() {
        assert_eq!(
            serde_json::to_value(Incoterm::InvoiceToRecipient).unwrap(),
            json!("INVOICE_TO_RECIPIENT")
        );
        assert_eq!("DAP_CLEARED".parse::<Incoterm>(), Ok(Incoterm::DapCleared));
    }

    #[test]
    fn quotation_keeps_unknown_fields_and_numeric_id() {
        let quotation: Quotation =
            serde_json::from_value(json!({"id": 981, "price": 42.5, "currency": "EUR"})).unwrap();

        assert_eq!(quotation.id, "981");
        assert_eq!(quotation.price(), Some(42.5));
        assert_eq!(quotation.details.get("currency"), Some(&json!("EUR")));
    }

    #[test]
    fn address_omits_absent_fields() {
        let address = Address {
            post_code: "10115".to_string(),
            country_code: "DE".to_string(),
            street: None,
            city: None,
            name: None,
        };

        assert_eq!(
            serde_json::to_value(&address).unwrap(),
            json!({"postCode": "10115", "countryCode": "DE"})
        );
    }

    #[test]
    fn order_flags_default_when_absent() {
        let order: OrderRequest = serde_json::from_value(json!({
            "product": "FIX_12",
            "shipper": {"reference": "S", "address": {"postCode": "10115", "countryCode": "DE"}},
            "consignee": {"reference": "C", "address": {"postCode": "20095", "countryCode": "DE"}},
            "lines": [{
                "content": "Tiles",
                "unitQuantity": 1,
                "unitPackageType": "EP",
                "unitLength": 120,
                "unitWidth": 80,
                "unitHeight": 90,
                "unitWeight": 300
            }]
        }))
        .unwrap();

        assert!(order.wants_climate_neutral_shipment);
        assert!(!order.wants_insurance);
    }

    #[test]
    fn label_decodes_base64_content() {
        let label = Label {
            name: None,
            mime_type: default_label_mime_type(),
            content: "JVBERi0=".to_string(),
        };

        assert_eq!(label.decode().unwrap(), b"%PDF-".to_vec());
    }
}
