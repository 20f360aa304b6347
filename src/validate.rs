//! Request validation.
//!
//! Turns the loosely-typed argument mapping a tool receives into a
//! [`ShipmentRequest`], or reports every violated field at once. Quotations and
//! orders share one walk over the input; the [`RequestKind`] decides which
//! address and party fields are mandatory.
//!
//! Keys are read in camelCase, with a snake_case fallback (`postCode` or
//! `post_code`). Violation paths always use the camelCase form. Keys the
//! request kind does not know are ignored.

use itertools::Itertools;
use nonempty::NonEmpty;
use serde_json::{Map, Value};

use crate::error::Violation;
use crate::model::{
    Address, ContactPerson, Incoterm, OrderRequest, Party, Product, QuotationRequest,
    RequestKind, ShipmentLine, ShipmentOptions, ShipmentRequest,
};

/// Validate `raw` against the rules of `kind`.
pub fn validate(
    raw: &Map<String, Value>,
    kind: RequestKind,
) -> Result<ShipmentRequest, Vec<Violation>> {
    match kind {
        RequestKind::Quotation => validate_quotation(raw).map(ShipmentRequest::Quotation),
        RequestKind::Order => validate_order(raw).map(ShipmentRequest::Order),
    }
}

pub fn validate_quotation(raw: &Map<String, Value>) -> Result<QuotationRequest, Vec<Violation>> {
    let mut checker = Checker::default();
    let core = checker.core(raw, RequestKind::Quotation);
    let options = checker.options(raw);

    let request = core.map(|core| QuotationRequest {
        product: core.product,
        shipper: core.shipper,
        consignee: core.consignee,
        lines: core.lines,
        options,
    });
    checker.finish(request)
}

pub fn validate_order(raw: &Map<String, Value>) -> Result<OrderRequest, Vec<Violation>> {
    let mut checker = Checker::default();
    let core = checker.core(raw, RequestKind::Order);
    let options = checker.options(raw);
    let wants_climate_neutral_shipment = checker
        .optional_bool(raw, "", "wantsClimateNeutralShipment")
        .unwrap_or(true);
    let wants_insurance = checker
        .optional_bool(raw, "", "wantsInsurance")
        .unwrap_or(false);
    let customer_order_code = checker.optional_str(raw, "", "customerOrderCode");
    let tax_declaration = checker.optional_str(raw, "", "taxDeclaration");

    let request = core.map(|core| OrderRequest {
        product: core.product,
        shipper: core.shipper,
        consignee: core.consignee,
        lines: core.lines,
        options,
        wants_climate_neutral_shipment,
        wants_insurance,
        customer_order_code,
        tax_declaration,
    });
    checker.finish(request)
}

/// Check a carrier identifier argument. Only non-emptiness is enforced.
pub fn validate_id(field: &str, id: &str) -> Result<String, Vec<Violation>> {
    let id = id.trim();
    if id.is_empty() {
        return Err(vec![Violation::new(field, "must not be empty")]);
    }
    Ok(id.to_string())
}

/// Fields common to both request kinds.
struct Core {
    product: Product,
    shipper: Party,
    consignee: Party,
    lines: NonEmpty<ShipmentLine>,
}

#[derive(Default)]
struct Checker {
    violations: Vec<Violation>,
}

impl Checker {
    fn finish<T>(self, value: Option<T>) -> Result<T, Vec<Violation>> {
        match value {
            Some(value) if self.violations.is_empty() => Ok(value),
            _ => Err(self.violations),
        }
    }

    fn violation(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.violations.push(Violation::new(field, message));
    }

    fn core(&mut self, raw: &Map<String, Value>, kind: RequestKind) -> Option<Core> {
        let product = self.product(raw);
        let shipper = self.party(raw, "shipper", kind);
        let consignee = self.party(raw, "consignee", kind);
        let lines = self.lines(raw);

        Some(Core {
            product: product?,
            shipper: shipper?,
            consignee: consignee?,
            lines: lines?,
        })
    }

    fn product(&mut self, raw: &Map<String, Value>) -> Option<Product> {
        let code = self.required_str(raw, "", "product")?;
        match code.parse::<Product>() {
            Ok(product) => Some(product),
            Err(_) => {
                self.violation(
                    "product",
                    format!(
                        "unknown product code `{code}` (expected one of {})",
                        Product::ALL.iter().join(", ")
                    ),
                );
                None
            }
        }
    }

    fn party(&mut self, raw: &Map<String, Value>, key: &str, kind: RequestKind) -> Option<Party> {
        let obj = self.required_object(raw, "", key)?;
        let reference = self.required_str(obj, key, "reference");
        // Orders need the company name the label is addressed to.
        let name = match kind {
            RequestKind::Order => self.required_str(obj, key, "name").map(Some),
            RequestKind::Quotation => Some(self.optional_str(obj, key, "name")),
        };
        let address = self.address(obj, key, kind);
        let contact_person = self.contact_person(obj, key);

        Some(Party {
            reference: reference?,
            name: name?,
            address: address?,
            contact_person,
        })
    }

    fn address(
        &mut self,
        party: &Map<String, Value>,
        party_at: &str,
        kind: RequestKind,
    ) -> Option<Address> {
        let obj = self.required_object(party, party_at, "address")?;
        let at = &path(party_at, "address");

        let post_code = self.required_str(obj, at, "postCode");
        let country_code = self.country_code(obj, at);
        let (street, city) = match kind {
            RequestKind::Order => (
                self.required_str(obj, at, "street").map(Some),
                self.required_str(obj, at, "city").map(Some),
            ),
            RequestKind::Quotation => (
                Some(self.optional_str(obj, at, "street")),
                Some(self.optional_str(obj, at, "city")),
            ),
        };
        let name = self.optional_str(obj, at, "name");

        Some(Address {
            post_code: post_code?,
            country_code: country_code?,
            street: street?,
            city: city?,
            name,
        })
    }

    fn country_code(&mut self, obj: &Map<String, Value>, at: &str) -> Option<String> {
        let code = self.required_str(obj, at, "countryCode")?;
        if code.len() != 2 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
            self.violation(
                path(at, "countryCode"),
                format!("`{code}` is not a two-letter country code"),
            );
            return None;
        }
        Some(code.to_ascii_uppercase())
    }

    fn contact_person(&mut self, party: &Map<String, Value>, at: &str) -> Option<ContactPerson> {
        let obj = self.optional_object(party, at, "contactPerson")?;
        let at = path(at, "contactPerson");

        Some(ContactPerson {
            name: self.optional_str(obj, &at, "name"),
            phone: self.optional_str(obj, &at, "phone"),
            email: self.optional_str(obj, &at, "email"),
        })
    }

    fn lines(&mut self, raw: &Map<String, Value>) -> Option<NonEmpty<ShipmentLine>> {
        let Some(value) = lookup(raw, "lines") else {
            self.violation("lines", "is required");
            return None;
        };
        let Some(items) = value.as_array() else {
            self.violation("lines", "must be a list of shipment lines");
            return None;
        };
        if items.is_empty() {
            self.violation("lines", "must contain at least one shipment line");
            return None;
        }

        // Every line is checked even after an earlier one failed.
        let lines: Vec<Option<ShipmentLine>> = items
            .iter()
            .enumerate()
            .map(|(index, item)| self.line(index, item))
            .collect();

        let lines: Option<Vec<ShipmentLine>> = lines.into_iter().collect();
        NonEmpty::from_vec(lines?)
    }

    fn line(&mut self, index: usize, item: &Value) -> Option<ShipmentLine> {
        let at = format!("lines[{index}]");
        let Some(obj) = item.as_object() else {
            self.violation(at, "must be an object");
            return None;
        };

        let content = self.required_str(obj, &at, "content");
        let unit_quantity = self.quantity(obj, &at);
        let unit_package_type = self.required_str(obj, &at, "unitPackageType");
        let unit_length = self.positive_number(obj, &at, "unitLength");
        let unit_width = self.positive_number(obj, &at, "unitWidth");
        let unit_height = self.positive_number(obj, &at, "unitHeight");
        let unit_weight = self.positive_number(obj, &at, "unitWeight");

        Some(ShipmentLine {
            content: content?,
            unit_quantity: unit_quantity?,
            unit_package_type: unit_package_type?,
            unit_length: unit_length?,
            unit_width: unit_width?,
            unit_height: unit_height?,
            unit_weight: unit_weight?,
        })
    }

    fn quantity(&mut self, obj: &Map<String, Value>, at: &str) -> Option<u32> {
        let field = path(at, "unitQuantity");
        let Some(value) = lookup(obj, "unitQuantity") else {
            self.violation(field, "is required");
            return None;
        };
        let Some(number) = as_number(value) else {
            self.violation(field, "must be a whole number");
            return None;
        };
        if number.fract() != 0.0 {
            self.violation(field, "must be a whole number");
            return None;
        }
        if number < 1.0 {
            self.violation(field, "must be at least 1");
            return None;
        }
        if number > f64::from(u32::MAX) {
            self.violation(field, "is too large");
            return None;
        }
        Some(number as u32)
    }

    fn options(&mut self, raw: &Map<String, Value>) -> ShipmentOptions {
        ShipmentOptions {
            coupon_code: self.optional_str(raw, "", "couponCode"),
            uit_code: self.optional_str(raw, "", "uitCode"),
            wants_export_declaration: self
                .optional_bool(raw, "", "wantsExportDeclaration")
                .unwrap_or(false),
            customs_tariff_quantity: self.non_negative_number(raw, "customsTariffQuantity"),
            incoterm: self.incoterm(raw),
            is_supplying_company_or_receiving_customer: self.optional_bool(
                raw,
                "",
                "isSupplyingCompanyOrReceivingCustomer",
            ),
            value_of_goods_amount: self.non_negative_number(raw, "valueOfGoodsAmount"),
            value_of_goods_currency: self.currency(raw),
            lines_pallet_bays: self.optional_positive_number(raw, "linesPalletBays"),
        }
    }

    fn incoterm(&mut self, raw: &Map<String, Value>) -> Option<Incoterm> {
        let code = self.optional_str(raw, "", "incoterm")?;
        match code.parse::<Incoterm>() {
            Ok(incoterm) => Some(incoterm),
            Err(_) => {
                self.violation(
                    "incoterm",
                    format!(
                        "unknown incoterm `{code}` (expected one of {})",
                        Incoterm::ALL.iter().join(", ")
                    ),
                );
                None
            }
        }
    }

    fn currency(&mut self, raw: &Map<String, Value>) -> Option<String> {
        let code = self.optional_str(raw, "", "valueOfGoodsCurrency")?;
        if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
            self.violation(
                "valueOfGoodsCurrency",
                format!("`{code}` is not a three-letter currency code"),
            );
            return None;
        }
        Some(code.to_ascii_uppercase())
    }

    // --- Primitive checks ---

    fn required_object<'a>(
        &mut self,
        obj: &'a Map<String, Value>,
        at: &str,
        key: &str,
    ) -> Option<&'a Map<String, Value>> {
        match lookup(obj, key) {
            None => {
                self.violation(path(at, key), "is required");
                None
            }
            Some(Value::Object(inner)) => Some(inner),
            Some(_) => {
                self.violation(path(at, key), "must be an object");
                None
            }
        }
    }

    fn optional_object<'a>(
        &mut self,
        obj: &'a Map<String, Value>,
        at: &str,
        key: &str,
    ) -> Option<&'a Map<String, Value>> {
        match lookup(obj, key)? {
            Value::Object(inner) => Some(inner),
            _ => {
                self.violation(path(at, key), "must be an object");
                None
            }
        }
    }

    fn required_str(&mut self, obj: &Map<String, Value>, at: &str, key: &str) -> Option<String> {
        if lookup(obj, key).is_none() {
            self.violation(path(at, key), "is required");
            return None;
        }
        self.optional_str(obj, at, key)
    }

    fn optional_str(&mut self, obj: &Map<String, Value>, at: &str, key: &str) -> Option<String> {
        match lookup(obj, key)? {
            Value::String(s) if s.trim().is_empty() => {
                self.violation(path(at, key), "must not be empty");
                None
            }
            Value::String(s) => Some(s.trim().to_string()),
            _ => {
                self.violation(path(at, key), "must be a string");
                None
            }
        }
    }

    fn optional_bool(&mut self, obj: &Map<String, Value>, at: &str, key: &str) -> Option<bool> {
        match lookup(obj, key)? {
            Value::Bool(b) => Some(*b),
            _ => {
                self.violation(path(at, key), "must be true or false");
                None
            }
        }
    }

    fn positive_number(&mut self, obj: &Map<String, Value>, at: &str, key: &str) -> Option<f64> {
        if lookup(obj, key).is_none() {
            self.violation(path(at, key), "is required");
            return None;
        }
        self.bounded_number(obj, at, key, |n| n > 0.0, "must be greater than 0")
    }

    fn optional_positive_number(&mut self, obj: &Map<String, Value>, key: &str) -> Option<f64> {
        self.bounded_number(obj, "", key, |n| n > 0.0, "must be greater than 0")
    }

    fn non_negative_number(&mut self, obj: &Map<String, Value>, key: &str) -> Option<f64> {
        self.bounded_number(obj, "", key, |n| n >= 0.0, "must not be negative")
    }

    fn bounded_number(
        &mut self,
        obj: &Map<String, Value>,
        at: &str,
        key: &str,
        accept: impl Fn(f64) -> bool,
        message: &str,
    ) -> Option<f64> {
        let value = lookup(obj, key)?;
        match as_number(value) {
            None => {
                self.violation(path(at, key), "must be a number");
                None
            }
            Some(n) if !accept(n) => {
                self.violation(path(at, key), message);
                None
            }
            Some(n) => Some(n),
        }
    }
}

fn path(at: &str, key: &str) -> String {
    if at.is_empty() {
        key.to_string()
    } else {
        format!("{at}.{key}")
    }
}

/// Find `key`, falling back to its snake_case spelling. `null` counts as absent.
fn lookup<'a>(obj: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    obj.get(key)
        .or_else(|| obj.get(&snake_case(key)))
        .filter(|value| !value.is_null())
}

fn snake_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    for c in key.chars() {
        if c.is_ascii_uppercase() {
            out.push('_');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Finite numbers, and strings that parse as one.
fn as_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    n.is_finite().then_some(n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    fn quotation_args() -> Map<String, Value> {
        object(json!({
            "product": "STANDARD",
            "shipper": {
                "reference": "S-1",
                "address": {"postCode": "10115", "countryCode": "DE"}
            },
            "consignee": {
                "reference": "C-1",
                "address": {"postCode": "20095", "countryCode": "DE"}
            },
            "lines": [{
                "content": "Machine parts",
                "unitQuantity": 2,
                "unitPackageType": "PA",
                "unitLength": 120,
                "unitWidth": 80,
                "unitHeight": 100,
                "unitWeight": 15.5
            }]
        }))
    }

    fn order_args() -> Map<String, Value> {
        object(json!({
            "product": "EXPRESS_12",
            "shipper": {
                "reference": "S-1",
                "name": "Acme GmbH",
                "address": {
                    "postCode": "10115",
                    "countryCode": "DE",
                    "street": "Invalidenstr. 1",
                    "city": "Berlin"
                },
                "contactPerson": {"name": "Jane Roe", "phone": "+4930123456"}
            },
            "consignee": {
                "reference": "C-1",
                "name": "Hafen AG",
                "address": {
                    "postCode": "20095",
                    "countryCode": "DE",
                    "street": "Kai 2",
                    "city": "Hamburg"
                }
            },
            "lines": [{
                "content": "Machine parts",
                "unitQuantity": 1,
                "unitPackageType": "EP",
                "unitLength": 120,
                "unitWidth": 80,
                "unitHeight": 100,
                "unitWeight": 250
            }],
            "customerOrderCode": "PO-77"
        }))
    }

    fn fields(violations: &[Violation]) -> Vec<&str> {
        violations.iter().map(|v| v.field.as_str()).collect()
    }

    #[test]
    fn quotation_without_street_or_city_passes() {
        let request = validate_quotation(&quotation_args()).unwrap();

        assert_eq!(request.product, Product::Standard);
        assert_eq!(request.shipper.address.street, None);
        assert_eq!(request.lines.len(), 1);
        assert_eq!(request.lines.head.unit_quantity, 2);
        assert_eq!(request.lines.head.unit_weight, 15.5);
    }

    #[test]
    fn order_without_street_and_city_lists_exactly_those_fields() {
        let mut args = order_args();
        for party in ["shipper", "consignee"] {
            let address = args[party]["address"].as_object_mut().unwrap();
            address.remove("street");
            address.remove("city");
        }

        let violations = validate_order(&args).unwrap_err();

        assert_eq!(
            fields(&violations),
            vec![
                "shipper.address.street",
                "shipper.address.city",
                "consignee.address.street",
                "consignee.address.city",
            ]
        );
    }

    #[test]
    fn order_requires_party_name() {
        let mut args = order_args();
        args["consignee"].as_object_mut().unwrap().remove("name");

        let violations = validate_order(&args).unwrap_err();
        assert_eq!(fields(&violations), vec!["consignee.name"]);
    }

    #[test]
    fn unknown_product_is_rejected_on_product_field() {
        for code in ["OVERNIGHT", "express", "EXPRESS10", ""] {
            let mut args = quotation_args();
            args.insert("product".to_string(), json!(code));

            let violations = validate_quotation(&args).unwrap_err();
            assert_eq!(fields(&violations), vec!["product"], "code {code:?}");
        }
    }

    #[test]
    fn non_positive_line_values_name_the_line_index() {
        let mut args = quotation_args();
        let good = args["lines"][0].clone();
        let mut zero_quantity = good.clone();
        zero_quantity["unitQuantity"] = json!(0);
        let mut negative_height = good.clone();
        negative_height["unitHeight"] = json!(-10);
        let mut zero_width_and_weight = good.clone();
        zero_width_and_weight["unitWidth"] = json!(0.0);
        zero_width_and_weight["unitWeight"] = json!(0);
        args.insert(
            "lines".to_string(),
            json!([good, zero_quantity, negative_height, zero_width_and_weight]),
        );

        let violations = validate_quotation(&args).unwrap_err();
        assert_eq!(
            fields(&violations),
            vec![
                "lines[1].unitQuantity",
                "lines[2].unitHeight",
                "lines[3].unitWidth",
                "lines[3].unitWeight",
            ]
        );
        assert_eq!(violations[3].message, "must be greater than 0");
    }

    #[test]
    fn smallest_positive_dimensions_are_accepted() {
        let mut args = quotation_args();
        args["lines"][0]["unitLength"] = json!(0.1);
        args["lines"][0]["unitWeight"] = json!(0.001);

        let request = validate_quotation(&args).unwrap();
        assert_eq!(request.lines.head.unit_weight, 0.001);
    }

    #[test]
    fn fractional_quantity_is_rejected() {
        let mut args = quotation_args();
        args["lines"][0]["unitQuantity"] = json!(1.5);

        let violations = validate_quotation(&args).unwrap_err();
        assert_eq!(violations[0].message, "must be a whole number");
    }

    #[test]
    fn missing_consignee_country_code_is_reported() {
        let mut args = quotation_args();
        args["consignee"]["address"]
            .as_object_mut()
            .unwrap()
            .remove("countryCode");

        let violations = validate_quotation(&args).unwrap_err();
        assert_eq!(
            violations,
            vec![Violation::new(
                "consignee.address.countryCode",
                "is required"
            )]
        );
    }

    #[test]
    fn all_violations_are_collected() {
        let args = object(json!({
            "product": "TELEPORT",
            "shipper": {"address": {"postCode": "10115", "countryCode": "Germany"}},
            "lines": []
        }));

        let violations = validate_quotation(&args).unwrap_err();
        assert_eq!(
            fields(&violations),
            vec![
                "product",
                "shipper.reference",
                "shipper.address.countryCode",
                "consignee",
                "lines",
            ]
        );
    }

    #[test]
    fn snake_case_keys_and_lowercase_country_are_accepted() {
        let args = object(json!({
            "product": "FIX_8",
            "shipper": {
                "reference": "S-1",
                "address": {"post_code": "10115", "country_code": "de"}
            },
            "consignee": {
                "reference": "C-1",
                "address": {"post_code": "1010", "country_code": "at"}
            },
            "lines": [{
                "content": "Books",
                "unit_quantity": "3",
                "unit_package_type": "PA",
                "unit_length": "40",
                "unit_width": 30,
                "unit_height": 20,
                "unit_weight": 12
            }]
        }));

        let request = validate_quotation(&args).unwrap();
        assert_eq!(request.shipper.address.country_code, "DE");
        assert_eq!(request.consignee.address.country_code, "AT");
        assert_eq!(request.lines.head.unit_quantity, 3);
        assert_eq!(request.lines.head.unit_length, 40.0);
    }

    #[test]
    fn order_flags_default_and_quotation_ignores_them() {
        let order = validate_order(&order_args()).unwrap();
        assert!(order.wants_climate_neutral_shipment);
        assert!(!order.wants_insurance);
        assert_eq!(order.customer_order_code.as_deref(), Some("PO-77"));

        let mut args = quotation_args();
        args.insert("wantsInsurance".to_string(), json!("yes please"));
        assert!(validate_quotation(&args).is_ok());
    }

    #[test]
    fn optional_values_are_type_checked() {
        let mut args = order_args();
        args.insert("wantsInsurance".to_string(), json!("yes"));
        args.insert("incoterm".to_string(), json!("CIF"));
        args.insert("valueOfGoodsAmount".to_string(), json!(-1));
        args.insert("valueOfGoodsCurrency".to_string(), json!("euro"));
        args["shipper"]["contactPerson"]["email"] = json!("");

        let violations = validate_order(&args).unwrap_err();
        assert_eq!(
            fields(&violations),
            vec![
                "shipper.contactPerson.email",
                "incoterm",
                "valueOfGoodsAmount",
                "valueOfGoodsCurrency",
                "wantsInsurance",
            ]
        );
    }

    #[test]
    fn validate_dispatches_on_kind() {
        let request = validate(&order_args(), RequestKind::Order).unwrap();
        assert_eq!(request.kind(), RequestKind::Order);

        let violations = validate(&quotation_args(), RequestKind::Order).unwrap_err();
        assert!(fields(&violations).contains(&"shipper.name"));
    }

    #[test]
    fn blank_ids_are_rejected() {
        assert_eq!(validate_id("order_id", "  A-1 ").unwrap(), "A-1");
        assert_eq!(
            validate_id("order_id", "   ").unwrap_err(),
            vec![Violation::new("order_id", "must not be empty")]
        );
    }
}
