//! Carrier response classification.
//!
//! Every [`CarrierResponse`] becomes either a domain value or exactly one
//! [`ShippingError`] kind. Error bodies are read only in the shapes the carrier
//! is known to produce; anything else falls back to the raw text.

use base64::Engine;
use nonempty::NonEmpty;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::{ShippingError, Violation};
use crate::http::CarrierResponse;
use crate::model::{Label, LabelSet, Order, Quotation};

const MESSAGE_KEYS: [&str; 4] = ["message", "detail", "title", "error"];
const FIELD_ERROR_KEYS: [&str; 2] = ["violations", "errors"];
const FIELD_KEYS: [&str; 3] = ["propertyPath", "field", "path"];
const FIELD_MESSAGE_KEYS: [&str; 3] = ["message", "title", "detail"];
const MAX_FALLBACK_MESSAGE: usize = 500;

/// Successful quotation response.
pub fn quotation(response: &CarrierResponse) -> Result<Quotation, ShippingError> {
    let quotation: Quotation = success_body(response)?;
    require_id(response, &quotation.id)?;
    Ok(quotation)
}

/// Successful order response.
pub fn order(response: &CarrierResponse) -> Result<Order, ShippingError> {
    let order: Order = success_body(response)?;
    require_id(response, &order.id)?;
    Ok(order)
}

/// Successful label response.
///
/// A non-JSON body is the label document itself. A JSON body is either
/// `{"labels": [..]}` or a single label object.
pub fn labels(order_id: &str, response: &CarrierResponse) -> Result<LabelSet, ShippingError> {
    check_status(response)?;
    let status = response.status.as_u16();

    if !response.is_json() {
        if response.body.is_empty() {
            return Err(ShippingError::malformed(status, "empty label document"));
        }
        let label = Label {
            name: None,
            mime_type: response
                .media_type()
                .unwrap_or_else(|| "application/octet-stream".to_string()),
            content: base64::engine::general_purpose::STANDARD.encode(&response.body),
        };
        return Ok(LabelSet {
            order_id: order_id.to_string(),
            labels: NonEmpty::new(label),
        });
    }

    let value: Value = parse_json(response)?;
    let labels: Vec<Label> = match value {
        Value::Object(mut obj) if obj.contains_key("labels") => {
            let raw = obj.remove("labels").unwrap_or(Value::Null);
            serde_json::from_value(raw)
                .map_err(|e| ShippingError::malformed(status, format!("unexpected labels: {e}")))?
        }
        Value::Object(obj) if obj.contains_key("content") => {
            let label = serde_json::from_value(Value::Object(obj))
                .map_err(|e| ShippingError::malformed(status, format!("unexpected label: {e}")))?;
            vec![label]
        }
        _ => {
            return Err(ShippingError::malformed(
                status,
                "expected a `labels` list or a label object",
            ))
        }
    };

    for (index, label) in labels.iter().enumerate() {
        if label.decode().is_err() {
            return Err(ShippingError::malformed(
                status,
                format!("label {index} is not valid base64"),
            ));
        }
    }

    let labels = NonEmpty::from_vec(labels)
        .ok_or_else(|| ShippingError::malformed(status, "carrier returned no labels"))?;
    Ok(LabelSet {
        order_id: order_id.to_string(),
        labels,
    })
}

/// Map a non-2xx response to its failure kind.
pub fn check_status(response: &CarrierResponse) -> Result<(), ShippingError> {
    if response.status.is_success() {
        return Ok(());
    }

    let status = response.status.as_u16();
    let body = ErrorBody::parse(response);
    let message = body.message.unwrap_or_else(|| fallback_message(response));

    Err(match status {
        401 | 403 => ShippingError::AuthenticationFailure { status, message },
        404 => ShippingError::NotFound { status, message },
        400 | 422 => ShippingError::RemoteValidationFailure {
            status,
            message,
            violations: body.violations,
        },
        429 => ShippingError::RateLimited {
            status,
            message,
            retry_after: response.retry_after,
        },
        500..=599 => ShippingError::CarrierUnavailable { status, message },
        _ => ShippingError::malformed(status, format!("unexpected status: {message}")),
    })
}

fn success_body<T: DeserializeOwned>(response: &CarrierResponse) -> Result<T, ShippingError> {
    check_status(response)?;
    parse_json(response)
}

fn parse_json<T: DeserializeOwned>(response: &CarrierResponse) -> Result<T, ShippingError> {
    serde_json::from_slice(&response.body).map_err(|e| {
        ShippingError::malformed(
            response.status.as_u16(),
            format!("unexpected response body: {e}"),
        )
    })
}

fn require_id(response: &CarrierResponse, id: &str) -> Result<(), ShippingError> {
    if id.trim().is_empty() {
        return Err(ShippingError::malformed(
            response.status.as_u16(),
            "response has an empty id",
        ));
    }
    Ok(())
}

/// Raw body text when it says anything, else the reason phrase.
fn fallback_message(response: &CarrierResponse) -> String {
    let text = response.text();
    let text = text.trim();
    if !text.is_empty() && !is_empty_json(text) {
        return text.chars().take(MAX_FALLBACK_MESSAGE).collect();
    }
    response
        .status
        .canonical_reason()
        .map(str::to_string)
        .unwrap_or_else(|| format!("HTTP {}", response.status.as_u16()))
}

fn is_empty_json(text: &str) -> bool {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Null) => true,
        Ok(Value::Object(obj)) => obj.is_empty(),
        Ok(Value::Array(items)) => items.is_empty(),
        _ => false,
    }
}

/// The parts of a carrier error body that are understood.
#[derive(Debug, Default)]
struct ErrorBody {
    message: Option<String>,
    violations: Vec<Violation>,
}

impl ErrorBody {
    fn parse(response: &CarrierResponse) -> Self {
        let Ok(Value::Object(obj)) = serde_json::from_slice::<Value>(&response.body) else {
            return Self::default();
        };

        Self {
            message: message(&obj),
            violations: FIELD_ERROR_KEYS
                .iter()
                .filter_map(|key| obj.get(*key))
                .flat_map(field_errors)
                .collect(),
        }
    }
}

fn message(obj: &Map<String, Value>) -> Option<String> {
    MESSAGE_KEYS.iter().find_map(|key| match obj.get(*key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        // {"error": {"message": ".."}}
        Value::Object(inner) => message(inner),
        _ => None,
    })
}

fn first_str<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|key| obj.get(*key).and_then(Value::as_str))
}

fn field_errors(value: &Value) -> Vec<Violation> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_object)
            .filter_map(|item| {
                let message = first_str(item, &FIELD_MESSAGE_KEYS)?;
                let field = first_str(item, &FIELD_KEYS).unwrap_or_default();
                Some(Violation::new(field, message))
            })
            .collect(),
        Value::Object(fields) => fields
            .iter()
            .flat_map(|(field, messages)| match messages {
                Value::String(message) => vec![Violation::new(field, message)],
                Value::Array(list) => list
                    .iter()
                    .filter_map(Value::as_str)
                    .map(|message| Violation::new(field, message))
                    .collect(),
                _ => Vec::new(),
            })
            .collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use reqwest::StatusCode;
    use serde_json::json;

    fn reply(status: u16, body: Value) -> CarrierResponse {
        CarrierResponse::json(StatusCode::from_u16(status).unwrap(), &body)
    }

    #[test]
    fn quotation_keeps_carrier_fields() {
        let quotation = quotation(&reply(200, json!({"id": "Q123", "price": 42.5}))).unwrap();

        assert_eq!(quotation.id, "Q123");
        assert_eq!(quotation.price(), Some(42.5));
    }

    #[test]
    fn numeric_order_ids_become_strings() {
        let order = order(&reply(201, json!({"id": 9001, "status": "CREATED"}))).unwrap();

        assert_eq!(order.id, "9001");
        assert_eq!(order.status(), Some("CREATED"));
    }

    #[test]
    fn success_without_id_is_malformed() {
        for body in [json!({"price": 1}), json!({"id": ""}), json!([1, 2])] {
            let err = quotation(&reply(200, body)).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::MalformedResponse);
            assert_eq!(err.status(), Some(200));
        }

        let err = order(&CarrierResponse::new(StatusCode::OK, "<html>")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedResponse);
    }

    #[test]
    fn statuses_map_to_kinds() {
        let cases = [
            (401, ErrorKind::AuthenticationFailure),
            (403, ErrorKind::AuthenticationFailure),
            (404, ErrorKind::NotFound),
            (400, ErrorKind::RemoteValidationFailure),
            (422, ErrorKind::RemoteValidationFailure),
            (429, ErrorKind::RateLimited),
            (500, ErrorKind::CarrierUnavailable),
            (503, ErrorKind::CarrierUnavailable),
            (302, ErrorKind::MalformedResponse),
            (409, ErrorKind::MalformedResponse),
        ];

        for (status, kind) in cases {
            let err = check_status(&reply(status, json!({"message": "nope"}))).unwrap_err();
            assert_eq!(err.kind(), kind, "status {status}");
            assert_eq!(err.status(), Some(status));
        }
    }

    #[test]
    fn violation_list_is_extracted() {
        let body = json!({
            "title": "Validation Failed",
            "detail": "2 errors",
            "violations": [
                {"propertyPath": "consignee.address.postCode", "message": "invalid post code"},
                {"field": "lines[0].unitWeight", "title": "too heavy"},
                {"propertyPath": "ignored"}
            ]
        });

        let err = check_status(&reply(422, body)).unwrap_err();

        assert_eq!(
            err,
            ShippingError::RemoteValidationFailure {
                status: 422,
                message: "2 errors".to_string(),
                violations: vec![
                    Violation::new("consignee.address.postCode", "invalid post code"),
                    Violation::new("lines[0].unitWeight", "too heavy"),
                ],
            }
        );
    }

    #[test]
    fn error_map_is_extracted() {
        let body = json!({
            "error": {"message": "bad request"},
            "errors": {"product": "unknown", "shipper.reference": ["required", "too long"]}
        });

        let err = check_status(&reply(400, body)).unwrap_err();

        assert_eq!(err.to_string(), "Carrier rejected the request (HTTP 400): bad request");
        assert_eq!(err.violations().len(), 3);
        assert!(err.violations().contains(&Violation::new("shipper.reference", "too long")));
    }

    #[test]
    fn unknown_error_bodies_fall_back_to_text() {
        let plain = CarrierResponse::new(StatusCode::BAD_GATEWAY, "upstream down");
        let err = check_status(&plain).unwrap_err();
        assert_eq!(
            err,
            ShippingError::CarrierUnavailable {
                status: 502,
                message: "upstream down".to_string()
            }
        );

        let body = json!({"code": "E42", "reason": "postCode 99999 does not exist in DE"});
        let err = check_status(&reply(400, body.clone())).unwrap_err();
        assert_eq!(
            err,
            ShippingError::RemoteValidationFailure {
                status: 400,
                message: body.to_string(),
                violations: vec![],
            }
        );

        let long = CarrierResponse::new(StatusCode::SERVICE_UNAVAILABLE, "x".repeat(2000));
        let err = check_status(&long).unwrap_err();
        assert_eq!(err.to_value()["error"]["message"].as_str().map(str::len), Some(500));
    }

    #[test]
    fn empty_error_bodies_use_the_reason_phrase() {
        for body in [json!({}), json!([]), Value::Null] {
            let err = check_status(&reply(404, body)).unwrap_err();
            assert_eq!(
                err,
                ShippingError::NotFound {
                    status: 404,
                    message: "Not Found".to_string()
                }
            );
        }

        let err = check_status(&CarrierResponse::new(StatusCode::UNAUTHORIZED, "")).unwrap_err();
        assert_eq!(err.to_string(), "Authentication failed (HTTP 401): Unauthorized");
    }

    #[test]
    fn rate_limit_keeps_retry_after() {
        let response = reply(429, json!({})).with_retry_after(30);

        match check_status(&response).unwrap_err() {
            ShippingError::RateLimited { retry_after, .. } => assert_eq!(retry_after, Some(30)),
            other => panic!("expected RateLimited, got {other:?}"),
        }
    }

    #[test]
    fn binary_label_body_is_one_label() {
        let response = CarrierResponse::new(StatusCode::OK, &b"%PDF-1.7 ..."[..])
            .with_content_type("application/pdf");

        let set = labels("O1", &response).unwrap();

        assert_eq!(set.order_id, "O1");
        assert_eq!(set.labels.len(), 1);
        assert_eq!(set.labels.head.mime_type, "application/pdf");
        assert_eq!(set.labels.head.decode().unwrap(), b"%PDF-1.7 ...");
    }

    #[test]
    fn json_label_shapes() {
        let list = reply(
            200,
            json!({"labels": [
                {"name": "pallet-1", "content": "SGVsbG8="},
                {"content": "V29ybGQ=", "mimeType": "application/zpl"}
            ]}),
        );
        let set = labels("O1", &list).unwrap();
        assert_eq!(set.labels.len(), 2);
        assert_eq!(set.labels.head.name.as_deref(), Some("pallet-1"));
        assert_eq!(set.labels.tail[0].mime_type, "application/zpl");

        let single = reply(200, json!({"content": "SGVsbG8="}));
        assert_eq!(labels("O1", &single).unwrap().labels.head.mime_type, "application/pdf");
    }

    #[test]
    fn unusable_label_bodies_are_malformed() {
        for body in [
            json!({"labels": []}),
            json!({"labels": [{"content": "not base64!"}]}),
            json!({"url": "https://example.com/label.pdf"}),
        ] {
            let err = labels("O1", &reply(200, body)).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::MalformedResponse);
        }

        let empty = CarrierResponse::new(StatusCode::OK, "").with_content_type("application/pdf");
        assert_eq!(labels("O1", &empty).unwrap_err().kind(), ErrorKind::MalformedResponse);
    }

    #[test]
    fn rejected_label_request_is_remote_validation() {
        let body = json!({"message": "order not yet confirmed"});
        let err = labels("O1", &reply(422, body)).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::RemoteValidationFailure);
        assert_eq!(
            err.to_string(),
            "Carrier rejected the request (HTTP 422): order not yet confirmed"
        );
    }
}
