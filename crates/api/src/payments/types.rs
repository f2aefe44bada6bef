//! Processor wire types.

use serde::{Deserialize, Serialize};

/// Free-form notes attached to a processor order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderNotes {
    pub user_id: String,
    pub name: String,
    pub number: String,
    pub address: String,
}

/// Body of `POST /v1/orders`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateOrderRequest {
    /// Amount in minor units (paise for INR).
    pub amount: i64,
    pub currency: String,
    pub receipt: String,
    pub notes: OrderNotes,
}

/// A processor order as returned by `POST /v1/orders`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessorOrder {
    pub id: String,
    /// Amount in minor units.
    pub amount: i64,
    pub currency: String,
    #[serde(default)]
    pub receipt: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Error envelope returned on non-2xx responses.
#[derive(Debug, Deserialize)]
pub(super) struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Debug, Deserialize)]
pub(super) struct ErrorBody {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn processor_order_parses_minimal_response() {
        let json = r#"{"id":"order_Kq81","amount":29500,"currency":"INR","entity":"order"}"#;
        let order: ProcessorOrder = serde_json::from_str(json).expect("parse");
        assert_eq!(order.id, "order_Kq81");
        assert_eq!(order.amount, 29_500);
        assert_eq!(order.receipt, None);
    }

    #[test]
    fn notes_serialize_camel_case() {
        let notes = OrderNotes {
            user_id: "u1".to_owned(),
            name: "Asha".to_owned(),
            number: "98".to_owned(),
            address: "4 Park Street".to_owned(),
        };
        let json = serde_json::to_value(&notes).expect("serialize");
        assert_eq!(json["userId"], "u1");
    }
}
