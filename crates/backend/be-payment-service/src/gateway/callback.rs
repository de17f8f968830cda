//! Typed decoding of STK push result webhooks.
//!
//! Decoding happens in two steps. [`decode_envelope`] fails closed on
//! anything that is not the provider envelope. [`parse_callback`] then turns
//! a well-formed envelope into a [`CallbackOutcome`]; a success result whose
//! metadata cannot be decoded is reported as a failed payment.

use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// `TransactionDate` values are East Africa Time.
const PROVIDER_UTC_OFFSET_SECS: i32 = 3 * 3600;
const TRANSACTION_DATE_FORMAT: &str = "%Y%m%d%H%M%S";

#[derive(Debug, Error)]
#[error("malformed callback: {0}")]
pub struct CallbackError(#[from] serde_json::Error);

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CallbackEnvelope {
    pub body: CallbackBody,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackBody {
    #[serde(rename = "stkCallback")]
    pub stk_callback: StkCallback,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StkCallback {
    #[serde(rename = "MerchantRequestID", default)]
    pub merchant_request_id: String,
    #[serde(rename = "CheckoutRequestID")]
    pub checkout_request_id: String,
    pub result_code: i64,
    #[serde(default)]
    pub result_desc: String,
    pub callback_metadata: Option<CallbackMetadata>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackMetadata {
    #[serde(rename = "Item", default)]
    pub items: Vec<MetadataItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetadataItem {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Value", default)]
    pub value: Option<Value>,
}

impl CallbackMetadata {
    fn get(&self, name: &str) -> Option<&Value> {
        self.items
            .iter()
            .find(|item| item.name == name)
            .and_then(|item| item.value.as_ref())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PaymentReceipt {
    pub receipt_number: String,
    pub amount: Option<Decimal>,
    pub transaction_date: Option<DateTime<Utc>>,
    pub phone_number: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CallbackOutcome {
    Paid(PaymentReceipt),
    Failed { result_code: i64, reason: String },
}

pub fn decode_envelope(payload: &Value) -> Result<CallbackEnvelope, CallbackError> {
    Ok(CallbackEnvelope::deserialize(payload)?)
}

pub fn parse_callback(callback: &StkCallback) -> CallbackOutcome {
    if callback.result_code != 0 {
        return CallbackOutcome::Failed {
            result_code: callback.result_code,
            reason: callback.result_desc.clone(),
        };
    }

    let Some(metadata) = &callback.callback_metadata else {
        return CallbackOutcome::Failed {
            result_code: callback.result_code,
            reason: "No callback metadata received".to_string(),
        };
    };

    match decode_receipt(metadata) {
        Ok(receipt) => CallbackOutcome::Paid(receipt),
        Err(reason) => CallbackOutcome::Failed {
            result_code: callback.result_code,
            reason,
        },
    }
}

fn decode_receipt(metadata: &CallbackMetadata) -> Result<PaymentReceipt, String> {
    let receipt_number = metadata
        .get("MpesaReceiptNumber")
        .and_then(scalar_to_string)
        .filter(|receipt| !receipt.is_empty())
        .ok_or_else(|| "Callback metadata is missing MpesaReceiptNumber".to_string())?;

    let amount = metadata
        .get("Amount")
        .map(|value| {
            scalar_to_string(value)
                .and_then(|raw| raw.parse::<Decimal>().ok())
                .ok_or_else(|| format!("Invalid Amount in callback metadata: {value}"))
        })
        .transpose()?;

    let transaction_date = metadata
        .get("TransactionDate")
        .map(|value| {
            scalar_to_string(value)
                .and_then(|raw| parse_transaction_date(&raw))
                .ok_or_else(|| format!("Invalid TransactionDate in callback metadata: {value}"))
        })
        .transpose()?;

    let phone_number = metadata.get("PhoneNumber").and_then(scalar_to_string);

    Ok(PaymentReceipt {
        receipt_number,
        amount,
        transaction_date,
        phone_number,
    })
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Parses a `YYYYMMDDHHmmss` provider timestamp into UTC.
pub fn parse_transaction_date(raw: &str) -> Option<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(raw, TRANSACTION_DATE_FORMAT).ok()?;
    let offset = FixedOffset::east_opt(PROVIDER_UTC_OFFSET_SECS)?;
    naive
        .and_local_timezone(offset)
        .single()
        .map(|local| local.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn envelope(stk_callback: Value) -> Value {
        json!({ "Body": { "stkCallback": stk_callback } })
    }

    fn decode(stk_callback: Value) -> StkCallback {
        decode_envelope(&envelope(stk_callback))
            .unwrap()
            .body
            .stk_callback
    }

    #[test]
    fn successful_payment_yields_receipt() {
        let callback = decode(json!({
            "MerchantRequestID": "29115-34620561-1",
            "CheckoutRequestID": "ws_CO_191220191020363925",
            "ResultCode": 0,
            "ResultDesc": "The service request is processed successfully.",
            "CallbackMetadata": {
                "Item": [
                    {"Name": "Amount", "Value": 100},
                    {"Name": "MpesaReceiptNumber", "Value": "ABC123"},
                    {"Name": "Balance"},
                    {"Name": "TransactionDate", "Value": 20240101120000u64},
                    {"Name": "PhoneNumber", "Value": 254712345678u64}
                ]
            }
        }));

        let CallbackOutcome::Paid(receipt) = parse_callback(&callback) else {
            panic!("expected a paid outcome");
        };
        assert_eq!(receipt.receipt_number, "ABC123");
        assert_eq!(receipt.amount, Some(Decimal::new(100, 0)));
        assert_eq!(receipt.phone_number.as_deref(), Some("254712345678"));
        assert_eq!(
            receipt.transaction_date,
            Some(Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap())
        );
    }

    #[test]
    fn nonzero_result_code_is_failure() {
        let callback = decode(json!({
            "CheckoutRequestID": "ws_CO_1",
            "ResultCode": 1032,
            "ResultDesc": "Request cancelled by user"
        }));

        assert_eq!(
            parse_callback(&callback),
            CallbackOutcome::Failed {
                result_code: 1032,
                reason: "Request cancelled by user".into(),
            }
        );
    }

    #[test]
    fn success_without_metadata_is_failure() {
        let callback = decode(json!({
            "CheckoutRequestID": "ws_CO_1",
            "ResultCode": 0,
            "ResultDesc": "ok"
        }));

        assert_eq!(
            parse_callback(&callback),
            CallbackOutcome::Failed {
                result_code: 0,
                reason: "No callback metadata received".into(),
            }
        );
    }

    #[test]
    fn success_without_receipt_is_failure() {
        let callback = decode(json!({
            "CheckoutRequestID": "ws_CO_1",
            "ResultCode": 0,
            "CallbackMetadata": {"Item": [{"Name": "Amount", "Value": 100}]}
        }));

        let CallbackOutcome::Failed { reason, .. } = parse_callback(&callback) else {
            panic!("expected a failed outcome");
        };
        assert!(reason.contains("MpesaReceiptNumber"));
    }

    #[test]
    fn invalid_transaction_date_is_failure() {
        let callback = decode(json!({
            "CheckoutRequestID": "ws_CO_1",
            "ResultCode": 0,
            "CallbackMetadata": {"Item": [
                {"Name": "MpesaReceiptNumber", "Value": "ABC123"},
                {"Name": "TransactionDate", "Value": "yesterday"}
            ]}
        }));

        assert!(matches!(
            parse_callback(&callback),
            CallbackOutcome::Failed { .. }
        ));
    }

    #[test]
    fn non_envelope_payload_is_rejected() {
        assert!(decode_envelope(&json!({})).is_err());
        assert!(decode_envelope(&json!({"Body": {}})).is_err());
        assert!(decode_envelope(&envelope(json!({"ResultCode": 0}))).is_err());
        assert!(decode_envelope(&json!([1, 2, 3])).is_err());
    }
}
