//! `X-PAYMENT` header encoding.
//!
//! The header value is the standard base64 encoding of the JSON-serialized
//! [`PaymentPayload`].

use base64::Engine;
use base64::engine::general_purpose::STANDARD as b64;
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::PaymentPayload;

/// Errors that can occur while encoding or decoding a payment header.
#[derive(Debug, thiserror::Error)]
pub enum HeaderError {
    /// The header value is not valid base64.
    #[error("invalid base64 in payment header: {0}")]
    Base64(#[from] base64::DecodeError),
    /// JSON (de)serialization failed.
    #[error("invalid payment header JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Encodes a signed payload as an `X-PAYMENT` header value.
///
/// # Errors
///
/// Returns [`HeaderError::Json`] if the payload cannot be serialized.
pub fn encode_payment_header<T: Serialize>(
    payload: &PaymentPayload<T>,
) -> Result<String, HeaderError> {
    let json = serde_json::to_vec(payload)?;
    Ok(b64.encode(json))
}

/// Decodes an `X-PAYMENT` header value back into a payload.
///
/// # Errors
///
/// Returns [`HeaderError`] on base64 or JSON decode failure.
pub fn decode_payment_header<T: DeserializeOwned>(
    header_value: &str,
) -> Result<PaymentPayload<T>, HeaderError> {
    let bytes = b64.decode(header_value.trim())?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::{ExactScheme, X402Version1};

    #[test]
    fn test_header_decodes_to_same_payload() {
        let payload = PaymentPayload {
            x402_version: X402Version1,
            scheme: ExactScheme,
            network: "base".to_owned(),
            payload: serde_json::json!({ "signature": "0xabc" }),
        };
        let header = encode_payment_header(&payload).unwrap();
        assert!(!header.contains('{'));

        let decoded: PaymentPayload = decode_payment_header(&header).unwrap();
        assert_eq!(decoded.network, "base");
        assert_eq!(decoded.payload["signature"], "0xabc");
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let result: Result<PaymentPayload, _> = decode_payment_header("not base64!!");
        assert!(matches!(result, Err(HeaderError::Base64(_))));
    }
}
