//! Wire and typed-data definitions for the EVM "exact" scheme.

use alloy_primitives::{Address, B256, Bytes, U256};
use alloy_sol_types::sol;
use mcpay::proto::UnixTimestamp;
use serde::{Deserialize, Serialize};

/// EIP-3009 payment payload carried inside the x402 v1 envelope.
///
/// Holds the EIP-712 signature and the authorization it covers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExactEvmPayload {
    /// 65-byte `r || s || v` signature.
    pub signature: Bytes,
    /// The authorization that was signed.
    pub authorization: ExactEvmAuthorization,
}

/// The `transferWithAuthorization` parameters as they travel on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExactEvmAuthorization {
    /// Token owner authorizing the transfer.
    pub from: Address,
    /// Recipient.
    pub to: Address,
    /// Amount in base units, as a decimal string.
    pub value: String,
    /// Not valid before this time (inclusive).
    pub valid_after: UnixTimestamp,
    /// Not valid at or after this time.
    pub valid_before: UnixTimestamp,
    /// Unique 32-byte nonce.
    pub nonce: B256,
}

impl ExactEvmAuthorization {
    /// Rebuilds the EIP-712 struct that was signed.
    ///
    /// Returns `None` if `value` is not a decimal `uint256`.
    #[must_use]
    pub fn to_typed(&self) -> Option<TransferWithAuthorization> {
        let value = U256::from_str_radix(&self.value, 10).ok()?;
        Some(TransferWithAuthorization {
            from: self.from,
            to: self.to,
            value,
            validAfter: U256::from(self.valid_after.as_secs()),
            validBefore: U256::from(self.valid_before.as_secs()),
            nonce: self.nonce,
        })
    }
}

sol!(
    /// ERC-3009 `TransferWithAuthorization` typed-data struct.
    ///
    /// Field order and types must match the token contract's type hash.
    struct TransferWithAuthorization {
        address from;
        address to;
        uint256 value;
        uint256 validAfter;
        uint256 validBefore;
        bytes32 nonce;
    }
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authorization_wire_shape() {
        let authorization = ExactEvmAuthorization {
            from: Address::repeat_byte(0x11),
            to: Address::repeat_byte(0x22),
            value: "100000".into(),
            valid_after: UnixTimestamp::from_secs(1_700_000_000),
            valid_before: UnixTimestamp::from_secs(1_700_000_900),
            nonce: B256::repeat_byte(0x33),
        };
        let json = serde_json::to_value(&authorization).unwrap();
        assert_eq!(json["value"], "100000");
        assert_eq!(json["validAfter"], "1700000000");
        assert_eq!(json["validBefore"], "1700000900");

        let typed = authorization.to_typed().unwrap();
        assert_eq!(typed.value, U256::from(100_000u64));
        assert_eq!(typed.validBefore, U256::from(1_700_000_900u64));
    }

    #[test]
    fn test_non_decimal_value_is_rejected() {
        let authorization = ExactEvmAuthorization {
            from: Address::ZERO,
            to: Address::ZERO,
            value: "0x10".into(),
            valid_after: UnixTimestamp::from_secs(0),
            valid_before: UnixTimestamp::from_secs(1),
            nonce: B256::ZERO,
        };
        assert!(authorization.to_typed().is_none());
    }
}
