//! Minimal ABI encoding for constructor arguments and method calls.
//!
//! Covers the value shapes deployment parameters can take (address, uint,
//! bool, string, bytes). Dynamic values are encoded with the standard
//! head/tail offset layout.

use alloy_core::primitives::{keccak256, Address, Bytes, U256};

/// A concrete value ready for ABI encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbiValue {
    Address(Address),
    Uint(U256),
    Bool(bool),
    Str(String),
    Bytes(Bytes),
}

impl AbiValue {
    fn is_dynamic(&self) -> bool {
        matches!(self, AbiValue::Str(_) | AbiValue::Bytes(_))
    }

    /// The single 32-byte head word for a static value.
    fn static_word(&self) -> [u8; 32] {
        let mut word = [0u8; 32];
        match self {
            AbiValue::Address(addr) => word[12..].copy_from_slice(addr.as_slice()),
            AbiValue::Uint(value) => word = value.to_be_bytes::<32>(),
            AbiValue::Bool(flag) => word[31] = *flag as u8,
            AbiValue::Str(_) | AbiValue::Bytes(_) => unreachable!("dynamic value has no static word"),
        }
        word
    }

    fn dynamic_payload(&self) -> &[u8] {
        match self {
            AbiValue::Str(s) => s.as_bytes(),
            AbiValue::Bytes(b) => b.as_ref(),
            _ => unreachable!("static value has no dynamic payload"),
        }
    }
}

/// ABI-encode a value sequence (constructor arguments or call arguments,
/// without selector).
pub fn encode(values: &[AbiValue]) -> Bytes {
    let head_size = 32 * values.len();
    let mut head = Vec::with_capacity(head_size);
    let mut tail: Vec<u8> = Vec::new();

    for value in values {
        if value.is_dynamic() {
            let offset = head_size + tail.len();
            head.extend_from_slice(&U256::from(offset).to_be_bytes::<32>());

            let payload = value.dynamic_payload();
            tail.extend_from_slice(&U256::from(payload.len()).to_be_bytes::<32>());
            tail.extend_from_slice(payload);
            // Pad the payload to a whole word.
            let rem = payload.len() % 32;
            if rem != 0 {
                tail.extend(std::iter::repeat(0u8).take(32 - rem));
            }
        } else {
            head.extend_from_slice(&value.static_word());
        }
    }

    head.extend_from_slice(&tail);
    Bytes::from(head)
}

/// The 4-byte selector of a canonical method signature,
/// e.g. `transfer(address,uint256)`.
pub fn selector(signature: &str) -> [u8; 4] {
    let digest = keccak256(signature.as_bytes());
    [digest[0], digest[1], digest[2], digest[3]]
}

/// Selector plus encoded arguments: complete calldata for a method call.
pub fn encode_call(signature: &str, values: &[AbiValue]) -> Bytes {
    let mut data = Vec::with_capacity(4 + 32 * values.len());
    data.extend_from_slice(&selector(signature));
    data.extend_from_slice(&encode(values));
    Bytes::from(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_selectors() {
        assert_eq!(hex::encode(selector("transfer(address,uint256)")), "a9059cbb");
        assert_eq!(hex::encode(selector("approve(address,uint256)")), "095ea7b3");
        assert_eq!(hex::encode(selector("decimals()")), "313ce567");
        assert_eq!(
            hex::encode(selector("depositTransaction(address,uint256,uint64,bool,bytes)")),
            "e9e05c42"
        );
    }

    #[test]
    fn address_is_left_padded() {
        let addr: Address = "0x70997970C51812dc3A010C7d01b50e0d17dc79C8".parse().unwrap();
        let encoded = encode(&[AbiValue::Address(addr)]);

        assert_eq!(encoded.len(), 32);
        assert_eq!(
            hex::encode(&encoded),
            "00000000000000000000000070997970c51812dc3a010c7d01b50e0d17dc79c8"
        );
    }

    #[test]
    fn two_static_args_occupy_two_words() {
        let addr: Address = "0x0000000000000000000000000000000000000001".parse().unwrap();
        let encoded = encode(&[
            AbiValue::Address(addr),
            AbiValue::Uint(U256::from(1_000_000_000_000_000_000u128)),
        ]);

        assert_eq!(encoded.len(), 64);
        // 1 ETH in wei, big-endian in the second word.
        assert_eq!(
            hex::encode(&encoded[32..]),
            "0000000000000000000000000000000000000000000000000de0b6b3a7640000"
        );
    }

    #[test]
    fn bool_encodes_as_last_byte() {
        let encoded = encode(&[AbiValue::Bool(true), AbiValue::Bool(false)]);
        assert_eq!(encoded[31], 1);
        assert_eq!(encoded[63], 0);
    }

    #[test]
    fn dynamic_string_uses_offset_and_length() {
        let encoded = encode(&[
            AbiValue::Uint(U256::from(5u64)),
            AbiValue::Str("hello".to_string()),
        ]);

        // head: uint word + offset word; tail: length word + padded payload.
        assert_eq!(encoded.len(), 32 * 4);
        // Offset points past the 2-word head.
        assert_eq!(
            hex::encode(&encoded[32..64]),
            "0000000000000000000000000000000000000000000000000000000000000040"
        );
        // Length of "hello".
        assert_eq!(
            hex::encode(&encoded[64..96]),
            "0000000000000000000000000000000000000000000000000000000000000005"
        );
        assert_eq!(&encoded[96..101], b"hello");
        assert!(encoded[101..].iter().all(|b| *b == 0));
    }

    #[test]
    fn call_data_starts_with_selector() {
        let addr: Address = "0x0000000000000000000000000000000000000002".parse().unwrap();
        let data = encode_call(
            "transfer(address,uint256)",
            &[AbiValue::Address(addr), AbiValue::Uint(U256::from(10u64))],
        );

        assert_eq!(data.len(), 4 + 64);
        assert_eq!(hex::encode(&data[..4]), "a9059cbb");
    }
}
