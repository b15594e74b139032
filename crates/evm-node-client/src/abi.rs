//! Contract ABI helpers
//!
//! Encodes read-only calls (4-byte selector + 32-byte argument words) and
//! decodes the hex results returned by `eth_call`.

use num_bigint::BigUint;
use sha3::{Digest, Keccak256};
use tiergate_core::{EvmAddress, RpcError};

use crate::Result;

/// ABI word size in bytes
const WORD: usize = 32;

/// A call argument in its runtime form, checked against the signature when encoded
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbiArg {
    /// Textual address, validated at encode time
    Address(String),
    Uint(BigUint),
}

impl AbiArg {
    pub fn address(addr: &EvmAddress) -> Self {
        Self::Address(addr.as_str().to_string())
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Address(_) => "address",
            Self::Uint(_) => "uint",
        }
    }
}

/// First four bytes of the Keccak-256 hash of a function signature
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = Keccak256::digest(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// Encode a call to `signature` with the given arguments
pub fn encode_call(signature: &str, args: &[AbiArg]) -> Result<Vec<u8>> {
    let types = param_types(signature)?;
    if types.len() != args.len() {
        return Err(encoding_error(
            signature,
            format!("expected {} arguments, got {}", types.len(), args.len()),
        ));
    }

    let mut data = Vec::with_capacity(4 + WORD * args.len());
    data.extend_from_slice(&selector(signature));
    for (ty, arg) in types.iter().zip(args) {
        data.extend_from_slice(&encode_word(signature, ty, arg)?);
    }
    Ok(data)
}

/// `0x`-prefixed lowercase hex
pub fn to_hex(data: &[u8]) -> String {
    format!("0x{}", hex::encode(data))
}

fn param_types(signature: &str) -> Result<Vec<&str>> {
    let (open, close) = match (signature.find('('), signature.rfind(')')) {
        (Some(open), Some(close)) if open > 0 && close == signature.len() - 1 && open < close => {
            (open, close)
        }
        _ => return Err(encoding_error(signature, "malformed signature")),
    };

    let inner = &signature[open + 1..close];
    if inner.is_empty() {
        return Ok(Vec::new());
    }
    Ok(inner.split(',').map(str::trim).collect())
}

fn encode_word(signature: &str, ty: &str, arg: &AbiArg) -> Result<[u8; WORD]> {
    let mut word = [0u8; WORD];
    match arg {
        AbiArg::Address(raw) if ty == "address" => {
            let addr = EvmAddress::parse(raw).map_err(|e| encoding_error(signature, e.to_string()))?;
            word[WORD - 20..].copy_from_slice(&addr.to_bytes());
        }
        AbiArg::Uint(value) => {
            let bits = uint_bits(ty).ok_or_else(|| {
                encoding_error(signature, format!("parameter type {} does not accept uint", ty))
            })?;
            if value.bits() > bits {
                return Err(encoding_error(
                    signature,
                    format!("value {} does not fit in {}", value, ty),
                ));
            }
            let bytes = value.to_bytes_be();
            word[WORD - bytes.len()..].copy_from_slice(&bytes);
        }
        other => {
            return Err(encoding_error(
                signature,
                format!("parameter type {} does not accept {}", ty, other.kind()),
            ));
        }
    }
    Ok(word)
}

/// Bit width of `uint<N>` types (`uint` alone is `uint256`)
fn uint_bits(ty: &str) -> Option<u64> {
    let width = ty.strip_prefix("uint")?;
    if width.is_empty() {
        return Some(256);
    }
    let bits: u64 = width.parse().ok()?;
    (bits % 8 == 0 && (8..=256).contains(&bits)).then_some(bits)
}

fn encoding_error(signature: &str, reason: impl Into<String>) -> RpcError {
    RpcError::Encoding {
        signature: signature.to_string(),
        reason: reason.into(),
    }
}

fn strip_hex_prefix(raw: &str) -> &str {
    let trimmed = raw.trim();
    trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed)
}

/// Parse a call result as an unsigned integer of arbitrary width
pub fn decode_uint(raw: &str) -> Result<BigUint> {
    let digits = strip_hex_prefix(raw);
    if digits.is_empty() {
        return Err(RpcError::decode("empty result"));
    }
    if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(RpcError::decode(format!("not a hex integer: {}", raw)));
    }
    BigUint::parse_bytes(digits.as_bytes(), 16)
        .ok_or_else(|| RpcError::decode(format!("not a hex integer: {}", raw)))
}

/// Parse a call result as text.
///
/// Accepts both the dynamic `string` layout (offset, length, data) and
/// fixed `bytes32` payloads. NUL, C0 control and DEL characters are removed.
pub fn decode_text(raw: &str) -> Result<String> {
    let bytes = hex::decode(strip_hex_prefix(raw))
        .map_err(|e| RpcError::decode(format!("invalid hex: {}", e)))?;
    let payload = dynamic_string_payload(&bytes).unwrap_or(&bytes);
    let text = std::str::from_utf8(payload)
        .map_err(|e| RpcError::decode(format!("invalid UTF-8: {}", e)))?;

    let cleaned: String = text.chars().filter(|c| !c.is_ascii_control()).collect();
    Ok(cleaned.trim().to_string())
}

/// Like [`decode_text`], but any failure yields an empty string
pub fn decode_text_or_empty(raw: &str) -> String {
    decode_text(raw).unwrap_or_default()
}

fn dynamic_string_payload(bytes: &[u8]) -> Option<&[u8]> {
    if bytes.len() < 2 * WORD {
        return None;
    }
    let offset = word_to_usize(&bytes[..WORD])?;
    if offset != WORD {
        return None;
    }
    let len = word_to_usize(&bytes[offset..offset + WORD])?;
    let start = offset + WORD;
    bytes.get(start..start.checked_add(len)?)
}

fn word_to_usize(word: &[u8]) -> Option<usize> {
    if word.len() != WORD || word[..WORD - 8].iter().any(|b| *b != 0) {
        return None;
    }
    let mut tail = [0u8; 8];
    tail.copy_from_slice(&word[WORD - 8..]);
    usize::try_from(u64::from_be_bytes(tail)).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOLDER: &str = "0x8ba1f109551bd432803012645ac136ddd64dba72";

    fn padded_hex(prefix: &str, total_bytes: usize) -> String {
        format!("0x{:0<width$}", prefix, width = total_bytes * 2)
    }

    #[test]
    fn test_known_selectors() {
        assert_eq!(hex::encode(selector("balanceOf(address)")), "70a08231");
        assert_eq!(hex::encode(selector("decimals()")), "313ce567");
        assert_eq!(hex::encode(selector("symbol()")), "95d89b41");
        assert_eq!(hex::encode(selector("transfer(address,uint256)")), "a9059cbb");
    }

    #[test]
    fn test_encode_balance_of() {
        let data = encode_call("balanceOf(address)", &[AbiArg::Address(HOLDER.into())]).unwrap();
        assert_eq!(data.len(), 36);
        assert_eq!(
            to_hex(&data),
            "0x70a08231\
             0000000000000000000000008ba1f109551bd432803012645ac136ddd64dba72"
        );
    }

    #[test]
    fn test_encode_checksummed_address() {
        let lower = encode_call("balanceOf(address)", &[AbiArg::Address(HOLDER.into())]).unwrap();
        let mixed = encode_call(
            "balanceOf(address)",
            &[AbiArg::Address("0x8BA1f109551bD432803012645Ac136ddd64DBA72".into())],
        )
        .unwrap();
        assert_eq!(lower, mixed);
    }

    #[test]
    fn test_encode_no_args() {
        assert_eq!(to_hex(&encode_call("decimals()", &[]).unwrap()), "0x313ce567");
    }

    #[test]
    fn test_encode_rejects_bad_address() {
        let err = encode_call("balanceOf(address)", &[AbiArg::Address("0x1234".into())]);
        assert!(matches!(err, Err(RpcError::Encoding { .. })));
    }

    #[test]
    fn test_encode_rejects_arity_and_type_mismatch() {
        assert!(matches!(
            encode_call("balanceOf(address)", &[]),
            Err(RpcError::Encoding { .. })
        ));
        assert!(matches!(
            encode_call("balanceOf(address)", &[AbiArg::Uint(BigUint::from(1u32))]),
            Err(RpcError::Encoding { .. })
        ));
        assert!(matches!(
            encode_call("balanceOf", &[]),
            Err(RpcError::Encoding { .. })
        ));
    }

    #[test]
    fn test_encode_uint_words() {
        let data = encode_call(
            "transfer(address,uint256)",
            &[AbiArg::Address(HOLDER.into()), AbiArg::Uint(BigUint::from(1000u32))],
        )
        .unwrap();
        assert_eq!(data.len(), 4 + 64);
        assert_eq!(&data[data.len() - 2..], &[0x03, 0xe8]);

        let overflow = encode_call("f(uint8)", &[AbiArg::Uint(BigUint::from(256u32))]);
        assert!(matches!(overflow, Err(RpcError::Encoding { .. })));

        let fits = encode_call("f(uint8)", &[AbiArg::Uint(BigUint::from(255u32))]).unwrap();
        assert_eq!(fits[fits.len() - 1], 0xff);
    }

    #[test]
    fn test_decode_uint_exact() {
        let one_ether = "0x0000000000000000000000000000000000000000000000000de0b6b3a7640000";
        assert_eq!(
            decode_uint(one_ether).unwrap(),
            BigUint::from(1_000_000_000_000_000_000u64)
        );

        let wide: BigUint = "123456789012345678901234567890".parse().unwrap();
        assert_eq!(decode_uint("0x18ee90ff6c373e0ee4e3f0ad2").unwrap(), wide);
        assert_eq!(decode_uint("12").unwrap(), BigUint::from(18u32));
    }

    #[test]
    fn test_decode_uint_round_trips_hex() {
        let values = [
            "0",
            "1",
            "255",
            "18446744073709551616",
            "115792089237316195423570985008687907853269984665640564039457584007913129639935",
        ];
        for value in values {
            let n: BigUint = value.parse().unwrap();
            assert_eq!(decode_uint(&format!("0x{:x}", n)).unwrap(), n);
            assert_eq!(decode_uint(&format!("0x{:064x}", n)).unwrap(), n);
        }
    }

    #[test]
    fn test_decode_uint_rejects_garbage() {
        assert!(matches!(decode_uint("0x"), Err(RpcError::Decode { .. })));
        assert!(matches!(decode_uint(""), Err(RpcError::Decode { .. })));
        assert!(matches!(decode_uint("0xzz"), Err(RpcError::Decode { .. })));
        assert!(matches!(decode_uint("0x1_000"), Err(RpcError::Decode { .. })));
    }

    #[test]
    fn test_decode_text_strips_padding() {
        let raw = padded_hex("5a4b4c", 32);
        assert_eq!(decode_text(&raw).unwrap(), "ZKL");
    }

    #[test]
    fn test_decode_text_dynamic_string() {
        let raw = format!(
            "0x{:064x}{:064x}{}",
            32,
            3,
            &padded_hex("5a4b4c", 32)[2..]
        );
        assert_eq!(decode_text(&raw).unwrap(), "ZKL");
    }

    #[test]
    fn test_decode_text_removes_control_characters() {
        assert_eq!(decode_text("0x00411f425f7f43").unwrap(), "AB_C");
        assert_eq!(decode_text("0x").unwrap(), "");
    }

    #[test]
    fn test_decode_text_invalid_input() {
        assert!(matches!(decode_text("0xff"), Err(RpcError::Decode { .. })));
        assert!(matches!(decode_text("0xabc"), Err(RpcError::Decode { .. })));
        assert_eq!(decode_text_or_empty("0xff"), "");
        assert_eq!(decode_text_or_empty("not hex"), "");
        assert_eq!(decode_text_or_empty("0x5a4b4c"), "ZKL");
    }
}
