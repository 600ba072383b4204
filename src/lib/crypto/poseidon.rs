use alloy_primitives::B256;
use ark_bn254::Fr;
use ark_ff::{BigInteger, PrimeField};
use light_poseidon::{Poseidon, PoseidonHasher};

use super::encoding::{EncodingError, FieldWord};

/// Domain separator for order commitments.
pub const DOMAIN_ORDER_COMMITMENT: B256 = domain_tag("dark_pool.order_commitment");

/// Domain separator for order nullifiers.
pub const DOMAIN_ORDER_NULLIFIER: B256 = domain_tag("dark_pool.order_nullifier");

/// Convert BN254 field element to B256.
fn fr_to_b256(value: Fr) -> B256 {
    let bytes = value.into_bigint().to_bytes_be();
    B256::left_padding_from(&bytes)
}

/// Encode a domain tag string as a B256 field element.
///
/// The UTF-8 bytes are right-aligned (big-endian) in a 32-byte array.
/// The tag must be at most 31 bytes to stay within the BN254 field.
pub const fn domain_tag(tag: &str) -> B256 {
    let bytes = tag.as_bytes();
    assert!(bytes.len() <= 31, "Domain tag must be at most 31 bytes");
    let mut padded = [0u8; 32];
    let offset = 32 - bytes.len();
    let mut i = 0;
    while i < bytes.len() {
        padded[offset + i] = bytes[i];
        i += 1;
    }
    B256::new(padded)
}

/// Circom-compatible Poseidon over BN254 with `inputs.len()` inputs (1..=12).
pub fn poseidon(inputs: &[FieldWord]) -> Result<B256, EncodingError> {
    let mut hasher = Poseidon::<Fr>::new_circom(inputs.len())
        .map_err(|e| EncodingError::Hash(e.to_string()))?;
    let elements: Vec<Fr> = inputs.iter().map(|w| w.to_fr()).collect();
    let result = hasher
        .hash(&elements)
        .map_err(|e| EncodingError::Hash(e.to_string()))?;
    Ok(fr_to_b256(result))
}

/// Poseidon with a leading domain tag.
pub fn poseidon_tagged(tag: B256, inputs: &[FieldWord]) -> Result<B256, EncodingError> {
    let mut words = Vec::with_capacity(inputs.len() + 1);
    words.push(FieldWord::from_tag(tag));
    words.extend_from_slice(inputs);
    poseidon(&words)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_tag_encoding() {
        let tag = domain_tag("dark_pool.order_nullifier");
        let bytes = tag.as_slice();
        // 25-byte tag, so the first 7 bytes are zero
        assert!(bytes[..7].iter().all(|&b| b == 0));
        assert_eq!(&bytes[7..], b"dark_pool.order_nullifier");
    }

    #[test]
    fn test_domains_are_distinct() {
        assert_ne!(DOMAIN_ORDER_COMMITMENT, DOMAIN_ORDER_NULLIFIER);
    }

    #[test]
    fn test_poseidon_deterministic() {
        let inputs = [FieldWord::from_u64(1), FieldWord::from_u64(2)];
        assert_eq!(poseidon(&inputs).unwrap(), poseidon(&inputs).unwrap());
    }

    #[test]
    fn test_poseidon_order_matters() {
        let a = FieldWord::from_u64(1);
        let b = FieldWord::from_u64(2);
        assert_ne!(poseidon(&[a, b]).unwrap(), poseidon(&[b, a]).unwrap());
    }

    #[test]
    fn test_poseidon_tag_separates_domains() {
        let inputs = [FieldWord::from_u64(7), FieldWord::from_u64(8)];
        let c = poseidon_tagged(DOMAIN_ORDER_COMMITMENT, &inputs).unwrap();
        let n = poseidon_tagged(DOMAIN_ORDER_NULLIFIER, &inputs).unwrap();
        assert_ne!(c, n);
    }

    #[test]
    fn test_poseidon_output_is_canonical() {
        let out = poseidon(&[FieldWord::from_u64(42)]).unwrap();
        assert!(FieldWord::from_b256("hash", out).is_ok());
    }

    #[test]
    fn test_poseidon_rejects_too_many_inputs() {
        let inputs = vec![FieldWord::from_u64(1); 13];
        assert!(matches!(poseidon(&inputs), Err(EncodingError::Hash(_))));
    }
}
