//! Public key, private key and signature format conversions.
//!
//! Legacy integrations hand us keys and signatures in several byte layouts.
//! Everything here is a pure function of its input: point decompression is
//! done with field arithmetic over the secp256k1 prime, and every point that
//! leaves this module has been checked against the curve equation.

use k256::PublicKey;
use num_bigint::BigUint;
use tracing::{debug, instrument};

use crate::config::{CodecConfig, SignatureFrame};
use crate::error::{KeyError, Result};

/// Private scalar length
pub const PRIVATE_KEY_LEN: usize = 32;
/// Compressed SEC1 point: `0x02 | 0x03` prefix + x
pub const COMPRESSED_LEN: usize = 33;
/// Uncompressed SEC1 point: `0x04` prefix + x + y
pub const UNCOMPRESSED_LEN: usize = 65;
/// Raw point: x + y without a prefix
pub const RAW_POINT_LEN: usize = 64;
/// Raw signature: r + s
pub const SIGNATURE_LEN: usize = 64;
/// Canonical legacy signature frame (two unpadded 32-byte integers)
pub const LEGACY_FRAME_LEN: usize = 70;

const MIN_FRAME_LEN: usize = 68;
const MAX_FRAME_LEN: usize = 72;

/// secp256k1 field modulus p
const FIELD_PRIME: [u8; 32] = [
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xfe, 0xff, 0xff, 0xfc, 0x2f,
];

/// Curve constant b in y^2 = x^3 + b
const CURVE_B: u32 = 7;

const TAG_EVEN: u8 = 0x02;
const TAG_ODD: u8 = 0x03;
const TAG_UNCOMPRESSED: u8 = 0x04;

/// Decode a hex string, accepting an optional `0x` prefix.
pub fn decode_hex(value: &str) -> Result<Vec<u8>> {
    hex::decode(value.trim_start_matches("0x")).map_err(|e| KeyError::InvalidHex(e.to_string()))
}

/// Recover the uncompressed encoding of a compressed public key.
///
/// y is the square root of `x^3 + 7 (mod p)`, computed as
/// `(x^3 + 7)^((p + 1) / 4)` since p = 3 (mod 4), then negated if its parity
/// disagrees with the prefix.
///
/// # Arguments
/// * `compressed` - 33 bytes, `0x02` (even y) or `0x03` (odd y) followed by x
///
/// # Returns
/// 65 bytes: `0x04 || x || y`
///
/// # Errors
/// `UnsupportedKeyFormat` for a wrong length or prefix, `CurveArithmeticError`
/// if x does not belong to a point on the curve.
pub fn uncompressed_from_compressed(compressed: &[u8]) -> Result<[u8; UNCOMPRESSED_LEN]> {
    if compressed.len() != COMPRESSED_LEN {
        return Err(KeyError::UnsupportedKeyFormat(format!(
            "compressed key must be {} bytes, got {}",
            COMPRESSED_LEN,
            compressed.len()
        )));
    }
    let want_odd = match compressed[0] {
        TAG_EVEN => false,
        TAG_ODD => true,
        other => {
            return Err(KeyError::UnsupportedKeyFormat(format!(
                "unknown compressed key prefix 0x{:02x}",
                other
            )))
        }
    };

    let p = BigUint::from_bytes_be(&FIELD_PRIME);
    let x = BigUint::from_bytes_be(&compressed[1..]);
    if x >= p {
        return Err(KeyError::CurveArithmeticError(
            "x coordinate is not a field element".to_string(),
        ));
    }

    let y_square = (x.modpow(&BigUint::from(3u32), &p) + BigUint::from(CURVE_B)) % &p;
    let exponent = (&p + 1u32) / 4u32;
    let candidate = y_square.modpow(&exponent, &p);
    let y = if candidate.bit(0) != want_odd {
        (&p - &candidate) % &p
    } else {
        candidate
    };

    // The exponentiation yields a root only when y^2 is a quadratic residue
    if (&y * &y) % &p != y_square {
        return Err(KeyError::CurveArithmeticError(
            "x coordinate has no point on the curve".to_string(),
        ));
    }

    let mut out = [0u8; UNCOMPRESSED_LEN];
    out[0] = TAG_UNCOMPRESSED;
    out[1..33].copy_from_slice(&compressed[1..]);
    let y_bytes = y.to_bytes_be();
    out[UNCOMPRESSED_LEN - y_bytes.len()..].copy_from_slice(&y_bytes);

    ensure_on_curve(&out)?;
    Ok(out)
}

/// Compress a public key.
///
/// Accepts the 65-byte uncompressed form, the 64-byte raw `x || y` form, or an
/// already compressed 33-byte key, which is returned unchanged.
pub fn compressed_from_uncompressed(public_key: &[u8]) -> Result<[u8; COMPRESSED_LEN]> {
    let (x, y) = match public_key.len() {
        COMPRESSED_LEN => {
            if !matches!(public_key[0], TAG_EVEN | TAG_ODD) {
                return Err(KeyError::UnsupportedKeyFormat(format!(
                    "unknown compressed key prefix 0x{:02x}",
                    public_key[0]
                )));
            }
            ensure_on_curve(public_key)?;
            let mut out = [0u8; COMPRESSED_LEN];
            out.copy_from_slice(public_key);
            return Ok(out);
        }
        UNCOMPRESSED_LEN => {
            if public_key[0] != TAG_UNCOMPRESSED {
                return Err(KeyError::UnsupportedKeyFormat(format!(
                    "unknown uncompressed key prefix 0x{:02x}",
                    public_key[0]
                )));
            }
            ensure_on_curve(public_key)?;
            (&public_key[1..33], &public_key[33..])
        }
        RAW_POINT_LEN => {
            let mut sec1 = [0u8; UNCOMPRESSED_LEN];
            sec1[0] = TAG_UNCOMPRESSED;
            sec1[1..].copy_from_slice(public_key);
            ensure_on_curve(&sec1)?;
            (&public_key[..32], &public_key[32..])
        }
        other => {
            return Err(KeyError::UnsupportedKeyFormat(format!(
                "public key of {} bytes",
                other
            )))
        }
    };

    let mut out = [0u8; COMPRESSED_LEN];
    out[0] = if y[31] & 1 == 1 { TAG_ODD } else { TAG_EVEN };
    out[1..].copy_from_slice(x);
    Ok(out)
}

/// Hex form of [`uncompressed_from_compressed`]: 66 hex characters in,
/// 130 out.
pub fn to_uncompressed_public_key(compressed_hex: &str) -> Result<String> {
    let compressed = decode_hex(compressed_hex)?;
    Ok(hex::encode(uncompressed_from_compressed(&compressed)?))
}

/// Hex form of [`compressed_from_uncompressed`]: 130, 128 or 66 hex
/// characters in, 66 out.
pub fn to_compressed_public_key(public_key_hex: &str) -> Result<String> {
    let public_key = decode_hex(public_key_hex)?;
    Ok(hex::encode(compressed_from_uncompressed(&public_key)?))
}

fn ensure_on_curve(sec1: &[u8]) -> Result<()> {
    PublicKey::from_sec1_bytes(sec1)
        .map(|_| ())
        .map_err(|_| KeyError::CurveArithmeticError("point is not on secp256k1".to_string()))
}

/// Normalizes keys and signatures from legacy byte layouts into the raw
/// forms the signature primitive expects.
#[derive(Debug, Clone, Default)]
pub struct FormatCodec {
    config: CodecConfig,
}

impl FormatCodec {
    /// # Errors
    /// Returns `KeyError::InvalidInput` if the configuration does not validate.
    pub fn new(config: CodecConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    /// Reduce a private key to its 32-byte scalar.
    ///
    /// - 32 bytes: unchanged
    /// - 33 bytes: leading network marker stripped, or failing that, the
    ///   trailing compression flag
    /// - 34 bytes: both stripped
    pub fn normalize_private_key(&self, bytes: &[u8]) -> Result<[u8; PRIVATE_KEY_LEN]> {
        let scalar = match bytes.len() {
            PRIVATE_KEY_LEN => bytes,
            33 if bytes[0] == self.config.network_marker => &bytes[1..],
            33 if bytes[32] == self.config.compression_flag => &bytes[..32],
            33 => {
                return Err(KeyError::UnsupportedKeyFormat(
                    "33-byte private key carries neither network marker nor compression flag"
                        .to_string(),
                ))
            }
            34 if bytes[0] == self.config.network_marker
                && bytes[33] == self.config.compression_flag =>
            {
                &bytes[1..33]
            }
            34 => {
                return Err(KeyError::UnsupportedKeyFormat(
                    "34-byte private key must carry network marker and compression flag"
                        .to_string(),
                ))
            }
            actual => return Err(KeyError::InvalidKeyLength { actual }),
        };

        let mut out = [0u8; PRIVATE_KEY_LEN];
        out.copy_from_slice(scalar);
        Ok(out)
    }

    /// Reduce a public key to its raw 64-byte `x || y` form.
    ///
    /// # Errors
    /// `UnsupportedKeyFormat` for an unknown length or prefix,
    /// `CurveArithmeticError` if the point is not on the curve.
    pub fn normalize_public_key(&self, bytes: &[u8]) -> Result<[u8; RAW_POINT_LEN]> {
        let mut out = [0u8; RAW_POINT_LEN];
        match bytes.len() {
            RAW_POINT_LEN => {
                let mut sec1 = [0u8; UNCOMPRESSED_LEN];
                sec1[0] = TAG_UNCOMPRESSED;
                sec1[1..].copy_from_slice(bytes);
                ensure_on_curve(&sec1)?;
                out.copy_from_slice(bytes);
            }
            UNCOMPRESSED_LEN if bytes[0] == TAG_UNCOMPRESSED => {
                ensure_on_curve(bytes)?;
                out.copy_from_slice(&bytes[1..]);
            }
            COMPRESSED_LEN => out.copy_from_slice(&uncompressed_from_compressed(bytes)?[1..]),
            other => {
                return Err(KeyError::UnsupportedKeyFormat(format!(
                    "public key of {} bytes",
                    other
                )))
            }
        }
        Ok(out)
    }

    /// Reduce a signature to its raw 64-byte `r || s` form.
    #[instrument(level = "debug", skip(self, bytes), fields(signature_len = bytes.len()))]
    pub fn normalize_signature(&self, bytes: &[u8]) -> Result<[u8; SIGNATURE_LEN]> {
        let len = bytes.len();
        if len == SIGNATURE_LEN {
            let mut out = [0u8; SIGNATURE_LEN];
            out.copy_from_slice(bytes);
            return Ok(out);
        }

        match self.config.signature_frame {
            SignatureFrame::Der if (MIN_FRAME_LEN..=MAX_FRAME_LEN).contains(&len) => {
                decode_frame(bytes)
            }
            SignatureFrame::FixedOffsets if len == LEGACY_FRAME_LEN => {
                debug!("extracting r and s at fixed legacy frame offsets");
                let mut out = [0u8; SIGNATURE_LEN];
                out[..32].copy_from_slice(&bytes[4..36]);
                out[32..].copy_from_slice(&bytes[len - 32..]);
                Ok(out)
            }
            _ => Err(KeyError::UnsupportedSignatureFormat(format!(
                "signature of {} bytes",
                len
            ))),
        }
    }
}

/// Decode `0x30 len 0x02 rlen r 0x02 slen s` into `r || s`.
fn decode_frame(frame: &[u8]) -> Result<[u8; SIGNATURE_LEN]> {
    let body = match frame {
        [0x30, len, body @ ..] if *len as usize == body.len() => body,
        _ => {
            return Err(KeyError::UnsupportedSignatureFormat(
                "malformed signature frame header".to_string(),
            ))
        }
    };

    let (r, rest) = read_integer(body)?;
    let (s, rest) = read_integer(rest)?;
    if !rest.is_empty() {
        return Err(KeyError::UnsupportedSignatureFormat(format!(
            "{} trailing bytes after signature frame",
            rest.len()
        )));
    }

    let mut out = [0u8; SIGNATURE_LEN];
    out[..32].copy_from_slice(&r);
    out[32..].copy_from_slice(&s);
    Ok(out)
}

fn read_integer(input: &[u8]) -> Result<([u8; 32], &[u8])> {
    let (len, rest) = match input {
        [0x02, len, rest @ ..] => (*len as usize, rest),
        _ => {
            return Err(KeyError::UnsupportedSignatureFormat(
                "expected integer in signature frame".to_string(),
            ))
        }
    };
    if len == 0 || len > rest.len() {
        return Err(KeyError::UnsupportedSignatureFormat(
            "truncated integer in signature frame".to_string(),
        ));
    }

    let (value, rest) = rest.split_at(len);
    let first = value.iter().position(|b| *b != 0).unwrap_or(value.len());
    let value = &value[first..];
    if value.len() > 32 {
        return Err(KeyError::UnsupportedSignatureFormat(
            "integer wider than 32 bytes in signature frame".to_string(),
        ));
    }

    let mut out = [0u8; 32];
    out[32 - value.len()..].copy_from_slice(value);
    Ok((out, rest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{public_key_from_scalar, signing_key};
    use hex_literal::hex;
    use proptest::prelude::*;

    const COMPRESSED: &str = "021ad7138370ef5e93fb243aff3373e2b92383818dfc20022841b655e0cd6c618c";
    const UNCOMPRESSED: &str = "041ad7138370ef5e93fb243aff3373e2b92383818dfc20022841b655e0cd6c618c\
                                d578261c78e1adfe205c3ade8b81e1722d6058be9155eee55468fbb04b62040e";
    const COMPRESSED_ODD: &str = "0339a36013301597daef41fbe593a02cc513d0b55527ec2df1050e2e8ff49c85c2";
    const UNCOMPRESSED_ODD: &str = "0439a36013301597daef41fbe593a02cc513d0b55527ec2df1050e2e8ff49c85c2\
                                    3cbe7ded0e7ce6a594896b8f62888fdbc5c8821305e2ea42bf01e37300116281";

    const SIG_R: [u8; 32] = hex!("0c4e3b3b3a20340ec00f1ab38edb65301c151a16808091cecb49a247b1c7d627");
    const SIG_S: [u8; 32] = hex!("4488bccb1d190103390d11e637f8aa02e32b881b107d8a676b0efb687ef8bfae");
    const FRAME: [u8; 70] = hex!(
        "3044"
        "02200c4e3b3b3a20340ec00f1ab38edb65301c151a16808091cecb49a247b1c7d627"
        "02204488bccb1d190103390d11e637f8aa02e32b881b107d8a676b0efb687ef8bfae"
    );
    // Same r, s replaced by n - s: the integer needs a zero pad byte
    const PADDED_FRAME: [u8; 71] = hex!(
        "3045"
        "02200c4e3b3b3a20340ec00f1ab38edb65301c151a16808091cecb49a247b1c7d627"
        "022100bb774334e2e6fefcc6f2ee19c80755fbd78354cb9ecb15d454c36324513d8193"
    );

    fn raw_signature() -> [u8; 64] {
        let mut out = [0u8; 64];
        out[..32].copy_from_slice(&SIG_R);
        out[32..].copy_from_slice(&SIG_S);
        out
    }

    #[test]
    fn test_uncompressed_from_compressed_even() {
        assert_eq!(to_uncompressed_public_key(COMPRESSED).unwrap(), UNCOMPRESSED);
    }

    #[test]
    fn test_uncompressed_from_compressed_odd() {
        assert_eq!(to_uncompressed_public_key(COMPRESSED_ODD).unwrap(), UNCOMPRESSED_ODD);
        assert_eq!(
            to_uncompressed_public_key(&format!("0x{}", COMPRESSED_ODD)).unwrap(),
            UNCOMPRESSED_ODD
        );
    }

    #[test]
    fn test_compressed_from_uncompressed() {
        assert_eq!(to_compressed_public_key(UNCOMPRESSED).unwrap(), COMPRESSED);
        assert_eq!(to_compressed_public_key(UNCOMPRESSED_ODD).unwrap(), COMPRESSED_ODD);
        // Raw x || y
        assert_eq!(to_compressed_public_key(&UNCOMPRESSED[2..]).unwrap(), COMPRESSED);
        // Already compressed
        assert_eq!(to_compressed_public_key(COMPRESSED).unwrap(), COMPRESSED);
    }

    #[test]
    fn test_x_not_on_curve() {
        let mut compressed = [0u8; 33];
        compressed[0] = 0x02;
        compressed[32] = 5;
        assert!(matches!(
            uncompressed_from_compressed(&compressed),
            Err(KeyError::CurveArithmeticError(_))
        ));
    }

    #[test]
    fn test_x_not_a_field_element() {
        let mut compressed = [0xffu8; 33];
        compressed[0] = 0x03;
        assert!(matches!(
            uncompressed_from_compressed(&compressed),
            Err(KeyError::CurveArithmeticError(_))
        ));
    }

    #[test]
    fn test_compressed_rejects_bad_shape() {
        let mut bad_prefix = hex::decode(COMPRESSED).unwrap();
        bad_prefix[0] = 0x05;
        assert!(matches!(
            uncompressed_from_compressed(&bad_prefix),
            Err(KeyError::UnsupportedKeyFormat(_))
        ));
        assert!(matches!(
            uncompressed_from_compressed(&[0x02; 32]),
            Err(KeyError::UnsupportedKeyFormat(_))
        ));
        // 64 hex characters instead of 66
        assert!(matches!(
            to_uncompressed_public_key(&COMPRESSED[2..]),
            Err(KeyError::UnsupportedKeyFormat(_))
        ));
        assert!(matches!(
            to_uncompressed_public_key("02zz"),
            Err(KeyError::InvalidHex(_))
        ));
    }

    #[test]
    fn test_compress_rejects_off_curve_point() {
        let mut point = hex::decode(UNCOMPRESSED).unwrap();
        point[64] ^= 0x01;
        assert!(matches!(
            compressed_from_uncompressed(&point),
            Err(KeyError::CurveArithmeticError(_))
        ));
        assert!(matches!(
            compressed_from_uncompressed(&[0x04; 40]),
            Err(KeyError::UnsupportedKeyFormat(_))
        ));
    }

    #[test]
    fn test_normalize_private_key() {
        let codec = FormatCodec::default();
        let scalar = hex!("7a6be1df9cc5d88edce5443ef0fce246123295dd82afae9a57986543272157cc");

        let mut marked = vec![0x80];
        marked.extend_from_slice(&scalar);
        let mut flagged = scalar.to_vec();
        flagged.push(0x01);
        let mut both = marked.clone();
        both.push(0x01);

        assert_eq!(codec.normalize_private_key(&scalar).unwrap(), scalar);
        assert_eq!(codec.normalize_private_key(&marked).unwrap(), scalar);
        assert_eq!(codec.normalize_private_key(&flagged).unwrap(), scalar);
        assert_eq!(codec.normalize_private_key(&both).unwrap(), scalar);
    }

    #[test]
    fn test_normalize_private_key_custom_marker() {
        let codec = FormatCodec::new(CodecConfig::new().with_network_marker(0xef)).unwrap();
        let mut marked = vec![0xef];
        marked.extend_from_slice(&[0x11; 32]);
        assert_eq!(codec.normalize_private_key(&marked).unwrap(), [0x11; 32]);
    }

    #[test]
    fn test_normalize_private_key_rejects() {
        let codec = FormatCodec::default();
        assert_eq!(
            codec.normalize_private_key(&[0x11; 31]),
            Err(KeyError::InvalidKeyLength { actual: 31 })
        );
        assert_eq!(
            codec.normalize_private_key(&[0x11; 35]),
            Err(KeyError::InvalidKeyLength { actual: 35 })
        );
        assert!(matches!(
            codec.normalize_private_key(&[0x11; 33]),
            Err(KeyError::UnsupportedKeyFormat(_))
        ));
        assert!(matches!(
            codec.normalize_private_key(&[0x11; 34]),
            Err(KeyError::UnsupportedKeyFormat(_))
        ));
    }

    #[test]
    fn test_normalize_public_key() {
        let codec = FormatCodec::default();
        let uncompressed = hex::decode(UNCOMPRESSED).unwrap();
        let expected = &uncompressed[1..];

        assert_eq!(&codec.normalize_public_key(&uncompressed).unwrap()[..], expected);
        assert_eq!(&codec.normalize_public_key(expected).unwrap()[..], expected);
        assert_eq!(
            &codec.normalize_public_key(&hex::decode(COMPRESSED).unwrap()).unwrap()[..],
            expected
        );
    }

    #[test]
    fn test_normalize_public_key_rejects() {
        let codec = FormatCodec::default();
        assert!(matches!(
            codec.normalize_public_key(&[0x04; 40]),
            Err(KeyError::UnsupportedKeyFormat(_))
        ));
        let mut wrong_prefix = hex::decode(UNCOMPRESSED).unwrap();
        wrong_prefix[0] = 0x06;
        assert!(matches!(
            codec.normalize_public_key(&wrong_prefix),
            Err(KeyError::UnsupportedKeyFormat(_))
        ));
    }

    #[test]
    fn test_normalize_public_key_off_curve() {
        let codec = FormatCodec::default();
        assert!(matches!(
            codec.normalize_public_key(&[0u8; 64]),
            Err(KeyError::CurveArithmeticError(_))
        ));

        let mut sec1 = [0u8; 65];
        sec1[0] = 0x04;
        assert!(matches!(
            codec.normalize_public_key(&sec1),
            Err(KeyError::CurveArithmeticError(_))
        ));

        let mut tweaked = hex::decode(UNCOMPRESSED).unwrap();
        tweaked[64] ^= 0x01;
        assert!(matches!(
            codec.normalize_public_key(&tweaked),
            Err(KeyError::CurveArithmeticError(_))
        ));
        assert!(matches!(
            codec.normalize_public_key(&tweaked[1..]),
            Err(KeyError::CurveArithmeticError(_))
        ));
    }

    #[test]
    fn test_normalize_signature_raw() {
        let codec = FormatCodec::default();
        assert_eq!(codec.normalize_signature(&raw_signature()).unwrap(), raw_signature());
    }

    #[test]
    fn test_normalize_signature_frame() {
        let der = FormatCodec::default();
        let fixed = FormatCodec::new(
            CodecConfig::new().with_signature_frame(SignatureFrame::FixedOffsets),
        )
        .unwrap();

        assert_eq!(der.normalize_signature(&FRAME).unwrap(), raw_signature());
        assert_eq!(fixed.normalize_signature(&FRAME).unwrap(), raw_signature());
    }

    #[test]
    fn test_normalize_signature_padded_frame() {
        let der = FormatCodec::default();
        let sig = der.normalize_signature(&PADDED_FRAME).unwrap();
        assert_eq!(sig[..32], SIG_R);
        assert_eq!(
            sig[32..],
            hex!("bb774334e2e6fefcc6f2ee19c80755fbd78354cb9ecb15d454c36324513d8193")
        );

        let fixed = FormatCodec::new(
            CodecConfig::new().with_signature_frame(SignatureFrame::FixedOffsets),
        )
        .unwrap();
        assert!(matches!(
            fixed.normalize_signature(&PADDED_FRAME),
            Err(KeyError::UnsupportedSignatureFormat(_))
        ));
    }

    #[test]
    fn test_normalize_signature_rejects() {
        let codec = FormatCodec::default();
        assert!(matches!(
            codec.normalize_signature(&[0u8; 50]),
            Err(KeyError::UnsupportedSignatureFormat(_))
        ));

        let mut bad_header = FRAME;
        bad_header[0] = 0x31;
        assert!(matches!(
            codec.normalize_signature(&bad_header),
            Err(KeyError::UnsupportedSignatureFormat(_))
        ));

        let mut bad_length = FRAME;
        bad_length[3] = 0x21;
        assert!(matches!(
            codec.normalize_signature(&bad_length),
            Err(KeyError::UnsupportedSignatureFormat(_))
        ));
    }

    proptest! {
        #[test]
        fn test_compression_round_trip(scalar in any::<[u8; 32]>()) {
            prop_assume!(signing_key(&scalar).is_ok());
            let uncompressed = public_key_from_scalar(&scalar).unwrap();
            let compressed = compressed_from_uncompressed(&uncompressed).unwrap();

            prop_assert_eq!(compressed.len(), COMPRESSED_LEN);
            prop_assert_eq!(uncompressed_from_compressed(&compressed).unwrap(), uncompressed);
        }
    }
}
