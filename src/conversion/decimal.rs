//! Decimal type implementation (bespoke [`crate::decimal::Decimal`] engine).
//!
//! PostgreSQL NUMERIC binary format:
//! - ndigits: i16 - number of base-10000 digits
//! - weight: i16 - weight of first digit (power of 10000)
//! - sign: u16 - 0x0000 = positive, 0x4000 = negative, 0xC000 = NaN
//! - dscale: u16 - display scale (decimal places)
//! - digits: [u16] - base-10000 digits

use crate::decimal::Decimal;
use crate::error::{Error, Result};
use crate::protocol::types::{Oid, oid};

use super::{FromWireValue, ToWireValue};

const NUMERIC_POS: u16 = 0x0000;
const NUMERIC_NEG: u16 = 0x4000;
const NUMERIC_NAN: u16 = 0xC000;

impl FromWireValue<'_> for Decimal {
    fn from_text(oid: Oid, bytes: &[u8]) -> Result<Self> {
        if oid != oid::NUMERIC {
            return Err(Error::Decode(format!(
                "cannot decode oid {} as Decimal",
                oid
            )));
        }
        let s = simdutf8::compat::from_utf8(bytes)
            .map_err(|e| Error::Decode(format!("invalid UTF-8: {}", e)))?;
        s.parse()
    }

    fn from_binary(oid: Oid, bytes: &[u8]) -> Result<Self> {
        if oid != oid::NUMERIC {
            return Err(Error::Decode(format!(
                "cannot decode oid {} as Decimal",
                oid
            )));
        }
        if bytes.len() < 8 {
            return Err(Error::Decode(format!(
                "invalid NUMERIC length: {}",
                bytes.len()
            )));
        }

        let ndigits = i16::from_be_bytes([bytes[0], bytes[1]]) as usize;
        let weight = i16::from_be_bytes([bytes[2], bytes[3]]) as i32;
        let sign = u16::from_be_bytes([bytes[4], bytes[5]]);
        let dscale = u16::from_be_bytes([bytes[6], bytes[7]]);

        if sign == NUMERIC_NAN {
            return Ok(Decimal::nan());
        }
        if sign != NUMERIC_POS && sign != NUMERIC_NEG {
            return Err(Error::Decode(format!("unsupported NUMERIC sign: {:#06x}", sign)));
        }

        let expected_len = 8 + ndigits * 2;
        if bytes.len() < expected_len {
            return Err(Error::Decode(format!(
                "invalid NUMERIC length: {} (expected {})",
                bytes.len(),
                expected_len
            )));
        }

        let mut digits = Vec::with_capacity(ndigits);
        for i in 0..ndigits {
            let off = 8 + i * 2;
            digits.push(i16::from_be_bytes([bytes[off], bytes[off + 1]]));
        }

        Ok(Decimal::from_wire_parts(sign == NUMERIC_NEG, weight, dscale, digits))
    }
}

impl ToWireValue for Decimal {
    fn natural_oid(&self) -> Oid {
        oid::NUMERIC
    }

    fn encode(&self, target_oid: Oid, buf: &mut Vec<u8>) -> Result<()> {
        match target_oid {
            oid::NUMERIC => {
                if self.is_nan() {
                    buf.extend_from_slice(&8_i32.to_be_bytes());
                    buf.extend_from_slice(&0_i16.to_be_bytes());
                    buf.extend_from_slice(&0_i16.to_be_bytes());
                    buf.extend_from_slice(&NUMERIC_NAN.to_be_bytes());
                    buf.extend_from_slice(&0_u16.to_be_bytes());
                    return Ok(());
                }
                let (negative, weight, dscale, digits) = self.wire_parts();
                let ndigits = digits.len() as i16;
                let sign = if negative { NUMERIC_NEG } else { NUMERIC_POS };

                let data_len = 8 + (ndigits as usize) * 2;
                buf.extend_from_slice(&(data_len as i32).to_be_bytes());
                buf.extend_from_slice(&ndigits.to_be_bytes());
                buf.extend_from_slice(&(weight as i16).to_be_bytes());
                buf.extend_from_slice(&sign.to_be_bytes());
                buf.extend_from_slice(&dscale.to_be_bytes());
                for &d in digits {
                    buf.extend_from_slice(&d.to_be_bytes());
                }
                Ok(())
            }
            _ => Err(Error::type_mismatch(self.natural_oid(), target_oid)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decimal_text() {
        let dec = Decimal::from_text(oid::NUMERIC, b"123.45").unwrap();
        assert_eq!(dec.to_string(), "123.45");
    }

    #[test]
    fn test_decimal_nan_binary_roundtrip() {
        let original = Decimal::nan();
        let mut buf = Vec::new();
        original.encode(original.natural_oid(), &mut buf).unwrap();
        let decoded = Decimal::from_binary(oid::NUMERIC, &buf[4..]).unwrap();
        assert!(decoded.is_nan());
    }

    #[test]
    fn test_decimal_zero_binary_roundtrip() {
        let original = Decimal::zero();
        let mut buf = Vec::new();
        original.encode(original.natural_oid(), &mut buf).unwrap();
        let decoded = Decimal::from_binary(oid::NUMERIC, &buf[4..]).unwrap();
        assert_eq!(decoded.to_string(), "0");
    }

    #[test]
    fn test_decimal_positive_roundtrip() {
        let original: Decimal = "12345.6789".parse().unwrap();
        let mut buf = Vec::new();
        original.encode(original.natural_oid(), &mut buf).unwrap();
        let decoded = Decimal::from_binary(oid::NUMERIC, &buf[4..]).unwrap();
        assert_eq!(decoded.to_string(), "12345.6789");
    }

    #[test]
    fn test_decimal_negative_roundtrip() {
        let original: Decimal = "-999.999".parse().unwrap();
        let mut buf = Vec::new();
        original.encode(original.natural_oid(), &mut buf).unwrap();
        let decoded = Decimal::from_binary(oid::NUMERIC, &buf[4..]).unwrap();
        assert_eq!(decoded.to_string(), "-999.999");
    }
}
