//! `money` wire codec.
//!
//! The wire representation is a plain signed 64-bit integer scaled by the
//! server's `lc_monetary` fractional digit count, which isn't advertised
//! over the protocol. We decode using [`MONEY_DEFAULT_FRAC_DIGITS`] (2,
//! matching the common `en_US`-style locales); callers with a differently
//! configured server should rescale the resulting [`Money`] themselves via
//! [`Money::to_frac_digits`].

use crate::error::{Error, Result};
use crate::money::Money;
use crate::protocol::types::{Oid, oid};

use super::{FromWireValue, ToWireValue};

/// Fractional digit count assumed when decoding `money` without more
/// specific configuration.
pub const MONEY_DEFAULT_FRAC_DIGITS: u8 = 2;

impl FromWireValue<'_> for Money {
    fn from_text(oid: Oid, bytes: &[u8]) -> Result<Self> {
        if oid != oid::MONEY {
            return Err(Error::Decode(format!("cannot decode oid {} as Money", oid)));
        }
        let s = simdutf8::compat::from_utf8(bytes)
            .map_err(|e| Error::Decode(format!("invalid UTF-8: {}", e)))?;
        let cleaned: String = s
            .chars()
            .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
            .collect();
        let f: f64 = cleaned
            .parse()
            .map_err(|_| Error::Decode(format!("invalid money text: {}", s)))?;
        Ok(Money::from_f64(f, MONEY_DEFAULT_FRAC_DIGITS))
    }

    fn from_binary(oid: Oid, bytes: &[u8]) -> Result<Self> {
        if oid != oid::MONEY {
            return Err(Error::Decode(format!("cannot decode oid {} as Money", oid)));
        }
        if bytes.len() != 8 {
            return Err(Error::Decode(format!(
                "invalid money length: {} (expected 8)",
                bytes.len()
            )));
        }
        let mut b = [0_u8; 8];
        b.copy_from_slice(bytes);
        let val = i64::from_be_bytes(b);
        Ok(Money::from_scaled(val, MONEY_DEFAULT_FRAC_DIGITS))
    }
}

impl ToWireValue for Money {
    fn natural_oid(&self) -> Oid {
        oid::MONEY
    }

    fn encode(&self, target_oid: Oid, buf: &mut Vec<u8>) -> Result<()> {
        match target_oid {
            oid::MONEY => {
                let rescaled = self.to_frac_digits(MONEY_DEFAULT_FRAC_DIGITS);
                buf.extend_from_slice(&8_i32.to_be_bytes());
                buf.extend_from_slice(&rescaled.scaled_value().to_be_bytes());
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
    fn binary_roundtrip() {
        let original = Money::from_i64(42, MONEY_DEFAULT_FRAC_DIGITS);
        let mut buf = Vec::new();
        original.encode(original.natural_oid(), &mut buf).unwrap();
        let decoded = Money::from_binary(oid::MONEY, &buf[4..]).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn text_parses_dollar_sign() {
        let decoded = Money::from_text(oid::MONEY, b"$1,234.56").unwrap();
        assert_eq!(decoded.to_string(), "1234.56");
    }

    #[test]
    fn rejects_wrong_oid() {
        assert!(Money::from_binary(oid::NUMERIC, &[0; 8]).is_err());
    }
}
