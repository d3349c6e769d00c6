//! Fixed-point currency type mirroring PostgreSQL's `money`.
//!
//! `money` on the wire is a signed 64-bit integer scaled by a fractional
//! digit count (`10^frac_digits`). Unlike the server, which reads
//! `frac_digits` from the connection's locale, each [`Money`] instance
//! carries its own and operations rescale operands to a common one before
//! combining them, matching `pq_async::money::to_frac_digits`.

use std::cmp::Ordering;
use std::fmt;

use crate::error::{Error, Result};

/// A signed, fixed-point currency amount.
#[derive(Debug, Clone, Copy)]
pub struct Money {
    val: i64,
    frac_digits: u8,
}

fn pow10(n: u8) -> i64 {
    10_i64.pow(u32::from(n))
}

impl Money {
    /// Builds a `Money` from a pre-scaled integer value (the raw wire
    /// representation) and its fractional digit count.
    #[must_use]
    pub fn from_scaled(val: i64, frac_digits: u8) -> Self {
        Self { val, frac_digits }
    }

    /// The raw scaled integer value.
    #[must_use]
    pub fn scaled_value(&self) -> i64 {
        self.val
    }

    /// The fractional digit count this value is currently scaled to.
    #[must_use]
    pub fn frac_digits(&self) -> u8 {
        self.frac_digits
    }

    /// Builds a `Money` from a whole number of currency units.
    #[must_use]
    pub fn from_i64(v: i64, frac_digits: u8) -> Self {
        Self {
            val: v.saturating_mul(pow10(frac_digits)),
            frac_digits,
        }
    }

    /// Builds a `Money` from a floating-point amount, rounding to the
    /// nearest scaled integer.
    #[must_use]
    pub fn from_f64(v: f64, frac_digits: u8) -> Self {
        #[expect(clippy::float_arithmetic, reason = "scaling a decimal amount into an integer")]
        let scaled = v * (pow10(frac_digits) as f64);
        Self {
            val: scaled.round() as i64,
            frac_digits,
        }
    }

    /// Rescales `self` to `target` fractional digits, rounding towards
    /// zero when reducing precision (same truncating behavior as the
    /// server's `cash_div_cash`/`to_frac_digits`).
    #[must_use]
    pub fn to_frac_digits(&self, target: u8) -> Self {
        if target == self.frac_digits {
            return *self;
        }
        let val = if target > self.frac_digits {
            self.val.saturating_mul(pow10(target - self.frac_digits))
        } else {
            self.val / pow10(self.frac_digits - target)
        };
        Self {
            val,
            frac_digits: target,
        }
    }

    fn rescale_pair(self, other: Self) -> (i64, i64, u8) {
        let frac_digits = self.frac_digits.max(other.frac_digits);
        let a = self.to_frac_digits(frac_digits).val;
        let b = other.to_frac_digits(frac_digits).val;
        (a, b, frac_digits)
    }

    /// Adds two amounts, rescaling to the wider fractional precision first.
    pub fn checked_add(&self, other: &Self) -> Result<Self> {
        let (a, b, frac_digits) = self.rescale_pair(*other);
        let val = a
            .checked_add(b)
            .ok_or_else(|| Error::overflow("money addition overflow"))?;
        Ok(Self { val, frac_digits })
    }

    /// Subtracts `other` from `self`, rescaling to the wider precision first.
    pub fn checked_sub(&self, other: &Self) -> Result<Self> {
        let (a, b, frac_digits) = self.rescale_pair(*other);
        let val = a
            .checked_sub(b)
            .ok_or_else(|| Error::overflow("money subtraction overflow"))?;
        Ok(Self { val, frac_digits })
    }

    /// Multiplies two amounts, rescaling first and dividing out one
    /// scale factor so the result stays at the same fractional precision.
    pub fn checked_mul(&self, other: &Self) -> Result<Self> {
        let (a, b, frac_digits) = self.rescale_pair(*other);
        let product = i128::from(a)
            .checked_mul(i128::from(b))
            .ok_or_else(|| Error::overflow("money multiplication overflow"))?;
        let scale = i128::from(pow10(frac_digits));
        let val = product
            .checked_div(scale)
            .ok_or_else(|| Error::overflow("money multiplication overflow"))?;
        let val = i64::try_from(val).map_err(|_| Error::overflow("money multiplication overflow"))?;
        Ok(Self { val, frac_digits })
    }

    /// Divides `self` by `other`, rescaling first and multiplying back
    /// the scale factor so the result stays at the same fractional precision.
    pub fn checked_div(&self, other: &Self) -> Result<Self> {
        let (a, b, frac_digits) = self.rescale_pair(*other);
        if b == 0 {
            return Err(Error::domain("division by zero money amount"));
        }
        let scale = i128::from(pow10(frac_digits));
        let val = i128::from(a)
            .checked_mul(scale)
            .ok_or_else(|| Error::overflow("money division overflow"))?
            / i128::from(b);
        let val = i64::try_from(val).map_err(|_| Error::overflow("money division overflow"))?;
        Ok(Self { val, frac_digits })
    }

    /// Converts to a floating-point amount.
    #[must_use]
    pub fn to_f64(&self) -> f64 {
        #[expect(clippy::float_arithmetic, reason = "converting a scaled integer to a decimal amount")]
        let v = self.val as f64 / (pow10(self.frac_digits) as f64);
        v
    }
}

impl PartialEq for Money {
    fn eq(&self, other: &Self) -> bool {
        let (a, b, _) = self.rescale_pair(*other);
        a == b
    }
}

impl Eq for Money {}

impl PartialOrd for Money {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Money {
    fn cmp(&self, other: &Self) -> Ordering {
        let (a, b, _) = self.rescale_pair(*other);
        a.cmp(&b)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scale = pow10(self.frac_digits);
        let whole = self.val / scale;
        let frac = (self.val % scale).abs();
        if self.frac_digits == 0 {
            write!(f, "{whole}")
        } else {
            write!(f, "{whole}.{frac:0width$}", width = usize::from(self.frac_digits))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_i64_and_display() {
        let m = Money::from_i64(42, 2);
        assert_eq!(m.scaled_value(), 4200);
        assert_eq!(m.to_string(), "42.00");
    }

    #[test]
    fn rescale_widens_precision() {
        let m = Money::from_scaled(1250, 2); // 12.50
        let wider = m.to_frac_digits(4);
        assert_eq!(wider.scaled_value(), 125_000);
        assert_eq!(wider.frac_digits(), 4);
    }

    #[test]
    fn add_with_mismatched_frac_digits() {
        let a = Money::from_scaled(100, 2); // 1.00
        let b = Money::from_scaled(5, 1); // 0.5
        let sum = a.checked_add(&b).unwrap();
        assert_eq!(sum.to_string(), "1.50");
    }

    #[test]
    fn div_by_zero_is_domain_error() {
        let a = Money::from_i64(10, 2);
        let b = Money::from_i64(0, 2);
        assert!(matches!(a.checked_div(&b), Err(Error::DomainError(_))));
    }

    #[test]
    fn equality_is_scale_independent() {
        let a = Money::from_scaled(100, 2);
        let b = Money::from_scaled(1000, 3);
        assert_eq!(a, b);
    }
}
