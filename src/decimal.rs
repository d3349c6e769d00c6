//! Self-contained arbitrary-precision decimal.
//!
//! Mirrors PostgreSQL's `numeric` internal representation: sign-magnitude,
//! digits stored in base 10000 (`NBASE`), most significant digit first.
//! `weight` is the power of `NBASE` carried by the first digit; `dscale` is
//! the number of decimal places the value is displayed/rounded to.
//!
//! This type does not depend on `rust_decimal` — the wire format's digit
//! grouping is awkward to round-trip exactly through a fixed 96-bit mantissa,
//! so the representation here stores the same base-10000 digit array
//! PostgreSQL itself uses.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

const NBASE: i64 = 10_000;
const DEC_DIGITS: u32 = 4;
const DIV_GUARD_DIGITS: usize = 4;
/// Mirrors `NUMERIC_MAX_RESULT_SCALE` from the original numeric engine.
const MAX_RESULT_SCALE: u16 = 2000;
/// Mirrors `NUMERIC_MIN_SIG_DIGITS`: the minimum number of significant
/// digits `log`/`pow` aim to leave in their result.
const MIN_SIG_DIGITS: i32 = 16;
/// `log10(e)`, used only to size working scales for `exp`/`pow`, never to
/// compute the value itself.
const LOG10_E: f64 = 0.434294481903252;
/// `log10(2)`, used only to size working scales for `exp`.
const LOG10_2: f64 = 0.301029995663981;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Sign {
    Positive,
    Negative,
    Nan,
}

/// Arbitrary-precision signed decimal number.
#[derive(Debug, Clone)]
pub struct Decimal {
    sign: Sign,
    weight: i32,
    dscale: u16,
    /// Base-10000 digits, most significant first. Empty iff the value is
    /// zero (and `sign` is `Positive`).
    digits: Vec<i16>,
}

impl Decimal {
    /// The value `0`.
    pub fn zero() -> Self {
        Self {
            sign: Sign::Positive,
            weight: 0,
            dscale: 0,
            digits: Vec::new(),
        }
    }

    /// Not-a-number.
    pub fn nan() -> Self {
        Self {
            sign: Sign::Nan,
            weight: 0,
            dscale: 0,
            digits: Vec::new(),
        }
    }

    /// True if this value is NaN.
    pub fn is_nan(&self) -> bool {
        self.sign == Sign::Nan
    }

    /// True if this value is exactly zero.
    pub fn is_zero(&self) -> bool {
        self.sign != Sign::Nan && self.digits.is_empty()
    }

    /// True if this value is strictly negative.
    pub fn is_negative(&self) -> bool {
        self.sign == Sign::Negative && !self.is_zero()
    }

    /// Number of digits after the decimal point this value displays with.
    pub fn dscale(&self) -> u16 {
        self.dscale
    }

    /// Build a value directly from NUMERIC wire-format components.
    pub(crate) fn from_wire_parts(negative: bool, weight: i32, dscale: u16, digits: Vec<i16>) -> Self {
        let mut v = Self {
            sign: if negative { Sign::Negative } else { Sign::Positive },
            weight,
            dscale,
            digits,
        };
        v.strip();
        v.dscale = dscale;
        v
    }

    /// Decompose into NUMERIC wire-format components: `(negative, weight, dscale, digits)`.
    pub(crate) fn wire_parts(&self) -> (bool, i32, u16, &[i16]) {
        (self.is_negative(), self.weight, self.dscale, &self.digits)
    }

    fn zero_with_dscale(dscale: u16) -> Self {
        Self {
            sign: Sign::Positive,
            weight: 0,
            dscale,
            digits: Vec::new(),
        }
    }

    /// Internal: base-10000 digits as `i64` for arithmetic headroom.
    fn digits_i64(&self) -> Vec<i64> {
        self.digits.iter().map(|&d| d as i64).collect()
    }

    /// Remove leading and trailing zero digit groups, adjusting `weight`.
    fn strip(&mut self) {
        if self.digits.is_empty() {
            self.weight = 0;
            if self.sign != Sign::Nan {
                self.sign = Sign::Positive;
            }
            return;
        }
        let mut start = 0;
        while start < self.digits.len() && self.digits[start] == 0 {
            start += 1;
            self.weight -= 1;
        }
        let mut end = self.digits.len();
        while end > start && self.digits[end - 1] == 0 {
            end -= 1;
        }
        if start >= end {
            self.digits.clear();
            self.weight = 0;
            self.sign = Sign::Positive;
        } else {
            self.digits = self.digits[start..end].to_vec();
        }
    }

    /// Parse the magnitude-and-sign digit string into base-10000 digits.
    fn from_decimal_string(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("nan") {
            return Ok(Self::nan());
        }
        let mut chars = s.chars().peekable();
        let negative = match chars.peek() {
            Some('+') => {
                chars.next();
                false
            }
            Some('-') => {
                chars.next();
                true
            }
            _ => false,
        };

        let rest: String = chars.collect();
        let (mantissa, exponent) = match rest.find(['e', 'E']) {
            Some(pos) => {
                let (m, e) = rest.split_at(pos);
                let exp: i32 = e[1..]
                    .parse()
                    .map_err(|_| Error::Decode(format!("invalid decimal exponent: {s}")))?;
                (m.to_string(), exp)
            }
            None => (rest, 0),
        };

        let (int_part, frac_part) = match mantissa.split_once('.') {
            Some((i, f)) => (i, f),
            None => (mantissa.as_str(), ""),
        };
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(Error::Decode(format!("invalid decimal literal: {s}")));
        }
        if !int_part.bytes().all(|b| b.is_ascii_digit())
            || !frac_part.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(Error::Decode(format!("invalid decimal literal: {s}")));
        }

        // All significant decimal digits, with `point_pos` marking where the
        // decimal point falls (from the left), before exponent adjustment.
        let mut all_digits: Vec<u8> = int_part
            .bytes()
            .chain(frac_part.bytes())
            .map(|b| b - b'0')
            .collect();
        let mut point_pos = int_part.len() as i32 + exponent;

        // dscale is the number of displayed fractional digits (text input
        // scale, not rounded) after exponent shifting.
        let dscale_signed = frac_part.len() as i32 - exponent;
        let dscale = dscale_signed.max(0).min(MAX_RESULT_SCALE as i32) as u16;

        // Strip leading zero decimal digits (adjusting point_pos).
        let mut lead = 0;
        while lead < all_digits.len() && all_digits[lead] == 0 {
            lead += 1;
            point_pos -= 1;
        }
        all_digits.drain(..lead);
        // Strip trailing zero decimal digits (doesn't affect point_pos).
        while all_digits.last() == Some(&0) {
            all_digits.pop();
        }
        if all_digits.is_empty() {
            return Ok(Self::zero_with_dscale(dscale));
        }

        // Group decimal digits into base-10000 groups aligned on the decimal
        // point: the first group holds `point_pos mod 4` (or 4) digits.
        let first_group_len = {
            let m = point_pos.rem_euclid(4);
            if m == 0 { 4 } else { m }
        };
        let weight = (point_pos - first_group_len) / 4;

        // Pad on the left so the first group is complete.
        let lead_pad = (first_group_len as usize).saturating_sub(all_digits.len());
        let mut padded = vec![0u8; lead_pad];
        padded.extend_from_slice(&all_digits);
        // Pad on the right so the total length is a multiple of 4.
        while (padded.len() - first_group_len as usize) % 4 != 0 {
            padded.push(0);
        }

        let mut digits = Vec::with_capacity(padded.len() / 4 + 1);
        let mut i = 0usize;
        let mut first = true;
        while i < padded.len() {
            let take = if first { first_group_len as usize } else { 4 };
            let group = &padded[i..i + take];
            let mut value: i16 = 0;
            for &d in group {
                value = value * 10 + d as i16;
            }
            digits.push(value);
            i += take;
            first = false;
        }

        let mut result = Self {
            sign: if negative { Sign::Negative } else { Sign::Positive },
            weight,
            dscale,
            digits,
        };
        result.strip();
        result.dscale = dscale;
        Ok(result)
    }

    /// Format the magnitude (no sign) as a plain decimal string with exactly
    /// `dscale` fractional digits. Mirrors `get_str_from_var()`'s structure.
    fn format_digits(&self) -> String {
        let ndigits = self.digits.len();
        let weight = self.weight;
        let dscale = self.dscale as i32;

        if ndigits == 0 {
            return if dscale > 0 {
                format!("0.{}", "0".repeat(dscale as usize))
            } else {
                "0".to_string()
            };
        }

        let mut result = String::new();
        let int_digits = (weight + 1) * 4;

        if int_digits <= 0 {
            result.push('0');
            result.push('.');
            for _ in 0..(-int_digits) {
                result.push('0');
            }
            let mut frac_written = (-int_digits) as i32;
            for (i, &d) in self.digits.iter().enumerate() {
                let s = format!("{:04}", d);
                if i == ndigits - 1 {
                    for c in s.chars() {
                        if frac_written < dscale {
                            result.push(c);
                            frac_written += 1;
                        }
                    }
                } else {
                    result.push_str(&s);
                    frac_written += 4;
                }
            }
            while frac_written < dscale {
                result.push('0');
                frac_written += 1;
            }
        } else {
            let mut d_idx = 0usize;
            if d_idx < ndigits {
                result.push_str(&self.digits[d_idx].to_string());
                d_idx += 1;
            }
            let full_int_groups = weight as usize;
            while d_idx <= full_int_groups && d_idx < ndigits {
                result.push_str(&format!("{:04}", self.digits[d_idx]));
                d_idx += 1;
            }
            while d_idx <= full_int_groups {
                result.push_str("0000");
                d_idx += 1;
            }
            if dscale > 0 {
                result.push('.');
                let mut frac_written = 0i32;
                while d_idx < ndigits && frac_written < dscale {
                    let s = format!("{:04}", self.digits[d_idx]);
                    for c in s.chars() {
                        if frac_written < dscale {
                            result.push(c);
                            frac_written += 1;
                        }
                    }
                    d_idx += 1;
                }
                while frac_written < dscale {
                    result.push('0');
                    frac_written += 1;
                }
            }
        }

        result
    }

    /// Round (half away from zero) to the given number of decimal places.
    pub fn round_to_scale(&mut self, scale: u16) {
        if self.is_nan() || self.is_zero() {
            self.dscale = scale;
            if self.is_zero() {
                self.digits.clear();
                self.weight = 0;
            }
            return;
        }
        let scale = scale.min(MAX_RESULT_SCALE);
        // Number of base-10000 groups needed to cover `scale` fractional
        // decimal digits, counted from the first digit (weight).
        let needed_len = (self.weight + 1).max(0) as i64 + (scale as i64).div_ceil(4.into());
        let needed_len = needed_len.max(0) as usize;

        if self.digits.len() > needed_len {
            let round_up = {
                // Look at the first digit beyond what we keep, scaled to
                // decide round-half-away-from-zero at decimal granularity.
                let decimals_kept_in_last_group = {
                    let total_decimals_if_kept = (needed_len as i32) * 4 - (self.weight + 1) * 4;
                    total_decimals_if_kept.rem_euclid(4)
                };
                let next_digit = self.digits[needed_len];
                if decimals_kept_in_last_group == 0 {
                    next_digit >= (NBASE / 2) as i16
                } else {
                    let divisor = 10i16.pow(4 - decimals_kept_in_last_group as u32);
                    (next_digit / divisor) >= 5
                }
            };
            self.digits.truncate(needed_len);
            if round_up {
                self.add_one_at_last_digit();
            }
        }
        self.dscale = scale;
        self.strip_trailing_keep_weight();
    }

    /// Truncate (toward zero) to the given number of decimal places.
    pub fn trunc_to_scale(&mut self, scale: u16) {
        if self.is_nan() || self.is_zero() {
            self.dscale = scale;
            return;
        }
        let needed_len = ((self.weight + 1).max(0) as i64 + (scale as i64).div_ceil(4.into())).max(0) as usize;
        if self.digits.len() > needed_len {
            self.digits.truncate(needed_len);
        }
        self.dscale = scale;
        self.strip_trailing_keep_weight();
    }

    fn strip_trailing_keep_weight(&mut self) {
        while self.digits.last() == Some(&0) {
            self.digits.pop();
        }
        if self.digits.is_empty() {
            self.weight = 0;
            self.sign = Sign::Positive;
        }
    }

    fn add_one_at_last_digit(&mut self) {
        let mut carry = 1i16;
        for d in self.digits.iter_mut().rev() {
            *d += carry;
            if *d >= NBASE as i16 {
                *d -= NBASE as i16;
                carry = 1;
            } else {
                carry = 0;
                break;
            }
        }
        if carry > 0 {
            self.digits.insert(0, carry);
            self.weight += 1;
        }
    }

    /// Ceiling: smallest integer >= self.
    pub fn ceil(&self) -> Self {
        if self.is_negative() {
            let mut v = self.clone();
            v.trunc_to_scale(0);
            v
        } else {
            let mut v = self.clone();
            let frac_nonzero = {
                let mut t = self.clone();
                t.trunc_to_scale(0);
                !(t.cmp_abs(self) == Ordering::Equal)
            };
            v.trunc_to_scale(0);
            if frac_nonzero {
                v.add_one_at_last_digit_aligned_int();
            }
            v
        }
    }

    /// Floor: largest integer <= self.
    pub fn floor(&self) -> Self {
        if !self.is_negative() {
            let mut v = self.clone();
            v.trunc_to_scale(0);
            v
        } else {
            let mut t = self.clone();
            t.trunc_to_scale(0);
            let frac_nonzero = t.cmp_abs(self) != Ordering::Equal;
            if frac_nonzero {
                t.add_one_at_last_digit_aligned_int();
            }
            t
        }
    }

    fn add_one_at_last_digit_aligned_int(&mut self) {
        // self is truncated to an integer (dscale 0, weight unchanged);
        // the "last digit" is the units group at index == weight position.
        if self.digits.is_empty() {
            self.digits.push(1);
            self.weight = 0;
            return;
        }
        self.add_one_at_last_digit();
    }

    fn cmp_abs(&self, other: &Self) -> Ordering {
        cmp_abs_digits(self.weight, &self.digits, other.weight, &other.digits)
    }

    fn to_i128_checked(&self) -> Result<i128> {
        if self.is_nan() {
            return Err(Error::domain("NaN has no integer representation"));
        }
        let mut rounded = self.clone();
        rounded.round_to_scale(0);
        let mut value: i128 = 0;
        for &d in &rounded.digits {
            value = value
                .checked_mul(NBASE as i128)
                .and_then(|v| v.checked_add(d as i128))
                .ok_or_else(|| Error::overflow("decimal too large for integer conversion"))?;
        }
        if rounded.is_negative() {
            value = -value;
        }
        Ok(value)
    }

    /// Convert to `i64`, rounding to the nearest integer; errors on overflow.
    pub fn to_i64(&self) -> Result<i64> {
        let v = self.to_i128_checked()?;
        i64::try_from(v).map_err(|_| Error::overflow("decimal does not fit in i64"))
    }

    /// Convert to `i32`, rounding to the nearest integer; errors on overflow.
    pub fn to_i32(&self) -> Result<i32> {
        let v = self.to_i128_checked()?;
        i32::try_from(v).map_err(|_| Error::overflow("decimal does not fit in i32"))
    }

    /// Convert to `f64` (lossy for very high precision values).
    pub fn to_f64(&self) -> f64 {
        if self.is_nan() {
            return f64::NAN;
        }
        let mut result = 0f64;
        for (i, &d) in self.digits.iter().enumerate() {
            let power = self.weight - i as i32;
            result += (d as f64) * (NBASE as f64).powi(power);
        }
        if self.is_negative() {
            -result
        } else {
            result
        }
    }

    fn from_i128(value: i128, dscale: u16) -> Self {
        if value == 0 {
            return Self::zero_with_dscale(dscale);
        }
        let negative = value < 0;
        let mut magnitude = value.unsigned_abs();
        let mut digits = Vec::new();
        while magnitude > 0 {
            digits.push((magnitude % NBASE as u128) as i16);
            magnitude /= NBASE as u128;
        }
        digits.reverse();
        let weight = digits.len() as i32 - 1;
        let mut result = Self {
            sign: if negative { Sign::Negative } else { Sign::Positive },
            weight,
            dscale,
            digits,
        };
        result.strip();
        result.dscale = dscale;
        result
    }

    fn add_magnitudes(a_weight: i32, a: &[i16], b_weight: i32, b: &[i16]) -> (i32, Vec<i16>) {
        let hi_weight = a_weight.max(b_weight);
        let a_offset = (hi_weight - a_weight) as usize;
        let b_offset = (hi_weight - b_weight) as usize;
        let len = (a_offset + a.len()).max(b_offset + b.len());
        let mut out = vec![0i64; len];
        for (i, &d) in a.iter().enumerate() {
            out[a_offset + i] += d as i64;
        }
        for (i, &d) in b.iter().enumerate() {
            out[b_offset + i] += d as i64;
        }
        let mut carry = 0i64;
        for d in out.iter_mut().rev() {
            *d += carry;
            carry = *d / NBASE;
            *d %= NBASE;
        }
        let mut weight = hi_weight;
        if carry > 0 {
            out.insert(0, carry);
            weight += 1;
        }
        (weight, out.into_iter().map(|d| d as i16).collect())
    }

    /// Subtract magnitude `b` from magnitude `a`, assuming `a >= b`.
    fn sub_magnitudes(a_weight: i32, a: &[i16], b_weight: i32, b: &[i16]) -> (i32, Vec<i16>) {
        let hi_weight = a_weight;
        let a_offset = 0usize;
        let b_offset = (a_weight - b_weight) as usize;
        let len = a.len().max(b_offset + b.len());
        let mut out = vec![0i64; len];
        for (i, &d) in a.iter().enumerate() {
            out[a_offset + i] += d as i64;
        }
        for (i, &d) in b.iter().enumerate() {
            out[b_offset + i] -= d as i64;
        }
        let mut borrow = 0i64;
        for d in out.iter_mut().rev() {
            *d -= borrow;
            if *d < 0 {
                *d += NBASE;
                borrow = 1;
            } else {
                borrow = 0;
            }
        }
        (hi_weight, out.into_iter().map(|d| d as i16).collect())
    }

    fn add_signed(a: &Self, b: &Self) -> Self {
        if a.is_nan() || b.is_nan() {
            return Self::nan();
        }
        let dscale = a.dscale.max(b.dscale);
        if a.sign == b.sign || a.is_zero() || b.is_zero() {
            let sign = if a.is_zero() { b.sign } else { a.sign };
            let (weight, digits) = Self::add_magnitudes(a.weight, &a.digits, b.weight, &b.digits);
            let mut r = Self { sign, weight, dscale, digits };
            r.strip();
            r.dscale = dscale;
            r
        } else {
            match a.cmp_abs(b) {
                Ordering::Equal => Self::zero_with_dscale(dscale),
                Ordering::Greater => {
                    let (weight, digits) = Self::sub_magnitudes(a.weight, &a.digits, b.weight, &b.digits);
                    let mut r = Self { sign: a.sign, weight, dscale, digits };
                    r.strip();
                    r.dscale = dscale;
                    r
                }
                Ordering::Less => {
                    let (weight, digits) = Self::sub_magnitudes(b.weight, &b.digits, a.weight, &a.digits);
                    let mut r = Self { sign: b.sign, weight, dscale, digits };
                    r.strip();
                    r.dscale = dscale;
                    r
                }
            }
        }
    }

    /// `self + other`. Returns NaN if either operand is NaN.
    pub fn checked_add(&self, other: &Self) -> Self {
        Self::add_signed(self, other)
    }

    /// `self - other`. Returns NaN if either operand is NaN.
    pub fn checked_sub(&self, other: &Self) -> Self {
        let negated_other = Self {
            sign: match other.sign {
                Sign::Positive => Sign::Negative,
                Sign::Negative => Sign::Positive,
                Sign::Nan => Sign::Nan,
            },
            ..other.clone()
        };
        Self::add_signed(self, &negated_other)
    }

    /// `self * other`.
    pub fn checked_mul(&self, other: &Self) -> Self {
        if self.is_nan() || other.is_nan() {
            return Self::nan();
        }
        let dscale = (self.dscale + other.dscale).min(MAX_RESULT_SCALE);
        if self.is_zero() || other.is_zero() {
            return Self::zero_with_dscale(dscale);
        }
        // Convolve least-significant-digit-first to keep index arithmetic simple,
        // then normalize carries and flip back to most-significant-first.
        let a: Vec<i64> = self.digits_i64().into_iter().rev().collect();
        let b: Vec<i64> = other.digits_i64().into_iter().rev().collect();
        let mut acc = vec![0i64; a.len() + b.len()];
        for (i, &da) in a.iter().enumerate() {
            if da == 0 {
                continue;
            }
            for (j, &db) in b.iter().enumerate() {
                acc[i + j] += da * db;
            }
        }
        let mut carry = 0i64;
        for slot in acc.iter_mut() {
            *slot += carry;
            carry = *slot / NBASE;
            *slot %= NBASE;
        }
        while carry > 0 {
            acc.push(carry % NBASE);
            carry /= NBASE;
        }
        acc.reverse();

        // self.weight is the NBASE-power of a's MSB digit, i.e. a_lsb[last]
        // contributes weight `self.weight - (a.len()-1)`. The LSB-first
        // convolution's index 0 therefore carries weight
        // (self.weight - (a.len()-1)) + (other.weight - (b.len()-1)), and the
        // resulting MSB-first array's first digit carries weight
        // `weight0 + acc.len() - 1` (pre-reverse length).
        let a_len = self.digits.len() as i32;
        let b_len = other.digits.len() as i32;
        let weight0 = (self.weight - (a_len - 1)) + (other.weight - (b_len - 1));
        let weight = weight0 + (acc.len() as i32 - 1);
        let negative = self.is_negative() != other.is_negative();
        let mut result = Self {
            sign: if negative { Sign::Negative } else { Sign::Positive },
            weight,
            dscale,
            digits: acc.into_iter().map(|d| d as i16).collect(),
        };
        result.strip();
        result.dscale = dscale;
        result
    }

    /// `self / other`, rounded to `target_scale` decimal places.
    pub fn checked_div(&self, other: &Self, target_scale: u16) -> Result<Self> {
        if self.is_nan() || other.is_nan() {
            return Ok(Self::nan());
        }
        if other.is_zero() {
            return Err(Error::domain("division by zero"));
        }
        if self.is_zero() {
            return Ok(Self::zero_with_dscale(target_scale));
        }

        let negative = self.is_negative() != other.is_negative();
        let num_digits = self.digits_i64();
        let den_digits = other.digits_i64();

        let frac_nbase_digits = (target_scale as u32).div_ceil(DEC_DIGITS) as usize + DIV_GUARD_DIGITS;
        let total_steps = num_digits.len() + frac_nbase_digits;

        let mut remainder: Vec<i64> = Vec::new();
        let mut quotient: Vec<i64> = Vec::with_capacity(total_steps);
        for i in 0..total_steps {
            let next = if i < num_digits.len() { num_digits[i] } else { 0 };
            remainder.push(next);
            trim_leading_zeros(&mut remainder);

            let q = find_quotient_digit(&remainder, &den_digits);
            if q > 0 {
                let sub = mul_scalar(&den_digits, q);
                remainder = bignum_sub(&remainder, &sub);
            }
            quotient.push(q);
        }

        let mut qweight = self.weight - other.weight;
        let mut start = 0usize;
        while start + 1 < quotient.len() && quotient[start] == 0 {
            start += 1;
            qweight -= 1;
        }
        let quotient = quotient[start..].to_vec();

        let mut result = Self {
            sign: if negative { Sign::Negative } else { Sign::Positive },
            weight: qweight,
            dscale: target_scale,
            digits: quotient.into_iter().map(|d| d as i16).collect(),
        };
        result.strip();
        result.round_to_scale(target_scale);
        Ok(result)
    }

    /// `self % other` (result has the sign of `self`), matching SQL `MOD`/`%`.
    pub fn checked_rem(&self, other: &Self) -> Result<Self> {
        if self.is_nan() || other.is_nan() {
            return Ok(Self::nan());
        }
        if other.is_zero() {
            return Err(Error::domain("division by zero"));
        }
        // self - trunc(self/other) * other, using enough scale to be exact.
        let scale = self.dscale.max(other.dscale).max(MAX_RESULT_SCALE.min(self.implied_exact_scale() + other.implied_exact_scale() + 4));
        let quotient = self.checked_div(other, scale)?;
        let mut truncated = quotient;
        truncated.trunc_to_scale(0);
        let product = truncated.checked_mul(other);
        Ok(self.checked_sub(&product))
    }

    fn implied_exact_scale(&self) -> u16 {
        self.dscale
    }

    /// Square root via Newton's method in decimal arithmetic.
    pub fn sqrt(&self, target_scale: u16) -> Result<Self> {
        if self.is_nan() {
            return Ok(Self::nan());
        }
        if self.is_negative() {
            return Err(Error::domain("square root of a negative number"));
        }
        if self.is_zero() {
            return Ok(Self::zero_with_dscale(target_scale));
        }
        let working_scale = target_scale.saturating_add(8).min(MAX_RESULT_SCALE);
        let two = Self::from(2i64);
        let mut x = Self::from_f64_approx(self.to_f64().sqrt().max(1e-300));
        for _ in 0..60 {
            let quotient = self.checked_div(&x, working_scale)?;
            let sum = x.checked_add(&quotient);
            x = sum.checked_div(&two, working_scale)?;
        }
        x.round_to_scale(target_scale);
        Ok(x)
    }

    fn from_f64_approx(v: f64) -> Self {
        Self::from_decimal_string(&format!("{v:.15}")).unwrap_or_else(|_| Self::zero())
    }

    /// Estimate `log10(|ln(self)|)`, i.e. the decimal weight of the most
    /// significant digit of `ln(self)`. Used only to size the working scale
    /// for [`Decimal::ln`]/[`Decimal::log`]/[`Decimal::pow`] — never to
    /// compute the value itself. Mirrors `estimate_ln_dweight`.
    fn estimate_ln_dweight(&self) -> i32 {
        let zero_point_nine = Self::from_decimal_string("0.9").unwrap();
        let one_point_one = Self::from_decimal_string("1.1").unwrap();
        if *self >= zero_point_nine && *self <= one_point_one {
            // ln(var) has a negative weight here; estimate via ln(1+x) ~= x.
            let x = self.checked_sub(&Self::from(1i64));
            if let Some(&lead) = x.digits.first() {
                x.weight * DEC_DIGITS as i32 + (lead as f64).log10() as i32
            } else {
                0
            }
        } else if let Some(&lead) = self.digits.first() {
            let mut digits = lead as f64;
            let mut dweight = self.weight * DEC_DIGITS as i32;
            if let Some(&second) = self.digits.get(1) {
                digits = digits * NBASE as f64 + second as f64;
                dweight -= DEC_DIGITS as i32;
            }
            let ln_var = digits.ln() + dweight as f64 * std::f64::consts::LN_10;
            ln_var.abs().log10() as i32
        } else {
            0
        }
    }

    /// Natural logarithm, via sqrt-based argument reduction into `(0.9,
    /// 1.1)` followed by the Taylor series for `0.5 * ln((1+z)/(1-z))` where
    /// `z = (x-1)/(x+1)`, computed entirely in exact base-10000 arithmetic.
    /// `to_f64`/digit-weight heuristics size the working scale only.
    /// Mirrors `ln_var`.
    pub fn ln(&self, target_scale: u16) -> Result<Self> {
        if self.is_nan() {
            return Ok(Self::nan());
        }
        if self.is_zero() {
            return Err(Error::domain("cannot take logarithm of zero"));
        }
        if self.is_negative() {
            return Err(Error::domain("cannot take logarithm of a negative number"));
        }

        let zero_point_nine = Self::from_decimal_string("0.9").unwrap();
        let one_point_one = Self::from_decimal_string("1.1").unwrap();
        let one = Self::from(1i64);
        let two = Self::from(2i64);
        let rscale = target_scale as i32;

        let mut x = self.clone();
        let mut fact = two.clone();
        while x <= zero_point_nine || x >= one_point_one {
            let local_rscale = (rscale - x.weight * DEC_DIGITS as i32 / 2 + 8).max(0) as u16;
            x = x.sqrt(local_rscale)?;
            fact = fact.checked_mul(&two);
            fact.round_to_scale(0);
        }

        let local_rscale = (rscale + 8).max(0) as u16;

        let numer = x.checked_sub(&one);
        let denom = x.checked_add(&one);
        let mut result = numer.checked_div(&denom, local_rscale)?;
        let mut z_squared = result.checked_mul(&result);
        z_squared.round_to_scale(local_rscale);
        let mut xx = result.clone();
        let mut ni = one.clone();

        loop {
            ni = ni.checked_add(&two);
            xx = xx.checked_mul(&z_squared);
            xx.round_to_scale(local_rscale);
            let elem = xx.checked_div(&ni, local_rscale)?;

            if elem.is_zero() {
                break;
            }
            result = result.checked_add(&elem);

            let cutoff = result.weight - (local_rscale as i32) * 2 / DEC_DIGITS as i32;
            if elem.weight < cutoff {
                break;
            }
        }

        result = result.checked_mul(&fact);
        result.round_to_scale(target_scale);
        Ok(result)
    }

    /// `e^self`, via argument-halving into `[-0.01, 0.01]` followed by the
    /// Taylor series `1 + x + x^2/2! + x^3/3! + ...`, computed entirely in
    /// exact base-10000 arithmetic. `to_f64` sizes the working scale
    /// (`dweight`, `ndiv2`, `sig_digits`) only. Mirrors `exp_var`.
    pub fn exp(&self, target_scale: u16) -> Result<Self> {
        if self.is_nan() {
            return Ok(Self::nan());
        }

        let mut val = self.to_f64();
        if val.abs() >= MAX_RESULT_SCALE as f64 * 3.0 {
            return Err(Error::overflow("value overflows numeric format"));
        }
        let dweight = (val * LOG10_E) as i32;

        let one = Self::from(1i64);
        let two = Self::from(2i64);

        let mut x = self.clone();
        let mut ndiv2: i32 = 0;
        if val.abs() > 0.01 {
            let mut two_pow = two.clone();
            ndiv2 = 1;
            val /= 2.0;
            while val.abs() > 0.01 {
                ndiv2 += 1;
                val /= 2.0;
                two_pow = two_pow.checked_add(&two_pow);
            }
            let local_rscale = (x.dscale as i32 + ndiv2).max(0) as u16;
            x = x.checked_div(&two_pow, local_rscale)?;
        }

        let sig_digits = (1 + dweight + target_scale as i32 + (ndiv2 as f64 * LOG10_2) as i32).max(0) + 8;
        let local_rscale = (sig_digits - 1).max(0) as u16;

        let mut result = one.checked_add(&x);
        let mut elem = x.checked_mul(&x);
        elem.round_to_scale(local_rscale);
        let mut ni = two.clone();
        elem = elem.checked_div(&ni, local_rscale)?;

        while !elem.is_zero() {
            result = result.checked_add(&elem);
            result.round_to_scale(local_rscale);

            elem = elem.checked_mul(&x);
            elem.round_to_scale(local_rscale);
            ni = ni.checked_add(&one);
            elem = elem.checked_div(&ni, local_rscale)?;
        }

        for _ in 0..ndiv2 {
            let lr = (sig_digits - result.weight * 2 * DEC_DIGITS as i32).max(0) as u16;
            result = result.checked_mul(&result);
            result.round_to_scale(lr);
        }

        result.round_to_scale(target_scale);
        Ok(result)
    }

    /// Logarithm of `self` in the given `base`. Mirrors `log_var`: picks
    /// working scales for the two `ln` calls from `estimate_ln_dweight`
    /// estimates of each operand, then divides.
    pub fn log(&self, base: &Self, target_scale: u16) -> Result<Self> {
        if self.is_nan() || base.is_nan() {
            return Ok(Self::nan());
        }
        if self.is_zero() || self.is_negative() {
            return Err(Error::domain("cannot take logarithm of a non-positive number"));
        }
        if base.is_zero() || base.is_negative() {
            return Err(Error::domain("cannot take logarithm with a non-positive base"));
        }

        let ln_base_dweight = base.estimate_ln_dweight();
        let ln_num_dweight = self.estimate_ln_dweight();
        let result_dweight = ln_num_dweight - ln_base_dweight;

        let rscale = (MIN_SIG_DIGITS - result_dweight)
            .max(base.dscale as i32)
            .max(self.dscale as i32)
            .max(target_scale as i32)
            .max(0)
            .min(MAX_RESULT_SCALE as i32);

        let ln_base_rscale = (rscale + result_dweight - ln_base_dweight + 8).max(0) as u16;
        let ln_num_rscale = (rscale + result_dweight - ln_num_dweight + 8).max(0) as u16;

        let ln_base = base.ln(ln_base_rscale)?;
        let ln_num = self.ln(ln_num_rscale)?;

        ln_num.checked_div(&ln_base, target_scale)
    }

    /// `self ^ exponent` for an integer exponent, by exact repeated squaring.
    pub fn pow_int(&self, exponent: i32) -> Result<Self> {
        if self.is_nan() {
            return Ok(Self::nan());
        }
        if exponent == 0 {
            return Ok(Self::from(1i64));
        }
        if exponent < 0 {
            let positive = self.pow_int(-exponent)?;
            return Self::from(1i64).checked_div(&positive, MAX_RESULT_SCALE);
        }
        let mut result = Self::from(1i64);
        let mut base = self.clone();
        let mut e = exponent as u32;
        while e > 0 {
            if e & 1 == 1 {
                result = result.checked_mul(&base);
            }
            base = base.checked_mul(&base);
            e >>= 1;
        }
        Ok(result)
    }

    /// `self ^ exponent` for a fractional exponent, via
    /// `exp(exponent * ln(self))` at a precision chosen from a low-precision
    /// pre-estimate of the result's weight. Mirrors `power_var`.
    pub fn pow(&self, exponent: &Self, target_scale: u16) -> Result<Self> {
        if self.is_nan() || exponent.is_nan() {
            return Ok(Self::nan());
        }
        let mut e_copy = exponent.clone();
        e_copy.trunc_to_scale(0);
        if e_copy.cmp_abs(exponent) == Ordering::Equal {
            if let Ok(i) = e_copy.to_i32() {
                return self.pow_int(i);
            }
        }
        if self.is_zero() {
            return Ok(Self::zero_with_dscale(target_scale));
        }
        if self.is_negative() {
            return Err(Error::domain("cannot raise a negative number to a non-integer power"));
        }

        let ln_dweight = self.estimate_ln_dweight();
        let coarse_rscale = (8 - ln_dweight).max(0).min(MAX_RESULT_SCALE as i32) as u16;

        let ln_base = self.ln(coarse_rscale)?;
        let ln_num = exponent.checked_mul(&ln_base);

        let val = ln_num.to_f64();
        if val.abs() > MAX_RESULT_SCALE as f64 * 3.01 {
            return Err(Error::overflow("value overflows numeric format"));
        }
        let weight_estimate = (val * LOG10_E) as i32;

        let rscale = (MIN_SIG_DIGITS - weight_estimate)
            .max(self.dscale as i32)
            .max(exponent.dscale as i32)
            .max(target_scale as i32)
            .max(0)
            .min(MAX_RESULT_SCALE as i32);

        let local_rscale = (rscale + weight_estimate - ln_dweight + 8).max(0) as u16;

        let ln_base = self.ln(local_rscale)?;
        let ln_num = exponent.checked_mul(&ln_base);

        ln_num.exp(target_scale)
    }
}

fn trim_leading_zeros(v: &mut Vec<i64>) {
    let mut start = 0;
    while start + 1 < v.len() && v[start] == 0 {
        start += 1;
    }
    if start > 0 {
        v.drain(..start);
    }
}

fn bignum_cmp(a: &[i64], b: &[i64]) -> Ordering {
    let a_trimmed = {
        let mut start = 0;
        while start < a.len() && a[start] == 0 {
            start += 1;
        }
        &a[start..]
    };
    let b_trimmed = {
        let mut start = 0;
        while start < b.len() && b[start] == 0 {
            start += 1;
        }
        &b[start..]
    };
    match a_trimmed.len().cmp(&b_trimmed.len()) {
        Ordering::Equal => a_trimmed.cmp(b_trimmed),
        other => other,
    }
}

fn bignum_sub(a: &[i64], b: &[i64]) -> Vec<i64> {
    let offset = a.len() - b.len();
    let mut out = a.to_vec();
    let mut borrow = 0i64;
    for i in (0..a.len()).rev() {
        let bv = if i >= offset { b[i - offset] } else { 0 };
        let mut v = out[i] - bv - borrow;
        if v < 0 {
            v += NBASE;
            borrow = 1;
        } else {
            borrow = 0;
        }
        out[i] = v;
    }
    trim_leading_zeros(&mut out);
    out
}

fn mul_scalar(a: &[i64], scalar: i64) -> Vec<i64> {
    if scalar == 0 {
        return vec![0];
    }
    let mut out = vec![0i64; a.len() + 1];
    let mut carry = 0i64;
    for (i, &d) in a.iter().enumerate().rev() {
        let v = d * scalar + carry;
        out[i + 1] = v % NBASE;
        carry = v / NBASE;
    }
    out[0] = carry;
    trim_leading_zeros(&mut out);
    out
}

/// Binary search the digit `q` in `0..NBASE` such that `den*q <= remainder < den*(q+1)`.
fn find_quotient_digit(remainder: &[i64], den: &[i64]) -> i64 {
    if bignum_cmp(remainder, den) == Ordering::Less {
        return 0;
    }
    let mut lo = 0i64;
    let mut hi = NBASE - 1;
    while lo < hi {
        let mid = (lo + hi + 1) / 2;
        let candidate = mul_scalar(den, mid);
        if bignum_cmp(&candidate, remainder) != Ordering::Greater {
            lo = mid;
        } else {
            hi = mid - 1;
        }
    }
    lo
}

fn cmp_abs_digits(a_weight: i32, a: &[i16], b_weight: i32, b: &[i16]) -> Ordering {
    if a.is_empty() && b.is_empty() {
        return Ordering::Equal;
    }
    if a.is_empty() {
        return Ordering::Less;
    }
    if b.is_empty() {
        return Ordering::Greater;
    }
    match a_weight.cmp(&b_weight) {
        Ordering::Equal => {
            let len = a.len().max(b.len());
            for i in 0..len {
                let da = a.get(i).copied().unwrap_or(0);
                let db = b.get(i).copied().unwrap_or(0);
                match da.cmp(&db) {
                    Ordering::Equal => continue,
                    other => return other,
                }
            }
            Ordering::Equal
        }
        other => other,
    }
}

impl FromStr for Decimal {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_decimal_string(s)
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_nan() {
            return write!(f, "NaN");
        }
        if self.is_negative() {
            write!(f, "-")?;
        }
        write!(f, "{}", self.format_digits())
    }
}

impl From<i64> for Decimal {
    fn from(value: i64) -> Self {
        Self::from_i128(value as i128, 0)
    }
}

impl From<i32> for Decimal {
    fn from(value: i32) -> Self {
        Self::from(value as i64)
    }
}

impl PartialEq for Decimal {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Decimal {}

impl PartialOrd for Decimal {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Decimal {
    /// NaN sorts after every non-NaN value and equals itself, matching
    /// PostgreSQL's `ORDER BY` treatment of `numeric` NaN.
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.is_nan(), other.is_nan()) {
            (true, true) => return Ordering::Equal,
            (true, false) => return Ordering::Greater,
            (false, true) => return Ordering::Less,
            (false, false) => {}
        }
        if self.is_zero() && other.is_zero() {
            return Ordering::Equal;
        }
        match (self.is_negative(), other.is_negative()) {
            (false, true) => Ordering::Greater,
            (true, false) => Ordering::Less,
            (false, false) => self.cmp_abs(other),
            (true, true) => other.cmp_abs(self),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_display_roundtrip() {
        for s in ["123.45", "-999.999", "0", "0.0001", "100000", "-0.5", "42"] {
            let d: Decimal = s.parse().unwrap();
            assert_eq!(d.to_string(), s, "roundtrip of {s}");
        }
    }

    #[test]
    fn parse_scientific_notation() {
        let d: Decimal = "1.5e3".parse().unwrap();
        assert_eq!(d.to_string(), "1500");
        let d: Decimal = "1.5e-2".parse().unwrap();
        assert_eq!(d.to_string(), "0.015");
    }

    #[test]
    fn nan_parses_and_displays() {
        let d: Decimal = "NaN".parse().unwrap();
        assert!(d.is_nan());
        assert_eq!(d.to_string(), "NaN");
    }

    #[test]
    fn addition_matches_expected() {
        let a: Decimal = "123.45".parse().unwrap();
        let b: Decimal = "0.55".parse().unwrap();
        assert_eq!(a.checked_add(&b).to_string(), "124.00");
    }

    #[test]
    fn subtraction_changes_sign_when_crossing_zero() {
        let a: Decimal = "1.5".parse().unwrap();
        let b: Decimal = "3".parse().unwrap();
        assert_eq!(a.checked_sub(&b).to_string(), "-1.5");
    }

    #[test]
    fn multiplication_matches_expected() {
        let a: Decimal = "12.5".parse().unwrap();
        let b: Decimal = "4".parse().unwrap();
        assert_eq!(a.checked_mul(&b).to_string(), "50.0");
    }

    #[test]
    fn division_matches_expected() {
        let a: Decimal = "10".parse().unwrap();
        let b: Decimal = "4".parse().unwrap();
        let r = a.checked_div(&b, 4).unwrap();
        assert_eq!(r.to_string(), "2.5000");
    }

    #[test]
    fn division_by_zero_is_domain_error() {
        let a: Decimal = "1".parse().unwrap();
        let b = Decimal::zero();
        assert!(matches!(a.checked_div(&b, 2), Err(Error::DomainError(_))));
    }

    #[test]
    fn ordering_treats_nan_as_greatest() {
        let n = Decimal::nan();
        let one: Decimal = "1".parse().unwrap();
        assert!(one < n);
        assert_eq!(n.cmp(&Decimal::nan()), Ordering::Equal);
    }

    #[test]
    fn to_i64_rounds() {
        let d: Decimal = "2.6".parse().unwrap();
        assert_eq!(d.to_i64().unwrap(), 3);
        let d: Decimal = "-2.6".parse().unwrap();
        assert_eq!(d.to_i64().unwrap(), -3);
    }

    #[test]
    fn sqrt_of_perfect_square() {
        let d: Decimal = "4".parse().unwrap();
        let r = d.sqrt(4).unwrap();
        assert_eq!(r.to_string(), "2.0000");
    }

    #[test]
    fn sqrt_of_negative_is_domain_error() {
        let d: Decimal = "-1".parse().unwrap();
        assert!(matches!(d.sqrt(2), Err(Error::DomainError(_))));
    }

    #[test]
    fn pow_int_matches_expected() {
        let d: Decimal = "2".parse().unwrap();
        assert_eq!(d.pow_int(10).unwrap().to_string(), "1024");
    }

    #[test]
    fn floor_and_ceil() {
        let d: Decimal = "-1.5".parse().unwrap();
        assert_eq!(d.floor().to_string(), "-2");
        assert_eq!(d.ceil().to_string(), "-1");
        let d: Decimal = "1.5".parse().unwrap();
        assert_eq!(d.floor().to_string(), "1");
        assert_eq!(d.ceil().to_string(), "2");
    }

    #[test]
    fn ln_of_one_is_zero() {
        let one: Decimal = "1".parse().unwrap();
        let r = one.ln(10).unwrap();
        assert_eq!(r.to_string(), "0.0000000000");
    }

    #[test]
    fn ln_matches_known_value_past_f64_precision() {
        // ln(2) = 0.69314718055994530941723212145818...
        let two: Decimal = "2".parse().unwrap();
        let r = two.ln(30).unwrap();
        assert_eq!(r.to_string(), "0.693147180559945309417232121458");
    }

    #[test]
    fn ln_rejects_non_positive() {
        assert!(matches!(Decimal::zero().ln(4), Err(Error::DomainError(_))));
        let neg: Decimal = "-1".parse().unwrap();
        assert!(matches!(neg.ln(4), Err(Error::DomainError(_))));
    }

    #[test]
    fn exp_of_zero_is_one() {
        let r = Decimal::zero().exp(10).unwrap();
        assert_eq!(r.to_string(), "1.0000000000");
    }

    #[test]
    fn exp_matches_known_value_past_f64_precision() {
        // e = 2.71828182845904523536028747135266...
        let one: Decimal = "1".parse().unwrap();
        let r = one.exp(30).unwrap();
        assert_eq!(r.to_string(), "2.718281828459045235360287471353");
    }

    #[test]
    fn exp_and_ln_are_inverses_at_high_precision() {
        let x: Decimal = "3.14159".parse().unwrap();
        let via_exp_ln = x.ln(40).unwrap().exp(20).unwrap();
        let rounded = {
            let mut v = x.clone();
            v.round_to_scale(20);
            v
        };
        assert_eq!(via_exp_ln.to_string(), rounded.to_string());
    }

    #[test]
    fn log_base_two_of_eight_is_three() {
        let base: Decimal = "2".parse().unwrap();
        let num: Decimal = "8".parse().unwrap();
        let r = num.log(&base, 10).unwrap();
        assert_eq!(r.to_string(), "3.0000000000");
    }

    #[test]
    fn pow_fractional_matches_sqrt() {
        let base: Decimal = "2".parse().unwrap();
        let half: Decimal = "0.5".parse().unwrap();
        let via_pow = base.pow(&half, 20).unwrap();
        let via_sqrt = base.sqrt(20).unwrap();
        assert_eq!(via_pow.to_string(), via_sqrt.to_string());
    }

    #[test]
    fn pow_integer_exponent_still_uses_exact_path() {
        let base: Decimal = "2".parse().unwrap();
        let exponent: Decimal = "10".parse().unwrap();
        assert_eq!(base.pow(&exponent, 4).unwrap().to_string(), "1024.0000");
    }
}
