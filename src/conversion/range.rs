//! Generic range type (`int4range`, `numrange`, `daterange`, ...).
//!
//! Binary layout: one flags byte (`RANGE_EMPTY = 0x01`, `RANGE_LB_INC =
//! 0x02`, `RANGE_UB_INC = 0x04`, `RANGE_LB_INF = 0x08`, `RANGE_UB_INF =
//! 0x10`), followed by a length-prefixed lower bound (unless
//! `RANGE_LB_INF`) and a length-prefixed upper bound (unless
//! `RANGE_UB_INF`), each encoded the same way the element type encodes
//! itself as a standalone value.

use crate::error::{Error, Result};
use crate::protocol::types::Oid;

use super::{FromWireValue, ToWireValue};

const RANGE_EMPTY: u8 = 0x01;
const RANGE_LB_INC: u8 = 0x02;
const RANGE_UB_INC: u8 = 0x04;
const RANGE_LB_INF: u8 = 0x08;
const RANGE_UB_INF: u8 = 0x10;

/// One endpoint of a range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Bound<T> {
    /// No bound on this side (extends to +/- infinity).
    Unbounded,
    /// Bounded, including the given value.
    Inclusive(T),
    /// Bounded, excluding the given value.
    Exclusive(T),
}

/// A contiguous range over an orderable element type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Range<T> {
    /// The empty range (contains no values).
    Empty,
    /// A non-empty range with the given lower and upper bounds.
    Bounded { lower: Bound<T>, upper: Bound<T> },
}

impl<T> Range<T> {
    #[must_use]
    pub fn empty() -> Self {
        Range::Empty
    }

    #[must_use]
    pub fn new(lower: Bound<T>, upper: Bound<T>) -> Self {
        Range::Bounded { lower, upper }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, Range::Empty)
    }
}

impl<'a, T> FromWireValue<'a> for Range<T>
where
    T: FromWireValue<'a>,
{
    fn from_text(oid: Oid, bytes: &'a [u8]) -> Result<Self> {
        let range_elem_oid = super::range_element_oid(oid)
            .ok_or_else(|| Error::Decode(format!("oid {} is not a known range type", oid)))?;
        let s = simdutf8::compat::from_utf8(bytes)
            .map_err(|e| Error::Decode(format!("invalid UTF-8: {}", e)))?;
        if s.eq_ignore_ascii_case("empty") {
            return Ok(Range::Empty);
        }
        let lower_inc = s.starts_with('[');
        let upper_inc = s.ends_with(']');
        let inner = s
            .get(1..s.len().saturating_sub(1))
            .ok_or_else(|| Error::Decode(format!("invalid range: {}", s)))?;
        let (lower_s, upper_s) = inner
            .split_once(',')
            .ok_or_else(|| Error::Decode(format!("invalid range: {}", s)))?;

        let lower = if lower_s.is_empty() {
            Bound::Unbounded
        } else {
            let v = T::from_text(range_elem_oid, lower_s.as_bytes())?;
            if lower_inc { Bound::Inclusive(v) } else { Bound::Exclusive(v) }
        };
        let upper = if upper_s.is_empty() {
            Bound::Unbounded
        } else {
            let v = T::from_text(range_elem_oid, upper_s.as_bytes())?;
            if upper_inc { Bound::Inclusive(v) } else { Bound::Exclusive(v) }
        };

        Ok(Range::Bounded { lower, upper })
    }

    fn from_binary(oid: Oid, bytes: &'a [u8]) -> Result<Self> {
        let range_elem_oid = super::range_element_oid(oid)
            .ok_or_else(|| Error::Decode(format!("oid {} is not a known range type", oid)))?;

        let flags = *bytes
            .first()
            .ok_or_else(|| Error::Decode("empty range value".into()))?;
        if flags & RANGE_EMPTY != 0 {
            return Ok(Range::Empty);
        }

        let mut pos = 1;
        let lower = if flags & RANGE_LB_INF != 0 {
            Bound::Unbounded
        } else {
            let len = i32::from_be_bytes(
                bytes
                    .get(pos..pos + 4)
                    .ok_or_else(|| Error::Decode("range value truncated".into()))?
                    .try_into()
                    .map_err(|_| Error::Decode("range value truncated".into()))?,
            );
            let len = usize::try_from(len).map_err(|_| Error::Decode("negative range bound length".into()))?;
            pos += 4;
            let v = T::from_binary(
                range_elem_oid,
                bytes
                    .get(pos..pos + len)
                    .ok_or_else(|| Error::Decode("range value truncated".into()))?,
            )?;
            pos += len;
            if flags & RANGE_LB_INC != 0 {
                Bound::Inclusive(v)
            } else {
                Bound::Exclusive(v)
            }
        };

        let upper = if flags & RANGE_UB_INF != 0 {
            Bound::Unbounded
        } else {
            let len = i32::from_be_bytes(
                bytes
                    .get(pos..pos + 4)
                    .ok_or_else(|| Error::Decode("range value truncated".into()))?
                    .try_into()
                    .map_err(|_| Error::Decode("range value truncated".into()))?,
            );
            let len = usize::try_from(len).map_err(|_| Error::Decode("negative range bound length".into()))?;
            pos += 4;
            let v = T::from_binary(
                range_elem_oid,
                bytes
                    .get(pos..pos + len)
                    .ok_or_else(|| Error::Decode("range value truncated".into()))?,
            )?;
            if flags & RANGE_UB_INC != 0 {
                Bound::Inclusive(v)
            } else {
                Bound::Exclusive(v)
            }
        };

        Ok(Range::Bounded { lower, upper })
    }
}

impl<T> ToWireValue for Range<T>
where
    T: ToWireValue,
{
    fn natural_oid(&self) -> Oid {
        match self {
            Range::Empty => 0,
            Range::Bounded { lower, upper } => {
                let elem_oid = match (lower, upper) {
                    (Bound::Inclusive(v) | Bound::Exclusive(v), _) => v.natural_oid(),
                    (Bound::Unbounded, Bound::Inclusive(v) | Bound::Exclusive(v)) => v.natural_oid(),
                    (Bound::Unbounded, Bound::Unbounded) => 0,
                };
                super::range_oid_for_element(elem_oid).unwrap_or(0)
            }
        }
    }

    fn encode(&self, target_oid: Oid, buf: &mut Vec<u8>) -> Result<()> {
        let elem_oid = super::range_element_oid(target_oid)
            .ok_or_else(|| Error::Decode(format!("oid {} is not a known range type", target_oid)))?;

        let mut body = Vec::new();
        match self {
            Range::Empty => {
                body.push(RANGE_EMPTY);
            }
            Range::Bounded { lower, upper } => {
                let mut flags = 0_u8;
                if matches!(lower, Bound::Inclusive(_)) {
                    flags |= RANGE_LB_INC;
                }
                if matches!(lower, Bound::Unbounded) {
                    flags |= RANGE_LB_INF;
                }
                if matches!(upper, Bound::Inclusive(_)) {
                    flags |= RANGE_UB_INC;
                }
                if matches!(upper, Bound::Unbounded) {
                    flags |= RANGE_UB_INF;
                }
                body.push(flags);

                for bound in [lower, upper] {
                    if let Bound::Inclusive(v) | Bound::Exclusive(v) = bound {
                        let mut vbuf = Vec::new();
                        v.encode(elem_oid, &mut vbuf)?;
                        // vbuf already carries its own 4-byte length prefix
                        body.extend_from_slice(&vbuf);
                    }
                }
            }
        }

        buf.extend_from_slice(&(body.len() as i32).to_be_bytes());
        buf.extend_from_slice(&body);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::types::oid;

    #[test]
    fn empty_range_roundtrip() {
        let original: Range<i32> = Range::empty();
        let mut buf = Vec::new();
        original.encode(oid::INT4RANGE, &mut buf).unwrap();
        let decoded = Range::<i32>::from_binary(oid::INT4RANGE, &buf[4..]).unwrap();
        assert_eq!(decoded, Range::Empty);
    }

    #[test]
    fn bounded_range_roundtrip() {
        let original = Range::new(Bound::Inclusive(1_i32), Bound::Exclusive(10_i32));
        let mut buf = Vec::new();
        original.encode(oid::INT4RANGE, &mut buf).unwrap();
        let decoded = Range::<i32>::from_binary(oid::INT4RANGE, &buf[4..]).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn unbounded_upper_roundtrip() {
        let original = Range::new(Bound::Inclusive(5_i32), Bound::Unbounded);
        let mut buf = Vec::new();
        original.encode(oid::INT4RANGE, &mut buf).unwrap();
        let decoded = Range::<i32>::from_binary(oid::INT4RANGE, &buf[4..]).unwrap();
        assert_eq!(decoded, original);
    }
}
