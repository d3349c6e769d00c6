//! Generic array codec (`ARRAY[...]` / `int4[]`, `text[]`, ...).
//!
//! Binary layout: `ndim(i32) | has_null_flag(i32) | elem_oid(i32)` followed
//! by `ndim` pairs of `(dim_size(i32), lower_bound(i32))`, then the
//! elements in row-major order, each individually length-prefixed (`-1`
//! for NULL) exactly like a standalone value of the element type.

use crate::error::{Error, Result};
use crate::protocol::types::{Oid, array_oid_for_element};

use super::{FromWireValue, ToWireValue};

/// A PostgreSQL array, generic over its element type.
///
/// Only one-dimensional arrays are constructible directly; multi-dimensional
/// arrays can still be decoded (`dims` reflects the server's shape) but are
/// read back out as a flat, row-major `Vec`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Array<T> {
    dims: Vec<(i32, i32)>,
    elements: Vec<Option<T>>,
}

impl<T> Array<T> {
    /// Builds a one-dimensional array with a lower bound of 1, matching
    /// PostgreSQL's default array indexing.
    #[must_use]
    pub fn from_vec(elements: Vec<T>) -> Self {
        let len = elements.len() as i32;
        Self {
            dims: vec![(len, 1)],
            elements: elements.into_iter().map(Some).collect(),
        }
    }

    /// Builds a one-dimensional array that may contain NULL elements.
    #[must_use]
    pub fn from_vec_nullable(elements: Vec<Option<T>>) -> Self {
        let len = elements.len() as i32;
        Self {
            dims: vec![(len, 1)],
            elements,
        }
    }

    #[must_use]
    pub fn dims(&self) -> &[(i32, i32)] {
        &self.dims
    }

    #[must_use]
    pub fn elements(&self) -> &[Option<T>] {
        &self.elements
    }

    pub fn into_elements(self) -> Vec<Option<T>> {
        self.elements
    }
}

impl<'a, T> FromWireValue<'a> for Array<T>
where
    T: FromWireValue<'a>,
{
    fn from_text(_oid: Oid, _bytes: &'a [u8]) -> Result<Self> {
        Err(Error::UnsupportedFormat {
            oid: _oid,
            format: "text array literal decoding is not implemented; use binary format",
        })
    }

    fn from_binary(_oid: Oid, bytes: &'a [u8]) -> Result<Self> {
        let read_i32 = |off: usize| -> Result<i32> {
            bytes
                .get(off..off + 4)
                .and_then(|s| s.try_into().ok())
                .map(i32::from_be_bytes)
                .ok_or_else(|| Error::Decode("array value truncated".into()))
        };

        let ndim = read_i32(0)?;
        let ndim = usize::try_from(ndim).map_err(|_| Error::Decode("negative array ndim".into()))?;
        let _has_null = read_i32(4)?;
        let elem_oid = read_i32(8)? as Oid;

        let mut pos = 12;
        let mut dims = Vec::with_capacity(ndim);
        let mut total: usize = 1;
        for _ in 0..ndim {
            let size = read_i32(pos)?;
            let lower = read_i32(pos + 4)?;
            pos += 8;
            total = total
                .checked_mul(usize::try_from(size).map_err(|_| Error::Decode("negative array dim".into()))?)
                .ok_or_else(|| Error::Decode("array dimensions overflow".into()))?;
            dims.push((size, lower));
        }
        if ndim == 0 {
            return Ok(Array { dims: vec![(0, 1)], elements: Vec::new() });
        }

        let mut elements = Vec::with_capacity(total);
        for _ in 0..total {
            let len = read_i32(pos)?;
            pos += 4;
            if len < 0 {
                elements.push(None);
                continue;
            }
            let len = len as usize;
            let elem_bytes = bytes
                .get(pos..pos + len)
                .ok_or_else(|| Error::Decode("array value truncated".into()))?;
            pos += len;
            elements.push(Some(T::from_binary(elem_oid, elem_bytes)?));
        }

        Ok(Array { dims, elements })
    }
}

impl<T> ToWireValue for Array<T>
where
    T: ToWireValue,
{
    fn natural_oid(&self) -> Oid {
        self.elements
            .iter()
            .flatten()
            .next()
            .and_then(|v| array_oid_for_element(v.natural_oid()))
            .unwrap_or(0)
    }

    fn encode(&self, target_oid: Oid, buf: &mut Vec<u8>) -> Result<()> {
        let elem_oid = self
            .elements
            .iter()
            .flatten()
            .next()
            .map(|v| v.natural_oid())
            .unwrap_or(0);

        let mut body = Vec::new();
        body.extend_from_slice(&(self.dims.len() as i32).to_be_bytes());
        let has_null = i32::from(self.elements.iter().any(Option::is_none));
        body.extend_from_slice(&has_null.to_be_bytes());
        body.extend_from_slice(&elem_oid.to_be_bytes());
        for (size, lower) in &self.dims {
            body.extend_from_slice(&size.to_be_bytes());
            body.extend_from_slice(&lower.to_be_bytes());
        }
        for elem in &self.elements {
            match elem {
                None => body.extend_from_slice(&(-1_i32).to_be_bytes()),
                Some(v) => v.encode(elem_oid, &mut body)?,
            }
        }

        let _ = target_oid;
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
    fn int4_array_roundtrip() {
        let original = Array::from_vec(vec![1_i32, 2, 3]);
        let mut buf = Vec::new();
        original.encode(oid::INT4_ARRAY, &mut buf).unwrap();
        let decoded = Array::<i32>::from_binary(oid::INT4_ARRAY, &buf[4..]).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn nullable_array_roundtrip() {
        let original = Array::from_vec_nullable(vec![Some(1_i32), None, Some(3)]);
        let mut buf = Vec::new();
        original.encode(oid::INT4_ARRAY, &mut buf).unwrap();
        let decoded = Array::<i32>::from_binary(oid::INT4_ARRAY, &buf[4..]).unwrap();
        assert_eq!(decoded, original);
    }
}
