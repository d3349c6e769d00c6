//! Geometric types: `point`, `line`, `lseg`, `box`, `path`, `polygon`,
//! `circle`.
//!
//! Binary layouts follow PostgreSQL's `geo_decls.c`: a `point` is two
//! big-endian `f64`s; composite shapes are a count (where variable-length)
//! followed by that many points, with `path` additionally prefixing a
//! closed/open byte.

use std::fmt;

use crate::error::{Error, Result};
use crate::protocol::types::{Oid, oid};

use super::{FromWireValue, ToWireValue};

fn read_f64(bytes: &[u8], off: usize) -> Result<f64> {
    let arr: [u8; 8] = bytes
        .get(off..off + 8)
        .ok_or_else(|| Error::Decode("geometric value truncated".into()))?
        .try_into()
        .map_err(|_| Error::Decode("geometric value truncated".into()))?;
    Ok(f64::from_be_bytes(arr))
}

fn parse_floats(s: &str) -> Result<Vec<f64>> {
    s.trim_matches(|c| c == '(' || c == ')' || c == '[' || c == ']' || c == '<' || c == '>')
        .split(',')
        .map(|part| {
            part.trim()
                .parse()
                .map_err(|_| Error::Decode(format!("invalid geometric value: {}", s)))
        })
        .collect()
}

/// A point `(x, y)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.x, self.y)
    }
}

impl FromWireValue<'_> for Point {
    fn from_text(oid: Oid, bytes: &[u8]) -> Result<Self> {
        if oid != oid::POINT {
            return Err(Error::Decode(format!("cannot decode oid {} as Point", oid)));
        }
        let s = simdutf8::compat::from_utf8(bytes)
            .map_err(|e| Error::Decode(format!("invalid UTF-8: {}", e)))?;
        let v = parse_floats(s)?;
        if v.len() != 2 {
            return Err(Error::Decode(format!("invalid point: {}", s)));
        }
        Ok(Point::new(v[0], v[1]))
    }

    fn from_binary(oid: Oid, bytes: &[u8]) -> Result<Self> {
        if oid != oid::POINT {
            return Err(Error::Decode(format!("cannot decode oid {} as Point", oid)));
        }
        Ok(Point::new(read_f64(bytes, 0)?, read_f64(bytes, 8)?))
    }
}

impl ToWireValue for Point {
    fn natural_oid(&self) -> Oid {
        oid::POINT
    }

    fn encode(&self, target_oid: Oid, buf: &mut Vec<u8>) -> Result<()> {
        match target_oid {
            oid::POINT => {
                buf.extend_from_slice(&16_i32.to_be_bytes());
                buf.extend_from_slice(&self.x.to_be_bytes());
                buf.extend_from_slice(&self.y.to_be_bytes());
                Ok(())
            }
            _ => Err(Error::type_mismatch(self.natural_oid(), target_oid)),
        }
    }
}

/// An infinite line `ax + by + c = 0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Line {
    pub a: f64,
    pub b: f64,
    pub c: f64,
}

impl FromWireValue<'_> for Line {
    fn from_text(oid: Oid, bytes: &[u8]) -> Result<Self> {
        if oid != oid::LINE {
            return Err(Error::Decode(format!("cannot decode oid {} as Line", oid)));
        }
        let s = simdutf8::compat::from_utf8(bytes)
            .map_err(|e| Error::Decode(format!("invalid UTF-8: {}", e)))?;
        let v = parse_floats(s.trim_start_matches('{').trim_end_matches('}'))?;
        if v.len() != 3 {
            return Err(Error::Decode(format!("invalid line: {}", s)));
        }
        Ok(Line { a: v[0], b: v[1], c: v[2] })
    }

    fn from_binary(oid: Oid, bytes: &[u8]) -> Result<Self> {
        if oid != oid::LINE {
            return Err(Error::Decode(format!("cannot decode oid {} as Line", oid)));
        }
        Ok(Line {
            a: read_f64(bytes, 0)?,
            b: read_f64(bytes, 8)?,
            c: read_f64(bytes, 16)?,
        })
    }
}

impl ToWireValue for Line {
    fn natural_oid(&self) -> Oid {
        oid::LINE
    }

    fn encode(&self, target_oid: Oid, buf: &mut Vec<u8>) -> Result<()> {
        match target_oid {
            oid::LINE => {
                buf.extend_from_slice(&24_i32.to_be_bytes());
                buf.extend_from_slice(&self.a.to_be_bytes());
                buf.extend_from_slice(&self.b.to_be_bytes());
                buf.extend_from_slice(&self.c.to_be_bytes());
                Ok(())
            }
            _ => Err(Error::type_mismatch(self.natural_oid(), target_oid)),
        }
    }
}

/// A line segment between two points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LSeg {
    pub p1: Point,
    pub p2: Point,
}

impl FromWireValue<'_> for LSeg {
    fn from_text(oid: Oid, bytes: &[u8]) -> Result<Self> {
        if oid != oid::LSEG {
            return Err(Error::Decode(format!("cannot decode oid {} as LSeg", oid)));
        }
        let s = simdutf8::compat::from_utf8(bytes)
            .map_err(|e| Error::Decode(format!("invalid UTF-8: {}", e)))?;
        let v = parse_floats(s.trim_start_matches('[').trim_end_matches(']'))?;
        if v.len() != 4 {
            return Err(Error::Decode(format!("invalid lseg: {}", s)));
        }
        Ok(LSeg {
            p1: Point::new(v[0], v[1]),
            p2: Point::new(v[2], v[3]),
        })
    }

    fn from_binary(oid: Oid, bytes: &[u8]) -> Result<Self> {
        if oid != oid::LSEG {
            return Err(Error::Decode(format!("cannot decode oid {} as LSeg", oid)));
        }
        Ok(LSeg {
            p1: Point::new(read_f64(bytes, 0)?, read_f64(bytes, 8)?),
            p2: Point::new(read_f64(bytes, 16)?, read_f64(bytes, 24)?),
        })
    }
}

impl ToWireValue for LSeg {
    fn natural_oid(&self) -> Oid {
        oid::LSEG
    }

    fn encode(&self, target_oid: Oid, buf: &mut Vec<u8>) -> Result<()> {
        match target_oid {
            oid::LSEG => {
                buf.extend_from_slice(&32_i32.to_be_bytes());
                buf.extend_from_slice(&self.p1.x.to_be_bytes());
                buf.extend_from_slice(&self.p1.y.to_be_bytes());
                buf.extend_from_slice(&self.p2.x.to_be_bytes());
                buf.extend_from_slice(&self.p2.y.to_be_bytes());
                Ok(())
            }
            _ => Err(Error::type_mismatch(self.natural_oid(), target_oid)),
        }
    }
}

/// An axis-aligned rectangle, stored as its upper-right and lower-left
/// corners (PostgreSQL always normalizes to this order on output).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub high: Point,
    pub low: Point,
}

impl FromWireValue<'_> for BoundingBox {
    fn from_text(oid: Oid, bytes: &[u8]) -> Result<Self> {
        if oid != oid::BOX {
            return Err(Error::Decode(format!("cannot decode oid {} as BoundingBox", oid)));
        }
        let s = simdutf8::compat::from_utf8(bytes)
            .map_err(|e| Error::Decode(format!("invalid UTF-8: {}", e)))?;
        let v = parse_floats(s)?;
        if v.len() != 4 {
            return Err(Error::Decode(format!("invalid box: {}", s)));
        }
        Ok(BoundingBox {
            high: Point::new(v[0], v[1]),
            low: Point::new(v[2], v[3]),
        })
    }

    fn from_binary(oid: Oid, bytes: &[u8]) -> Result<Self> {
        if oid != oid::BOX {
            return Err(Error::Decode(format!("cannot decode oid {} as BoundingBox", oid)));
        }
        Ok(BoundingBox {
            high: Point::new(read_f64(bytes, 0)?, read_f64(bytes, 8)?),
            low: Point::new(read_f64(bytes, 16)?, read_f64(bytes, 24)?),
        })
    }
}

impl ToWireValue for BoundingBox {
    fn natural_oid(&self) -> Oid {
        oid::BOX
    }

    fn encode(&self, target_oid: Oid, buf: &mut Vec<u8>) -> Result<()> {
        match target_oid {
            oid::BOX => {
                buf.extend_from_slice(&32_i32.to_be_bytes());
                buf.extend_from_slice(&self.high.x.to_be_bytes());
                buf.extend_from_slice(&self.high.y.to_be_bytes());
                buf.extend_from_slice(&self.low.x.to_be_bytes());
                buf.extend_from_slice(&self.low.y.to_be_bytes());
                Ok(())
            }
            _ => Err(Error::type_mismatch(self.natural_oid(), target_oid)),
        }
    }
}

/// An open or closed sequence of points.
#[derive(Debug, Clone, PartialEq)]
pub struct Path {
    pub points: Vec<Point>,
    pub closed: bool,
}

impl FromWireValue<'_> for Path {
    fn from_text(oid: Oid, bytes: &[u8]) -> Result<Self> {
        if oid != oid::PATH {
            return Err(Error::Decode(format!("cannot decode oid {} as Path", oid)));
        }
        let s = simdutf8::compat::from_utf8(bytes)
            .map_err(|e| Error::Decode(format!("invalid UTF-8: {}", e)))?;
        let closed = s.starts_with('(');
        let v = parse_floats(s.trim_start_matches(['(', '[']).trim_end_matches([')', ']']))?;
        if v.len() % 2 != 0 {
            return Err(Error::Decode(format!("invalid path: {}", s)));
        }
        let points = v.chunks_exact(2).map(|c| Point::new(c[0], c[1])).collect();
        Ok(Path { points, closed })
    }

    fn from_binary(oid: Oid, bytes: &[u8]) -> Result<Self> {
        if oid != oid::PATH {
            return Err(Error::Decode(format!("cannot decode oid {} as Path", oid)));
        }
        if bytes.is_empty() {
            return Err(Error::Decode("empty path value".into()));
        }
        let closed = bytes[0] != 0;
        let npoints = i32::from_be_bytes(
            bytes
                .get(1..5)
                .ok_or_else(|| Error::Decode("path value truncated".into()))?
                .try_into()
                .map_err(|_| Error::Decode("path value truncated".into()))?,
        );
        let npoints = usize::try_from(npoints).map_err(|_| Error::Decode("negative path length".into()))?;
        let mut points = Vec::with_capacity(npoints);
        for i in 0..npoints {
            let off = 5 + i * 16;
            points.push(Point::new(read_f64(bytes, off)?, read_f64(bytes, off + 8)?));
        }
        Ok(Path { points, closed })
    }
}

impl ToWireValue for Path {
    fn natural_oid(&self) -> Oid {
        oid::PATH
    }

    fn encode(&self, target_oid: Oid, buf: &mut Vec<u8>) -> Result<()> {
        match target_oid {
            oid::PATH => {
                let data_len = 5 + self.points.len() * 16;
                buf.extend_from_slice(&(data_len as i32).to_be_bytes());
                buf.push(u8::from(self.closed));
                buf.extend_from_slice(&(self.points.len() as i32).to_be_bytes());
                for p in &self.points {
                    buf.extend_from_slice(&p.x.to_be_bytes());
                    buf.extend_from_slice(&p.y.to_be_bytes());
                }
                Ok(())
            }
            _ => Err(Error::type_mismatch(self.natural_oid(), target_oid)),
        }
    }
}

/// A closed sequence of points.
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    pub points: Vec<Point>,
}

impl FromWireValue<'_> for Polygon {
    fn from_text(oid: Oid, bytes: &[u8]) -> Result<Self> {
        if oid != oid::POLYGON {
            return Err(Error::Decode(format!("cannot decode oid {} as Polygon", oid)));
        }
        let s = simdutf8::compat::from_utf8(bytes)
            .map_err(|e| Error::Decode(format!("invalid UTF-8: {}", e)))?;
        let v = parse_floats(s)?;
        if v.len() % 2 != 0 {
            return Err(Error::Decode(format!("invalid polygon: {}", s)));
        }
        let points = v.chunks_exact(2).map(|c| Point::new(c[0], c[1])).collect();
        Ok(Polygon { points })
    }

    fn from_binary(oid: Oid, bytes: &[u8]) -> Result<Self> {
        if oid != oid::POLYGON {
            return Err(Error::Decode(format!("cannot decode oid {} as Polygon", oid)));
        }
        let npoints = i32::from_be_bytes(
            bytes
                .get(0..4)
                .ok_or_else(|| Error::Decode("polygon value truncated".into()))?
                .try_into()
                .map_err(|_| Error::Decode("polygon value truncated".into()))?,
        );
        let npoints = usize::try_from(npoints).map_err(|_| Error::Decode("negative polygon length".into()))?;
        let mut points = Vec::with_capacity(npoints);
        for i in 0..npoints {
            let off = 4 + i * 16;
            points.push(Point::new(read_f64(bytes, off)?, read_f64(bytes, off + 8)?));
        }
        Ok(Polygon { points })
    }
}

impl ToWireValue for Polygon {
    fn natural_oid(&self) -> Oid {
        oid::POLYGON
    }

    fn encode(&self, target_oid: Oid, buf: &mut Vec<u8>) -> Result<()> {
        match target_oid {
            oid::POLYGON => {
                let data_len = 4 + self.points.len() * 16;
                buf.extend_from_slice(&(data_len as i32).to_be_bytes());
                buf.extend_from_slice(&(self.points.len() as i32).to_be_bytes());
                for p in &self.points {
                    buf.extend_from_slice(&p.x.to_be_bytes());
                    buf.extend_from_slice(&p.y.to_be_bytes());
                }
                Ok(())
            }
            _ => Err(Error::type_mismatch(self.natural_oid(), target_oid)),
        }
    }
}

/// A circle: center point and radius.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Circle {
    pub center: Point,
    pub radius: f64,
}

impl FromWireValue<'_> for Circle {
    fn from_text(oid: Oid, bytes: &[u8]) -> Result<Self> {
        if oid != oid::CIRCLE {
            return Err(Error::Decode(format!("cannot decode oid {} as Circle", oid)));
        }
        let s = simdutf8::compat::from_utf8(bytes)
            .map_err(|e| Error::Decode(format!("invalid UTF-8: {}", e)))?;
        let v = parse_floats(s.trim_start_matches('<').trim_end_matches('>'))?;
        if v.len() != 3 {
            return Err(Error::Decode(format!("invalid circle: {}", s)));
        }
        Ok(Circle {
            center: Point::new(v[0], v[1]),
            radius: v[2],
        })
    }

    fn from_binary(oid: Oid, bytes: &[u8]) -> Result<Self> {
        if oid != oid::CIRCLE {
            return Err(Error::Decode(format!("cannot decode oid {} as Circle", oid)));
        }
        Ok(Circle {
            center: Point::new(read_f64(bytes, 0)?, read_f64(bytes, 8)?),
            radius: read_f64(bytes, 16)?,
        })
    }
}

impl ToWireValue for Circle {
    fn natural_oid(&self) -> Oid {
        oid::CIRCLE
    }

    fn encode(&self, target_oid: Oid, buf: &mut Vec<u8>) -> Result<()> {
        match target_oid {
            oid::CIRCLE => {
                buf.extend_from_slice(&24_i32.to_be_bytes());
                buf.extend_from_slice(&self.center.x.to_be_bytes());
                buf.extend_from_slice(&self.center.y.to_be_bytes());
                buf.extend_from_slice(&self.radius.to_be_bytes());
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
    fn point_binary_roundtrip() {
        let original = Point::new(1.5, -2.25);
        let mut buf = Vec::new();
        original.encode(original.natural_oid(), &mut buf).unwrap();
        let decoded = Point::from_binary(oid::POINT, &buf[4..]).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn point_text() {
        let p = Point::from_text(oid::POINT, b"(3,4)").unwrap();
        assert_eq!(p, Point::new(3.0, 4.0));
    }

    #[test]
    fn path_binary_roundtrip_closed() {
        let original = Path {
            points: vec![Point::new(0.0, 0.0), Point::new(1.0, 1.0)],
            closed: true,
        };
        let mut buf = Vec::new();
        original.encode(original.natural_oid(), &mut buf).unwrap();
        let decoded = Path::from_binary(oid::PATH, &buf[4..]).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn polygon_text() {
        let poly = Polygon::from_text(oid::POLYGON, b"((0,0),(1,0),(1,1))").unwrap();
        assert_eq!(poly.points.len(), 3);
    }

    #[test]
    fn circle_binary_roundtrip() {
        let original = Circle {
            center: Point::new(0.0, 0.0),
            radius: 5.0,
        };
        let mut buf = Vec::new();
        original.encode(original.natural_oid(), &mut buf).unwrap();
        let decoded = Circle::from_binary(oid::CIRCLE, &buf[4..]).unwrap();
        assert_eq!(decoded, original);
    }
}
