//! `json` and `jsonb` wire codecs, backed by `serde_json::Value`.

use serde_json::Value;

use crate::error::{Error, Result};
use crate::protocol::types::{Oid, oid};

use super::{FromWireValue, ToWireValue};

/// A `json` column value: text-stored JSON, re-parsed on every read.
#[derive(Debug, Clone, PartialEq)]
pub struct Json(pub Value);

/// A `jsonb` column value: PostgreSQL's decomposed binary JSON storage.
/// On the wire this differs from `json` only by a leading version byte
/// (currently always `1`); the payload itself is still JSON text.
#[derive(Debug, Clone, PartialEq)]
pub struct Jsonb(pub Value);

const JSONB_VERSION: u8 = 1;

impl FromWireValue<'_> for Json {
    fn from_text(oid: Oid, bytes: &[u8]) -> Result<Self> {
        if oid != oid::JSON {
            return Err(Error::Decode(format!("cannot decode oid {} as Json", oid)));
        }
        serde_json::from_slice(bytes)
            .map(Json)
            .map_err(|e| Error::Decode(format!("invalid json: {}", e)))
    }

    fn from_binary(oid: Oid, bytes: &[u8]) -> Result<Self> {
        Self::from_text(oid, bytes)
    }
}

impl ToWireValue for Json {
    fn natural_oid(&self) -> Oid {
        oid::JSON
    }

    fn encode(&self, target_oid: Oid, buf: &mut Vec<u8>) -> Result<()> {
        match target_oid {
            oid::JSON => {
                let text =
                    serde_json::to_vec(&self.0).map_err(|e| Error::Decode(format!("invalid json: {}", e)))?;
                buf.extend_from_slice(&(text.len() as i32).to_be_bytes());
                buf.extend_from_slice(&text);
                Ok(())
            }
            _ => Err(Error::type_mismatch(self.natural_oid(), target_oid)),
        }
    }
}

impl FromWireValue<'_> for Jsonb {
    fn from_text(oid: Oid, bytes: &[u8]) -> Result<Self> {
        if oid != oid::JSONB {
            return Err(Error::Decode(format!("cannot decode oid {} as Jsonb", oid)));
        }
        serde_json::from_slice(bytes)
            .map(Jsonb)
            .map_err(|e| Error::Decode(format!("invalid jsonb: {}", e)))
    }

    fn from_binary(oid: Oid, bytes: &[u8]) -> Result<Self> {
        if oid != oid::JSONB {
            return Err(Error::Decode(format!("cannot decode oid {} as Jsonb", oid)));
        }
        let (version, rest) = bytes
            .split_first()
            .ok_or_else(|| Error::Decode("empty jsonb value".into()))?;
        if *version != JSONB_VERSION {
            return Err(Error::Decode(format!("unsupported jsonb version: {}", version)));
        }
        serde_json::from_slice(rest)
            .map(Jsonb)
            .map_err(|e| Error::Decode(format!("invalid jsonb: {}", e)))
    }
}

impl ToWireValue for Jsonb {
    fn natural_oid(&self) -> Oid {
        oid::JSONB
    }

    fn encode(&self, target_oid: Oid, buf: &mut Vec<u8>) -> Result<()> {
        match target_oid {
            oid::JSONB => {
                let text =
                    serde_json::to_vec(&self.0).map_err(|e| Error::Decode(format!("invalid jsonb: {}", e)))?;
                buf.extend_from_slice(&(1 + text.len() as i32).to_be_bytes());
                buf.push(JSONB_VERSION);
                buf.extend_from_slice(&text);
                Ok(())
            }
            _ => Err(Error::type_mismatch(self.natural_oid(), target_oid)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_text_roundtrip() {
        let original = Json(json!({"a": 1, "b": [1, 2, 3]}));
        let mut buf = Vec::new();
        original.encode(oid::JSON, &mut buf).unwrap();
        let decoded = Json::from_binary(oid::JSON, &buf[4..]).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn jsonb_binary_roundtrip() {
        let original = Jsonb(json!({"nested": {"x": true}}));
        let mut buf = Vec::new();
        original.encode(oid::JSONB, &mut buf).unwrap();
        let decoded = Jsonb::from_binary(oid::JSONB, &buf[4..]).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn jsonb_rejects_bad_version() {
        assert!(Jsonb::from_binary(oid::JSONB, &[9, b'{', b'}']).is_err());
    }
}
