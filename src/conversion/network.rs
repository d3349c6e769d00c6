//! Network address types: `inet`, `cidr`, `macaddr`, `macaddr8`.
//!
//! The `inet`/`cidr` binary wire format is `family(1) | bits(1) |
//! is_cidr(1) | nb(1) | addr[nb]`, where `family` is `2` for IPv4 and `3`
//! for IPv6 (PostgreSQL's own `PGSQL_AF_INET`/`PGSQL_AF_INET6`, offset
//! from the platform's `AF_INET`) and `nb` is the address length in bytes
//! (4 or 16).

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use crate::error::{Error, Result};
use crate::protocol::types::{Oid, oid};

use super::{FromWireValue, ToWireValue};

const PGSQL_AF_INET: u8 = 2;
const PGSQL_AF_INET6: u8 = 3;

fn family_of(addr: &IpAddr) -> u8 {
    match addr {
        IpAddr::V4(_) => PGSQL_AF_INET,
        IpAddr::V6(_) => PGSQL_AF_INET6,
    }
}

fn max_bits(addr: &IpAddr) -> u8 {
    match addr {
        IpAddr::V4(_) => 32,
        IpAddr::V6(_) => 128,
    }
}

fn decode_network(bytes: &[u8]) -> Result<(IpAddr, u8, bool)> {
    if bytes.len() < 4 {
        return Err(Error::Decode(format!(
            "invalid inet/cidr length: {}",
            bytes.len()
        )));
    }
    let family = bytes[0];
    let bits = bytes[1];
    let is_cidr = bytes[2] != 0;
    let nb = bytes[3] as usize;
    let addr_bytes = &bytes[4..];
    if addr_bytes.len() != nb {
        return Err(Error::Decode(format!(
            "invalid inet/cidr address length: expected {}, got {}",
            nb,
            addr_bytes.len()
        )));
    }
    let addr = match family {
        PGSQL_AF_INET if nb == 4 => {
            let mut b = [0_u8; 4];
            b.copy_from_slice(addr_bytes);
            IpAddr::V4(Ipv4Addr::from(b))
        }
        PGSQL_AF_INET6 if nb == 16 => {
            let mut b = [0_u8; 16];
            b.copy_from_slice(addr_bytes);
            IpAddr::V6(Ipv6Addr::from(b))
        }
        _ => {
            return Err(Error::Decode(format!(
                "unsupported network address family: {}",
                family
            )));
        }
    };
    Ok((addr, bits, is_cidr))
}

fn encode_network(addr: &IpAddr, bits: u8, is_cidr: bool, buf: &mut Vec<u8>) {
    let family = family_of(addr);
    let (nb, addr_bytes): (u8, Vec<u8>) = match addr {
        IpAddr::V4(v4) => (4, v4.octets().to_vec()),
        IpAddr::V6(v6) => (16, v6.octets().to_vec()),
    };
    let data_len = 4 + addr_bytes.len();
    buf.extend_from_slice(&(data_len as i32).to_be_bytes());
    buf.push(family);
    buf.push(bits);
    buf.push(u8::from(is_cidr));
    buf.push(nb);
    buf.extend_from_slice(&addr_bytes);
}

/// A host address with an optional network mask (`inet`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Inet {
    addr: IpAddr,
    bits: u8,
}

impl Inet {
    /// Builds an `Inet` for a single host (mask = address width).
    #[must_use]
    pub fn new_host(addr: IpAddr) -> Self {
        let bits = max_bits(&addr);
        Self { addr, bits }
    }

    /// Builds an `Inet` with an explicit mask length.
    pub fn new(addr: IpAddr, bits: u8) -> Result<Self> {
        if bits > max_bits(&addr) {
            return Err(Error::domain(format!(
                "mask length {bits} exceeds address width"
            )));
        }
        Ok(Self { addr, bits })
    }

    #[must_use]
    pub fn address(&self) -> IpAddr {
        self.addr
    }

    #[must_use]
    pub fn prefix_len(&self) -> u8 {
        self.bits
    }
}

impl fmt::Display for Inet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.bits == max_bits(&self.addr) {
            write!(f, "{}", self.addr)
        } else {
            write!(f, "{}/{}", self.addr, self.bits)
        }
    }
}

impl FromWireValue<'_> for Inet {
    fn from_text(oid: Oid, bytes: &[u8]) -> Result<Self> {
        if oid != oid::INET {
            return Err(Error::Decode(format!("cannot decode oid {} as Inet", oid)));
        }
        let s = simdutf8::compat::from_utf8(bytes)
            .map_err(|e| Error::Decode(format!("invalid UTF-8: {}", e)))?;
        match s.split_once('/') {
            Some((addr, bits)) => {
                let addr: IpAddr = addr
                    .parse()
                    .map_err(|_| Error::Decode(format!("invalid inet address: {}", s)))?;
                let bits: u8 = bits
                    .parse()
                    .map_err(|_| Error::Decode(format!("invalid inet mask: {}", s)))?;
                Inet::new(addr, bits)
            }
            None => {
                let addr: IpAddr = s
                    .parse()
                    .map_err(|_| Error::Decode(format!("invalid inet address: {}", s)))?;
                Ok(Inet::new_host(addr))
            }
        }
    }

    fn from_binary(oid: Oid, bytes: &[u8]) -> Result<Self> {
        if oid != oid::INET {
            return Err(Error::Decode(format!("cannot decode oid {} as Inet", oid)));
        }
        let (addr, bits, _) = decode_network(bytes)?;
        Ok(Self { addr, bits })
    }
}

impl ToWireValue for Inet {
    fn natural_oid(&self) -> Oid {
        oid::INET
    }

    fn encode(&self, target_oid: Oid, buf: &mut Vec<u8>) -> Result<()> {
        match target_oid {
            oid::INET => {
                encode_network(&self.addr, self.bits, false, buf);
                Ok(())
            }
            _ => Err(Error::type_mismatch(self.natural_oid(), target_oid)),
        }
    }
}

/// A network (`cidr`): like [`Inet`], but host bits beyond the mask must
/// be zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cidr {
    addr: IpAddr,
    bits: u8,
}

fn host_bits_are_zero(addr: &IpAddr, bits: u8) -> bool {
    match addr {
        IpAddr::V4(v4) => {
            let mask = if bits == 0 { 0 } else { u32::MAX << (32 - bits) };
            u32::from(*v4) & !mask == 0
        }
        IpAddr::V6(v6) => {
            let mask = if bits == 0 { 0 } else { u128::MAX << (128 - bits) };
            u128::from(*v6) & !mask == 0
        }
    }
}

impl Cidr {
    pub fn new(addr: IpAddr, bits: u8) -> Result<Self> {
        if bits > max_bits(&addr) {
            return Err(Error::domain(format!(
                "mask length {bits} exceeds address width"
            )));
        }
        if !host_bits_are_zero(&addr, bits) {
            return Err(Error::domain(
                "invalid cidr value: bits set to the right of the mask",
            ));
        }
        Ok(Self { addr, bits })
    }

    #[must_use]
    pub fn network_address(&self) -> IpAddr {
        self.addr
    }

    #[must_use]
    pub fn prefix_len(&self) -> u8 {
        self.bits
    }
}

impl fmt::Display for Cidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.addr, self.bits)
    }
}

impl FromWireValue<'_> for Cidr {
    fn from_text(oid: Oid, bytes: &[u8]) -> Result<Self> {
        if oid != oid::CIDR {
            return Err(Error::Decode(format!("cannot decode oid {} as Cidr", oid)));
        }
        let s = simdutf8::compat::from_utf8(bytes)
            .map_err(|e| Error::Decode(format!("invalid UTF-8: {}", e)))?;
        let (addr, bits) = s
            .split_once('/')
            .ok_or_else(|| Error::Decode(format!("cidr value missing mask: {}", s)))?;
        let addr: IpAddr = addr
            .parse()
            .map_err(|_| Error::Decode(format!("invalid cidr address: {}", s)))?;
        let bits: u8 = bits
            .parse()
            .map_err(|_| Error::Decode(format!("invalid cidr mask: {}", s)))?;
        Cidr::new(addr, bits)
    }

    fn from_binary(oid: Oid, bytes: &[u8]) -> Result<Self> {
        if oid != oid::CIDR {
            return Err(Error::Decode(format!("cannot decode oid {} as Cidr", oid)));
        }
        let (addr, bits, _) = decode_network(bytes)?;
        Ok(Self { addr, bits })
    }
}

impl ToWireValue for Cidr {
    fn natural_oid(&self) -> Oid {
        oid::CIDR
    }

    fn encode(&self, target_oid: Oid, buf: &mut Vec<u8>) -> Result<()> {
        match target_oid {
            oid::CIDR => {
                encode_network(&self.addr, self.bits, true, buf);
                Ok(())
            }
            _ => Err(Error::type_mismatch(self.natural_oid(), target_oid)),
        }
    }
}

/// A 6-byte hardware (MAC) address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MacAddr([u8; 6]);

impl MacAddr {
    #[must_use]
    pub fn new(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }

    #[must_use]
    pub fn octets(&self) -> [u8; 6] {
        self.0
    }

    /// Widens to an EUI-64 `macaddr8` by inserting `ff:fe` in the middle,
    /// matching `macaddr8_set7bit`'s counterpart `trunc`/widen behavior
    /// used by PostgreSQL's `macaddr::macaddr8` cast.
    #[must_use]
    pub fn to_macaddr8(&self) -> MacAddr8 {
        let b = self.0;
        MacAddr8::new([b[0], b[1], b[2], 0xff, 0xfe, b[3], b[4], b[5]])
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            b[0], b[1], b[2], b[3], b[4], b[5]
        )
    }
}

fn parse_mac_bytes(s: &str) -> Option<Vec<u8>> {
    s.split(|c| c == ':' || c == '-')
        .map(|part| u8::from_str_radix(part, 16).ok())
        .collect()
}

impl FromWireValue<'_> for MacAddr {
    fn from_text(oid: Oid, bytes: &[u8]) -> Result<Self> {
        if oid != oid::MACADDR {
            return Err(Error::Decode(format!(
                "cannot decode oid {} as MacAddr",
                oid
            )));
        }
        let s = simdutf8::compat::from_utf8(bytes)
            .map_err(|e| Error::Decode(format!("invalid UTF-8: {}", e)))?;
        let parts = parse_mac_bytes(s)
            .filter(|v| v.len() == 6)
            .ok_or_else(|| Error::Decode(format!("invalid macaddr: {}", s)))?;
        let mut arr = [0_u8; 6];
        arr.copy_from_slice(&parts);
        Ok(MacAddr(arr))
    }

    fn from_binary(oid: Oid, bytes: &[u8]) -> Result<Self> {
        if oid != oid::MACADDR {
            return Err(Error::Decode(format!(
                "cannot decode oid {} as MacAddr",
                oid
            )));
        }
        let arr: [u8; 6] = bytes
            .try_into()
            .map_err(|_| Error::Decode(format!("invalid macaddr length: {}", bytes.len())))?;
        Ok(MacAddr(arr))
    }
}

impl ToWireValue for MacAddr {
    fn natural_oid(&self) -> Oid {
        oid::MACADDR
    }

    fn encode(&self, target_oid: Oid, buf: &mut Vec<u8>) -> Result<()> {
        match target_oid {
            oid::MACADDR => {
                buf.extend_from_slice(&6_i32.to_be_bytes());
                buf.extend_from_slice(&self.0);
                Ok(())
            }
            _ => Err(Error::type_mismatch(self.natural_oid(), target_oid)),
        }
    }
}

/// An 8-byte EUI-64 hardware address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MacAddr8([u8; 8]);

impl MacAddr8 {
    #[must_use]
    pub fn new(bytes: [u8; 8]) -> Self {
        Self(bytes)
    }

    #[must_use]
    pub fn octets(&self) -> [u8; 8] {
        self.0
    }
}

impl fmt::Display for MacAddr8 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]
        )
    }
}

impl FromWireValue<'_> for MacAddr8 {
    fn from_text(oid: Oid, bytes: &[u8]) -> Result<Self> {
        if oid != oid::MACADDR8 {
            return Err(Error::Decode(format!(
                "cannot decode oid {} as MacAddr8",
                oid
            )));
        }
        let s = simdutf8::compat::from_utf8(bytes)
            .map_err(|e| Error::Decode(format!("invalid UTF-8: {}", e)))?;
        let parts = parse_mac_bytes(s)
            .filter(|v| v.len() == 8)
            .ok_or_else(|| Error::Decode(format!("invalid macaddr8: {}", s)))?;
        let mut arr = [0_u8; 8];
        arr.copy_from_slice(&parts);
        Ok(MacAddr8(arr))
    }

    fn from_binary(oid: Oid, bytes: &[u8]) -> Result<Self> {
        if oid != oid::MACADDR8 {
            return Err(Error::Decode(format!(
                "cannot decode oid {} as MacAddr8",
                oid
            )));
        }
        let arr: [u8; 8] = bytes
            .try_into()
            .map_err(|_| Error::Decode(format!("invalid macaddr8 length: {}", bytes.len())))?;
        Ok(MacAddr8(arr))
    }
}

impl ToWireValue for MacAddr8 {
    fn natural_oid(&self) -> Oid {
        oid::MACADDR8
    }

    fn encode(&self, target_oid: Oid, buf: &mut Vec<u8>) -> Result<()> {
        match target_oid {
            oid::MACADDR8 => {
                buf.extend_from_slice(&8_i32.to_be_bytes());
                buf.extend_from_slice(&self.0);
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
    fn inet_text_host() {
        let inet = Inet::from_text(oid::INET, b"192.168.1.1").unwrap();
        assert_eq!(inet.to_string(), "192.168.1.1");
    }

    #[test]
    fn inet_text_with_mask() {
        let inet = Inet::from_text(oid::INET, b"192.168.1.0/24").unwrap();
        assert_eq!(inet.to_string(), "192.168.1.0/24");
    }

    #[test]
    fn inet_binary_roundtrip() {
        let original = Inet::new("10.0.0.5".parse().unwrap(), 8).unwrap();
        let mut buf = Vec::new();
        original.encode(original.natural_oid(), &mut buf).unwrap();
        let decoded = Inet::from_binary(oid::INET, &buf[4..]).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn cidr_rejects_host_bits() {
        assert!(Cidr::new("192.168.1.5".parse().unwrap(), 24).is_err());
    }

    #[test]
    fn cidr_accepts_network_address() {
        let cidr = Cidr::new("192.168.1.0".parse().unwrap(), 24).unwrap();
        assert_eq!(cidr.to_string(), "192.168.1.0/24");
    }

    #[test]
    fn macaddr_text_roundtrip() {
        let mac = MacAddr::from_text(oid::MACADDR, b"08:00:2b:01:02:03").unwrap();
        assert_eq!(mac.to_string(), "08:00:2b:01:02:03");
    }

    #[test]
    fn macaddr_widens_to_macaddr8() {
        let mac = MacAddr::new([0x08, 0x00, 0x2b, 0x01, 0x02, 0x03]);
        let mac8 = mac.to_macaddr8();
        assert_eq!(mac8.to_string(), "08:00:2b:ff:fe:01:02:03");
    }
}
