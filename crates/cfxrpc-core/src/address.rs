//! CIP-37 addresses.
//!
//! An [`Address`] is a 20-byte account body plus the network id it belongs to.
//! Addresses built from raw hex have no network id yet; they are *incomplete*
//! until [`Address::complete`] stamps one, which the RPC client does for every
//! outgoing call. Complete addresses render as base32 (`cfx:aa…`), incomplete
//! ones as `0x` hex.
//!
//! Base32 layout: `<prefix>:<payload><checksum>`, where the payload is the
//! version byte (always `0`) followed by the body, regrouped into 5-bit
//! symbols, and the checksum is the 40-bit BCH polymod over the prefix, a zero
//! separator, the payload and eight zero symbols.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

pub const MAINNET_ID: u32 = 1029;
pub const TESTNET_ID: u32 = 1;

const ALPHABET: &[u8; 32] = b"abcdefghjkmnprstuvwxyz0123456789";
const CHECKSUM_LEN: usize = 8;
const PAYLOAD_LEN: usize = 34;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("expected 0x-prefixed 40-character hex address, got {0:?}")]
    InvalidHex(String),
    #[error("invalid base32 address {0:?}: {1}")]
    InvalidBase32(String, &'static str),
    #[error("invalid network prefix {0:?}")]
    InvalidPrefix(String),
    #[error("checksum mismatch in {0:?}")]
    Checksum(String),
}

/// Account class encoded in the high nibble of the first body byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressType {
    Null,
    Builtin,
    User,
    Contract,
}

impl AddressType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Builtin => "builtin",
            Self::User => "user",
            Self::Contract => "contract",
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address {
    body: [u8; 20],
    network_id: Option<u32>,
}

impl Address {
    /// An address with no network id attached.
    pub const fn from_bytes(body: [u8; 20]) -> Self {
        Self {
            body,
            network_id: None,
        }
    }

    pub fn from_hex(s: &str) -> Result<Self, AddressError> {
        let digits = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .ok_or_else(|| AddressError::InvalidHex(s.to_string()))?;
        let mut body = [0u8; 20];
        hex::decode_to_slice(digits, &mut body)
            .map_err(|_| AddressError::InvalidHex(s.to_string()))?;
        Ok(Self::from_bytes(body))
    }

    /// Parse `cfx:…`, `cfxtest:…`, `net<N>:…`, optionally with a
    /// `type.<kind>:` segment.
    pub fn from_base32(s: &str) -> Result<Self, AddressError> {
        let invalid = |why| AddressError::InvalidBase32(s.to_string(), why);
        if s.to_lowercase() != s && s.to_uppercase() != s {
            return Err(invalid("mixed case"));
        }
        let lower = s.to_lowercase();
        let parts: Vec<&str> = lower.split(':').collect();
        if parts.len() < 2 || parts.len() > 3 {
            return Err(invalid("expected <prefix>:<body>"));
        }
        let network_id = network_id_from_prefix(parts[0])?;
        let encoded = parts[parts.len() - 1];
        if encoded.len() != PAYLOAD_LEN + CHECKSUM_LEN {
            return Err(invalid("wrong length"));
        }

        let symbols = encoded
            .bytes()
            .map(|c| {
                ALPHABET
                    .iter()
                    .position(|a| *a == c)
                    .map(|i| i as u8)
                    .ok_or_else(|| invalid("character outside alphabet"))
            })
            .collect::<Result<Vec<u8>, _>>()?;
        let (payload, checksum) = symbols.split_at(PAYLOAD_LEN);
        if checksum_symbols(parts[0], payload) != checksum {
            return Err(AddressError::Checksum(s.to_string()));
        }

        let bytes = regroup(payload, 5, 8, false).ok_or_else(|| invalid("non-zero padding"))?;
        if bytes.len() != 21 || bytes[0] != 0 {
            return Err(invalid("unsupported version byte"));
        }
        let mut body = [0u8; 20];
        body.copy_from_slice(&bytes[1..]);

        let address = Self {
            body,
            network_id: Some(network_id),
        };
        if parts.len() == 3 {
            let expected = format!("type.{}", address.address_type().as_str());
            if parts[1] != expected {
                return Err(invalid("address type segment does not match body"));
            }
        }
        Ok(address)
    }

    pub fn with_network_id(mut self, network_id: u32) -> Self {
        self.network_id = Some(network_id);
        self
    }

    /// Attach `network_id` if the address does not carry one yet.
    pub fn complete(&mut self, network_id: u32) {
        if self.network_id.is_none() {
            self.network_id = Some(network_id);
        }
    }

    pub fn is_complete(&self) -> bool {
        self.network_id.is_some()
    }

    pub fn network_id(&self) -> Option<u32> {
        self.network_id
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.body
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.body))
    }

    pub fn address_type(&self) -> AddressType {
        if self.body == [0u8; 20] {
            return AddressType::Null;
        }
        match self.body[0] & 0xf0 {
            0x00 => AddressType::Builtin,
            0x10 => AddressType::User,
            0x80 => AddressType::Contract,
            _ => AddressType::User,
        }
    }

    /// Base32 rendering for `network_id`, ignoring the address's own id.
    pub fn to_base32(&self, network_id: u32) -> String {
        let prefix = network_prefix(network_id);
        let mut versioned = Vec::with_capacity(21);
        versioned.push(0u8);
        versioned.extend_from_slice(&self.body);
        // 8 -> 5 regrouping with padding always succeeds
        let payload = regroup(&versioned, 8, 5, true).unwrap_or_default();
        let checksum = checksum_symbols(&prefix, &payload);

        let mut out = String::with_capacity(prefix.len() + 1 + PAYLOAD_LEN + CHECKSUM_LEN);
        out.push_str(&prefix);
        out.push(':');
        out.extend(
            payload
                .iter()
                .chain(checksum.iter())
                .map(|s| ALPHABET[*s as usize] as char),
        );
        out
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.network_id {
            Some(id) => f.write_str(&self.to_base32(id)),
            None => f.write_str(&self.to_hex()),
        }
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.starts_with("0x") || s.starts_with("0X") {
            Self::from_hex(s)
        } else {
            Self::from_base32(s)
        }
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

pub fn network_prefix(network_id: u32) -> String {
    match network_id {
        MAINNET_ID => "cfx".to_string(),
        TESTNET_ID => "cfxtest".to_string(),
        n => format!("net{n}"),
    }
}

fn network_id_from_prefix(prefix: &str) -> Result<u32, AddressError> {
    match prefix {
        "cfx" => Ok(MAINNET_ID),
        "cfxtest" => Ok(TESTNET_ID),
        other => {
            let id = other
                .strip_prefix("net")
                .and_then(|n| n.parse::<u32>().ok())
                .ok_or_else(|| AddressError::InvalidPrefix(other.to_string()))?;
            // mainnet and testnet must use their named prefixes
            if id == MAINNET_ID || id == TESTNET_ID {
                return Err(AddressError::InvalidPrefix(other.to_string()));
            }
            Ok(id)
        }
    }
}

fn checksum_symbols(prefix: &str, payload: &[u8]) -> [u8; CHECKSUM_LEN] {
    let mut input: Vec<u8> = prefix.bytes().map(|b| b & 0x1f).collect();
    input.push(0);
    input.extend_from_slice(payload);
    input.extend_from_slice(&[0u8; CHECKSUM_LEN]);

    let checksum = polymod(&input);
    let mut out = [0u8; CHECKSUM_LEN];
    for (i, symbol) in out.iter_mut().enumerate() {
        *symbol = ((checksum >> (5 * (CHECKSUM_LEN - 1 - i))) & 0x1f) as u8;
    }
    out
}

fn polymod(values: &[u8]) -> u64 {
    let mut c: u64 = 1;
    for &d in values {
        let c0 = (c >> 35) as u8;
        c = ((c & 0x07_ffff_ffff) << 5) ^ u64::from(d);
        if c0 & 0x01 != 0 {
            c ^= 0x98_f2bc_8e61;
        }
        if c0 & 0x02 != 0 {
            c ^= 0x79_b76d_99e2;
        }
        if c0 & 0x04 != 0 {
            c ^= 0xf3_3e5f_b3c4;
        }
        if c0 & 0x08 != 0 {
            c ^= 0xae_2eab_e2a8;
        }
        if c0 & 0x10 != 0 {
            c ^= 0x1e_4f43_e470;
        }
    }
    c ^ 1
}

/// Regroup a bit stream from `from`-bit to `to`-bit symbols. Without `pad`,
/// leftover bits must be zero and are dropped.
fn regroup(data: &[u8], from: u32, to: u32, pad: bool) -> Option<Vec<u8>> {
    let mut acc: u32 = 0;
    let mut bits: u32 = 0;
    let max = (1u32 << to) - 1;
    let mut out = Vec::with_capacity(data.len() * from as usize / to as usize + 1);
    for &value in data {
        acc = (acc << from) | u32::from(value);
        bits += from;
        while bits >= to {
            bits -= to;
            out.push(((acc >> bits) & max) as u8);
        }
        acc &= (1u32 << bits) - 1;
    }
    if pad {
        if bits > 0 {
            out.push(((acc << (to - bits)) & max) as u8);
        }
    } else if acc != 0 {
        return None;
    }
    Some(out)
}
