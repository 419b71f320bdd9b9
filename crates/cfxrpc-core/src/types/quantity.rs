//! Serde adapters for JSON-RPC integer quantities.
//!
//! Nodes send small integers as `"0x…"` strings, but some older endpoints use
//! bare JSON numbers. Both are accepted; output is always hex.

use serde::de::{self, Deserializer, Visitor};
use serde::Serializer;
use std::fmt;

pub fn serialize<T, S>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
where
    T: Copy + Into<u64>,
    S: Serializer,
{
    serializer.serialize_str(&format!("{:#x}", (*value).into()))
}

pub fn deserialize<'de, T, D>(deserializer: D) -> Result<T, D::Error>
where
    T: TryFrom<u64>,
    D: Deserializer<'de>,
{
    let raw = deserializer.deserialize_any(QuantityVisitor)?;
    T::try_from(raw).map_err(|_| de::Error::custom(format!("quantity {raw} out of range")))
}

/// Parse a `0x`-prefixed hex or decimal quantity.
pub fn parse(s: &str) -> Option<u64> {
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(digits) if !digits.is_empty() => u64::from_str_radix(digits, 16).ok(),
        Some(_) => None,
        None => s.parse().ok(),
    }
}

struct QuantityVisitor;

impl<'de> Visitor<'de> for QuantityVisitor {
    type Value = u64;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a hex string or unsigned integer")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<u64, E> {
        Ok(v)
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<u64, E> {
        parse(v).ok_or_else(|| E::custom(format!("invalid quantity {v:?}")))
    }
}

/// `Option` flavour for nullable or absent fields.
pub mod opt {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<T, S>(value: &Option<T>, serializer: S) -> Result<S::Ok, S::Error>
    where
        T: Copy + Into<u64>,
        S: Serializer,
    {
        match value {
            Some(v) => super::serialize(v, serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
    where
        T: TryFrom<u64>,
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Wrapper<U: TryFrom<u64>>(#[serde(with = "super")] U);

        Ok(Option::<Wrapper<T>>::deserialize(deserializer)?.map(|w| w.0))
    }
}
