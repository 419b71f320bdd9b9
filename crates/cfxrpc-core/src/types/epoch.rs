use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::quantity;

/// Reference point at which a state query is evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Epoch {
    Earliest,
    LatestCheckpoint,
    LatestFinalized,
    LatestConfirmed,
    #[default]
    LatestState,
    LatestMined,
    Number(u64),
}

impl Epoch {
    pub fn as_tag(&self) -> Option<&'static str> {
        match self {
            Self::Earliest => Some("earliest"),
            Self::LatestCheckpoint => Some("latest_checkpoint"),
            Self::LatestFinalized => Some("latest_finalized"),
            Self::LatestConfirmed => Some("latest_confirmed"),
            Self::LatestState => Some("latest_state"),
            Self::LatestMined => Some("latest_mined"),
            Self::Number(_) => None,
        }
    }
}

impl fmt::Display for Epoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n:#x}"),
            named => f.write_str(named.as_tag().unwrap_or_default()),
        }
    }
}

impl FromStr for Epoch {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "earliest" => Self::Earliest,
            "latest_checkpoint" => Self::LatestCheckpoint,
            "latest_finalized" => Self::LatestFinalized,
            "latest_confirmed" => Self::LatestConfirmed,
            "latest_state" => Self::LatestState,
            "latest_mined" => Self::LatestMined,
            other => Self::Number(
                quantity::parse(other).ok_or_else(|| format!("invalid epoch {other:?}"))?,
            ),
        })
    }
}

impl From<u64> for Epoch {
    fn from(n: u64) -> Self {
        Self::Number(n)
    }
}

impl Serialize for Epoch {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Epoch {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
