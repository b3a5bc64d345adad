//! Trading pair and trade-direction types

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;
#[cfg(feature = "utoipa")]
use crate::utoipa::ToSchema;

/// A canonically ordered asset pair.
///
/// Construction normalizes the two symbols so that `asset0 < asset1`
/// lexicographically. Direction semantics (which asset is sold) are expressed
/// relative to this canonical ordering via [`Direction`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(ToSchema))]
#[serde(try_from = "String", into = "String")]
pub struct Pair {
    asset0: String,
    asset1: String,
}

impl Pair {
    /// Create a pair from two asset symbols, normalizing the ordering.
    pub fn new(a: impl Into<String>, b: impl Into<String>) -> Result<Self, Error> {
        let a = a.into().trim().to_uppercase();
        let b = b.into().trim().to_uppercase();

        if a.is_empty() || b.is_empty() {
            return Err(Error::InvalidOrderParameters(
                "Pair assets must be non-empty".to_string(),
            ));
        }
        if a == b {
            return Err(Error::InvalidOrderParameters(format!(
                "Pair assets must differ: {}",
                a
            )));
        }

        let (asset0, asset1) = if a < b { (a, b) } else { (b, a) };
        Ok(Self { asset0, asset1 })
    }

    /// The lexicographically smaller asset of the pair.
    pub fn asset0(&self) -> &str {
        &self.asset0
    }

    /// The lexicographically larger asset of the pair.
    pub fn asset1(&self) -> &str {
        &self.asset1
    }

    /// Render the canonical symbol, e.g. `"ETH/USDC"`.
    pub fn symbol(&self) -> String {
        format!("{}/{}", self.asset0, self.asset1)
    }
}

impl fmt::Display for Pair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.asset0, self.asset1)
    }
}

impl FromStr for Pair {
    type Err = Error;

    /// Parse `"ETH/USDC"` (or the URL-safe `"ETH-USDC"`) into a pair.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = if s.contains('/') {
            s.split('/').collect()
        } else {
            s.split('-').collect()
        };

        if parts.len() != 2 {
            return Err(Error::InvalidOrderParameters(format!(
                "Invalid pair format: {}",
                s
            )));
        }

        Pair::new(parts[0], parts[1])
    }
}

impl TryFrom<String> for Pair {
    type Error = Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Pair> for String {
    fn from(pair: Pair) -> Self {
        pair.symbol()
    }
}

/// Trade direction relative to the pair's canonical ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Sell `asset0`, acquire `asset1`
    ZeroForOne,
    /// Sell `asset1`, acquire `asset0`
    OneForZero,
}

impl Direction {
    /// The asset this direction spends.
    pub fn input_asset<'a>(&self, pair: &'a Pair) -> &'a str {
        match self {
            Direction::ZeroForOne => pair.asset0(),
            Direction::OneForZero => pair.asset1(),
        }
    }

    /// The asset this direction acquires.
    pub fn output_asset<'a>(&self, pair: &'a Pair) -> &'a str {
        match self {
            Direction::ZeroForOne => pair.asset1(),
            Direction::OneForZero => pair.asset0(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_normalizes_ordering() {
        let a = Pair::new("USDC", "ETH").unwrap();
        let b = Pair::new("ETH", "USDC").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.symbol(), "ETH/USDC");
    }

    #[test]
    fn pair_parses_both_separators() {
        let slash: Pair = "ETH/USDC".parse().unwrap();
        let dash: Pair = "ETH-USDC".parse().unwrap();
        assert_eq!(slash, dash);
    }

    #[test]
    fn pair_rejects_identical_assets() {
        assert!(Pair::new("ETH", "ETH").is_err());
        assert!("ETH".parse::<Pair>().is_err());
    }

    #[test]
    fn direction_asset_selection() {
        let pair = Pair::new("ETH", "USDC").unwrap();
        assert_eq!(Direction::ZeroForOne.input_asset(&pair), "ETH");
        assert_eq!(Direction::ZeroForOne.output_asset(&pair), "USDC");
        assert_eq!(Direction::OneForZero.input_asset(&pair), "USDC");
        assert_eq!(Direction::OneForZero.output_asset(&pair), "ETH");
    }
}
