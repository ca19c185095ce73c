use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::errors::CoreError;

/// Weights of one allocation level must sum to 1.0 within this tolerance.
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// Asset class a sub-portfolio belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AssetClass {
    /// DeFi lending protocols (stable yields)
    LendingProtocols,
    /// The BTC/ETH pair basket
    BtcEth,
    /// Basket of large-cap alt coins
    AltCoins,
}

impl AssetClass {
    pub const ALL: [AssetClass; 3] = [
        AssetClass::LendingProtocols,
        AssetClass::BtcEth,
        AssetClass::AltCoins,
    ];

    /// Key used for this class in documents and class-level matrices.
    pub fn key(&self) -> &'static str {
        match self {
            AssetClass::LendingProtocols => "lendingProtocols",
            AssetClass::BtcEth => "btcEth",
            AssetClass::AltCoins => "altCoins",
        }
    }
}

impl std::fmt::Display for AssetClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

impl std::str::FromStr for AssetClass {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AssetClass::ALL
            .into_iter()
            .find(|c| c.key() == s)
            .ok_or_else(|| CoreError::Config(format!("unknown asset class: {s}")))
    }
}

/// Ticker → weight for one allocation level.
///
/// Weights are finite, non-negative, and sum to 1.0 within
/// [`WEIGHT_SUM_TOLERANCE`]. Construction rejects anything else.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, f64>", into = "BTreeMap<String, f64>")]
pub struct AssetWeights {
    weights: BTreeMap<String, f64>,
}

impl AssetWeights {
    pub fn new(weights: BTreeMap<String, f64>) -> Result<Self, CoreError> {
        check_weights(weights.iter().map(|(k, v)| (k.as_str(), *v)))?;
        Ok(Self { weights })
    }

    /// Convenience constructor from `(ticker, weight)` pairs.
    pub fn from_pairs<S: Into<String>>(
        pairs: impl IntoIterator<Item = (S, f64)>,
    ) -> Result<Self, CoreError> {
        Self::new(pairs.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn get(&self, ticker: &str) -> Option<f64> {
        self.weights.get(ticker).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.weights.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn tickers(&self) -> impl Iterator<Item = &str> {
        self.weights.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }
}

impl TryFrom<BTreeMap<String, f64>> for AssetWeights {
    type Error = CoreError;

    fn try_from(weights: BTreeMap<String, f64>) -> Result<Self, Self::Error> {
        Self::new(weights)
    }
}

impl From<AssetWeights> for BTreeMap<String, f64> {
    fn from(w: AssetWeights) -> Self {
        w.weights
    }
}

/// Per-class baskets: asset class → weights of the assets inside it.
pub type AssetClassWeights = BTreeMap<AssetClass, AssetWeights>;

/// Weight of each asset class inside a user-facing strategy.
///
/// Zero entries are allowed and mean the strategy has no exposure to that class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<AssetClass, f64>", into = "BTreeMap<AssetClass, f64>")]
pub struct StrategyWeights {
    weights: BTreeMap<AssetClass, f64>,
}

impl StrategyWeights {
    pub fn new(weights: BTreeMap<AssetClass, f64>) -> Result<Self, CoreError> {
        check_weights(weights.iter().map(|(k, v)| (k.key(), *v)))?;
        Ok(Self { weights })
    }

    pub fn from_pairs(pairs: impl IntoIterator<Item = (AssetClass, f64)>) -> Result<Self, CoreError> {
        Self::new(pairs.into_iter().collect())
    }

    /// Weight of a class, `0.0` when the class is not listed.
    pub fn get(&self, class: AssetClass) -> f64 {
        self.weights.get(&class).copied().unwrap_or(0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (AssetClass, f64)> + '_ {
        self.weights.iter().map(|(k, v)| (*k, *v))
    }

    /// Classes the strategy is actually exposed to.
    pub fn active_classes(&self) -> Vec<AssetClass> {
        self.iter().filter(|(_, w)| *w > 0.0).map(|(c, _)| c).collect()
    }

    /// Weights of the active classes keyed by class key, for valuing
    /// class-level matrices. Zero-weight classes are left out.
    pub fn as_asset_weights(&self) -> AssetWeights {
        AssetWeights {
            weights: self
                .weights
                .iter()
                .filter(|(_, w)| **w > 0.0)
                .map(|(class, w)| (class.key().to_string(), *w))
                .collect(),
        }
    }
}

impl TryFrom<BTreeMap<AssetClass, f64>> for StrategyWeights {
    type Error = CoreError;

    fn try_from(weights: BTreeMap<AssetClass, f64>) -> Result<Self, Self::Error> {
        Self::new(weights)
    }
}

impl From<StrategyWeights> for BTreeMap<AssetClass, f64> {
    fn from(w: StrategyWeights) -> Self {
        w.weights
    }
}

fn check_weights<'a>(weights: impl Iterator<Item = (&'a str, f64)>) -> Result<(), CoreError> {
    let mut sum = 0.0;
    let mut count = 0usize;
    for (name, w) in weights {
        if !w.is_finite() || w < 0.0 {
            return Err(CoreError::InvalidWeights(format!(
                "weight for {name} must be a finite non-negative number, got {w}"
            )));
        }
        sum += w;
        count += 1;
    }
    if count == 0 {
        return Err(CoreError::InvalidWeights("no weights given".into()));
    }
    // f64::EPSILON absorbs the representation error of sums sitting exactly on the boundary
    if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE + f64::EPSILON {
        return Err(CoreError::InvalidWeights(format!(
            "weights must sum to 1.0, got {sum}"
        )));
    }
    Ok(())
}
