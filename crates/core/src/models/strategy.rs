use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::errors::CoreError;

use super::weights::{AssetClass, AssetClassWeights, AssetWeights, StrategyWeights};

/// A named, user-facing blend of asset classes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyDefinition {
    /// Identifier used as the document key (e.g., "alpSave")
    pub name: String,

    /// Human-readable name (e.g., "Alpine Save")
    pub full_name: String,

    #[serde(default)]
    pub description: String,

    pub weights: StrategyWeights,
}

impl StrategyDefinition {
    pub fn new(
        name: impl Into<String>,
        full_name: impl Into<String>,
        description: impl Into<String>,
        weights: StrategyWeights,
    ) -> Self {
        Self {
            name: name.into(),
            full_name: full_name.into(),
            description: description.into(),
            weights,
        }
    }
}

/// Everything the engine needs to know about allocations: the basket of
/// each asset class and the strategies blending those classes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioCatalog {
    pub asset_classes: AssetClassWeights,
    pub strategies: Vec<StrategyDefinition>,
}

impl PortfolioCatalog {
    /// Check that every class a strategy is exposed to has a basket and
    /// that strategy names are unique.
    pub fn validate(&self) -> Result<(), CoreError> {
        let mut seen = std::collections::HashSet::new();
        for strategy in &self.strategies {
            if !seen.insert(strategy.name.as_str()) {
                return Err(CoreError::Config(format!(
                    "duplicate strategy name: {}",
                    strategy.name
                )));
            }
            for class in strategy.weights.active_classes() {
                if !self.asset_classes.contains_key(&class) {
                    return Err(CoreError::Config(format!(
                        "strategy {} uses asset class {class} which has no basket",
                        strategy.name
                    )));
                }
            }
        }
        Ok(())
    }

    /// Every ticker held by any basket, sorted and deduplicated.
    pub fn tickers(&self) -> Vec<String> {
        let mut tickers: Vec<String> = self
            .asset_classes
            .values()
            .flat_map(|w| w.tickers().map(str::to_string))
            .collect();
        tickers.sort();
        tickers.dedup();
        tickers
    }

    pub fn strategy(&self, name: &str) -> Option<&StrategyDefinition> {
        self.strategies.iter().find(|s| s.name == name)
    }
}

impl Default for PortfolioCatalog {
    /// The production allocation, see [`PortfolioCatalog::production`].
    fn default() -> Self {
        let catalog = Self::production();
        debug_assert!(catalog.is_ok(), "production catalog literals: {catalog:?}");
        catalog.unwrap_or_else(|_| Self {
            asset_classes: AssetClassWeights::new(),
            strategies: Vec::new(),
        })
    }
}

impl PortfolioCatalog {
    /// The production allocation: three baskets and three strategies.
    pub fn production() -> Result<Self, CoreError> {
        let basket = |pairs: &[(&str, f64)]| {
            AssetWeights::new(pairs.iter().map(|(t, w)| (t.to_string(), *w)).collect())
        };
        let blend = |lending: f64, btc_eth: f64, alt: f64| {
            StrategyWeights::new(BTreeMap::from([
                (AssetClass::LendingProtocols, lending),
                (AssetClass::BtcEth, btc_eth),
                (AssetClass::AltCoins, alt),
            ]))
        };

        let asset_classes: AssetClassWeights = [
            (
                AssetClass::LendingProtocols,
                basket(&[
                    ("aave", 0.25),
                    ("comp", 0.15),
                    ("dydx", 0.25),
                    ("definer", 0.1),
                    ("anc", 0.25),
                ]),
            ),
            (AssetClass::BtcEth, basket(&[("btc", 0.5), ("eth", 0.5)])),
            (
                AssetClass::AltCoins,
                basket(&[
                    ("xrp", 0.2),
                    ("bch", 0.05),
                    ("eos", 0.05),
                    ("xlm", 0.05),
                    ("ltc", 0.1),
                    ("bsv", 0.05),
                    ("trx", 0.2),
                    ("ada", 0.05),
                    ("miota", 0.05),
                    ("xmr", 0.2),
                ]),
            ),
        ]
        .into_iter()
        .map(|(class, weights)| weights.map(|w| (class, w)))
        .collect::<Result<_, CoreError>>()?;

        let strategies: Vec<StrategyDefinition> = [
            (
                "alpSave",
                "Alpine Save",
                "Invests only in lending protocols for stable yields.",
                blend(1.0, 0.0, 0.0),
            ),
            (
                "alpBal",
                "Alpine Balanced",
                "Mostly lending protocols with some exposure to BTC and ETH.",
                blend(0.8, 0.2, 0.0),
            ),
            (
                "alpAggr",
                "Alpine Aggressive",
                "Growth oriented mix of BTC, ETH and alt coins on top of lending yields.",
                blend(0.2, 0.5, 0.3),
            ),
        ]
        .into_iter()
        .map(|(name, full_name, description, weights)| {
            weights.map(|w| StrategyDefinition::new(name, full_name, description, w))
        })
        .collect::<Result<_, CoreError>>()?;

        Ok(Self {
            asset_classes,
            strategies,
        })
    }
}
