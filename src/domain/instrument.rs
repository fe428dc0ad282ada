/// Instrument metadata
///
/// A book cannot be built before its tick size is known. The metadata source
/// is pluggable through `InstrumentCatalog`; `StaticCatalog` covers the
/// common case of a list loaded once at startup.

use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Per-instrument price grid
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstrumentSpec {
    pub symbol: String,
    pub tick_size: Decimal,
    /// Price decimals; derived from `tick_size` when the source omits it
    #[serde(default, rename = "priceScale")]
    pub price_decimals: Option<u32>,
}

impl InstrumentSpec {
    pub fn new(symbol: impl Into<String>, tick_size: Decimal) -> Self {
        Self {
            symbol: symbol.into(),
            tick_size,
            price_decimals: None,
        }
    }

    pub fn with_decimals(mut self, decimals: u32) -> Self {
        self.price_decimals = Some(decimals);
        self
    }

    /// Decimal places used to normalize prices
    pub fn decimals(&self) -> u32 {
        self.price_decimals
            .unwrap_or_else(|| self.tick_size.normalize().scale())
    }
}

/// Source of instrument metadata
pub trait InstrumentCatalog: Send + Sync {
    fn lookup(&self, symbol: &str) -> Option<InstrumentSpec>;

    fn symbols(&self) -> Vec<String>;
}

/// In-memory catalog
#[derive(Debug, Default)]
pub struct StaticCatalog {
    specs: RwLock<HashMap<String, InstrumentSpec>>,
}

impl StaticCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `[{ "symbol": "BTCUSDT", "tickSize": "0.1", "priceScale": 1 }, ...]`
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let specs: Vec<InstrumentSpec> = serde_json::from_str(json)?;
        Ok(specs.into_iter().collect())
    }

    pub fn insert(&self, spec: InstrumentSpec) {
        self.specs.write().insert(spec.symbol.clone(), spec);
    }

    pub fn len(&self) -> usize {
        self.specs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.read().is_empty()
    }

    pub fn into_shared(self) -> Arc<dyn InstrumentCatalog> {
        Arc::new(self)
    }
}

impl FromIterator<InstrumentSpec> for StaticCatalog {
    fn from_iter<I: IntoIterator<Item = InstrumentSpec>>(iter: I) -> Self {
        let specs = iter
            .into_iter()
            .map(|spec| (spec.symbol.clone(), spec))
            .collect();
        Self { specs: RwLock::new(specs) }
    }
}

impl InstrumentCatalog for StaticCatalog {
    fn lookup(&self, symbol: &str) -> Option<InstrumentSpec> {
        self.specs.read().get(symbol).cloned()
    }

    fn symbols(&self) -> Vec<String> {
        let mut symbols: Vec<_> = self.specs.read().keys().cloned().collect();
        symbols.sort();
        symbols
    }
}
