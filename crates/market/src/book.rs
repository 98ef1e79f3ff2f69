//! Mock market book. Fixed quotes, listing order preserved.

use serde::Serialize;

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Quote {
    pub price: f64,
    pub change: f64,
    pub change_percent: f64,
    /// 24h volume in USD.
    pub volume: f64,
}

/// Symbol table the operation handlers read from. Injected into every
/// handler rather than reached for as a global, so tests can substitute
/// their own.
#[derive(Debug, Clone)]
pub struct MarketBook {
    entries: Vec<(String, Quote)>,
}

impl MarketBook {
    pub fn new(entries: Vec<(String, Quote)>) -> Self {
        Self { entries }
    }

    /// Case-insensitive lookup.
    pub fn quote(&self, symbol: &str) -> Option<&Quote> {
        let upper = symbol.to_uppercase();
        self.entries
            .iter()
            .find(|(name, _)| *name == upper)
            .map(|(_, quote)| quote)
    }

    /// First `limit` symbols in listing order.
    pub fn top(&self, limit: usize) -> &[(String, Quote)] {
        &self.entries[..limit.min(self.entries.len())]
    }

    pub fn symbols(&self) -> Vec<&str> {
        self.entries.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for MarketBook {
    fn default() -> Self {
        let quote = |price, change, change_percent, volume| Quote {
            price,
            change,
            change_percent,
            volume,
        };
        Self::new(vec![
            ("BTC".to_string(), quote(48250.0, 1250.0, 2.66, 28.5e9)),
            ("ETH".to_string(), quote(2850.0, -85.0, -2.89, 15.2e9)),
            ("SOL".to_string(), quote(185.5, 12.5, 7.21, 2.1e9)),
            ("XRP".to_string(), quote(2.15, 0.18, 9.30, 1.8e9)),
            ("ADA".to_string(), quote(0.95, 0.05, 5.6, 450e6)),
            ("DOGE".to_string(), quote(0.35, 0.02, 6.0, 350e6)),
        ])
    }
}

/// Renders a percent with explicit sign, matching the quote displays.
pub(crate) fn signed_percent(value: f64) -> String {
    if value >= 0.0 {
        format!("+{value:.2}%")
    } else {
        format!("{value:.2}%")
    }
}
