//! Operation bodies. Each handler is a pure function over an injected
//! `MarketBook`; the text payloads are what the model sees as tool output.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use cryptopulse_ops::{HandlerError, OperationHandler, ValidatedArguments};

use crate::book::{signed_percent, MarketBook};

fn unknown_symbol(symbol: &str) -> HandlerError {
    format!("cryptocurrency {symbol} not found").into()
}

pub struct GetPrice {
    book: Arc<MarketBook>,
}

impl GetPrice {
    pub fn new(book: Arc<MarketBook>) -> Self {
        Self { book }
    }
}

#[async_trait]
impl OperationHandler for GetPrice {
    async fn run(&self, args: ValidatedArguments) -> Result<Value, HandlerError> {
        let symbol = args.str("symbol").unwrap_or_default().to_uppercase();
        let quote = self.book.quote(&symbol).ok_or_else(|| unknown_symbol(&symbol))?;

        Ok(json!(format!(
            "{symbol}: ${:.2} ({}) | 24h Volume: ${:.2}B",
            quote.price,
            signed_percent(quote.change_percent),
            quote.volume / 1e9,
        )))
    }
}

pub struct GetMarketOverview {
    book: Arc<MarketBook>,
}

impl GetMarketOverview {
    pub fn new(book: Arc<MarketBook>) -> Self {
        Self { book }
    }
}

#[async_trait]
impl OperationHandler for GetMarketOverview {
    async fn run(&self, args: ValidatedArguments) -> Result<Value, HandlerError> {
        let limit = args.i64("limit").unwrap_or(5).max(0) as usize;
        let listing = self
            .book
            .top(limit)
            .iter()
            .map(|(symbol, quote)| {
                format!(
                    "{symbol}: ${:.2} ({})",
                    quote.price,
                    signed_percent(quote.change_percent)
                )
            })
            .collect::<Vec<_>>()
            .join("\n");

        Ok(json!(format!(
            "Top {limit} Cryptocurrencies:\n{listing}\n\nMarket analysis shows mixed signals with strong performers like BTC and SOL leading gains."
        )))
    }
}

pub struct AnalyzeTrend {
    book: Arc<MarketBook>,
}

impl AnalyzeTrend {
    pub fn new(book: Arc<MarketBook>) -> Self {
        Self { book }
    }
}

/// BTC and ETH carry curated levels; everything else derives from price.
fn trend_levels(symbol: &str, price: f64) -> ([f64; 2], [f64; 2]) {
    match symbol {
        "BTC" => ([46500.0, 45000.0], [50000.0, 52000.0]),
        "ETH" => ([2700.0, 2500.0], [3000.0, 3200.0]),
        _ => ([price * 0.92, price * 0.85], [price * 1.08, price * 1.15]),
    }
}

#[async_trait]
impl OperationHandler for AnalyzeTrend {
    async fn run(&self, args: ValidatedArguments) -> Result<Value, HandlerError> {
        let symbol = args.str("symbol").unwrap_or_default().to_uppercase();
        let timeframe = args.str("timeframe").unwrap_or("1d").to_string();
        let quote = self.book.quote(&symbol).ok_or_else(|| unknown_symbol(&symbol))?;

        let trend = if quote.change_percent >= 2.0 {
            "bullish"
        } else if quote.change_percent <= -2.0 {
            "bearish"
        } else {
            "neutral"
        };
        let outlook = match trend {
            "bullish" => "potential upside",
            "bearish" => "potential downside",
            _ => "consolidation",
        };
        let (support, resistance) = trend_levels(&symbol, quote.price);

        Ok(json!(format!(
            "{symbol} {timeframe} Analysis:\n\
             Trend: {trend}\n\
             Current Price: ${:.2}\n\
             Support Levels: ${:.2}, ${:.2}\n\
             Resistance Levels: ${:.2}, ${:.2}\n\
             24h Change: {}\n\
             Volume: ${:.2}B\n\n\
             Analysis: The {trend} trend indicates {outlook}. Key levels to watch are the support at ${:.2} and resistance at ${:.2}.",
            quote.price,
            support[0],
            support[1],
            resistance[0],
            resistance[1],
            signed_percent(quote.change_percent),
            quote.volume / 1e9,
            support[0],
            resistance[0],
        )))
    }
}

pub struct CalculateRsi {
    book: Arc<MarketBook>,
}

impl CalculateRsi {
    pub fn new(book: Arc<MarketBook>) -> Self {
        Self { book }
    }
}

#[async_trait]
impl OperationHandler for CalculateRsi {
    async fn run(&self, args: ValidatedArguments) -> Result<Value, HandlerError> {
        let symbol = args.str("symbol").unwrap_or_default().to_uppercase();
        let period = args.i64("period").unwrap_or(14);
        let quote = self.book.quote(&symbol).ok_or_else(|| unknown_symbol(&symbol))?;

        // Mock RSI derived from the 24h change.
        let rsi = 45.0 + quote.change_percent * 3.0;
        let status = if rsi > 70.0 {
            "overbought"
        } else if rsi < 30.0 {
            "oversold"
        } else {
            "neutral"
        };

        Ok(json!(format!(
            "{symbol} RSI ({period}-period):\n\
             RSI Value: {rsi:.2}\n\
             Status: {status}\n\n\
             An RSI of {rsi:.2} indicates the asset is {status}. Values above 70 suggest possible pullback, while below 30 suggests potential recovery."
        )))
    }
}

pub struct GetSupportResistance {
    book: Arc<MarketBook>,
}

impl GetSupportResistance {
    pub fn new(book: Arc<MarketBook>) -> Self {
        Self { book }
    }
}

#[async_trait]
impl OperationHandler for GetSupportResistance {
    async fn run(&self, args: ValidatedArguments) -> Result<Value, HandlerError> {
        let symbol = args.str("symbol").unwrap_or_default().to_uppercase();
        let quote = self.book.quote(&symbol).ok_or_else(|| unknown_symbol(&symbol))?;

        let support = [quote.price * 0.96, quote.price * 0.92, quote.price * 0.85];
        let resistance = [quote.price * 1.04, quote.price * 1.08, quote.price * 1.15];

        Ok(json!(format!(
            "{symbol} Key Levels:\n\
             Current Price: ${:.2}\n\n\
             Support Levels:\n\
             - Level 1 (Short-term): ${:.2}\n\
             - Level 2 (Medium-term): ${:.2}\n\
             - Level 3 (Strong): ${:.2}\n\n\
             Resistance Levels:\n\
             - Level 1 (Short-term): ${:.2}\n\
             - Level 2 (Medium-term): ${:.2}\n\
             - Level 3 (Strong): ${:.2}\n\n\
             These levels are calculated based on recent price action and are useful for setting stop losses and take profit targets.",
            quote.price,
            support[0],
            support[1],
            support[2],
            resistance[0],
            resistance[1],
            resistance[2],
        )))
    }
}

pub struct GetNews;

const HEADLINES: &[(&str, &str)] = &[
    ("Bitcoin breaks above $48k resistance level", "CryptoNews"),
    ("Ethereum staking rewards increase by 15%", "DeFi Times"),
    ("Major exchange launches new trading pairs", "Trading Updates"),
];

#[async_trait]
impl OperationHandler for GetNews {
    async fn run(&self, args: ValidatedArguments) -> Result<Value, HandlerError> {
        let topic = args.str("symbol").unwrap_or("general").to_string();
        let limit = args.i64("limit").unwrap_or(5).max(0) as usize;

        let items = HEADLINES
            .iter()
            .take(limit)
            .map(|(title, source)| format!("- {title} ({source})"))
            .collect::<Vec<_>>()
            .join("\n");

        Ok(json!(format!("Latest crypto headlines ({topic}):\n{items}")))
    }
}

pub struct PredictPrice {
    book: Arc<MarketBook>,
}

impl PredictPrice {
    pub fn new(book: Arc<MarketBook>) -> Self {
        Self { book }
    }
}

#[async_trait]
impl OperationHandler for PredictPrice {
    async fn run(&self, args: ValidatedArguments) -> Result<Value, HandlerError> {
        let symbol = args.str("symbol").unwrap_or_default().to_uppercase();
        let hours = args.i64("hours_ahead").unwrap_or(24).max(1);
        let quote = self.book.quote(&symbol).ok_or_else(|| unknown_symbol(&symbol))?;

        // Deterministic drift: extrapolate the 24h change over the horizon.
        let drift = quote.change_percent / 100.0 * (hours as f64 / 24.0);
        let predicted = (quote.price * (1.0 + drift) * 100.0).round() / 100.0;
        let direction = if predicted >= quote.price { "up" } else { "down" };

        Ok(json!(format!(
            "{symbol} {hours}h Price Prediction:\n\
             Current Price: ${:.2}\n\
             Predicted Price: ${predicted:.2}\n\
             Direction: {direction}\n\n\
             Prediction extrapolates the current 24h momentum and is for informational purposes only, not financial advice.",
            quote.price,
        )))
    }
}
