//! Mock market data and the CryptoPulse operation catalog.

use std::sync::Arc;

use serde_json::json;

use cryptopulse_ops::{FieldSpec, InputSchema, OperationRegistry, OperationSpec};

pub mod book;
pub mod handlers;

pub use book::{MarketBook, Quote};

/// Builds the full operation catalog over the given market book, in the
/// order both transports list it.
pub fn registry_with_book(book: Arc<MarketBook>) -> cryptopulse_ops::Result<OperationRegistry> {
    let mut registry = OperationRegistry::new();

    registry.register(OperationSpec::new(
        "get_price",
        "Get the current price of a cryptocurrency",
        InputSchema::new().field(
            FieldSpec::string("symbol", "The cryptocurrency symbol (e.g., BTC, ETH, SOL)")
                .required(),
        ),
        Arc::new(handlers::GetPrice::new(book.clone())),
    ))?;

    registry.register(OperationSpec::new(
        "get_market_overview",
        "Get an overview of the entire cryptocurrency market",
        InputSchema::new().field(
            FieldSpec::integer("limit", "Number of top cryptocurrencies to return")
                .with_default(json!(5)),
        ),
        Arc::new(handlers::GetMarketOverview::new(book.clone())),
    ))?;

    registry.register(OperationSpec::new(
        "analyze_trend",
        "Analyze the trend and provide technical insights for a cryptocurrency",
        InputSchema::new()
            .field(FieldSpec::string("symbol", "The cryptocurrency symbol").required())
            .field(
                FieldSpec::enumeration(
                    "timeframe",
                    "Timeframe for analysis",
                    &["1h", "4h", "1d", "1w"],
                )
                .with_default(json!("1d")),
            ),
        Arc::new(handlers::AnalyzeTrend::new(book.clone())),
    ))?;

    registry.register(OperationSpec::new(
        "calculate_rsi",
        "Calculate the Relative Strength Index (RSI) for a cryptocurrency",
        InputSchema::new()
            .field(FieldSpec::string("symbol", "The cryptocurrency symbol").required())
            .field(FieldSpec::integer("period", "RSI period (default 14)").with_default(json!(14))),
        Arc::new(handlers::CalculateRsi::new(book.clone())),
    ))?;

    registry.register(OperationSpec::new(
        "get_support_resistance",
        "Get key support and resistance levels for a cryptocurrency",
        InputSchema::new()
            .field(FieldSpec::string("symbol", "The cryptocurrency symbol").required()),
        Arc::new(handlers::GetSupportResistance::new(book.clone())),
    ))?;

    registry.register(OperationSpec::new(
        "get_news",
        "Get latest news about cryptocurrencies",
        InputSchema::new()
            .field(FieldSpec::string("symbol", "Specific cryptocurrency symbol"))
            .field(
                FieldSpec::integer("limit", "Number of news items to return").with_default(json!(5)),
            ),
        Arc::new(handlers::GetNews),
    ))?;

    registry.register(OperationSpec::new(
        "predict_price",
        "Predict the future price of a cryptocurrency based on momentum analysis",
        InputSchema::new()
            .field(FieldSpec::string("symbol", "The cryptocurrency symbol").required())
            .field(
                FieldSpec::integer("hours_ahead", "Number of hours to predict ahead")
                    .with_default(json!(24)),
            ),
        Arc::new(handlers::PredictPrice::new(book)),
    ))?;

    Ok(registry)
}

/// Catalog over the default mock book.
pub fn default_registry() -> cryptopulse_ops::Result<OperationRegistry> {
    registry_with_book(Arc::new(MarketBook::default()))
}
