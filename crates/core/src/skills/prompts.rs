//! Default system prompts bundled at compile time.

/// Market Analyst - trends, customer, competition, price
pub const MARKET_ANALYST: &str = include_str!("defaults/market_analyst.md");

/// Design Analyst - originality, brand fit, construction
pub const DESIGN_ANALYST: &str = include_str!("defaults/design_analyst.md");

/// Production Analyst - cost, sourcing, quality, timeline
pub const PRODUCTION_ANALYST: &str = include_str!("defaults/production_analyst.md");

/// Report Writer - consolidates analyst sections for the reviewer
pub const REPORT_WRITER: &str = include_str!("defaults/report_writer.md");

/// All default prompts with their slugs
pub fn all_defaults() -> Vec<(&'static str, &'static str)> {
    vec![
        ("market_analyst", MARKET_ANALYST),
        ("design_analyst", DESIGN_ANALYST),
        ("production_analyst", PRODUCTION_ANALYST),
        ("report_writer", REPORT_WRITER),
    ]
}
