//! Price oracle adapter

mod service;

pub use service::{FeedPriceOracle, PriceOracle, StaticPriceOracle};
