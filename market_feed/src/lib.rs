//! Client for the Bconomy market data API.
//!
//! The crate exposes a vendor-agnostic [`providers::MarketDataProvider`] trait
//! and one concrete implementation, [`providers::bconomy_rest::BconomyProvider`],
//! plus the wire models the API returns.

pub mod models;
pub mod providers;
