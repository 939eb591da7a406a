//! REST client for `https://bconomy.net/api/data`.
//!
//! Every request is a `POST` with a JSON body selecting the data set
//! (see [`request::DataRequest`]) and the API key in the `x-api-key` header.

pub mod provider;
pub mod request;
pub mod response;

pub use provider::{BconomyProvider, BconomySettings, DEFAULT_ENDPOINT};
