//! API exposure modules
//!
//! Each exposure consumes a `ServerHost` and produces a Router for its
//! protocol. Only REST is served.

pub mod rest;

pub use rest::RestExposure;
