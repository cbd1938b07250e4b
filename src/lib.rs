//! `kw-trends` library crate.
//!
//! The binary (`kwt`) is a thin wrapper around this library so the batching,
//! normalization and forecasting stages can be tested without spawning
//! processes or touching the network.

pub mod app;
pub mod batch;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod features;
pub mod forecast;
pub mod io;
pub mod logging;
pub mod models;
pub mod observe;
pub mod report;
