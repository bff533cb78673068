pub mod common;
pub mod config;
pub mod domain;
pub mod storage;

// Layered boundaries: use cases and controllers over ports, adapters behind them
pub mod app;
pub mod infra;

pub mod observability;
pub mod server;
