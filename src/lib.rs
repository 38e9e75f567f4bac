// Latency Profile Generator - Library root

pub mod completion;
pub mod config;
pub mod error;
pub mod routes;
pub mod sweep;
