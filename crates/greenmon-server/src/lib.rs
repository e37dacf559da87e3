pub mod api;
pub mod app;
pub mod config;
pub mod ingest;
pub mod logging;
pub mod state;
