//! shelfscan
//!
//! Personal book inventory intake from camera-scanned ISBN barcodes. The
//! core is a persisted, single-consumer scan queue that serially reconciles
//! each scanned ISBN against a SQLite inventory through a multi-provider
//! metadata lookup, resilient to restarts, duplicate scans, and partial
//! failures.

pub mod app_state;
pub mod config;
pub mod db;
pub mod models;
pub mod routes;
pub mod services;
