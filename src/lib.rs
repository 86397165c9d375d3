//! Library exports for the binary, integration tests and benchmarks.
/// Application data directories.
pub mod app_dirs;
/// Bootstrap configuration loading.
pub mod bootstrap;
/// Interactive terminal menu.
pub mod cli;
pub(crate) mod http_client;
/// Learning-base grammar and on-disk store.
pub mod learning_base;
/// Tracing setup.
pub mod logging;
/// Prediction result file.
pub mod output;
/// Service supervision and RPC.
pub mod service;
/// Session wiring store, client and supervisor.
pub mod session;
