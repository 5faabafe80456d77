pub mod app;
pub mod auth;
pub mod client;
pub mod config;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod locale;
pub mod logging;
pub mod mail;
pub mod metrics;
pub mod server;
pub mod state;
pub mod storage;
