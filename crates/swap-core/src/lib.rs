pub mod auth;
pub mod config;
pub mod db;
pub mod http;
pub mod image_host;
pub mod images;
pub mod logging;
pub mod metrics;
pub mod migrations;
pub mod server;
