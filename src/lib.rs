pub mod config;
pub mod engine;
pub mod errors;
pub mod logging;
pub mod models;
pub mod orchestrator;
pub mod progress;
pub mod runner;
pub mod sitemap;
pub mod store;
pub mod ui;
pub mod web;
