pub mod app;
pub mod auth;
pub mod browse;
pub mod catalog;
pub mod config;
pub mod detail;
pub mod error;
pub mod ledger;
pub mod models;
pub mod recommend;
pub mod session;
pub mod store;
pub mod tmdb;
