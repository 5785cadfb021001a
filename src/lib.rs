pub mod api;
pub mod config;
pub mod error;
pub mod middleware;
pub mod models;
pub mod proxy;
pub mod routes;
pub mod services;
pub mod storage;
pub mod utils;
