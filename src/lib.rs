pub mod auth;
pub mod config;
pub mod database;
pub mod errors;
pub mod imaging;
pub mod search;
pub mod server;
pub mod services;
pub mod storage;
pub mod vision;
