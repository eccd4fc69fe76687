pub mod auth;
pub mod cli;
pub mod config;
pub mod database;
pub mod error;
pub mod filter;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod observer;
pub mod services;
pub mod types;
pub mod validation;

#[cfg(test)]
pub mod testing;
