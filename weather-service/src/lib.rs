pub mod api;
pub mod cache;
pub mod config;
pub mod forecast;
pub mod handlers;
pub mod lookup;
pub mod models;
pub mod openapi;
