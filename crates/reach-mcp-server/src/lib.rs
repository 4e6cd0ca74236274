pub mod cache;
pub mod config;
pub mod resources;
pub mod server;
pub mod tools;
