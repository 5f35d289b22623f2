pub mod api;
pub mod auth;
pub mod config;
pub mod playground;
pub mod render;
pub mod session;
