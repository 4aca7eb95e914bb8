pub mod app;
pub mod client;
pub mod config;
pub mod dashboard;
pub mod logging;
pub mod map;
pub mod model;
pub mod render;
pub mod search;
