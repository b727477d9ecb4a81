pub mod analysis;
pub mod browser;
pub mod config;
pub mod error;
pub mod feed;
pub mod models;
pub mod pipeline;
pub mod report;
pub mod session;
