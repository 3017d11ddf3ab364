pub mod config;
pub mod context;
pub mod db;
pub mod pipeline;
pub mod scraper;
pub mod store;
