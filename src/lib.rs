pub mod api;
pub mod calendar;
pub mod cast;
pub mod config;
pub mod daemon;
pub mod locale;
pub mod models;
pub mod notify;
pub mod quiet;
