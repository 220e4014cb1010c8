pub mod config;
pub mod helpers;
pub mod report;
pub mod tracking;
