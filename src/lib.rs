pub mod analyzers;
pub mod chart;
pub mod checks;
pub mod config;
pub mod credentials;
pub mod decoder;
pub mod fetch;
pub mod infra;
pub mod output;
pub mod parser;
pub mod report;
pub mod services;
