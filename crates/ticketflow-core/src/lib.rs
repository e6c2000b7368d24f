pub mod config;
pub mod corrector;
pub mod criteria;
pub mod engine;
pub mod errors;
pub mod fingerprint;
pub mod model;
pub mod parser;
pub mod providers;
pub mod report;
pub mod validate;
