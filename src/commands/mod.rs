pub mod config;
pub mod kinds;
pub mod plan;
pub mod resolve;
pub mod state;
pub mod validate;
