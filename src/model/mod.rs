pub mod bert;
pub mod config;
