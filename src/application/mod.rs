pub mod bootstrapper;
pub mod config;
pub mod database;
pub mod error;
pub mod state;
