pub mod browser;
pub mod config;
pub mod discord;
pub mod error;
pub mod handler;
pub mod model;
pub mod warrior;

pub use error::Error;
