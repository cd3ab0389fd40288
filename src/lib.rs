pub mod backend;
pub mod capture;
pub mod command_log;
pub mod config;
pub mod console;
pub mod dashboard;
pub mod error;
pub mod pose;
pub mod protocol;
pub mod render;
pub mod store;
pub mod sync;

pub use error::{Error, Result, ValidationError};
