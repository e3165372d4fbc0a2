pub mod bootstrap;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod models;
pub mod services;
pub mod web;

pub use config::*;
pub use domain::errors::*;
pub use models::*;
pub use services::*;
