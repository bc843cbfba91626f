//! Hydroponic pH prediction service.

pub mod api;
pub mod config;
pub mod docs;
pub mod error;
pub mod model;
pub mod types;
pub mod validate;
