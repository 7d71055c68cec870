//! Storage module for autorun
//!
//! - `json`: JSON file load/save (configuration)

mod json;

pub use json::JsonStore;
