pub mod config;
pub mod data;
pub mod error;
pub mod features;
pub mod logging;
pub mod panel;
pub mod regime;
pub mod render;

pub use error::{RegimeError, Result};
