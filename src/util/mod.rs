//! Utility functions.

pub mod format;
pub mod time;

pub use format::{display_model_name, format_cost, format_percent, format_tokens};
pub use time::{format_reset_window, parse_reset};
