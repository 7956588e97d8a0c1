//! Utility functions for common operations.
//!
//! - **Text sanitizing**: removal of terminal control sequences from provider text
//! - **Terminal layout**: Unicode-aware width calculation and wrapping for CJK text

mod text;

pub use text::{display_width, strip_control_chars, truncate_to_width, wrap_to_width};
