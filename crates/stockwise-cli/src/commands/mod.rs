//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `core` - Core commands (init, config) and shared utilities (open_db, load_config)
//! - `import` - CSV purchase import
//! - `insights` - Insight feed generation and display
//! - `purchases` - Purchase listing

pub mod core;
pub mod import;
pub mod insights;
pub mod purchases;

// Re-export command functions for main.rs
pub use self::core::*;
pub use import::*;
pub use insights::*;
pub use purchases::*;

/// Truncate a string to a maximum number of characters, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
