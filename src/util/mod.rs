//! Utility functions shared by the sync engine and the CLI.
//!
//! - **URL canonicalization**: the natural key used to deduplicate feeds and articles
//! - **Text processing**: terminal-safe rendering of remote-controlled strings
//!
//! # Examples
//!
//! ```
//! use fluxsync::util::{canonical_url, fit_width, sanitize_line};
//!
//! assert_eq!(
//!     canonical_url("  HTTPS://Example.com:443/post#comments ").as_deref(),
//!     Some("https://example.com/post")
//! );
//! assert_eq!(sanitize_line("multi\nline\x1b[31m title"), "multi line title");
//! assert_eq!(fit_width("Hello World", 8), "Hello...");
//! ```

mod canonical;
mod text;

pub use self::canonical::canonical_url;
pub use self::text::{fit_width, sanitize_line};
