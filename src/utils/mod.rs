//! Utility functions and helpers.

pub mod http;
pub mod url;

pub use url::{absolute_url, extract_post_id};
