//! Fetch an Instagram profile and its recent posts as a single JSON object.

pub mod commands;
pub mod datetime_utils;
pub mod error_utils;
pub mod instagram;
pub mod profile;
