//! End-to-end API tests against the built-in demonstration rule set.
//!
//! Run with: `cargo test --test integration`

mod detect_api;
mod json_api;
mod lifecycle;
mod map_api;
