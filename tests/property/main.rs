//! Property-based soundness tests.
//!
//! Run with: `cargo test --test property`

mod mask_shape;
mod pipeline_soundness;
