//! `openusd-text` is a native Rust parser for the USDA (USD ASCII) text format.
//!
//! The parser does not build a scene graph. It emits construction events
//! through the [`usda::Builder`] trait, leaving the layout of the stage to the caller.

pub mod sdf;
pub mod usda;

pub use half::f16;
