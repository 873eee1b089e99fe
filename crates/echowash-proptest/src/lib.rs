//! Property-based test support for the echowash workspace.
//!
//! Provides stream/frame generators and signal metrics used by the
//! integration and property tests of the pipeline crates.
//!
//! # Usage
//!
//! ```ignore
//! use echowash_proptest::generators::*;
//! use test_strategy::proptest;
//!
//! #[proptest]
//! fn my_test(#[strategy(frame_f32(16000, 1))] frame: Vec<f32>) {
//!     assert_eq!(frame.len(), 160);
//! }
//! ```

pub mod generators;
pub mod metrics;

pub use proptest;
pub use test_strategy;
