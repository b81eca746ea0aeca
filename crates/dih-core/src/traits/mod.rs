//! Cross-cutting traits.

pub mod cancellation;
