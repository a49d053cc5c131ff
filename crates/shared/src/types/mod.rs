//! Common types used across the application.

pub mod id;
pub mod product;

pub use id::*;
pub use product::Product;
