//! HTTP handlers for declaration-service.

pub mod access_right;

pub use access_right::*;
