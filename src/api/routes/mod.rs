//! HTTP Routes
//!
//! Route handlers organized by functionality.

pub mod page;
