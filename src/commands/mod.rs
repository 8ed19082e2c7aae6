//! Command implementations.

mod configure;

pub use configure::*;
