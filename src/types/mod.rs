//! Client Types
//!
//! Token, cookie and configuration types.

pub mod config;
pub mod cookie;
pub mod token;

pub use config::*;
pub use cookie::*;
pub use token::*;
