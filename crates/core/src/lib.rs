//! Core data types for the price monitor.

pub mod alert;
pub mod coin;
pub mod price;
pub mod provider;

pub use alert::*;
pub use coin::*;
pub use price::*;
pub use provider::*;
