#![forbid(unsafe_code)]

pub mod catalog;
pub mod error;
pub mod evaluator;
pub mod model;
pub mod simulator;
pub mod time;

pub use time::Clock;
