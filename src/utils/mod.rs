pub mod error;
pub mod logger;
pub mod monitor;
pub mod number;
pub mod validation;
