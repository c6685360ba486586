#![forbid(unsafe_code)]

pub mod error;
pub mod import;
pub mod model;
pub mod ordering;

pub use error::Error;
