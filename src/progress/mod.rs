//! Progress math for the driver's periodic log events

mod reporter;

pub use reporter::*;
