//! The three roles that make up a sync run: supervisor, driver, agent

mod agent;
mod driver;
mod supervisor;

pub use agent::*;
pub use driver::*;
pub use supervisor::*;
