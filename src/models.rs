//! Data structures for representing discovery results.
mod gateway;
mod interface;
mod neighbor;
mod request;

pub use gateway::*;
pub use interface::*;
pub use neighbor::*;
pub use request::*;
