pub mod chain;
pub mod client;
pub mod error;
pub mod gateway;
pub mod parser;
pub mod poller;
pub mod sources;

pub use chain::*;
pub use client::*;
pub use error::*;
pub use gateway::*;
pub use parser::*;
pub use poller::*;
pub use sources::*;
