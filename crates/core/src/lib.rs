//! Core logic including tool group resolution, agent configuration,
//! session caching, turn execution and event reduction.

#![deny(missing_docs)]
#![deny(clippy::missing_safety_doc)]

#[macro_use]
extern crate tracing;

mod cache;
mod config;
pub mod conversation;
mod error;
mod executor;
pub mod react;
pub mod reducer;
mod session;
pub mod toolgroup;

pub use cache::{AgentHandle, SessionCache};
pub use config::{AgentConfigBuilder, DEFAULT_INSTRUCTIONS, DEFAULT_MAX_TOKENS};
pub use error::{ConfigurationError, Error};
pub use executor::{TurnEvents, TurnExecutor};
pub use react::ReActOutput;
pub use reducer::{Fragment, Fragments};
pub use session::{Session, Turn};
