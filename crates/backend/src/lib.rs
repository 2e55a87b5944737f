//! An abstraction layer for agent backends.
//!
//! This crate establishes an unified protocol for the agent harness to
//! interact with an inference and tool-execution service: catalog queries,
//! agent and session lifecycle, and turn submission with a step event
//! stream.
//!
//! Types in this crate don't define any behavior, instead they are the
//! constraints that the implementors should adhere to. Orchestration on
//! top of them lives in its own crate.

#![deny(missing_docs)]

mod agent;
mod backend;
mod catalog;
mod error;
mod event;
mod response;

pub use agent::*;
pub use backend::*;
pub use catalog::*;
pub use error::*;
pub use event::*;
pub use response::*;
