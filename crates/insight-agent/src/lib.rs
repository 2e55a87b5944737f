//! A chat playground over a Llama Stack server, with connector and builtin
//! tool groups, knowledge sources and streamed answers.
//!
//! The crate includes a CLI tool for using in the terminal. And you can also
//! use [`Playground`] as a library with any [`Backend`] implementation.
//!
//! [`Backend`]: insight_agent_backend::Backend

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

mod playground;

pub use playground::{Playground, PlaygroundSettings, split_prompts};

/// Re-exports of [`insight_agent_backend`] crate.
pub mod backend {
    pub use insight_agent_backend::*;
}

/// Re-exports of [`insight_agent_core`] crate.
pub mod core {
    pub use insight_agent_core::*;
}

/// Re-exports of [`insight_agent_llama_stack`] crate.
pub mod llama_stack {
    pub use insight_agent_llama_stack::*;
}
