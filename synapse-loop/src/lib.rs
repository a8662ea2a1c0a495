#![deny(missing_docs)]
//! The Agent Loop crate: ties the provider, tool execution, context
//! orchestration, session persistence, failure detection, todo reminders,
//! and hook pipelines together into one runnable agent.
//!
//! Grounded in `neuron-loop`, generalized so that iteration exhaustion and
//! failure-threshold exhaustion are reported as [`TerminationReason`]
//! values on a successful [`AgentResult`] rather than thrown as errors —
//! both are normal, documented ways for a run to end, not infrastructure
//! failures.

mod config;
mod hooks;
mod loop_impl;
mod subagent;

pub use config::LoopConfig;
pub use hooks::BoxedHook;
pub use loop_impl::{AgentLoop, AgentLoopBuilder, AgentResult, TerminationReason};
pub use subagent::LoopSubAgentRunner;
