//! The policy `PermissionChecker` consults before letting a call through.

/// What a [`PermissionPolicy`] decided about one tool call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionDecision {
    /// The call may proceed.
    Allow,
    /// The call is rejected outright, with a human-readable reason.
    Deny(String),
    /// The call requires out-of-band confirmation this bridge cannot
    /// obtain; treated the same as `Deny` but kept distinct so a caller
    /// that *can* prompt a user may special-case it.
    Ask(String),
}

/// Decides whether a tool call is allowed to execute.
pub trait PermissionPolicy: Send + Sync {
    /// Evaluate one call.
    fn check(&self, tool_name: &str, input: &serde_json::Value) -> PermissionDecision;
}

/// A policy that allows everything. Useful as a default and in tests.
pub struct AllowAll;

impl PermissionPolicy for AllowAll {
    fn check(&self, _tool_name: &str, _input: &serde_json::Value) -> PermissionDecision {
        PermissionDecision::Allow
    }
}
