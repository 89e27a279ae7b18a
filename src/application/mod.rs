//! Application layer: the challenge session components.
//!
//! Every component talks to the outside world through the ports in
//! [`crate::domain::ports`] and wraps each upstream call in a bounded guard,
//! so a slow collaborator surfaces as `UpstreamUnavailable` instead of a hung
//! request.

pub mod client_action;
pub mod notifier;
pub mod orchestrator;
pub mod poller;
pub mod step_builder;
pub(crate) mod upstream;

#[cfg(test)]
pub(crate) mod testing;
