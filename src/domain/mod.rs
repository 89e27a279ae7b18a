//! Domain layer: the challenge session entity, its value types, and the ports
//! through which the application reaches external collaborators.

pub mod browser_flow;
pub mod callback;
pub mod client_action;
pub mod instrument;
pub mod ports;
pub mod session;
pub mod signature;
