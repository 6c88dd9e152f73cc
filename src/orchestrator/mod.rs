//! Application-level orchestration.
//!
//! Owns the service session (client + advisory cache) and the controller loop
//! that turns UI commands into remote calls. UI/CLI layers call into this module
//! instead of talking to the client directly.

mod controller;

pub(crate) use controller::{run_controller, AppEvent, Session, UiCommand};
