//! Session orchestration.
//!
//! [`controller`] holds the synchronous state machine; [`actor`] wraps it in
//! a tokio task so every host notification, stroke commit, and bundle action
//! runs on one cooperative context.

mod actor;
mod controller;

pub use actor::{SessionCommand, SessionHandle, spawn_session};
pub use controller::{PresentationSessionController, RenderSurface};
