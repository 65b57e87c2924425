//! Session and transport coordination for handing video playback between a
//! local player and a cast receiver.
//!
//! [`coordinator::CastCoordinator`] is the entry point: it owns the device
//! registry, the session controller, the event bus and the open viewer, and
//! processes transport callbacks, app lifecycle hooks and viewer commands on a
//! single context.

pub mod config;
pub mod coordinator;
pub mod device_registry;
pub mod error;
pub mod events;
pub mod media;
pub mod playback_state;
pub mod router;
pub mod session;
pub mod sim;
pub mod ticker;
pub mod transport;
pub mod viewer;

pub use handoff_types as types;
