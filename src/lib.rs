//! Labelbench annotation engine.
//!
//! Host-agnostic core for an image labeling workstation: canvas/image
//! coordinate mapping, geometry tools, the draft/confirmed annotation
//! lifecycle, batch operations over image selections, and optimistic
//! edit locks against a remote annotation store.
//!
//! Hosts own the windowing, decoding and painting; the engine owns the
//! annotation state and talks to the collaborator. The entry point is
//! [`Workstation`].

pub mod batch;
pub mod config;
pub mod constants;
pub mod error;
pub mod event;
pub mod lifecycle;
pub mod model;
pub mod remote;
pub mod render;
pub mod session;
pub mod state;
pub mod tools;
pub mod transform;

pub use config::EngineConfig;
pub use error::{EngineError, RemoteError};
pub use event::EngineEvent;
pub use state::Workstation;
