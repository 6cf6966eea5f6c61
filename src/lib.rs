//! psicogate: session-aware gateway between the therapy-assistant dashboard
//! and its conversational backend.

pub mod config;
pub mod error;
pub mod identity;
pub mod guard;
pub mod relay;
pub mod capability;
pub mod server;
pub mod client;
