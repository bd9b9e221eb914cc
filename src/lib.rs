//! Canvas Assist: assistant management and transcription proxy for the
//! canvas chat front-end.

pub mod assistants;
pub mod config;
pub mod error;
pub mod server;
pub mod store;
pub mod transcription;
