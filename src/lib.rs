//! Teaching-material generation backend.
//!
//! The core is a structured generation pipeline: resolve question counts, compose a
//! prompt, call the generation backend with bounded retry, recover sections from the
//! model's text and apply module-specific post-processing. `routes` exposes it over
//! HTTP and WebSocket.

pub mod config;
pub mod counts;
pub mod domain;
pub mod error;
pub mod executor;
pub mod gemini;
pub mod pipeline;
pub mod postprocess;
pub mod prompt;
pub mod protocol;
pub mod recovery;
pub mod routes;
pub mod state;
pub mod telemetry;
pub mod util;
