//! # kazpaGPT Core
//!
//! Domain types, traits, and error definitions shared by every kazpaGPT crate.
//! This crate has **no framework dependencies**: the HTTP gateway, the
//! knowledge engine and the LLM providers all depend inward on it.
//!
//! The LLM backend is a trait here so the gateway and the assistant can be
//! tested against scripted providers without touching the network.

pub mod error;
pub mod message;
pub mod provider;

// Re-export key types at crate root for ergonomics
pub use error::{Error, ProviderError, Result};
pub use message::{Message, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, Usage};
