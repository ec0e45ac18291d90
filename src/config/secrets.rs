//! Secret handling utilities.
//!
//! Re-exports secrecy types so the connection URLs can be exposed only at
//! the point a client is built.

pub use secrecy::{ExposeSecret, SecretString};
