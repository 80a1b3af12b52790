//! Core types, update policy, and trait definitions for the WebAPK updater.
//!
//! This crate is deliberately free of HTTP and database dependencies. The
//! policy functions are pure; persistence and network access live behind the
//! traits in [`store`] and [`collab`].

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod app;
pub mod collab;
pub mod error;
pub mod lifecycle;
pub mod manifest;
pub mod policy;
pub mod reason;
pub mod store;

pub use error::{Error, Result};
