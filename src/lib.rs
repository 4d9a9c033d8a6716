//! Glint is a small terminal client for GLM chat-completion APIs.
//!
//! The crate is organized around a few collaborating layers:
//! - [`auth`] turns a raw `"<id>.<secret>"` API key into the short-lived
//!   signed token the service expects as its `Authorization` header.
//! - [`api`] defines the chat request/response payloads.
//! - [`core`] owns configuration and the chat transport, including the
//!   incremental stream decoder.
//! - [`cli`] parses arguments and prints streamed or complete replies.
//!
//! The binary crate (`src/main.rs`) routes through [`cli::run`].

pub mod api;
pub mod auth;
pub mod cli;
pub mod core;
pub mod utils;
