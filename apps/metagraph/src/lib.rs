//! # metagraph
//!
//! The metagraph binary as a library: the HTTP API, the CLI and the
//! configuration file they share. Integration tests drive the API through
//! `metagraph::api::create_router`.

pub mod api;
pub mod cli;
pub mod config;
