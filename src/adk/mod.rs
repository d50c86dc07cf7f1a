// SPDX-License-Identifier: MIT

//! Collaborator kit - the external capabilities node executors call into
//!
//! - [model] - chat model trait and an OpenAI-compatible implementation
//! - [http] - HTTP transport trait and a `reqwest` implementation
//! - [tool] - tool trait and the in-process tool registry
//! - [error] - crate-wide error types

pub mod error;
pub mod http;
pub mod model;
pub mod tool;
