// SPDX-License-Identifier: MIT

//! Declarative workflow graph compiler and runner

pub mod adk;
pub mod config;
pub mod flow;
pub mod server;
