// SPDX-License-Identifier: MIT

//! Graph compilation and execution
//!
//! - [engine] - single-path state graph the compiled workflows run on
//! - [compiler] - definition to executable graph translation
//! - [cache] - shared definition and compiled graph caches

pub mod cache;
pub mod compiler;
pub mod engine;

pub use cache::WorkflowCache;
pub use compiler::{CompilerHandle, CompilerSettings, Completion, ExecutableGraph, GraphCompiler};
pub use engine::{Next, DEFAULT_MAX_STEPS};
