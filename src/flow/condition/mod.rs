// SPDX-License-Identifier: MIT

//! Rule evaluation for conditional routing
//!
//! A rule is an ordered list of conditions combined with AND/OR logic.
//! Condition fields and values are templates resolved against the state
//! before comparison.

pub mod evaluator;
pub mod operator;

pub use evaluator::{evaluate_condition, evaluate_rule, evaluate_rules, DEFAULT_ROUTE};
pub use operator::{LogicType, Operator};
