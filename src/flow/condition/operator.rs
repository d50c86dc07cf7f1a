// SPDX-License-Identifier: MIT

//! Comparison operators and rule logic types

use std::fmt;

/// Comparison applied by a single condition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Equals,
    NotEquals,
    Contains,
    IsEmpty,
    IsNotEmpty,
    GreaterThan,
    LessThan,
}

impl Operator {
    /// Parse an operator name; spaces, underscores and case are ignored
    pub fn parse(name: &str) -> Option<Self> {
        let normalized = name.trim().to_ascii_lowercase().replace([' ', '_'], "-");
        match normalized.as_str() {
            "equals" | "==" | "eq" => Some(Self::Equals),
            "not-equals" | "!=" | "ne" => Some(Self::NotEquals),
            "contains" => Some(Self::Contains),
            "is-empty" => Some(Self::IsEmpty),
            "is-not-empty" => Some(Self::IsNotEmpty),
            "greater-than" | ">" | "gt" => Some(Self::GreaterThan),
            "less-than" | "<" | "lt" => Some(Self::LessThan),
            _ => None,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Equals => "equals",
            Self::NotEquals => "not-equals",
            Self::Contains => "contains",
            Self::IsEmpty => "is-empty",
            Self::IsNotEmpty => "is-not-empty",
            Self::GreaterThan => "greater-than",
            Self::LessThan => "less-than",
        };
        write!(f, "{}", s)
    }
}

/// How a rule combines its conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogicType {
    #[default]
    And,
    Or,
    /// Matches regardless of its conditions
    Default,
}

impl LogicType {
    /// Parse a logic type; anything unrecognized behaves as AND
    pub fn parse(name: Option<&str>) -> Self {
        match name.map(str::trim) {
            Some(s) if s.eq_ignore_ascii_case("or") => Self::Or,
            Some(s) if s.eq_ignore_ascii_case("default") => Self::Default,
            Some(s) if !s.is_empty() && !s.eq_ignore_ascii_case("and") => {
                log::warn!("Unknown logic type '{}', treating as AND", s);
                Self::And
            }
            _ => Self::And,
        }
    }
}
