// 🏷️ Validity Rules - which PINs are too easy to guess
// Pure predicates over the 4-character string form (leading zeros preserved)
// Rule set inspired by https://www.datagenetics.com/blog/september32012/

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::pin::PIN_LENGTH;

const ASCENDING_RUN: &str = "0123456789";
const DESCENDING_RUN: &str = "9876543210";

/// Codes in this range read as a year of birth or similar
const FIRST_LOGICAL_YEAR: u16 = 1900;
const LAST_LOGICAL_YEAR: u16 = 2029;

// ============================================================================
// PREDICATES
// ============================================================================

/// Exactly four ASCII digits
pub fn is_well_formed(code: &str) -> bool {
    code.len() == PIN_LENGTH && code.bytes().all(|b| b.is_ascii_digit())
}

/// Contiguous run of "0123456789" or "9876543210" (non-wrapping)
pub fn is_sequential(code: &str) -> bool {
    ASCENDING_RUN.contains(code) || DESCENDING_RUN.contains(code)
}

/// Two pairs, e.g. "1122" or "4422"
pub fn contains_pairs(code: &str) -> bool {
    let b = code.as_bytes();
    b.len() == PIN_LENGTH && b[0] == b[1] && b[2] == b[3]
}

/// First half repeated, e.g. "4343"
pub fn contains_repeat(code: &str) -> bool {
    let b = code.as_bytes();
    b.len() == PIN_LENGTH && b[..2] == b[2..]
}

/// Numeric value lies in 1900..=2029
pub fn is_logical_year(code: &str) -> bool {
    code.parse::<u16>()
        .map(|value| (FIRST_LOGICAL_YEAR..=LAST_LOGICAL_YEAR).contains(&value))
        .unwrap_or(false)
}

pub fn is_palindromic(code: &str) -> bool {
    code.bytes().eq(code.bytes().rev())
}

/// True iff the code is well-formed and none of the five rules reject it
pub fn is_valid(code: &str) -> bool {
    is_well_formed(code)
        && !is_sequential(code)
        && !contains_pairs(code)
        && !contains_repeat(code)
        && !is_logical_year(code)
        && !is_palindromic(code)
}

/// Validate caller input as a 4-digit code
pub fn parse_code(input: &str) -> Result<String> {
    let code = input.trim();

    if code.len() != PIN_LENGTH {
        return Err(Error::InvalidCode {
            code: code.to_string(),
            reason: format!("expected {} characters, got {}", PIN_LENGTH, code.len()),
        });
    }

    if !is_well_formed(code) {
        return Err(Error::InvalidCode {
            code: code.to_string(),
            reason: "only digits 0-9 are allowed".to_string(),
        });
    }

    Ok(code.to_string())
}

// ============================================================================
// RULE DEFINITION
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WeakPinRule {
    Sequential,
    Pairs,
    Repeat,
    LogicalYear,
    Palindromic,
}

impl WeakPinRule {
    pub const ALL: [WeakPinRule; 5] = [
        WeakPinRule::Sequential,
        WeakPinRule::Pairs,
        WeakPinRule::Repeat,
        WeakPinRule::LogicalYear,
        WeakPinRule::Palindromic,
    ];

    /// Check if this rule rejects the given code
    pub fn matches(&self, code: &str) -> bool {
        match self {
            WeakPinRule::Sequential => is_sequential(code),
            WeakPinRule::Pairs => contains_pairs(code),
            WeakPinRule::Repeat => contains_repeat(code),
            WeakPinRule::LogicalYear => is_logical_year(code),
            WeakPinRule::Palindromic => is_palindromic(code),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            WeakPinRule::Sequential => "sequential",
            WeakPinRule::Pairs => "pairs",
            WeakPinRule::Repeat => "repeat",
            WeakPinRule::LogicalYear => "logical_year",
            WeakPinRule::Palindromic => "palindromic",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            WeakPinRule::Sequential => "digits form an ascending or descending run",
            WeakPinRule::Pairs => "two pairs of identical digits",
            WeakPinRule::Repeat => "first two digits repeated",
            WeakPinRule::LogicalYear => "reads as a year between 1900 and 2029",
            WeakPinRule::Palindromic => "reads the same backwards",
        }
    }
}

// ============================================================================
// RULE REPORT
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct RuleReport {
    pub code: String,
    pub malformed: bool,
    pub violations: Vec<WeakPinRule>,
}

impl RuleReport {
    pub fn is_valid(&self) -> bool {
        !self.malformed && self.violations.is_empty()
    }
}

// ============================================================================
// RULE ENGINE
// ============================================================================

/// Evaluates every rule against a code so a rejection can be explained
pub struct RuleEngine {
    rules: Vec<WeakPinRule>,
}

impl RuleEngine {
    pub fn new() -> Self {
        RuleEngine {
            rules: WeakPinRule::ALL.to_vec(),
        }
    }

    /// Run all rules; unlike `is_valid` this never short-circuits
    pub fn check(&self, code: &str) -> RuleReport {
        if !is_well_formed(code) {
            return RuleReport {
                code: code.to_string(),
                malformed: true,
                violations: Vec::new(),
            };
        }

        let violations = self
            .rules
            .iter()
            .copied()
            .filter(|rule| rule.matches(code))
            .collect();

        RuleReport {
            code: code.to_string(),
            malformed: false,
            violations,
        }
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================
