// 🔢 PIN Entity - the only record the pool stores
//
// "code" is IDENTITY (never changes once created)
// "allocated" is STATE (flips on issue, cleared in bulk on rollover)

use serde::{Deserialize, Serialize};

/// Number of characters in every PIN code
pub const PIN_LENGTH: usize = 4;

/// A 4-digit PIN record as persisted by a store and returned to callers
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pin {
    /// Zero-padded 4-digit code, "0000".."9999"
    pub code: String,

    /// True once the PIN has been handed out to a caller
    pub allocated: bool,
}

impl Pin {
    /// Create a fresh, unallocated PIN
    pub fn new(code: impl Into<String>) -> Self {
        Pin {
            code: code.into(),
            allocated: false,
        }
    }

    /// Same code, marked as issued
    pub fn into_allocated(self) -> Self {
        Pin {
            allocated: true,
            ..self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_pin_is_unallocated() {
        let pin = Pin::new("0420");

        assert_eq!(pin.code, "0420");
        assert!(!pin.allocated);
    }

    #[test]
    fn test_into_allocated_keeps_code() {
        let pin = Pin::new("8361").into_allocated();

        assert_eq!(pin.code, "8361");
        assert!(pin.allocated);
    }

    #[test]
    fn test_json_shape() {
        let json = serde_json::to_value(Pin::new("0007")).unwrap();

        assert_eq!(json, serde_json::json!({"code": "0007", "allocated": false}));
    }
}
