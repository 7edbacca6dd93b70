// 🌐 PIN Universe - every 4-digit code, and the subset worth issuing
//
// Deterministic and restartable: each call starts a fresh ascending sequence.

use crate::pin::Pin;
use crate::rules::is_valid;

/// Number of codes in the universe, "0000".."9999"
pub const UNIVERSE_SIZE: u16 = 10_000;

/// All 10,000 codes in ascending order, zero-padded to four digits
pub fn all_possible() -> impl Iterator<Item = String> {
    (0..UNIVERSE_SIZE).map(|value| format!("{:04}", value))
}

/// Keep the candidates that pass every validity rule, in candidate order
pub fn all_valid<I>(candidates: I) -> impl Iterator<Item = String>
where
    I: IntoIterator<Item = String>,
{
    candidates.into_iter().filter(|code| is_valid(code))
}

/// Map codes to fresh, unallocated PIN records, preserving order
pub fn to_entities<I, S>(codes: I) -> Vec<Pin>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    codes.into_iter().map(Pin::new).collect()
}

/// The canonical valid pool, ready to bulk-load into a store
pub fn all_valid_pins() -> Vec<Pin> {
    to_entities(all_valid(all_possible()))
}

/// Size of the canonical valid pool (9,580 for the current rule set)
pub fn valid_pool_size() -> usize {
    all_valid(all_possible()).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_all_possible() {
        let codes: Vec<String> = all_possible().collect();

        assert_eq!(codes.len(), 10_000);
        assert_eq!(codes.first().map(String::as_str), Some("0000"));
        assert_eq!(codes.last().map(String::as_str), Some("9999"));
        assert!(codes.windows(2).all(|w| w[0] < w[1]), "codes ascend");

        let unique: HashSet<&String> = codes.iter().collect();
        assert_eq!(unique.len(), 10_000);
    }

    #[test]
    fn test_all_possible_restartable() {
        assert!(all_possible().eq(all_possible()));
    }

    #[test]
    fn test_valid_pool_size() {
        assert_eq!(all_valid(all_possible()).count(), 9_580);
        assert_eq!(valid_pool_size(), 9_580);
    }

    #[test]
    fn test_all_valid_preserves_order() {
        let candidates = vec![
            "9775".to_string(),
            "1122".to_string(),
            "6442".to_string(),
            "1986".to_string(),
            "0001".to_string(),
        ];

        let valid: Vec<String> = all_valid(candidates).collect();
        assert_eq!(valid, vec!["9775", "6442", "0001"]);
    }

    #[test]
    fn test_to_entities() {
        let pins = to_entities(["0000", "1111", "5453"]);

        assert_eq!(pins.len(), 3);
        assert_eq!(pins[0].code, "0000");
        assert_eq!(pins[1].code, "1111");
        assert_eq!(pins[2].code, "5453");
        assert!(pins.iter().all(|pin| !pin.allocated));
    }

    #[test]
    fn test_all_valid_pins() {
        let pins = all_valid_pins();

        assert_eq!(pins.len(), 9_580);
        assert_eq!(pins[0].code, "0001");
        assert!(pins.iter().all(|pin| !pin.allocated && is_valid(&pin.code)));
    }
}
