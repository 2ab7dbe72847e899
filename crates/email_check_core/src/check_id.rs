//! Time-derived check identifiers with embedded client id and check digit
//!
//! Every validation attempt gets a fresh identifier: millisecond epoch
//! prefix (sortable by time), a random entropy segment, the numeric tenant
//! id, and a trailing Luhn check digit so a tampered or fabricated id can be
//! rejected cheaply.

use chrono::Utc;
use rand::Rng;
use std::fmt;

/// Identifier for one validation attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckId(String);

impl CheckId {
    /// Generate a fresh identifier embedding the given client id
    pub fn generate(client_id: u32) -> Self {
        let millis = Utc::now().timestamp_millis();
        let entropy: u32 = rand::thread_rng().gen_range(0..10_000);
        let body = format!("{}{:04}{}", millis, entropy, client_id);
        let digit = luhn_check_digit(&body);
        CheckId(format!("{}{}", body, digit))
    }

    /// Verify the trailing check digit of a candidate identifier
    pub fn is_authentic(candidate: &str) -> bool {
        if candidate.len() < 2 || !candidate.bytes().all(|b| b.is_ascii_digit()) {
            return false;
        }
        let (body, digit) = candidate.split_at(candidate.len() - 1);
        luhn_check_digit(body).to_string() == digit
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CheckId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Standard Luhn check digit over a decimal digit string
fn luhn_check_digit(digits: &str) -> u8 {
    let sum: u32 = digits
        .bytes()
        .rev()
        .enumerate()
        .map(|(i, b)| {
            let d = u32::from(b - b'0');
            if i % 2 == 0 {
                let doubled = d * 2;
                if doubled > 9 {
                    doubled - 9
                } else {
                    doubled
                }
            } else {
                d
            }
        })
        .sum();
    ((10 - (sum % 10)) % 10) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_generated_ids_are_authentic() {
        for _ in 0..50 {
            let id = CheckId::generate(42);
            assert!(CheckId::is_authentic(id.as_str()), "id: {id}");
        }
    }

    #[test]
    fn test_client_id_embedded() {
        let id = CheckId::generate(907);
        let body = &id.as_str()[..id.as_str().len() - 1];
        assert!(body.ends_with("907"));
    }

    #[test]
    fn test_tampering_detected() {
        let id = CheckId::generate(1);
        let mut tampered: Vec<u8> = id.as_str().bytes().collect();
        // Flip one digit in the time prefix
        tampered[3] = if tampered[3] == b'9' { b'0' } else { tampered[3] + 1 };
        let tampered = String::from_utf8(tampered).unwrap();
        assert!(!CheckId::is_authentic(&tampered));
    }

    #[test]
    fn test_rejects_non_numeric() {
        assert!(!CheckId::is_authentic(""));
        assert!(!CheckId::is_authentic("7"));
        assert!(!CheckId::is_authentic("12a45"));
        assert!(!CheckId::is_authentic("not-a-check-id"));
    }

    #[test]
    fn test_luhn_known_values() {
        // 7992739871 has Luhn check digit 3
        assert_eq!(luhn_check_digit("7992739871"), 3);
        assert!(CheckId::is_authentic("79927398713"));
    }

    #[test]
    fn test_ids_are_unique_per_attempt() {
        let ids: std::collections::HashSet<String> = (0..20)
            .map(|_| CheckId::generate(5).as_str().to_string())
            .collect();
        // Time prefix plus entropy segment; a rare same-millisecond entropy
        // collision is tolerated
        assert!(ids.len() >= 19);
    }
}
