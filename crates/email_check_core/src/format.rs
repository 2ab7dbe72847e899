//! Structural address validation with an RFC-5322-lite grammar
//!
//! Pure predicate over the normalized address. Stricter than full RFC 5322
//! (no quoted strings, no domain literals) because CRM intake only accepts
//! plain dot-atom addresses.

use regex::Regex;
use std::sync::OnceLock;

/// Maximum total address length accepted
const MAX_ADDRESS_LEN: usize = 254;
/// Maximum local-part length accepted
const MAX_LOCAL_LEN: usize = 64;
/// Maximum DNS label length
const MAX_LABEL_LEN: usize = 63;

static ADDRESS_RE: OnceLock<Regex> = OnceLock::new();

fn address_re() -> &'static Regex {
    ADDRESS_RE.get_or_init(|| {
        // Dot-atom local part and hostname-style domain; dot placement and
        // label lengths are enforced separately below.
        Regex::new(
            r"^[A-Za-z0-9!#$%&'*+/=?^_`{|}~.-]+@[A-Za-z0-9-]+(\.[A-Za-z0-9-]+)+$",
        )
        .expect("address regex is valid")
    })
}

/// Check whether an address is structurally valid
///
/// Grammar: dot-atom local part (1-64 chars, no leading/trailing/consecutive
/// dots), domain of at least two dot-separated labels (1-63 chars each, no
/// leading/trailing hyphen), alphabetic top-level label of 2+ chars, and a
/// total length of at most 254.
pub fn is_valid_format(address: &str) -> bool {
    if address.is_empty() || address.len() > MAX_ADDRESS_LEN {
        return false;
    }

    if !address_re().is_match(address) {
        return false;
    }

    let Some((local, domain)) = address.rsplit_once('@') else {
        return false;
    };

    if local.is_empty() || local.len() > MAX_LOCAL_LEN {
        return false;
    }
    if local.starts_with('.') || local.ends_with('.') || local.contains("..") {
        return false;
    }
    // Exactly one @: the regex forbids @ in the domain, so reject any extra
    // in the local part too.
    if local.contains('@') {
        return false;
    }

    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 {
        return false;
    }
    for label in &labels {
        if label.is_empty() || label.len() > MAX_LABEL_LEN {
            return false;
        }
        if label.starts_with('-') || label.ends_with('-') {
            return false;
        }
    }

    let tld = labels[labels.len() - 1];
    tld.len() >= 2 && tld.chars().all(|c| c.is_ascii_alphabetic())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_common_addresses() {
        assert!(is_valid_format("user@example.com"));
        assert!(is_valid_format("jane.doe@sub.example.co.uk"));
        assert!(is_valid_format("first+tag@company.org"));
        assert!(is_valid_format("o'brien@irish-pub.ie"));
        assert!(is_valid_format("x@ab.cd"));
    }

    #[test]
    fn test_rejects_structural_garbage() {
        assert!(!is_valid_format(""));
        assert!(!is_valid_format("not-an-email"));
        assert!(!is_valid_format("@example.com"));
        assert!(!is_valid_format("user@"));
        assert!(!is_valid_format("user@localhost"));
        assert!(!is_valid_format("user@@example.com"));
        assert!(!is_valid_format("user example@example.com"));
    }

    #[test]
    fn test_rejects_bad_dots() {
        assert!(!is_valid_format(".user@example.com"));
        assert!(!is_valid_format("user.@example.com"));
        assert!(!is_valid_format("us..er@example.com"));
        assert!(!is_valid_format("user@.example.com"));
        assert!(!is_valid_format("user@example..com"));
        assert!(!is_valid_format("user@example.com."));
    }

    #[test]
    fn test_rejects_bad_labels() {
        assert!(!is_valid_format("user@-example.com"));
        assert!(!is_valid_format("user@example-.com"));
        assert!(!is_valid_format("user@example.c"));
        assert!(!is_valid_format("user@example.c0m"));
        let long_label = format!("user@{}.com", "a".repeat(64));
        assert!(!is_valid_format(&long_label));
        let ok_label = format!("user@{}.com", "a".repeat(63));
        assert!(is_valid_format(&ok_label));
    }

    #[test]
    fn test_rejects_oversized_parts() {
        let long_local = format!("{}@example.com", "a".repeat(65));
        assert!(!is_valid_format(&long_local));
        let ok_local = format!("{}@example.com", "a".repeat(64));
        assert!(is_valid_format(&ok_local));

        let long_total = format!("user@{}.com", "a.".repeat(130));
        assert!(!is_valid_format(&long_total));
    }
}
