//! Heuristic domain classification against static deny/allow tables
//!
//! Denylisted domains short-circuit the pipeline as invalid without ever
//! asking the oracle about a domain already known bad. Allowlisted domains
//! are trusted enough to stand in for the oracle when it is skipped or
//! unavailable.

use std::collections::HashSet;
use tracing::debug;

/// Classification of a domain by local heuristics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomainClass {
    /// Known a priori to be invalid (disposable, spamtrap, test)
    Denylisted,
    /// Known a priori to be a trustworthy mailbox provider
    Allowlisted,
    /// No local knowledge; the verdict defers to cache or oracle
    Unknown,
}

/// Domain classifier backed by static lookup tables
pub struct DomainClassifier {
    denylist: HashSet<String>,
    allowlist: HashSet<String>,
}

impl DomainClassifier {
    /// Create a classifier with the default deny/allow tables
    pub fn new() -> Self {
        let classifier = Self {
            denylist: Self::default_denylist(),
            allowlist: Self::default_allowlist(),
        };
        debug!(
            "Domain classifier initialized with {} denylisted and {} allowlisted domains",
            classifier.denylist.len(),
            classifier.allowlist.len()
        );
        classifier
    }

    /// Create a classifier with custom tables
    pub fn with_lists(denylist: HashSet<String>, allowlist: HashSet<String>) -> Self {
        Self {
            denylist,
            allowlist,
        }
    }

    /// Classify a domain; denylist wins over allowlist
    pub fn classify(&self, domain: &str) -> DomainClass {
        let domain = domain.to_lowercase();
        if self.denylist.contains(&domain) {
            debug!("Domain denylisted: {}", domain);
            DomainClass::Denylisted
        } else if self.allowlist.contains(&domain) {
            DomainClass::Allowlisted
        } else {
            DomainClass::Unknown
        }
    }

    /// Number of denylisted domains
    pub fn denylist_count(&self) -> usize {
        self.denylist.len()
    }

    /// Number of allowlisted domains
    pub fn allowlist_count(&self) -> usize {
        self.allowlist.len()
    }

    /// Disposable and spamtrap domains known bad a priori
    fn default_denylist() -> HashSet<String> {
        [
            "mailinator.com",
            "guerrillamail.com",
            "10minutemail.com",
            "sharklasers.com",
            "yopmail.com",
            "trashmail.com",
            "getnada.com",
            "dispostable.com",
            "fakeinbox.com",
            "mailnesia.com",
            "tempmail.com",
            "throwawaymail.com",
            "spam4.me",
        ]
        .iter()
        .map(|&s| s.to_string())
        .collect()
    }

    /// Major mailbox providers trusted a priori
    fn default_allowlist() -> HashSet<String> {
        [
            "gmail.com",
            "googlemail.com",
            "outlook.com",
            "hotmail.com",
            "live.com",
            "msn.com",
            "yahoo.com",
            "ymail.com",
            "icloud.com",
            "me.com",
            "aol.com",
            "protonmail.com",
            "proton.me",
            "fastmail.com",
            "zoho.com",
            "gmx.de",
            "gmx.net",
            "web.de",
            "mail.com",
        ]
        .iter()
        .map(|&s| s.to_string())
        .collect()
    }
}

impl Default for DomainClassifier {
    fn default() -> Self {
        Self::new()
    }
}
