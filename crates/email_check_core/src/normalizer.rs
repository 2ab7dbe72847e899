//! Address normalization: case, whitespace, typo repair, alias stripping
//!
//! This module is the first pipeline stage. It is a total, deterministic
//! function: it never fails, and applying it to its own output is a no-op.

use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Outcome of normalizing one raw address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalized {
    /// The normalized address
    pub address: String,
    /// True iff the output differs from the raw input
    pub was_corrected: bool,
}

/// Deterministic address normalizer
///
/// Substitutions are applied in a fixed order: trim/lowercase, whitespace
/// removal, exact-match domain typo repair, provider alias stripping, and
/// country-TLD re-dotting. Each substitution is independent and idempotent.
pub struct Normalizer {
    typo_table: HashMap<&'static str, &'static str>,
    plus_alias_domains: HashSet<&'static str>,
    dash_alias_domains: HashSet<&'static str>,
    tld_repairs: HashMap<&'static str, &'static str>,
    strip_aliases: bool,
    normalize_country_tlds: bool,
}

impl Normalizer {
    /// Create a normalizer with the default correction tables
    ///
    /// # Arguments
    /// * `strip_aliases` - drop address-tagging suffixes on known providers
    /// * `normalize_country_tlds` - rewrite bare country suffixes (e.g.
    ///   `example.combr` -> `example.com.br`)
    pub fn new(strip_aliases: bool, normalize_country_tlds: bool) -> Self {
        let normalizer = Self {
            typo_table: Self::default_typo_table(),
            plus_alias_domains: Self::default_plus_alias_domains(),
            dash_alias_domains: Self::default_dash_alias_domains(),
            tld_repairs: Self::default_tld_repairs(),
            strip_aliases,
            normalize_country_tlds,
        };
        debug!(
            "Normalizer initialized with {} typo entries and {} alias providers",
            normalizer.typo_table.len(),
            normalizer.plus_alias_domains.len() + normalizer.dash_alias_domains.len()
        );
        normalizer
    }

    /// Normalize a raw address
    ///
    /// Total function: malformed input (no `@`, empty string) passes through
    /// lowercased and trimmed; the format checker rejects it downstream.
    pub fn normalize(&self, raw: &str) -> Normalized {
        let mut address: String = raw
            .trim()
            .to_lowercase()
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();

        if let Some((local, domain)) = address.rsplit_once('@') {
            let mut local = local.to_string();
            let mut domain = domain.to_string();

            if let Some(fixed) = self.typo_table.get(domain.as_str()) {
                debug!("Domain typo repaired: {} -> {}", domain, fixed);
                domain = (*fixed).to_string();
            }

            if self.strip_aliases {
                if self.plus_alias_domains.contains(domain.as_str()) {
                    if let Some(pos) = local.find('+') {
                        local.truncate(pos);
                    }
                } else if self.dash_alias_domains.contains(domain.as_str()) {
                    if let Some(pos) = local.find('-') {
                        local.truncate(pos);
                    }
                }
            }

            if self.normalize_country_tlds {
                if let Some((head, last_label)) = domain.rsplit_once('.') {
                    if let Some(dotted) = self.tld_repairs.get(last_label) {
                        debug!("Country TLD repaired: {} -> {}", last_label, dotted);
                        domain = format!("{}.{}", head, dotted);
                    }
                }
            }

            address = format!("{}@{}", local, domain);
        }

        Normalized {
            was_corrected: address != raw,
            address,
        }
    }

    /// Exact-match corrections for common misspellings of major providers
    fn default_typo_table() -> HashMap<&'static str, &'static str> {
        [
            ("gmial.com", "gmail.com"),
            ("gmal.com", "gmail.com"),
            ("gamil.com", "gmail.com"),
            ("gmaill.com", "gmail.com"),
            ("gmali.com", "gmail.com"),
            ("gmai.com", "gmail.com"),
            ("gmail.co", "gmail.com"),
            ("gmail.cm", "gmail.com"),
            ("gmail.con", "gmail.com"),
            ("gnail.com", "gmail.com"),
            ("hotmial.com", "hotmail.com"),
            ("hotmal.com", "hotmail.com"),
            ("hotmail.co", "hotmail.com"),
            ("hotmail.con", "hotmail.com"),
            ("hotamil.com", "hotmail.com"),
            ("yaho.com", "yahoo.com"),
            ("yahooo.com", "yahoo.com"),
            ("yahoo.co", "yahoo.com"),
            ("yahoo.con", "yahoo.com"),
            ("outlok.com", "outlook.com"),
            ("outloo.com", "outlook.com"),
            ("outlook.co", "outlook.com"),
            ("outlook.con", "outlook.com"),
            ("iclod.com", "icloud.com"),
            ("icloud.co", "icloud.com"),
            ("icoud.com", "icloud.com"),
        ]
        .into_iter()
        .collect()
    }

    /// Providers that treat `+suffix` in the local part as an alias tag
    fn default_plus_alias_domains() -> HashSet<&'static str> {
        [
            "gmail.com",
            "googlemail.com",
            "outlook.com",
            "hotmail.com",
            "live.com",
            "msn.com",
            "icloud.com",
            "me.com",
            "protonmail.com",
            "proton.me",
            "fastmail.com",
        ]
        .into_iter()
        .collect()
    }

    /// Providers that use `-suffix` for address tagging
    fn default_dash_alias_domains() -> HashSet<&'static str> {
        ["yahoo.com", "ymail.com", "rocketmail.com"]
            .into_iter()
            .collect()
    }

    /// Bare country suffixes glued onto a second-level ending, keyed by the
    /// final label as it appears after the last remaining dot
    fn default_tld_repairs() -> HashMap<&'static str, &'static str> {
        [
            ("combr", "com.br"),
            ("comar", "com.ar"),
            ("commx", "com.mx"),
            ("comau", "com.au"),
            ("comco", "com.co"),
            ("couk", "co.uk"),
            ("cojp", "co.jp"),
            ("conz", "co.nz"),
            ("coza", "co.za"),
            ("coin", "co.in"),
        ]
        .into_iter()
        .collect()
    }
}
