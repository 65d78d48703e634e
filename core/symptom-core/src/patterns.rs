//! Compiled regex patterns.
//!
//! Compiled once on first use and reused for every intervention created.

use once_cell::sync::Lazy;
use regex::Regex;

/// Any run of characters that cannot appear in an intervention id slug.
pub static RE_SLUG_SEPARATOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9]+").unwrap());

/// Lower-cases `name` and collapses every run of non-alphanumeric characters
/// into a single `-`. Leading and trailing dashes are kept, matching how ids
/// have always been generated.
pub fn slugify(name: &str) -> String {
    RE_SLUG_SEPARATOR
        .replace_all(&name.to_lowercase(), "-")
        .into_owned()
}
