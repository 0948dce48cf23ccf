//! Domain name validation

use once_cell::sync::Lazy;
use regex::Regex;

/// Dot-separated labels of letters, digits and hyphens ending in an
/// alphabetic top-level label of at least two characters.
static DOMAIN_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9-]+(\.[a-zA-Z0-9-]+)*\.[a-zA-Z]{2,}$")
        .unwrap_or_else(|e| panic!("domain pattern must compile: {e}"))
});

/// Conservative hostname check run before any side effect.
///
/// # Examples
///
/// ```
/// use ssl_auto_core::is_valid_domain_name;
///
/// assert!(is_valid_domain_name("example.com"));
/// assert!(is_valid_domain_name("sub.example-domain.com"));
/// assert!(!is_valid_domain_name("example"));
/// assert!(!is_valid_domain_name("example-.com"));
/// ```
pub fn is_valid_domain_name(domain: &str) -> bool {
    // No label may start or end with a hyphen
    DOMAIN_PATTERN.is_match(domain)
        && !domain.starts_with('-')
        && !domain.ends_with('-')
        && !domain.contains("-.")
        && !domain.contains(".-")
}
