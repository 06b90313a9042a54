use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // word segments joined by single separators: local@domain.tld
    static ref EMAIL_PATTERN: Regex = Regex::new(
        r"^[0-9A-Za-z_]+([-+.][0-9A-Za-z_]+)*@[0-9A-Za-z_]+([-.][0-9A-Za-z_]+)*\.[0-9A-Za-z_]+([-.][0-9A-Za-z_]+)*$"
    )
    .expect("email pattern is a valid regex");
}

/// Syntactic email check. The whole string must match.
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_PATTERN.is_match(email)
}

/// Canonical form used for lookup and storage.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
