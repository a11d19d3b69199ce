//! Email acceptance policy for new accounts.

use super::AccountError;

/// Domain suffixes accepted for new accounts. A domain matches when it equals
/// a suffix or is a subdomain of it.
pub const ACCEPTED_EMAIL_DOMAINS: &[&str] = &[
    "example.com",
    "163.com",
    "126.com",
    "qq.com",
    "gmail.com",
    "outlook.com",
    "hotmail.com",
    "yahoo.com",
    "icloud.com",
];

/// Returns the canonical form under which an email is stored and compared.
///
/// Addresses are compared case-insensitively, so the whole address is
/// lowercased.
pub fn normalize_email(email: &str) -> String {
    email.to_ascii_lowercase()
}

/// Checks that `email` is well formed and belongs to an accepted domain.
pub fn validate_email(email: &str) -> Result<(), AccountError> {
    let reject = |reason: &'static str| AccountError::InvalidEmail {
        email: email.to_string(),
        reason,
    };

    if email.chars().any(char::is_whitespace) {
        return Err(reject("contains whitespace"));
    }

    let mut parts = email.split('@');
    let (Some(local), Some(domain), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(reject("must contain exactly one '@'"));
    };

    if local.is_empty() {
        return Err(reject("local part is empty"));
    }
    if domain.is_empty() {
        return Err(reject("domain is empty"));
    }

    let domain = domain.to_ascii_lowercase();
    let accepted = ACCEPTED_EMAIL_DOMAINS.iter().any(|suffix| {
        domain == *suffix
            || domain
                .strip_suffix(suffix)
                .is_some_and(|head| head.len() > 1 && head.ends_with('.'))
    });

    if accepted {
        Ok(())
    } else {
        Err(reject("domain is not accepted"))
    }
}
