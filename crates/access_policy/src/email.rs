//! Email normalization.
//!
//! Two notions of "the same email" are in use:
//!
//! * [`normalize`] - trimmed and lowercased. This is the identity used for
//!   verification records and user lookups.
//! * [`canonical_member_email`] - additionally folds address variants that
//!   deliver to the same mailbox, so a member listed as `alex.b@gmail.com`
//!   matches `alexb+mc@gmail.com`.

const DOT_INSENSITIVE_DOMAINS: [&str; 2] = ["gmail.com", "googlemail.com"];

/// Trims and lowercases an email.
pub fn normalize(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Canonical mailbox form used for membership matching.
///
/// Returns an empty string when the input has no `local@domain` shape.
pub fn canonical_member_email(raw: &str) -> String {
    let trimmed = normalize(raw);
    let Some((local, domain)) = trimmed.split_once('@') else {
        return String::new();
    };
    if local.is_empty() || domain.is_empty() {
        return String::new();
    }
    // Only the first '@' separates; anything after a second '@' is dropped.
    let domain = domain.split('@').next().unwrap_or_default();
    if domain.is_empty() {
        return String::new();
    }

    let base_local = local.split('+').next().unwrap_or_default();
    let local = if DOT_INSENSITIVE_DOMAINS.contains(&domain) {
        base_local.replace('.', "")
    } else {
        base_local.to_string()
    };

    format!("{local}@{domain}")
}

/// True when `email` ends with `domain`, ignoring case and surrounding whitespace.
pub fn has_domain(email: &str, domain: &str) -> bool {
    let domain = domain.trim().to_lowercase();
    !domain.is_empty() && normalize(email).ends_with(&domain)
}
