//! Policy vocabulary shared by the evaluator and the server configuration.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Who may join a server without review.
///
/// Older server records use `public` and `verified` for what is now `open`;
/// both are accepted when reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AccessLevel {
    /// Any verified email
    #[default]
    #[serde(alias = "public", alias = "verified")]
    Open,
    /// Email must end with the server's required domain
    Student,
    /// Email must appear on the membership list
    Member,
    /// Every request is reviewed by an admin
    AppealOnly,
}

impl AccessLevel {
    /// Wire name of the level.
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessLevel::Open => "open",
            AccessLevel::Student => "student",
            AccessLevel::Member => "member",
            AccessLevel::AppealOnly => "appeal_only",
        }
    }

    /// Parses a stored level, falling back to [`AccessLevel::Open`] for unknown values.
    pub fn parse_lenient(value: &str) -> Self {
        match value.trim() {
            "student" => AccessLevel::Student,
            "member" => AccessLevel::Member,
            "appeal_only" => AccessLevel::AppealOnly,
            _ => AccessLevel::Open,
        }
    }
}

/// When a request that does not qualify may still go to an admin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AppealPolicy {
    #[default]
    Never,
    /// Every request is reviewed, even qualifying ones
    Always,
    /// Emails failing the server's credential check may appeal
    NonStudent,
    /// Non-members may appeal on membership servers
    NonMember,
}

impl AppealPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppealPolicy::Never => "never",
            AppealPolicy::Always => "always",
            AppealPolicy::NonStudent => "non_student",
            AppealPolicy::NonMember => "non_member",
        }
    }

    /// Parses a stored policy, falling back to [`AppealPolicy::Never`] for unknown values.
    pub fn parse_lenient(value: &str) -> Self {
        match value.trim() {
            "always" => AppealPolicy::Always,
            "non_student" => AppealPolicy::NonStudent,
            "non_member" => AppealPolicy::NonMember,
            _ => AppealPolicy::Never,
        }
    }
}

/// The policy-relevant slice of a server's configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ServerPolicy {
    pub access_level: AccessLevel,
    pub appeal_policy: AppealPolicy,
    /// Suffix the email must end with on student servers, e.g. `@student.uu.se`
    pub required_email_domain: Option<String>,
}

/// Failure to consult the membership list.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MembershipError {
    /// The list file could not be found
    #[error("membership list missing: {0}")]
    ListMissing(String),

    /// The list exists but could not be read or parsed
    #[error("membership list unavailable: {0}")]
    Unavailable(String),
}

/// Source of truth for "is this email a member".
///
/// Implementations receive the raw email and are responsible for their own
/// canonicalization.
pub trait MembershipLookup: Send + Sync {
    fn is_member(&self, email: &str) -> Result<bool, MembershipError>;
}

/// Lookup for deployments without a membership list. Nobody is a member.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoMembership;

impl MembershipLookup for NoMembership {
    fn is_member(&self, _email: &str) -> Result<bool, MembershipError> {
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_level_names_read_as_open() {
        let level: AccessLevel = serde_json::from_str("\"public\"").unwrap();
        assert_eq!(level, AccessLevel::Open);

        let level: AccessLevel = serde_json::from_str("\"verified\"").unwrap();
        assert_eq!(level, AccessLevel::Open);

        let level: AccessLevel = serde_json::from_str("\"appeal_only\"").unwrap();
        assert_eq!(level, AccessLevel::AppealOnly);
    }

    #[test]
    fn lenient_parsing_defaults() {
        assert_eq!(AccessLevel::parse_lenient("nonsense"), AccessLevel::Open);
        assert_eq!(AccessLevel::parse_lenient(" member "), AccessLevel::Member);
        assert_eq!(AppealPolicy::parse_lenient(""), AppealPolicy::Never);
        assert_eq!(AppealPolicy::parse_lenient("non_member"), AppealPolicy::NonMember);
    }

    #[test]
    fn serialized_names_match_as_str() {
        for level in [
            AccessLevel::Open,
            AccessLevel::Student,
            AccessLevel::Member,
            AccessLevel::AppealOnly,
        ] {
            let json = serde_json::to_string(&level).unwrap();
            assert_eq!(json, format!("\"{}\"", level.as_str()));
        }
        for policy in [
            AppealPolicy::Never,
            AppealPolicy::Always,
            AppealPolicy::NonStudent,
            AppealPolicy::NonMember,
        ] {
            let json = serde_json::to_string(&policy).unwrap();
            assert_eq!(json, format!("\"{}\"", policy.as_str()));
        }
    }
}
