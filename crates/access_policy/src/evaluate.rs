//! The access decision.

use serde::Serialize;

use crate::email::has_domain;
use crate::types::{AccessLevel, AppealPolicy, MembershipError, MembershipLookup, ServerPolicy};

/// Why a request was turned away.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "domain", rename_all = "snake_case")]
pub enum DenialReason {
    MembershipRequired,
    EmailDomainRequired(String),
    VerifiedEmailRequired,
}

impl DenialReason {
    /// Message shown to the applicant.
    pub fn message(&self) -> String {
        match self {
            DenialReason::MembershipRequired => {
                "This server requires a verified membership email. Appeals are disabled for non-members."
                    .to_string()
            }
            DenialReason::EmailDomainRequired(domain) => format!(
                "This server requires an email ending with {domain}. Appeals are disabled for other addresses."
            ),
            DenialReason::VerifiedEmailRequired => {
                "This server requires a verified email for access.".to_string()
            }
        }
    }
}

/// What happens to a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", content = "reason", rename_all = "snake_case")]
pub enum AccessOutcome {
    /// Access is given immediately
    Granted,
    /// The request waits for an admin
    Review,
    Denied(DenialReason),
}

impl AccessOutcome {
    pub fn is_granted(&self) -> bool {
        matches!(self, AccessOutcome::Granted)
    }

    pub fn is_review(&self) -> bool {
        matches!(self, AccessOutcome::Review)
    }

    pub fn is_denied(&self) -> bool {
        matches!(self, AccessOutcome::Denied(_))
    }
}

/// Full result of [`evaluate`], including the facts the outcome was derived from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessDecision {
    pub outcome: AccessOutcome,
    /// The email satisfies every credential the server requires
    pub qualifies: bool,
    /// A non-qualifying email may still be sent for review
    pub appeals_enabled: bool,
    /// Policy after `appeal_only` servers are forced to `always`
    pub effective_policy: AppealPolicy,
    /// Student server and the email passed the domain check
    pub student_email: bool,
    /// Membership server and the email is on the list
    pub member: bool,
}

impl AccessDecision {
    /// True when the email passed a credential check the server actually required.
    pub fn has_credential(&self) -> bool {
        self.student_email || self.member
    }
}

/// Evaluates `email` against a server's policy.
///
/// The membership lookup is consulted only for [`AccessLevel::Member`] servers;
/// a lookup failure is returned as-is so the caller can map it to a status code.
///
/// # Arguments
///
/// * `policy` - The server's access level, appeal policy and optional domain
/// * `email` - The applicant's email, in any case and with stray whitespace
/// * `membership` - Membership list used for member-only servers
pub fn evaluate(
    policy: &ServerPolicy,
    email: &str,
    membership: &dyn MembershipLookup,
) -> Result<AccessDecision, MembershipError> {
    let requires_student = policy.access_level == AccessLevel::Student;
    let requires_member = policy.access_level == AccessLevel::Member;

    let domain = policy
        .required_email_domain
        .as_deref()
        .map(str::trim)
        .filter(|domain| !domain.is_empty());

    // A student server without a configured domain accepts any verified email.
    let student_email = requires_student && domain.map_or(true, |d| has_domain(email, d));
    let member = requires_member && membership.is_member(email)?;

    let qualifies = (!requires_student || student_email) && (!requires_member || member);

    let effective_policy = if policy.access_level == AccessLevel::AppealOnly {
        AppealPolicy::Always
    } else {
        policy.appeal_policy
    };

    let appeals_enabled = effective_policy == AppealPolicy::Always
        || (requires_member
            && !member
            && matches!(
                effective_policy,
                AppealPolicy::NonStudent | AppealPolicy::NonMember
            ))
        || (requires_student && !student_email && effective_policy == AppealPolicy::NonStudent);

    let outcome = if effective_policy == AppealPolicy::Always {
        AccessOutcome::Review
    } else if qualifies {
        AccessOutcome::Granted
    } else if appeals_enabled {
        AccessOutcome::Review
    } else if requires_member {
        AccessOutcome::Denied(DenialReason::MembershipRequired)
    } else if let Some(domain) = domain {
        AccessOutcome::Denied(DenialReason::EmailDomainRequired(domain.to_string()))
    } else {
        AccessOutcome::Denied(DenialReason::VerifiedEmailRequired)
    };

    Ok(AccessDecision {
        outcome,
        qualifies,
        appeals_enabled,
        effective_policy,
        student_email,
        member,
    })
}
