//! # Access Policy
//!
//! Decides whether a candidate email gets onto a Minecraft server's whitelist.
//!
//! Every server carries an [`AccessLevel`] and an [`AppealPolicy`]. Together with
//! an optional required email domain and a membership lookup they produce an
//! [`AccessDecision`]:
//!
//! * **Granted** - the email qualifies and the server does not force review
//! * **Review** - an admin has to look at the request before access is given
//! * **Denied** - the email does not qualify and appeals are closed
//!
//! This crate is the only place the rule lives. The HTTP layer calls
//! [`evaluate`] for registration, appeal submission and the public access
//! preview, so the three can never disagree.
//!
//! ```rust
//! use access_policy::{evaluate, AccessLevel, AppealPolicy, NoMembership, ServerPolicy};
//!
//! let policy = ServerPolicy {
//!     access_level: AccessLevel::Student,
//!     appeal_policy: AppealPolicy::NonStudent,
//!     required_email_domain: Some("@student.uu.se".to_string()),
//! };
//!
//! let decision = evaluate(&policy, "alex@gmail.com", &NoMembership).unwrap();
//! assert!(decision.outcome.is_review());
//! ```

pub mod email;
pub mod evaluate;
pub mod types;

pub use evaluate::{evaluate, AccessDecision, AccessOutcome, DenialReason};
pub use types::{
    AccessLevel, AppealPolicy, MembershipError, MembershipLookup, NoMembership, ServerPolicy,
};
