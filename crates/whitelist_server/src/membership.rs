//! Membership list loaded from a CSV export.
//!
//! The file format is not interpreted: every email-shaped substring anywhere
//! in the file counts as a member, canonicalized so that address variants of
//! the same mailbox match.

use access_policy::email::canonical_member_email;
use access_policy::{MembershipError, MembershipLookup};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use regex::Regex;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)[A-Z0-9._%+-]+@[A-Z0-9.-]+\.[A-Z]{2,}").expect("email pattern is valid")
});

/// What is currently loaded.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MembershipStats {
    pub loaded_at: Option<DateTime<Utc>>,
    /// Emails found in the file, duplicates included
    pub count: usize,
    /// SHA-256 of the file content, hex encoded
    pub hash: Option<String>,
    pub source: String,
}

/// Result of a single membership check.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MembershipCheck {
    pub member: bool,
    pub normalized_email: String,
}

struct Loaded {
    entries: HashSet<String>,
    stats: MembershipStats,
}

/// Lazily loaded, reloadable membership list.
pub struct MembershipList {
    candidates: Vec<PathBuf>,
    loaded: RwLock<Option<Loaded>>,
}

/// Canonical emails found in `content`, in file order.
pub fn parse_emails(content: &str) -> Vec<String> {
    EMAIL_PATTERN
        .find_iter(content)
        .map(|m| canonical_member_email(m.as_str()))
        .filter(|email| !email.is_empty())
        .collect()
}

impl MembershipList {
    /// # Arguments
    ///
    /// * `candidates` - Paths tried in order; the first existing file is used
    pub fn new(candidates: Vec<PathBuf>) -> Self {
        Self {
            candidates,
            loaded: RwLock::new(None),
        }
    }

    /// Path that would be read, or the first candidate when none exists.
    pub fn source(&self) -> String {
        self.resolve()
            .or_else(|| self.candidates.first().cloned())
            .map(|p| p.display().to_string())
            .unwrap_or_default()
    }

    fn resolve(&self) -> Option<PathBuf> {
        self.candidates.iter().find(|p| p.is_file()).cloned()
    }

    /// Re-reads the list from disk.
    pub fn reload(&self) -> Result<MembershipStats, MembershipError> {
        let path = self.resolve().ok_or_else(|| {
            let tried = self
                .candidates
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", ");
            MembershipError::ListMissing(if tried.is_empty() {
                "no membership list path configured".to_string()
            } else {
                format!("tried {tried}")
            })
        })?;

        let loaded = load_file(&path)?;
        let stats = loaded.stats.clone();
        info!(
            "👥 Loaded {} membership emails from {}",
            stats.count,
            path.display()
        );
        *self.loaded.write() = Some(loaded);
        Ok(stats)
    }

    /// Stats of the loaded list, without loading it.
    pub fn stats(&self) -> MembershipStats {
        match self.loaded.read().as_ref() {
            Some(loaded) => loaded.stats.clone(),
            None => MembershipStats {
                loaded_at: None,
                count: 0,
                hash: None,
                source: self.source(),
            },
        }
    }

    fn ensure_loaded(&self) -> Result<(), MembershipError> {
        if self.loaded.read().is_none() {
            self.reload()?;
        }
        Ok(())
    }

    /// Checks `email`, loading the list on first use.
    pub fn check(&self, email: &str) -> Result<MembershipCheck, MembershipError> {
        self.ensure_loaded()?;
        let normalized_email = canonical_member_email(email);
        let member = !normalized_email.is_empty()
            && self
                .loaded
                .read()
                .as_ref()
                .map_or(false, |loaded| loaded.entries.contains(&normalized_email));
        Ok(MembershipCheck {
            member,
            normalized_email,
        })
    }
}

fn load_file(path: &Path) -> Result<Loaded, MembershipError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        warn!("Failed to read membership list {}: {}", path.display(), e);
        MembershipError::Unavailable(format!("{}: {e}", path.display()))
    })?;

    let hash = hex::encode(Sha256::digest(content.as_bytes()));
    let emails = parse_emails(&content);
    let count = emails.len();

    Ok(Loaded {
        entries: emails.into_iter().collect(),
        stats: MembershipStats {
            loaded_at: Some(Utc::now()),
            count,
            hash: Some(hash),
            source: path.display().to_string(),
        },
    })
}

impl MembershipLookup for MembershipList {
    fn is_member(&self, email: &str) -> Result<bool, MembershipError> {
        Ok(self.check(email)?.member)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const CSV: &str = "name;email;joined\n\
        Alex Andersson;Alex.Andersson@gmail.com;2024-01-10\n\
        Sam Svensson;\"sam+orbi@student.uu.se\";2024-02-01\n\
        Duplicate;alexandersson@gmail.com;2024-03-01\n\
        Broken;not-an-email;2024-03-02\n";

    fn csv_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn parse_finds_emails_anywhere() {
        assert_eq!(
            parse_emails(CSV),
            vec![
                "alexandersson@gmail.com",
                "sam@student.uu.se",
                "alexandersson@gmail.com"
            ]
        );
    }

    #[test]
    fn lookup_loads_lazily_and_canonicalizes() {
        let file = csv_file(CSV);
        let list = MembershipList::new(vec![file.path().to_path_buf()]);
        assert!(list.stats().loaded_at.is_none());

        assert!(list.is_member("alex.andersson+mc@GMAIL.com").unwrap());
        assert!(list.is_member("sam@student.uu.se").unwrap());
        assert!(!list.is_member("nobody@uu.se").unwrap());
        assert!(!list.is_member("garbage").unwrap());

        let stats = list.stats();
        assert!(stats.loaded_at.is_some());
        assert_eq!(stats.count, 3);
        assert_eq!(stats.hash.as_deref().map(str::len), Some(64));
    }

    #[test]
    fn first_existing_candidate_wins() {
        let file = csv_file(CSV);
        let list = MembershipList::new(vec![
            PathBuf::from("/definitely/not/here.csv"),
            file.path().to_path_buf(),
        ]);
        assert_eq!(list.source(), file.path().display().to_string());
        assert!(list.reload().is_ok());
    }

    #[test]
    fn missing_list_is_reported() {
        let list = MembershipList::new(vec![PathBuf::from("/definitely/not/here.csv")]);
        match list.is_member("alex@uu.se") {
            Err(MembershipError::ListMissing(message)) => {
                assert!(message.contains("/definitely/not/here.csv"))
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn reload_picks_up_changes() {
        let mut file = csv_file("a@uu.se\n");
        let list = MembershipList::new(vec![file.path().to_path_buf()]);
        assert!(!list.is_member("b@uu.se").unwrap());

        file.write_all(b"b@uu.se\n").unwrap();
        file.flush().unwrap();
        let before = list.stats().hash;
        let stats = list.reload().unwrap();

        assert_eq!(stats.count, 2);
        assert_ne!(stats.hash, before);
        assert!(list.is_member("b@uu.se").unwrap());
    }
}
