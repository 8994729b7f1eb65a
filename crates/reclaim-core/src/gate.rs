//! Membership gate
//!
//! Verifies that a user has joined every configured required group before a
//! privileged action runs. Lookups are never cached and errors fail closed.

use async_trait::async_trait;
use futures_util::future::join_all;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Membership status as reported by the chat platform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipStatus {
    /// Regular member (restricted members still present count here)
    Member,
    /// Group administrator
    Admin,
    /// Group owner
    Creator,
    /// Not in the group
    Left,
    /// Banned from the group
    Kicked,
    /// Anything the platform reports that we don't recognise
    Unknown,
}

impl MembershipStatus {
    /// Whether this status counts as joined
    #[must_use]
    pub const fn is_joined(self) -> bool {
        matches!(self, Self::Member | Self::Admin | Self::Creator)
    }
}

/// A group the user must join
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequiredGroup {
    /// `@username` for public groups or a numeric chat id for private ones
    pub id: String,
    /// Invite link for private groups
    pub invite_link: Option<String>,
}

impl RequiredGroup {
    /// Public group addressed by `@username`
    #[must_use]
    pub fn public(username: impl Into<String>) -> Self {
        let username = username.into();
        let id = if username.starts_with('@') {
            username
        } else {
            format!("@{username}")
        };
        Self {
            id,
            invite_link: None,
        }
    }

    /// Private group addressed by numeric id, joinable through an invite link
    #[must_use]
    pub fn private(id: impl Into<String>, invite_link: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            invite_link: Some(invite_link.into()),
        }
    }

    /// Private group addressed by numeric id only; users get no join button
    #[must_use]
    pub fn by_chat_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            invite_link: None,
        }
    }

    /// Name shown to users
    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.id
    }

    /// Link the user can follow to join, if one can be derived
    #[must_use]
    pub fn join_link(&self) -> Option<String> {
        if let Some(link) = &self.invite_link {
            return Some(link.clone());
        }
        self.id
            .strip_prefix('@')
            .filter(|name| !name.is_empty())
            .map(|name| format!("https://t.me/{name}"))
    }
}

/// Group-status lookup failure; always treated as not joined
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MembershipCheckError {
    /// The user id cannot be addressed on the platform
    #[error("invalid user id {0}")]
    InvalidUser(i64),
    /// The group identifier is malformed
    #[error("invalid group identifier '{0}'")]
    InvalidGroup(String),
    /// The platform call failed
    #[error("membership lookup in {group} failed: {message}")]
    Lookup {
        /// Group being checked
        group: String,
        /// Underlying error
        message: String,
    },
}

/// Platform capability for reading a user's status in a group
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MembershipLookup: Send + Sync {
    /// Status of `user_id` in `group`
    async fn membership_status(
        &self,
        group: &RequiredGroup,
        user_id: i64,
    ) -> Result<MembershipStatus, MembershipCheckError>;
}

/// Result of checking one group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupCheck {
    /// The group
    pub group: RequiredGroup,
    /// Whether the user counts as joined
    pub joined: bool,
}

/// Result of checking all required groups
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateReport {
    /// True iff every group reports a joined status
    pub satisfied: bool,
    /// Per-group results in configuration order
    pub checks: Vec<GroupCheck>,
}

impl GateReport {
    /// Groups the user still needs to join
    #[must_use]
    pub fn missing(&self) -> Vec<&RequiredGroup> {
        self.checks
            .iter()
            .filter(|check| !check.joined)
            .map(|check| &check.group)
            .collect()
    }
}

/// Gate over a fixed set of required groups
pub struct MembershipGate {
    groups: Vec<RequiredGroup>,
    lookup: Arc<dyn MembershipLookup>,
}

impl MembershipGate {
    /// Create a gate
    #[must_use]
    pub fn new(groups: Vec<RequiredGroup>, lookup: Arc<dyn MembershipLookup>) -> Self {
        Self { groups, lookup }
    }

    /// Check every group concurrently.
    ///
    /// A lookup error counts as not joined for that group.
    pub async fn check_all(&self, user_id: i64) -> GateReport {
        let lookups = self.groups.iter().map(|group| async move {
            let joined = match self.lookup.membership_status(group, user_id).await {
                Ok(status) => {
                    debug!(user_id, group = %group.id, ?status, "Membership status");
                    status.is_joined()
                }
                Err(e) => {
                    warn!(user_id, group = %group.id, "Membership check failed: {e}");
                    false
                }
            };
            GroupCheck {
                group: group.clone(),
                joined,
            }
        });

        let checks = join_all(lookups).await;
        let satisfied = checks.iter().all(|check| check.joined);
        GateReport { satisfied, checks }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn groups() -> Vec<RequiredGroup> {
        vec![
            RequiredGroup::public("news"),
            RequiredGroup::private("-1001234567890", "https://t.me/+abcdef"),
        ]
    }

    #[test]
    fn test_join_links() {
        let [public, private] = <[RequiredGroup; 2]>::try_from(groups()).expect("two groups");
        assert_eq!(public.id, "@news");
        assert_eq!(public.join_link().as_deref(), Some("https://t.me/news"));
        assert_eq!(private.join_link().as_deref(), Some("https://t.me/+abcdef"));

        let bare = RequiredGroup {
            id: "-100999".to_string(),
            invite_link: None,
        };
        assert_eq!(bare.join_link(), None);
    }

    #[test]
    fn test_joined_statuses() {
        assert!(MembershipStatus::Member.is_joined());
        assert!(MembershipStatus::Admin.is_joined());
        assert!(MembershipStatus::Creator.is_joined());
        assert!(!MembershipStatus::Left.is_joined());
        assert!(!MembershipStatus::Kicked.is_joined());
        assert!(!MembershipStatus::Unknown.is_joined());
    }

    #[tokio::test]
    async fn test_all_joined_is_satisfied() {
        let mut lookup = MockMembershipLookup::new();
        lookup
            .expect_membership_status()
            .times(2)
            .returning(|_, _| Ok(MembershipStatus::Member));
        let gate = MembershipGate::new(groups(), Arc::new(lookup));

        let report = gate.check_all(42).await;

        assert!(report.satisfied);
        assert!(report.missing().is_empty());
    }

    #[tokio::test]
    async fn test_left_group_is_missing() {
        let mut lookup = MockMembershipLookup::new();
        lookup
            .expect_membership_status()
            .returning(|group, _| {
                if group.id == "@news" {
                    Ok(MembershipStatus::Left)
                } else {
                    Ok(MembershipStatus::Admin)
                }
            });
        let gate = MembershipGate::new(groups(), Arc::new(lookup));

        let report = gate.check_all(42).await;

        assert!(!report.satisfied);
        let missing: Vec<&str> = report.missing().iter().map(|g| g.id.as_str()).collect();
        assert_eq!(missing, vec!["@news"]);
    }

    #[tokio::test]
    async fn test_lookup_error_fails_closed() {
        let mut lookup = MockMembershipLookup::new();
        lookup.expect_membership_status().returning(|group, _| {
            Err(MembershipCheckError::Lookup {
                group: group.id.clone(),
                message: "network down".to_string(),
            })
        });
        let gate = MembershipGate::new(groups(), Arc::new(lookup));

        let report = gate.check_all(42).await;

        assert!(!report.satisfied);
        assert_eq!(report.missing().len(), 2);
    }

    #[tokio::test]
    async fn test_no_groups_is_satisfied() {
        let mut lookup = MockMembershipLookup::new();
        lookup.expect_membership_status().never();
        let gate = MembershipGate::new(Vec::new(), Arc::new(lookup));

        assert!(gate.check_all(42).await.satisfied);
    }
}
