use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Capabilities a member group can hold on a category
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Capability {
    DenyAccess,
    ReadOnly,
    CreateTopics,
    CreatePolls,
    VoteInPosts,
    MarkAsSolution,
    EditPosts,
    DeletePosts,
    StickyTopics,
    LockTopics,
    AttachFiles,
}

impl Capability {
    pub const ALL: [Capability; 11] = [
        Capability::DenyAccess,
        Capability::ReadOnly,
        Capability::CreateTopics,
        Capability::CreatePolls,
        Capability::VoteInPosts,
        Capability::MarkAsSolution,
        Capability::EditPosts,
        Capability::DeletePosts,
        Capability::StickyTopics,
        Capability::LockTopics,
        Capability::AttachFiles,
    ];

    /// Capabilities that restrict rather than grant
    pub fn is_restriction(&self) -> bool {
        matches!(self, Capability::DenyAccess | Capability::ReadOnly)
    }
}

/// Resolved capabilities of a member group for one category
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionSet(BTreeSet<Capability>);

impl PermissionSet {
    pub fn has(&self, capability: Capability) -> bool {
        self.0.contains(&capability)
    }

    pub fn deny_access(&self) -> bool {
        self.has(Capability::DenyAccess)
    }

    pub fn read_only(&self) -> bool {
        self.has(Capability::ReadOnly)
    }

    /// Holds `CreateTopics` and nothing blocks posting
    pub fn can_create_topics(&self) -> bool {
        !self.deny_access() && !self.read_only() && self.has(Capability::CreateTopics)
    }

    /// Holds `VoteInPosts` and the category is neither denied nor read-only
    pub fn can_vote(&self) -> bool {
        !self.deny_access() && !self.read_only() && self.has(Capability::VoteInPosts)
    }

    pub fn can_create_polls(&self) -> bool {
        self.has(Capability::CreatePolls)
    }

    pub fn can_mark_as_solution(&self) -> bool {
        self.has(Capability::MarkAsSolution)
    }

    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<Capability> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Group a member belongs to, used to look up stored permissions
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MemberGroup {
    Guest,
    Admin,
    Named(String),
}

impl MemberGroup {
    pub const GUEST_ROLE_NAME: &'static str = "Guest";
    pub const ADMIN_ROLE_NAME: &'static str = "Admin";

    /// Group of a member from its group names, the first one winning
    pub fn for_member(groups: Option<&[String]>) -> Self {
        match groups.and_then(|groups| groups.first()) {
            None => MemberGroup::Guest,
            Some(name) => Self::from_name(name),
        }
    }

    pub fn from_name(name: &str) -> Self {
        match name {
            MemberGroup::GUEST_ROLE_NAME => MemberGroup::Guest,
            MemberGroup::ADMIN_ROLE_NAME => MemberGroup::Admin,
            other => MemberGroup::Named(other.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            MemberGroup::Guest => Self::GUEST_ROLE_NAME,
            MemberGroup::Admin => Self::ADMIN_ROLE_NAME,
            MemberGroup::Named(name) => name,
        }
    }

    /// Turn the capabilities stored for this group into its effective permissions
    pub fn resolve(&self, stored: impl IntoIterator<Item = Capability>) -> PermissionSet {
        match self {
            MemberGroup::Admin => Capability::ALL
                .into_iter()
                .filter(|capability| !capability.is_restriction())
                .collect(),
            MemberGroup::Guest => stored
                .into_iter()
                .filter(|capability| *capability == Capability::DenyAccess)
                .chain([Capability::ReadOnly])
                .collect(),
            MemberGroup::Named(_) => stored.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::*;
    use speculoos::prelude::*;

    #[test]
    fn test_admin_gets_everything_but_restrictions() {
        let permissions = MemberGroup::Admin.resolve([Capability::DenyAccess]);

        assert_that!(permissions.deny_access()).is_false();
        assert_that!(permissions.read_only()).is_false();
        assert_that!(permissions.can_create_topics()).is_true();
        assert_that!(permissions.can_mark_as_solution()).is_true();
    }

    #[rstest]
    #[case(vec![], false)]
    #[case(vec![Capability::DenyAccess, Capability::CreateTopics], true)]
    fn test_guest_is_read_only(#[case] stored: Vec<Capability>, #[case] denied: bool) {
        let permissions = MemberGroup::Guest.resolve(stored);

        assert_that!(permissions.read_only()).is_true();
        assert_that!(permissions.deny_access()).is_equal_to(denied);
        assert_that!(permissions.can_create_topics()).is_false();
    }

    #[rstest]
    #[case(vec![Capability::CreateTopics], true)]
    #[case(vec![Capability::CreateTopics, Capability::ReadOnly], false)]
    #[case(vec![Capability::CreateTopics, Capability::DenyAccess], false)]
    #[case(vec![Capability::CreatePolls], false)]
    fn test_can_create_topics(#[case] stored: Vec<Capability>, #[case] expected: bool) {
        let permissions = MemberGroup::Named("Standard".to_string()).resolve(stored);

        assert_that!(permissions.can_create_topics()).is_equal_to(expected);
    }

    #[rstest]
    #[case(vec![Capability::VoteInPosts], true)]
    #[case(vec![Capability::VoteInPosts, Capability::ReadOnly], false)]
    #[case(vec![Capability::VoteInPosts, Capability::DenyAccess], false)]
    #[case(vec![Capability::CreateTopics], false)]
    fn test_can_vote(#[case] stored: Vec<Capability>, #[case] expected: bool) {
        let permissions = MemberGroup::Named("Standard".to_string()).resolve(stored);

        assert_that!(permissions.can_vote()).is_equal_to(expected);
    }

    #[rstest]
    #[case(None, MemberGroup::Guest)]
    #[case(Some(vec![]), MemberGroup::Guest)]
    #[case(Some(vec!["Admin".to_string(), "Standard".to_string()]), MemberGroup::Admin)]
    #[case(Some(vec!["Standard".to_string()]), MemberGroup::Named("Standard".to_string()))]
    fn test_for_member(#[case] groups: Option<Vec<String>>, #[case] expected: MemberGroup) {
        assert_that!(MemberGroup::for_member(groups.as_deref())).is_equal_to(expected);
    }
}
