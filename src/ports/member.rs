use crate::domain::MemberGroup;
use uuid::Uuid;

/// Member store owned by the host CMS
#[mockall::automock]
#[async_trait::async_trait]
pub trait MemberPort {
    async fn get_member(&self, member_id: Uuid) -> Result<Member, Error>;
    /// Members matching `member_ids`, skipping unknown ids
    async fn get_members_by_id(&self, member_ids: Vec<Uuid>) -> Result<Vec<Member>, Error>;
    async fn add_post_count(&self, member_id: Uuid) -> Result<(), Error>;
    /// End the member's session
    async fn log_off(&self, member_id: Uuid) -> Result<(), Error>;
}

/// Member profile as stored by the CMS
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Member {
    pub member_id: Uuid,
    pub user_name: String,
    pub email: String,
    pub is_locked_out: bool,
    pub is_approved: bool,
    pub disable_posting: bool,
    pub disable_email_notifications: bool,
    /// Names of the groups the member belongs to, main group first
    pub groups: Vec<String>,
    pub post_count: u32,
}

impl Member {
    pub fn new(member_id: Uuid, user_name: impl Into<String>) -> Self {
        let user_name = user_name.into();
        Self {
            member_id,
            email: format!("{user_name}@example.com"),
            user_name,
            is_locked_out: false,
            is_approved: true,
            disable_posting: false,
            disable_email_notifications: false,
            groups: Vec::default(),
            post_count: 0,
        }
    }

    /// Locked out or not approved yet
    pub fn is_blocked(&self) -> bool {
        self.is_locked_out || !self.is_approved
    }

    /// Group the member's permissions are resolved for
    pub fn group(&self) -> MemberGroup {
        MemberGroup::for_member(Some(self.groups.as_slice()))
    }

    pub fn is_admin(&self) -> bool {
        self.group() == MemberGroup::Admin
    }

    /// Build the domain view of this member from its points balance
    pub fn with_points(&self, points: i32) -> crate::domain::Member {
        crate::domain::Member::new(
            self.member_id,
            points,
            self.is_locked_out,
            self.is_approved,
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Domain-level error when a member does not exist
    #[error("member {0} does not exist")]
    MemberDoesNotExist(Uuid),

    /// Concrete adapter errors
    ///
    /// This could represent any errors from a concrete adapter that is not part of the domain
    /// model, such as connectivity, configuration, or permission errors.
    #[error("adapter error: {0:?}")]
    Adapter(Box<dyn std::error::Error + Send + Sync>),
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::*;
    use speculoos::prelude::*;

    #[rstest]
    #[case(vec!["Admin"], true)]
    #[case(vec!["Admin", "Standard"], true)]
    #[case(vec!["Standard", "Admin"], false)]
    #[case(vec![], false)]
    fn test_is_admin(#[case] groups: Vec<&str>, #[case] expected: bool) {
        // GIVEN a member in these groups
        let mut member = Member::new(Uuid::new_v4(), "a");
        member.groups = groups.into_iter().map(String::from).collect();

        // THEN only a main Admin group makes it an admin, like permission resolution
        assert_that!(member.is_admin()).is_equal_to(expected);
        assert_that!(member.group() == MemberGroup::Admin).is_equal_to(expected);
    }
}
