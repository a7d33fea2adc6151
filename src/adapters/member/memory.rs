use crate::ports::member::{Error, Member, MemberPort};
use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex, PoisonError},
};
use uuid::Uuid;

/// In-memory stand-in for the CMS member store
#[derive(Clone, Debug, Default)]
pub struct MemoryMemberStore {
    members: Arc<Mutex<HashMap<Uuid, Member>>>,
    /// Members whose session was ended
    logged_off: Arc<Mutex<HashSet<Uuid>>>,
}

impl MemoryMemberStore {
    pub fn add_member(&self, member: Member) -> Result<(), Error> {
        self.members.lock()?.insert(member.member_id, member);
        Ok(())
    }

    pub fn is_logged_off(&self, member_id: Uuid) -> Result<bool, Error> {
        Ok(self.logged_off.lock()?.contains(&member_id))
    }
}

#[async_trait::async_trait]
impl MemberPort for MemoryMemberStore {
    async fn get_member(&self, member_id: Uuid) -> Result<Member, Error> {
        self.members
            .lock()?
            .get(&member_id)
            .cloned()
            .ok_or(Error::MemberDoesNotExist(member_id))
    }

    async fn get_members_by_id(&self, member_ids: Vec<Uuid>) -> Result<Vec<Member>, Error> {
        let members = self.members.lock()?;
        Ok(member_ids
            .iter()
            .filter_map(|member_id| members.get(member_id).cloned())
            .collect())
    }

    async fn add_post_count(&self, member_id: Uuid) -> Result<(), Error> {
        let mut members = self.members.lock()?;
        let member = members
            .get_mut(&member_id)
            .ok_or(Error::MemberDoesNotExist(member_id))?;
        member.post_count += 1;
        Ok(())
    }

    async fn log_off(&self, member_id: Uuid) -> Result<(), Error> {
        self.logged_off.lock()?.insert(member_id);
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("poison error: {0}")]
pub struct ErasedPoisonError(String);

impl<T> From<PoisonError<T>> for Error {
    fn from(err: PoisonError<T>) -> Self {
        Self::Adapter(Box::new(ErasedPoisonError(err.to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use speculoos::prelude::*;

    #[tokio::test]
    async fn test_add_post_count() {
        let store = MemoryMemberStore::default();
        let member = Member::new(Uuid::new_v4(), "alice");
        store.add_member(member.clone()).unwrap();

        let res = store.add_post_count(member.member_id).await;

        assert_that!(res).is_ok();
        assert_that!(store.get_member(member.member_id).await)
            .is_ok()
            .matches(|stored| stored.post_count == 1);
    }

    #[tokio::test]
    async fn test_unknown_member() {
        let store = MemoryMemberStore::default();
        let member_id = Uuid::new_v4();

        let res = store.get_member(member_id).await;

        assert_that!(res)
            .is_err()
            .matches(|err| matches!(err, Error::MemberDoesNotExist(id) if *id == member_id));
    }

    #[tokio::test]
    async fn test_get_members_by_id_skips_unknown() {
        let store = MemoryMemberStore::default();
        let member = Member::new(Uuid::new_v4(), "bob");
        store.add_member(member.clone()).unwrap();

        let res = store
            .get_members_by_id(vec![member.member_id, Uuid::new_v4()])
            .await;

        assert_that!(res).is_ok().is_equal_to(vec![member]);
    }
}
