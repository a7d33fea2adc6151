use std::{borrow::Cow, sync::Arc};

use uuid::Uuid;

use crate::{
    config::Settings,
    domain::{Member as Voter, MemberGroup, Message, PermissionSet},
    ports::{database::UnitOfWork, member::Member},
};

pub mod approve_topic;
pub mod create_topic;
pub mod create_topic_button;
pub mod latest_topics;
pub mod mark_as_solution;
pub mod more_posts;
pub mod post_vote;
pub mod show_topic;
pub mod topic_breadcrumb;

/// Forum actions, one `tower::Service` per request type
pub struct DomainLogic<D, M, S, E> {
    database: Arc<D>,
    member: Arc<M>,
    spam: Arc<S>,
    email: Arc<E>,
    settings: Arc<Settings>,
}

impl<D, M, S, E> DomainLogic<D, M, S, E> {
    pub fn new(
        database: Arc<D>,
        member: Arc<M>,
        spam: Arc<S>,
        email: Arc<E>,
        settings: Arc<Settings>,
    ) -> Self {
        Self {
            database,
            member,
            spam,
            email,
            settings,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }
}

impl<D, M, S, E> Clone for DomainLogic<D, M, S, E> {
    fn clone(&self) -> Self {
        Self {
            database: self.database.clone(),
            member: self.member.clone(),
            spam: self.spam.clone(),
            email: self.email.clone(),
            settings: self.settings.clone(),
        }
    }
}

/// What the host knows about the incoming request
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RequestContext {
    /// Signed-in member, if any
    pub member: Option<Member>,
    pub is_ajax: bool,
    /// The user agent is a known crawler
    pub is_bot: bool,
    /// The anti-forgery token of a form post checked out
    pub anti_forgery_verified: bool,
}

impl RequestContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn for_member(member: Member) -> Self {
        Self {
            member: Some(member),
            ..Self::default()
        }
    }

    pub fn ajax(mut self) -> Self {
        self.is_ajax = true;
        self
    }

    pub fn verified(mut self) -> Self {
        self.anti_forgery_verified = true;
        self
    }

    pub fn bot(mut self) -> Self {
        self.is_bot = true;
        self
    }

    pub fn member_id(&self) -> Option<Uuid> {
        self.member.as_ref().map(|member| member.member_id)
    }

    pub fn group(&self) -> MemberGroup {
        self.member
            .as_ref()
            .map_or(MemberGroup::Guest, |member| member.group())
    }
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("database port error: {0:?}")]
    Database(#[from] crate::ports::database::Error),
    #[error("member port error: {0:?}")]
    Member(#[from] crate::ports::member::Error),
    #[error("spam port error: {0:?}")]
    Spam(#[from] crate::ports::spam::Error),
    #[error("email port error: {0:?}")]
    Email(#[from] crate::ports::email::Error),

    #[error("request must be made with AJAX")]
    NotAjax,
    #[error("a signed-in member is required")]
    Unauthenticated,
    /// The member is locked out or not approved, and was logged off
    #[error("no access")]
    NoAccess,
    #[error("no permission")]
    NoPermission,
    /// Failure already logged, only a generic message goes back to the user
    #[error("generic failure")]
    Generic,

    #[error("invalid state")]
    InvalidState(Cow<'static, str>),
}

impl Error {
    /// Message to show the user for this error
    pub fn user_message(&self) -> Message {
        match self {
            Error::NoAccess => Message::NoAccess,
            Error::NoPermission | Error::Unauthenticated => Message::NoPermission,
            _ => Message::GenericMessage,
        }
    }
}

/// Resolve the permissions of the requesting member on a category
async fn permissions(
    uow: &mut dyn UnitOfWork,
    category_id: Uuid,
    context: &RequestContext,
) -> Result<PermissionSet, Error> {
    let group = context.group();
    let stored = uow.get_category_permissions(category_id, &group).await?;
    Ok(group.resolve(stored))
}

/// Domain view of the requesting member, with their points balance
async fn viewer(
    uow: &mut dyn UnitOfWork,
    context: &RequestContext,
) -> Result<Option<Voter>, Error> {
    match &context.member {
        None => Ok(None),
        Some(member) => {
            let points = uow.total_points(member.member_id).await?;
            Ok(Some(member.with_points(points)))
        }
    }
}

/// Commit, rolling back if that fails
async fn commit_or_rollback(uow: &mut dyn UnitOfWork) -> Result<(), Error> {
    if let Err(err) = uow.commit().await {
        tracing::error!(error = %err, "commit failed, rolling back");
        rollback(uow).await;
        return Err(err.into());
    }
    Ok(())
}

async fn rollback(uow: &mut dyn UnitOfWork) {
    if let Err(err) = uow.rollback().await {
        tracing::error!(error = %err, "rollback failed");
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::{
        adapters::{
            database::memory::MemoryDatabase, email::memory::MemoryOutbox,
            member::memory::MemoryMemberStore, spam::keyword::KeywordSpamFilter,
        },
        domain::{Capability, Category, MemberPoints, Post, Topic},
        ports::database::DatabasePort,
    };

    pub type MemoryLogic =
        DomainLogic<MemoryDatabase, MemoryMemberStore, KeywordSpamFilter, MemoryOutbox>;

    /// Fully in-memory forum with one category open to the `Standard` group
    pub struct Forum {
        pub logic: MemoryLogic,
        pub database: MemoryDatabase,
        pub members: MemoryMemberStore,
        pub outbox: MemoryOutbox,
        pub category: Category,
    }

    impl Forum {
        pub fn new(settings: Settings) -> Self {
            let database = MemoryDatabase::default();
            let members = MemoryMemberStore::default();
            let outbox = MemoryOutbox::default();
            let spam = KeywordSpamFilter::new(vec!["viagra".to_string()], 5).unwrap();
            let category = Category {
                category_id: Uuid::new_v4(),
                name: "General".to_string(),
                slug: "general".to_string(),
                parent_id: None,
                moderate_all_topics: false,
            };
            database.add_category(category.clone()).unwrap();
            database
                .grant(
                    category.category_id,
                    MemberGroup::Named("Standard".to_string()),
                    [
                        Capability::CreateTopics,
                        Capability::CreatePolls,
                        Capability::VoteInPosts,
                    ],
                )
                .unwrap();
            let logic = DomainLogic::new(
                Arc::new(database.clone()),
                Arc::new(members.clone()),
                Arc::new(spam),
                Arc::new(outbox.clone()),
                Arc::new(settings),
            );

            Self {
                logic,
                database,
                members,
                outbox,
                category,
            }
        }

        /// Register a `Standard` member holding `points`
        pub async fn member(&self, name: &str, points: i32) -> Member {
            let mut member = Member::new(Uuid::new_v4(), name);
            member.groups = vec!["Standard".to_string()];
            self.members.add_member(member.clone()).unwrap();
            if points != 0 {
                let mut uow = self.database.begin().await.unwrap();
                uow.add_member_points(MemberPoints::new(member.member_id, points, None))
                    .await
                    .unwrap();
                uow.commit().await.unwrap();
            }
            member
        }

        /// Create a topic by `author` with its starter post, returning both
        pub async fn topic(&self, author: &Member, name: &str) -> (Topic, Post) {
            let mut uow = self.database.begin().await.unwrap();
            let mut topic = Topic::new(
                name.to_string(),
                crate::domain::moderation::slugify(name),
                self.category.category_id,
                author.member_id,
            );
            let post = Post::new(topic.topic_id, author.member_id, "starter".to_string(), true);
            topic.last_post_id = Some(post.post_id);
            let topic = uow.add_topic(topic).await.unwrap();
            let post = uow.add_post(post).await.unwrap();
            uow.commit().await.unwrap();
            (topic, post)
        }

        /// Add a reply by `author` to `topic`
        pub async fn reply(&self, topic: &Topic, author: &Member) -> Post {
            let mut uow = self.database.begin().await.unwrap();
            let post = uow
                .add_post(Post::new(
                    topic.topic_id,
                    author.member_id,
                    "reply".to_string(),
                    false,
                ))
                .await
                .unwrap();
            uow.commit().await.unwrap();
            post
        }

        pub async fn points(&self, member: &Member) -> i32 {
            let mut uow = self.database.begin().await.unwrap();
            uow.total_points(member.member_id).await.unwrap()
        }

        pub async fn post(&self, post_id: Uuid) -> Post {
            let mut uow = self.database.begin().await.unwrap();
            uow.get_post(post_id).await.unwrap()
        }

        pub async fn topic_by_id(&self, topic_id: Uuid) -> Topic {
            let mut uow = self.database.begin().await.unwrap();
            uow.get_topic(topic_id).await.unwrap()
        }
    }
}
