use std::borrow::Cow;

use uuid::Uuid;

use crate::domain::{
    Capability, Category, Favourite, MemberGroup, MemberPoints, PagedList, Poll, Post,
    PostOrderBy, Topic, TopicNotification, Vote,
};

/// Entry point to the forum storage
#[mockall::automock]
#[async_trait::async_trait]
pub trait DatabasePort {
    /// Start a new unit of work
    ///
    /// Nothing done through the returned unit is visible to others until `commit` succeeds.
    /// Dropping it without committing discards every change.
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, Error>;
}

/// Transactional scope over the forum storage
#[mockall::automock]
#[async_trait::async_trait]
pub trait UnitOfWork: Send {
    async fn get_post(&mut self, post_id: Uuid) -> Result<Post, Error>;
    async fn get_topic(&mut self, topic_id: Uuid) -> Result<Topic, Error>;
    async fn get_topic_by_slug(&mut self, slug: &str) -> Result<Option<Topic>, Error>;
    async fn slug_exists(&mut self, slug: &str) -> Result<bool, Error>;
    async fn get_category(&mut self, category_id: Uuid) -> Result<Category, Error>;
    async fn get_all_categories(&mut self) -> Result<Vec<Category>, Error>;
    /// Ancestors of a category, root first, ending with the category itself
    async fn get_parent_categories(&mut self, category_id: Uuid) -> Result<Vec<Category>, Error>;
    async fn get_category_permissions(
        &mut self,
        category_id: Uuid,
        group: &MemberGroup,
    ) -> Result<Vec<Capability>, Error>;

    /// Posts of a topic, excluding the topic starter
    async fn get_paged_posts_by_topic(
        &mut self,
        topic_id: Uuid,
        page_index: u32,
        page_size: usize,
        order: PostOrderBy,
    ) -> Result<PagedList<Post>, Error>;
    async fn get_topic_starter_post(&mut self, topic_id: Uuid) -> Result<Post, Error>;
    /// Live topics, most recently active first
    async fn get_recent_topics(
        &mut self,
        page_index: u32,
        page_size: usize,
        max: usize,
    ) -> Result<PagedList<Topic>, Error>;

    async fn total_points(&mut self, member_id: Uuid) -> Result<i32, Error>;
    async fn add_member_points(&mut self, entry: MemberPoints) -> Result<(), Error>;

    /// Store a vote on its post
    ///
    /// Fails with `Error::Conflict` if the member already voted on that post.
    async fn add_vote(&mut self, vote: Vote) -> Result<(), Error>;

    async fn add_topic(&mut self, topic: Topic) -> Result<Topic, Error>;
    async fn update_topic(&mut self, topic: &Topic) -> Result<(), Error>;
    async fn add_post(&mut self, post: Post) -> Result<Post, Error>;
    /// Persist the score and solution flag of a post
    async fn update_post(&mut self, post: &Post) -> Result<(), Error>;
    async fn add_poll(&mut self, poll: Poll) -> Result<(), Error>;
    async fn get_poll(&mut self, poll_id: Uuid) -> Result<Poll, Error>;

    async fn get_favourites_by_member(&mut self, member_id: Uuid)
        -> Result<Vec<Favourite>, Error>;
    async fn is_subscribed_to_topic(&mut self, member_id: Uuid, topic_id: Uuid)
        -> Result<bool, Error>;
    async fn add_topic_notification(&mut self, notification: TopicNotification)
        -> Result<(), Error>;
    async fn get_category_subscribers(&mut self, category_id: Uuid) -> Result<Vec<Uuid>, Error>;

    async fn commit(&mut self) -> Result<(), Error>;
    async fn rollback(&mut self) -> Result<(), Error>;
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Domain-level error when an entity does not exist
    #[error("{entity} {id} does not exist")]
    NotFound { entity: &'static str, id: String },

    /// The change breaks a uniqueness rule, such as a second vote on the same post
    #[error("conflict: {0}")]
    Conflict(Cow<'static, str>),

    /// Another unit of work committed since this one started
    #[error("concurrent modification")]
    Concurrency,

    /// The unit of work was already committed or rolled back
    #[error("unit of work is closed")]
    Closed,

    /// Concrete adapter errors
    ///
    /// This could represent any errors from a concrete adapter that is not part of the domain
    /// model, such as connectivity, configuration, or permission errors.
    #[error("adapter error: {0:?}")]
    Adapter(Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}
