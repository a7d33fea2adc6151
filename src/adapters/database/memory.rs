use crate::{
    domain::{
        Capability, Category, CategoryNotification, Favourite, MemberGroup, MemberPoints,
        PagedList, Poll, Post, PostOrderBy, Topic, TopicNotification, Vote,
    },
    ports::database::{DatabasePort, Error, UnitOfWork},
};
use std::{
    collections::{BTreeSet, HashMap, HashSet},
    sync::{Arc, Mutex, PoisonError},
};
use uuid::Uuid;

/// Everything stored by the forum
#[derive(Clone, Debug, Default)]
struct State {
    /// Bumped for every topic, post or poll a commit writes to
    row_versions: HashMap<Uuid, u64>,
    categories: HashMap<Uuid, Category>,
    permissions: HashMap<(Uuid, MemberGroup), BTreeSet<Capability>>,
    topics: HashMap<Uuid, Topic>,
    posts: HashMap<Uuid, Post>,
    polls: HashMap<Uuid, Poll>,
    member_points: Vec<MemberPoints>,
    favourites: Vec<Favourite>,
    topic_notifications: Vec<TopicNotification>,
    category_notifications: Vec<CategoryNotification>,
}

/// A change made through a unit of work, replayed on the shared state at commit
#[derive(Clone, Debug)]
enum Write {
    MemberPoints(MemberPoints),
    Vote(Vote),
    AddTopic(Topic),
    UpdateTopic(Topic),
    AddPost(Post),
    UpdatePost(Post),
    AddPoll(Poll),
    TopicNotification(TopicNotification),
}

impl Write {
    /// Row whose version guards this change
    ///
    /// Ledger entries and subscriptions are append-only and never conflict.
    fn row(&self) -> Option<Uuid> {
        match self {
            Write::Vote(vote) => Some(vote.post_id),
            Write::AddTopic(topic) | Write::UpdateTopic(topic) => Some(topic.topic_id),
            Write::AddPost(post) | Write::UpdatePost(post) => Some(post.post_id),
            Write::AddPoll(poll) => Some(poll.poll_id),
            Write::MemberPoints(_) | Write::TopicNotification(_) => None,
        }
    }
}

impl State {
    fn apply(&mut self, write: Write) -> Result<(), Error> {
        match write {
            Write::MemberPoints(entry) => self.member_points.push(entry),
            Write::Vote(vote) => {
                let post = self
                    .posts
                    .get_mut(&vote.post_id)
                    .ok_or_else(|| Error::not_found("post", vote.post_id))?;
                // Return an error if this member already voted on the post
                if post.has_voted(vote.member_id) {
                    return Err(Error::Conflict(
                        format!("member {} already voted on post {}", vote.member_id, vote.post_id)
                            .into(),
                    ));
                }
                post.votes.push(vote);
            }
            Write::AddTopic(topic) => {
                if self.topics.values().any(|existing| existing.slug == topic.slug) {
                    return Err(Error::Conflict(
                        format!("slug {} is already used", topic.slug).into(),
                    ));
                }
                self.topics.insert(topic.topic_id, topic);
            }
            Write::UpdateTopic(topic) => {
                let existing = self
                    .topics
                    .get_mut(&topic.topic_id)
                    .ok_or_else(|| Error::not_found("topic", topic.topic_id))?;
                *existing = topic;
            }
            Write::AddPost(post) => {
                if !self.topics.contains_key(&post.topic_id) {
                    return Err(Error::not_found("topic", post.topic_id));
                }
                self.posts.insert(post.post_id, post);
            }
            Write::UpdatePost(post) => {
                let existing = self
                    .posts
                    .get_mut(&post.post_id)
                    .ok_or_else(|| Error::not_found("post", post.post_id))?;
                existing.content = post.content;
                existing.vote_count = post.vote_count;
                existing.is_solution = post.is_solution;
            }
            Write::AddPoll(poll) => {
                self.polls.insert(poll.poll_id, poll);
            }
            Write::TopicNotification(notification) => self.topic_notifications.push(notification),
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default)]
pub struct MemoryDatabase {
    state: Arc<Mutex<State>>,
}

impl MemoryDatabase {
    pub fn add_category(&self, category: Category) -> Result<(), Error> {
        self.state
            .lock()?
            .categories
            .insert(category.category_id, category);
        Ok(())
    }

    /// Store the capabilities of `group` on a category, replacing previous ones
    pub fn grant(
        &self,
        category_id: Uuid,
        group: MemberGroup,
        capabilities: impl IntoIterator<Item = Capability>,
    ) -> Result<(), Error> {
        let capabilities = capabilities.into_iter().collect();
        self.state
            .lock()?
            .permissions
            .insert((category_id, group), capabilities);
        Ok(())
    }

    pub fn add_favourite(&self, favourite: Favourite) -> Result<(), Error> {
        self.state.lock()?.favourites.push(favourite);
        Ok(())
    }

    pub fn subscribe_to_category(&self, notification: CategoryNotification) -> Result<(), Error> {
        self.state.lock()?.category_notifications.push(notification);
        Ok(())
    }

    /// Ledger entries owned by a member, oldest first
    pub fn ledger(&self, member_id: Uuid) -> Result<Vec<MemberPoints>, Error> {
        let ledger = self
            .state
            .lock()?
            .member_points
            .iter()
            .filter(|entry| entry.member_id == member_id)
            .cloned()
            .collect();

        Ok(ledger)
    }
}

#[async_trait::async_trait]
impl DatabasePort for MemoryDatabase {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, Error> {
        let working = self.state.lock()?.clone();

        Ok(Box::new(MemoryUnitOfWork {
            shared: self.state.clone(),
            working,
            writes: Vec::new(),
            open: true,
        }))
    }
}

/// Unit of work over a private copy of the database
///
/// Commit replays the unit's writes on the shared state, unless another unit committed a change
/// to one of the same topics, posts or polls in the meantime.
#[derive(Debug)]
pub struct MemoryUnitOfWork {
    shared: Arc<Mutex<State>>,
    working: State,
    writes: Vec<Write>,
    open: bool,
}

impl MemoryUnitOfWork {
    fn state(&mut self) -> Result<&mut State, Error> {
        if !self.open {
            return Err(Error::Closed);
        }
        Ok(&mut self.working)
    }

    fn write(&mut self, write: Write) -> Result<(), Error> {
        self.state()?.apply(write.clone())?;
        self.writes.push(write);
        Ok(())
    }
}

#[async_trait::async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn get_post(&mut self, post_id: Uuid) -> Result<Post, Error> {
        self.state()?
            .posts
            .get(&post_id)
            .cloned()
            .ok_or_else(|| Error::not_found("post", post_id))
    }

    async fn get_topic(&mut self, topic_id: Uuid) -> Result<Topic, Error> {
        self.state()?
            .topics
            .get(&topic_id)
            .cloned()
            .ok_or_else(|| Error::not_found("topic", topic_id))
    }

    async fn get_topic_by_slug(&mut self, slug: &str) -> Result<Option<Topic>, Error> {
        let topic = self
            .state()?
            .topics
            .values()
            .find(|topic| topic.slug == slug)
            .cloned();

        Ok(topic)
    }

    async fn slug_exists(&mut self, slug: &str) -> Result<bool, Error> {
        Ok(self.state()?.topics.values().any(|topic| topic.slug == slug))
    }

    async fn get_category(&mut self, category_id: Uuid) -> Result<Category, Error> {
        self.state()?
            .categories
            .get(&category_id)
            .cloned()
            .ok_or_else(|| Error::not_found("category", category_id))
    }

    async fn get_all_categories(&mut self) -> Result<Vec<Category>, Error> {
        let mut categories: Vec<_> = self.state()?.categories.values().cloned().collect();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    async fn get_parent_categories(&mut self, category_id: Uuid) -> Result<Vec<Category>, Error> {
        let state = self.state()?;
        let mut chain = Vec::new();
        let mut next = Some(category_id);
        // Bounded walk so a parent cycle cannot loop forever
        while let Some(id) = next.filter(|_| chain.len() <= state.categories.len()) {
            let category = state
                .categories
                .get(&id)
                .cloned()
                .ok_or_else(|| Error::not_found("category", id))?;
            next = category.parent_id;
            chain.push(category);
        }
        chain.reverse();

        Ok(chain)
    }

    async fn get_category_permissions(
        &mut self,
        category_id: Uuid,
        group: &MemberGroup,
    ) -> Result<Vec<Capability>, Error> {
        let capabilities = self
            .state()?
            .permissions
            .get(&(category_id, group.clone()))
            .map(|capabilities| capabilities.iter().copied().collect())
            .unwrap_or_default();

        Ok(capabilities)
    }

    async fn get_paged_posts_by_topic(
        &mut self,
        topic_id: Uuid,
        page_index: u32,
        page_size: usize,
        order: PostOrderBy,
    ) -> Result<PagedList<Post>, Error> {
        let mut posts: Vec<_> = self
            .state()?
            .posts
            .values()
            .filter(|post| post.topic_id == topic_id && !post.is_topic_starter)
            .cloned()
            .collect();
        order.sort(&mut posts);

        Ok(PagedList::paginate(posts, page_index, page_size, None))
    }

    async fn get_topic_starter_post(&mut self, topic_id: Uuid) -> Result<Post, Error> {
        self.state()?
            .posts
            .values()
            .find(|post| post.topic_id == topic_id && post.is_topic_starter)
            .cloned()
            .ok_or_else(|| Error::not_found("topic starter post", topic_id))
    }

    async fn get_recent_topics(
        &mut self,
        page_index: u32,
        page_size: usize,
        max: usize,
    ) -> Result<PagedList<Topic>, Error> {
        let mut topics: Vec<_> = self
            .state()?
            .topics
            .values()
            .filter(|topic| !topic.pending)
            .cloned()
            .collect();
        topics.sort_by(|a, b| b.last_activity.cmp(&a.last_activity));

        Ok(PagedList::paginate(topics, page_index, page_size, Some(max)))
    }

    async fn total_points(&mut self, member_id: Uuid) -> Result<i32, Error> {
        let total = self
            .state()?
            .member_points
            .iter()
            .filter(|entry| entry.member_id == member_id)
            .map(|entry| entry.points)
            .sum();

        Ok(total)
    }

    async fn add_member_points(&mut self, entry: MemberPoints) -> Result<(), Error> {
        self.write(Write::MemberPoints(entry))
    }

    async fn add_vote(&mut self, vote: Vote) -> Result<(), Error> {
        self.write(Write::Vote(vote))
    }

    async fn add_topic(&mut self, topic: Topic) -> Result<Topic, Error> {
        self.write(Write::AddTopic(topic.clone()))?;
        Ok(topic)
    }

    async fn update_topic(&mut self, topic: &Topic) -> Result<(), Error> {
        self.write(Write::UpdateTopic(topic.clone()))
    }

    async fn add_post(&mut self, post: Post) -> Result<Post, Error> {
        self.write(Write::AddPost(post.clone()))?;
        Ok(post)
    }

    async fn update_post(&mut self, post: &Post) -> Result<(), Error> {
        self.write(Write::UpdatePost(post.clone()))
    }

    async fn add_poll(&mut self, poll: Poll) -> Result<(), Error> {
        self.write(Write::AddPoll(poll))
    }

    async fn get_poll(&mut self, poll_id: Uuid) -> Result<Poll, Error> {
        self.state()?
            .polls
            .get(&poll_id)
            .cloned()
            .ok_or_else(|| Error::not_found("poll", poll_id))
    }

    async fn get_favourites_by_member(
        &mut self,
        member_id: Uuid,
    ) -> Result<Vec<Favourite>, Error> {
        let favourites = self
            .state()?
            .favourites
            .iter()
            .filter(|favourite| favourite.member_id == member_id)
            .cloned()
            .collect();

        Ok(favourites)
    }

    async fn is_subscribed_to_topic(
        &mut self,
        member_id: Uuid,
        topic_id: Uuid,
    ) -> Result<bool, Error> {
        let subscribed = self
            .state()?
            .topic_notifications
            .iter()
            .any(|n| n.member_id == member_id && n.topic_id == topic_id);

        Ok(subscribed)
    }

    async fn add_topic_notification(
        &mut self,
        notification: TopicNotification,
    ) -> Result<(), Error> {
        self.write(Write::TopicNotification(notification))
    }

    async fn get_category_subscribers(&mut self, category_id: Uuid) -> Result<Vec<Uuid>, Error> {
        let subscribers = self
            .state()?
            .category_notifications
            .iter()
            .filter(|n| n.category_id == category_id)
            .map(|n| n.member_id)
            .collect();

        Ok(subscribers)
    }

    async fn commit(&mut self) -> Result<(), Error> {
        if !self.open {
            return Err(Error::Closed);
        }
        let mut shared = self.shared.lock()?;
        let rows: HashSet<_> = self.writes.iter().filter_map(Write::row).collect();
        // Someone else committed to one of these rows since this unit of work started
        if rows
            .iter()
            .any(|row| shared.row_versions.get(row) != self.working.row_versions.get(row))
        {
            return Err(Error::Concurrency);
        }

        let mut next = shared.clone();
        for write in self.writes.iter().cloned() {
            next.apply(write)?;
        }
        for row in rows {
            *next.row_versions.entry(row).or_default() += 1;
        }
        *shared = next;
        self.writes.clear();
        self.open = false;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), Error> {
        self.working = State::default();
        self.writes.clear();
        self.open = false;
        Ok(())
    }
}

impl Drop for MemoryUnitOfWork {
    fn drop(&mut self) {
        if self.open {
            tracing::debug!("discarding uncommitted unit of work");
        }
    }
}

/// Erased [`PoisonError`]
///
/// `PoisonError` keeps the `MutexGuard` internally, which is not send. Thus we erase the error
/// and only keep the string representation instead.
#[derive(Debug, thiserror::Error)]
#[error("poison error: {0}")]
pub struct ErasedPoisonError(String);

/// We need to create a custom `From` implementation here for an error that's specific to this
/// adapter.
impl<T> From<PoisonError<T>> for Error {
    fn from(err: PoisonError<T>) -> Self {
        Self::Adapter(Box::new(ErasedPoisonError(err.to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::VoteDirection;
    use chrono::Utc;
    use rstest::*;
    use speculoos::prelude::*;

    /// Database holding one category, one topic and its starter post
    struct Seeded {
        database: MemoryDatabase,
        topic: Topic,
        post: Post,
    }

    #[fixture]
    async fn seeded() -> Seeded {
        let database = MemoryDatabase::default();
        let category = Category {
            category_id: Uuid::new_v4(),
            name: "General".to_string(),
            slug: "general".to_string(),
            parent_id: None,
            moderate_all_topics: false,
        };
        database.add_category(category.clone()).unwrap();
        let mut uow = database.begin().await.unwrap();
        let topic = uow
            .add_topic(Topic::new(
                "Hello".to_string(),
                "hello".to_string(),
                category.category_id,
                Uuid::new_v4(),
            ))
            .await
            .unwrap();
        let post = uow
            .add_post(Post::new(
                topic.topic_id,
                topic.member_id,
                "first".to_string(),
                true,
            ))
            .await
            .unwrap();
        uow.commit().await.unwrap();

        Seeded {
            database,
            topic,
            post,
        }
    }

    fn vote_on(post: &Post, member_id: Uuid, direction: VoteDirection) -> Vote {
        Vote {
            vote_id: Uuid::new_v4(),
            post_id: post.post_id,
            member_id,
            amount: direction.amount(),
            date_voted: Utc::now(),
        }
    }

    #[rstest]
    #[tokio::test]
    async fn test_commit_makes_changes_visible(#[future] seeded: Seeded) {
        let Seeded { database, post, .. } = seeded.await;
        let member_id = Uuid::new_v4();

        // GIVEN a unit of work adding a ledger entry
        let mut uow = database.begin().await.unwrap();
        uow.add_member_points(MemberPoints::new(member_id, 5, Some(post.post_id)))
            .await
            .unwrap();

        // WHEN it is committed
        let res = uow.commit().await;

        // THEN the entry shows up in a new unit of work
        assert_that!(res).is_ok();
        let mut uow = database.begin().await.unwrap();
        assert_that!(uow.total_points(member_id).await).is_ok().is_equal_to(5);
    }

    #[rstest]
    #[tokio::test]
    async fn test_drop_discards_changes(#[future] seeded: Seeded) {
        let Seeded { database, post, .. } = seeded.await;
        let member_id = Uuid::new_v4();

        // GIVEN a unit of work voting on a post, dropped without commit
        {
            let mut uow = database.begin().await.unwrap();
            uow.add_vote(vote_on(&post, member_id, VoteDirection::Up))
                .await
                .unwrap();
        }

        // THEN the vote is not stored
        let mut uow = database.begin().await.unwrap();
        let stored = uow.get_post(post.post_id).await.unwrap();
        assert_that!(stored.votes).is_empty();
    }

    #[rstest]
    #[tokio::test]
    async fn test_duplicate_vote_conflicts(#[future] seeded: Seeded) {
        let Seeded { database, post, .. } = seeded.await;
        let member_id = Uuid::new_v4();

        let mut uow = database.begin().await.unwrap();
        let res = uow
            .add_vote(vote_on(&post, member_id, VoteDirection::Up))
            .await;
        assert_that!(res).is_ok();

        let res = uow
            .add_vote(vote_on(&post, member_id, VoteDirection::Down))
            .await;
        assert_that!(res)
            .is_err()
            .matches(|err| matches!(err, Error::Conflict(_)));
    }

    /// Two requests voting on the same post from the same snapshot cannot both commit
    #[rstest]
    #[tokio::test]
    async fn test_stale_commit_fails(#[future] seeded: Seeded) {
        let Seeded { database, post, .. } = seeded.await;
        let member_id = Uuid::new_v4();

        // GIVEN two units of work started from the same state
        let mut first = database.begin().await.unwrap();
        let mut second = database.begin().await.unwrap();
        first
            .add_vote(vote_on(&post, member_id, VoteDirection::Up))
            .await
            .unwrap();
        second
            .add_vote(vote_on(&post, member_id, VoteDirection::Up))
            .await
            .unwrap();

        // WHEN both commit
        let first_res = first.commit().await;
        let second_res = second.commit().await;

        // THEN only the first one wins
        assert_that!(first_res).is_ok();
        assert_that!(second_res)
            .is_err()
            .matches(|err| matches!(err, Error::Concurrency));
        let mut uow = database.begin().await.unwrap();
        let stored = uow.get_post(post.post_id).await.unwrap();
        assert_that!(stored.votes).has_length(1);
    }

    /// A commit on another topic does not fail a vote started before it
    #[rstest]
    #[tokio::test]
    async fn test_unrelated_commit_does_not_conflict(#[future] seeded: Seeded) {
        let Seeded {
            database,
            topic,
            post,
        } = seeded.await;
        let member_id = Uuid::new_v4();

        // GIVEN a vote in flight and a new topic committed in the meantime
        let mut voting = database.begin().await.unwrap();
        voting
            .add_vote(vote_on(&post, member_id, VoteDirection::Up))
            .await
            .unwrap();
        let mut other = database.begin().await.unwrap();
        let other_topic = other
            .add_topic(Topic::new(
                "Other".to_string(),
                "other".to_string(),
                topic.category_id,
                Uuid::new_v4(),
            ))
            .await
            .unwrap();
        other.commit().await.unwrap();

        // WHEN the vote commits
        let res = voting.commit().await;

        // THEN both changes are stored
        assert_that!(res).is_ok();
        let mut uow = database.begin().await.unwrap();
        let stored = uow.get_post(post.post_id).await.unwrap();
        assert_that!(stored.votes).has_length(1);
        assert_that!(uow.get_topic(other_topic.topic_id).await).is_ok();
    }

    #[rstest]
    #[tokio::test]
    async fn test_slug_taken_before_commit_conflicts(#[future] seeded: Seeded) {
        let Seeded {
            database, topic, ..
        } = seeded.await;
        let new_topic = || {
            Topic::new(
                "Same".to_string(),
                "same".to_string(),
                topic.category_id,
                Uuid::new_v4(),
            )
        };

        // GIVEN two units of work adding a topic with the same slug
        let mut first = database.begin().await.unwrap();
        let mut second = database.begin().await.unwrap();
        first.add_topic(new_topic()).await.unwrap();
        second.add_topic(new_topic()).await.unwrap();
        first.commit().await.unwrap();

        // WHEN the second one commits
        let res = second.commit().await;

        // THEN the slug is only stored once
        assert_that!(res)
            .is_err()
            .matches(|err| matches!(err, Error::Conflict(_)));
        let mut uow = database.begin().await.unwrap();
        let page = uow.get_recent_topics(1, 10, 100).await.unwrap();
        assert_that!(page.iter().filter(|t| t.slug == "same").count()).is_equal_to(1);
    }

    #[rstest]
    #[tokio::test]
    async fn test_closed_after_commit(#[future] seeded: Seeded) {
        let Seeded { database, topic, .. } = seeded.await;

        let mut uow = database.begin().await.unwrap();
        uow.commit().await.unwrap();

        let res = uow.get_topic(topic.topic_id).await;
        assert_that!(res)
            .is_err()
            .matches(|err| matches!(err, Error::Closed));
    }

    #[rstest]
    #[tokio::test]
    async fn test_posts_exclude_topic_starter(#[future] seeded: Seeded) {
        let Seeded {
            database,
            topic,
            post,
        } = seeded.await;

        let mut uow = database.begin().await.unwrap();
        for n in 0..3 {
            uow.add_post(Post::new(
                topic.topic_id,
                Uuid::new_v4(),
                format!("reply {n}"),
                false,
            ))
            .await
            .unwrap();
        }

        let page = uow
            .get_paged_posts_by_topic(topic.topic_id, 1, 2, PostOrderBy::Standard)
            .await
            .unwrap();
        let starter = uow.get_topic_starter_post(topic.topic_id).await.unwrap();

        assert_that!(page.total_count).is_equal_to(3);
        assert_that!(page.items).has_length(2);
        assert_that!(page.iter().any(|p| p.post_id == post.post_id)).is_false();
        assert_that!(starter.post_id).is_equal_to(post.post_id);
    }

    #[rstest]
    #[tokio::test]
    async fn test_recent_topics_skip_pending(#[future] seeded: Seeded) {
        let Seeded {
            database, topic, ..
        } = seeded.await;

        let mut uow = database.begin().await.unwrap();
        let mut pending = Topic::new(
            "Pending".to_string(),
            "pending".to_string(),
            topic.category_id,
            Uuid::new_v4(),
        );
        pending.pending = true;
        uow.add_topic(pending).await.unwrap();

        let page = uow.get_recent_topics(1, 10, 100).await.unwrap();

        assert_that!(page.items).has_length(1);
        assert_that!(page.items[0].topic_id).is_equal_to(topic.topic_id);
    }

    #[tokio::test]
    async fn test_parent_categories_root_first() {
        let database = MemoryDatabase::default();
        let root = Category {
            category_id: Uuid::new_v4(),
            name: "Root".to_string(),
            slug: "root".to_string(),
            parent_id: None,
            moderate_all_topics: false,
        };
        let child = Category {
            category_id: Uuid::new_v4(),
            name: "Child".to_string(),
            slug: "child".to_string(),
            parent_id: Some(root.category_id),
            moderate_all_topics: false,
        };
        database.add_category(root.clone()).unwrap();
        database.add_category(child.clone()).unwrap();

        let mut uow = database.begin().await.unwrap();
        let chain = uow.get_parent_categories(child.category_id).await.unwrap();

        assert_that!(chain).is_equal_to(vec![root, child]);
    }
}
