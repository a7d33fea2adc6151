use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod ledger;
pub mod messages;
pub mod moderation;
pub mod paging;
pub mod permissions;
pub mod views;

pub use ledger::{apply_vote, solve_topic, VoteOutcome, VoteRejection, VotingRules};
pub use messages::Message;
pub use paging::{PagedList, PostOrderBy};
pub use permissions::{Capability, MemberGroup, PermissionSet};

/// A member as seen by the voting rules
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Member {
    /// Unique identifier for the `Member`
    ///
    /// This is the identifier used by the CMS member store.
    pub member_id: Uuid,
    /// Cumulative points balance
    ///
    /// This is the sum of every ledger entry owned by the member and can be negative.
    pub points: i32,
    pub is_locked_out: bool,
    pub is_approved: bool,
}

impl Member {
    pub fn new(member_id: Uuid, points: i32, is_locked_out: bool, is_approved: bool) -> Self {
        Self {
            member_id,
            points,
            is_locked_out,
            is_approved,
        }
    }

    /// Whether the member is allowed to act at all
    pub fn has_access(&self) -> bool {
        !self.is_locked_out && self.is_approved
    }
}

/// Direction of a vote cast on a post
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteDirection {
    Up,
    Down,
}

impl VoteDirection {
    /// Signed amount stored on the `Vote`
    pub fn amount(&self) -> i32 {
        match self {
            VoteDirection::Up => 1,
            VoteDirection::Down => -1,
        }
    }

    /// Whether a stored vote amount points the same way
    pub fn matches(&self, amount: i32) -> bool {
        match self {
            VoteDirection::Up => amount > 0,
            VoteDirection::Down => amount < 0,
        }
    }
}

impl From<bool> for VoteDirection {
    fn from(is_vote_up: bool) -> Self {
        if is_vote_up {
            VoteDirection::Up
        } else {
            VoteDirection::Down
        }
    }
}

/// A signed endorsement from one member on one post
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub vote_id: Uuid,
    pub post_id: Uuid,
    /// Member who cast the vote
    pub member_id: Uuid,
    /// `+1` or `-1`
    pub amount: i32,
    pub date_voted: DateTime<Utc>,
}

/// A single message within a topic
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub post_id: Uuid,
    pub topic_id: Uuid,
    /// Author of the post
    pub member_id: Uuid,
    pub content: String,
    pub date_created: DateTime<Utc>,
    /// Net score of the post
    ///
    /// Kept equal to the signed sum of `votes`.
    pub vote_count: i32,
    pub is_solution: bool,
    pub is_topic_starter: bool,
    pub votes: Vec<Vote>,
}

impl Post {
    pub fn new(topic_id: Uuid, member_id: Uuid, content: String, is_topic_starter: bool) -> Self {
        Self {
            post_id: Uuid::new_v4(),
            topic_id,
            member_id,
            content,
            date_created: Utc::now(),
            vote_count: 0,
            is_solution: false,
            is_topic_starter,
            votes: Vec::default(),
        }
    }

    pub fn has_voted(&self, member_id: Uuid) -> bool {
        self.votes.iter().any(|vote| vote.member_id == member_id)
    }

    pub fn up_votes(&self) -> usize {
        self.count_votes(VoteDirection::Up)
    }

    pub fn down_votes(&self) -> usize {
        self.count_votes(VoteDirection::Down)
    }

    pub fn count_votes(&self, direction: VoteDirection) -> usize {
        self.votes
            .iter()
            .filter(|vote| direction.matches(vote.amount))
            .count()
    }
}

/// Append-only record of a point change
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberPoints {
    pub entry_id: Uuid,
    /// Difference in points
    ///
    /// A positive number adds points to the member's balance. A negative number removes from it.
    pub points: i32,
    pub member_id: Uuid,
    pub related_post_id: Option<Uuid>,
    pub date_added: DateTime<Utc>,
}

impl MemberPoints {
    pub fn new(member_id: Uuid, points: i32, related_post_id: Option<Uuid>) -> Self {
        Self {
            entry_id: Uuid::new_v4(),
            points,
            member_id,
            related_post_id,
            date_added: Utc::now(),
        }
    }
}

/// A discussion thread
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    pub topic_id: Uuid,
    pub name: String,
    /// URL-safe identifier, unique across topics
    pub slug: String,
    pub category_id: Uuid,
    /// Member who created the topic
    pub member_id: Uuid,
    pub date_created: DateTime<Utc>,
    pub views: u32,
    /// Awaiting moderation
    pub pending: bool,
    pub solved: bool,
    pub poll_id: Option<Uuid>,
    pub last_post_id: Option<Uuid>,
    /// Time of the most recent post, used to order recent topics
    pub last_activity: DateTime<Utc>,
}

impl Topic {
    pub fn new(name: String, slug: String, category_id: Uuid, member_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            topic_id: Uuid::new_v4(),
            name,
            slug,
            category_id,
            member_id,
            date_created: now,
            views: 0,
            pending: false,
            solved: false,
            poll_id: None,
            last_post_id: None,
            last_activity: now,
        }
    }

    /// Relative URL of the topic under the forum root
    pub fn url(&self, forum_root_url: &str) -> String {
        format!("{}/topic/{}", forum_root_url.trim_end_matches('/'), self.slug)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub category_id: Uuid,
    pub name: String,
    pub slug: String,
    pub parent_id: Option<Uuid>,
    /// Every new topic in this category waits for a moderator
    pub moderate_all_topics: bool,
}

impl Category {
    pub fn url(&self, forum_root_url: &str) -> String {
        format!("{}/{}", forum_root_url.trim_end_matches('/'), self.slug)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Poll {
    pub poll_id: Uuid,
    /// Member who created the poll
    pub member_id: Uuid,
    pub answers: Vec<PollAnswer>,
}

impl Poll {
    /// Member ids of every vote across all answers
    pub fn voters(&self) -> impl Iterator<Item = Uuid> + '_ {
        self.answers
            .iter()
            .flat_map(|answer| answer.voter_ids.iter().copied())
    }

    pub fn total_votes(&self) -> usize {
        self.voters().count()
    }

    pub fn has_voted(&self, member_id: Uuid) -> bool {
        self.voters().any(|voter| voter == member_id)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollAnswer {
    pub answer_id: Uuid,
    pub answer: String,
    pub voter_ids: Vec<Uuid>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Favourite {
    pub member_id: Uuid,
    pub post_id: Uuid,
}

/// Subscription of a member to new posts in a topic
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicNotification {
    pub topic_id: Uuid,
    pub member_id: Uuid,
}

/// Subscription of a member to new topics in a category
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryNotification {
    pub category_id: Uuid,
    pub member_id: Uuid,
}
