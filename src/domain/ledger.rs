use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{Member, MemberPoints, Post, Topic, Vote, VoteDirection};

/// Point values applied by the vote and solution rules
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VotingRules {
    /// A voter needs strictly more points than this
    pub min_points_to_vote: i32,
    pub points_for_up_vote: u32,
    /// Always subtracted from the author
    pub points_for_down_vote: u32,
    pub points_for_solution: u32,
}

impl VotingRules {
    /// Points credited or debited to the author of a post
    pub fn delta(&self, direction: VoteDirection) -> i32 {
        match direction {
            VoteDirection::Up => ledger_points(self.points_for_up_vote),
            VoteDirection::Down => -ledger_points(self.points_for_down_vote),
        }
    }
}

/// Ledger value of a configured amount of points, saturating at `i32::MAX`
pub fn ledger_points(points: u32) -> i32 {
    i32::try_from(points).unwrap_or(i32::MAX)
}

/// Why a vote attempt was turned down
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VoteRejection {
    /// The voter is locked out or not approved
    NoAccess,
    SelfVote,
    NotEnoughPoints,
    AlreadyVoted,
}

/// Result of applying the vote rule to a post
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VoteOutcome {
    Cast {
        vote: Vote,
        ledger_entry: MemberPoints,
        /// Votes on the post pointing the same way as the one just cast
        reported_count: i32,
    },
    Rejected {
        reason: VoteRejection,
        /// Unchanged net score of the post
        vote_count: i32,
    },
}

impl VoteOutcome {
    /// Number returned to the caller, whatever the outcome
    pub fn count(&self) -> i32 {
        match self {
            VoteOutcome::Cast { reported_count, .. } => *reported_count,
            VoteOutcome::Rejected { vote_count, .. } => *vote_count,
        }
    }
}

/// Check whether `voter` may vote on `post`
pub fn check_eligibility(
    post: &Post,
    voter: &Member,
    rules: &VotingRules,
) -> Result<(), VoteRejection> {
    if !voter.has_access() {
        return Err(VoteRejection::NoAccess);
    }
    if voter.member_id == post.member_id {
        return Err(VoteRejection::SelfVote);
    }
    if voter.points <= rules.min_points_to_vote {
        return Err(VoteRejection::NotEnoughPoints);
    }
    if post.has_voted(voter.member_id) {
        return Err(VoteRejection::AlreadyVoted);
    }
    Ok(())
}

/// Apply a vote from `voter` on `post`, written by `author`
///
/// On success, the new `Vote` is appended to `post.votes` and `post.vote_count` moves by one in
/// the direction of the vote. The returned ledger entry credits or debits `author` and must be
/// persisted in the same unit of work as the vote. On rejection, `post` is left untouched.
pub fn apply_vote(
    post: &mut Post,
    author: &Member,
    voter: &Member,
    direction: VoteDirection,
    rules: &VotingRules,
    now: DateTime<Utc>,
) -> VoteOutcome {
    if let Err(reason) = check_eligibility(post, voter, rules) {
        return VoteOutcome::Rejected {
            reason,
            vote_count: post.vote_count,
        };
    }

    let mut ledger_entry =
        MemberPoints::new(author.member_id, rules.delta(direction), Some(post.post_id));
    ledger_entry.date_added = now;

    let vote = Vote {
        vote_id: Uuid::new_v4(),
        post_id: post.post_id,
        member_id: voter.member_id,
        amount: direction.amount(),
        date_voted: now,
    };
    post.votes.push(vote.clone());
    post.vote_count += direction.amount();

    VoteOutcome::Cast {
        vote,
        ledger_entry,
        reported_count: i32::try_from(post.count_votes(direction)).unwrap_or(i32::MAX),
    }
}

/// Mark `post` as the accepted answer of `topic`
///
/// Returns `None` when the topic is already solved. Otherwise both flags are set and the
/// returned value holds the ledger entry for the solution writer, if any is due. Marking your
/// own post earns nothing.
pub fn solve_topic(
    topic: &mut Topic,
    post: &mut Post,
    marker_id: Uuid,
    rules: &VotingRules,
) -> Option<Option<MemberPoints>> {
    if topic.solved {
        return None;
    }

    topic.solved = true;
    post.is_solution = true;

    let entry = (post.member_id != marker_id).then(|| {
        MemberPoints::new(
            post.member_id,
            ledger_points(rules.points_for_solution),
            Some(post.post_id),
        )
    });
    Some(entry)
}
