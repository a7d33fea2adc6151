//! View models handed to the presentation layer

use std::collections::HashMap;

use serde::Serialize;
use uuid::Uuid;

use super::{
    ledger::check_eligibility, Category, Favourite, Member, PagedList, PermissionSet, Post, Topic,
    VotingRules,
};

/// A post with everything the viewer needs to render it
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PostView {
    pub post: Post,
    pub up_votes: usize,
    pub down_votes: usize,
    /// The viewer already voted on this post
    pub has_voted: bool,
    /// The viewer may vote on this post now, in this category
    pub allowed_to_vote: bool,
    pub member_is_owner: bool,
    pub member_has_favourited: bool,
}

impl PostView {
    pub fn map(
        post: Post,
        viewer: Option<&Member>,
        permissions: &PermissionSet,
        favourites: &[Favourite],
        rules: &VotingRules,
    ) -> Self {
        let has_voted = viewer.is_some_and(|viewer| post.has_voted(viewer.member_id));
        let allowed_to_vote = permissions.can_vote()
            && viewer.is_some_and(|viewer| check_eligibility(&post, viewer, rules).is_ok());
        let member_is_owner = viewer.is_some_and(|viewer| viewer.member_id == post.member_id);
        let member_has_favourited = favourites
            .iter()
            .any(|favourite| favourite.post_id == post.post_id);

        Self {
            up_votes: post.up_votes(),
            down_votes: post.down_votes(),
            has_voted,
            allowed_to_vote,
            member_is_owner,
            member_has_favourited,
            post,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ShowTopicView {
    pub topic: Topic,
    pub permissions: PermissionSet,
    pub viewer_id: Option<Uuid>,
    pub topic_starter: PostView,
    pub posts: PagedList<PostView>,
    pub is_subscribed: bool,
    /// Content of the post being quoted, to prefill the reply box
    pub quote: Option<String>,
    pub user_has_already_voted_in_poll: bool,
    pub total_votes_in_poll: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MorePostsView {
    pub topic: Topic,
    pub permissions: PermissionSet,
    pub posts: PagedList<PostView>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LatestTopicsView {
    pub topics: PagedList<Topic>,
    /// Permissions of the viewer for every category appearing in `topics`
    pub permissions: HashMap<Uuid, PermissionSet>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CreateTopicButtonView {
    pub logged_on: bool,
    pub user_can_post_topics: bool,
    /// Category to preselect when the button sits on a category page
    pub category_id: Option<Uuid>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BreadcrumbView {
    /// Root first, ending with the topic's own category
    pub categories: Vec<Category>,
    pub topic: Topic,
}
