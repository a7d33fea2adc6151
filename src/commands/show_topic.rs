use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use tower::Service;
use uuid::Uuid;

use crate::{
    domain::{views::PostView, views::ShowTopicView, Message, PostOrderBy},
    ports::{database::DatabasePort, email::EmailPort, member::MemberPort, spam::SpamPort},
};

use super::{commit_or_rollback, permissions, viewer, DomainLogic, Error, RequestContext};

pub struct ShowTopicRequest {
    pub context: RequestContext,
    pub slug: String,
    /// One-based page, first page when missing
    pub page: Option<u32>,
    /// Raw `order` query string value
    pub order: Option<String>,
    /// The URL points at a specific comment, so every post must be on the page
    pub targets_comment: bool,
    /// Post to quote in the reply box
    pub quote: Option<Uuid>,
}

impl ShowTopicRequest {
    pub fn new(context: RequestContext, slug: impl Into<String>) -> Self {
        Self {
            context,
            slug: slug.into(),
            page: None,
            order: None,
            targets_comment: false,
            quote: None,
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum ShowTopicResponse {
    Topic(Box<ShowTopicView>),
    /// Send the user to the home page with a message
    RedirectHome(Message),
}

impl<D, M, S, E> DomainLogic<D, M, S, E>
where
    D: DatabasePort,
    M: MemberPort,
    S: SpamPort,
    E: EmailPort,
{
    #[tracing::instrument(skip(self, req), fields(slug = %req.slug, page = ?req.page))]
    pub async fn show_topic(&self, req: ShowTopicRequest) -> Result<ShowTopicResponse, Error> {
        if req.slug.is_empty() {
            return Ok(ShowTopicResponse::RedirectHome(Message::GenericMessage));
        }

        let mut uow = self.database.begin().await?;
        let Some(mut topic) = uow.get_topic_by_slug(&req.slug).await? else {
            return Ok(ShowTopicResponse::RedirectHome(Message::GenericMessage));
        };

        let permissions = permissions(uow.as_mut(), topic.category_id, &req.context).await?;
        if permissions.deny_access() {
            tracing::warn!(topic_id = %topic.topic_id, "access to topic denied");
            return Ok(ShowTopicResponse::RedirectHome(Message::NoPermission));
        }

        let order = PostOrderBy::parse(req.order.as_deref());
        let page_size = if order == PostOrderBy::All || req.targets_comment {
            usize::MAX
        } else {
            self.settings.posts_per_page
        };
        let posts = uow
            .get_paged_posts_by_topic(topic.topic_id, req.page.unwrap_or(1), page_size, order)
            .await?;

        let viewer = viewer(uow.as_mut(), &req.context).await?;
        let (is_subscribed, favourites) = match &viewer {
            Some(viewer) => (
                uow.is_subscribed_to_topic(viewer.member_id, topic.topic_id)
                    .await?,
                uow.get_favourites_by_member(viewer.member_id).await?,
            ),
            None => (false, Vec::new()),
        };

        let rules = self.settings.voting_rules();
        let starter = uow.get_topic_starter_post(topic.topic_id).await?;
        let map = |post| PostView::map(post, viewer.as_ref(), &permissions, &favourites, &rules);
        let topic_starter = map(starter);
        let posts = posts.map(map);

        let quote = match req.quote {
            None => None,
            Some(post_id) => match uow.get_post(post_id).await {
                Ok(post) => Some(post.content),
                Err(err) => {
                    tracing::error!(error = %err, %post_id, "cannot load quoted post");
                    None
                }
            },
        };

        let (user_has_already_voted_in_poll, total_votes_in_poll) = match topic.poll_id {
            None => (false, 0),
            Some(poll_id) => {
                let poll = uow.get_poll(poll_id).await?;
                let has_voted = viewer
                    .as_ref()
                    .is_some_and(|viewer| poll.has_voted(viewer.member_id));
                (has_voted, poll.total_votes())
            }
        };

        // Views by the topic's creator and by crawlers are not counted
        let is_creator = viewer
            .as_ref()
            .is_some_and(|viewer| viewer.member_id == topic.member_id);
        if !req.context.is_bot && !is_creator {
            topic.views += 1;
            let res: Result<(), Error> = async {
                uow.update_topic(&topic).await?;
                commit_or_rollback(uow.as_mut()).await
            }
            .await;
            if let Err(err) = res {
                tracing::error!(error = %err, topic_id = %topic.topic_id, "failed to count view");
            }
        }

        Ok(ShowTopicResponse::Topic(Box::new(ShowTopicView {
            topic,
            permissions,
            viewer_id: req.context.member_id(),
            topic_starter,
            posts,
            is_subscribed,
            quote,
            user_has_already_voted_in_poll,
            total_votes_in_poll,
        })))
    }
}

impl<D, M, S, E> Service<ShowTopicRequest> for DomainLogic<D, M, S, E>
where
    D: DatabasePort + 'static,
    M: MemberPort + 'static,
    S: SpamPort + 'static,
    E: EmailPort + 'static,
{
    type Response = ShowTopicResponse;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: ShowTopicRequest) -> Self::Future {
        let logic = self.clone();
        Box::pin(async move { logic.show_topic(req).await })
    }
}
