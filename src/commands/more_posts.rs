use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use tower::Service;
use uuid::Uuid;

use crate::{
    domain::{views::MorePostsView, views::PostView, PostOrderBy},
    ports::{database::DatabasePort, email::EmailPort, member::MemberPort, spam::SpamPort},
};

use super::{permissions, viewer, DomainLogic, Error, RequestContext};

/// Next page of posts, loaded as the reader scrolls
pub struct MorePostsRequest {
    pub context: RequestContext,
    pub topic_id: Uuid,
    pub page_index: u32,
    pub order: Option<String>,
}

impl<D, M, S, E> DomainLogic<D, M, S, E>
where
    D: DatabasePort,
    M: MemberPort,
    S: SpamPort,
    E: EmailPort,
{
    /// Returns `None` when the reader may not access the topic
    #[tracing::instrument(skip(self, req), fields(topic_id = %req.topic_id, page_index = req.page_index))]
    pub async fn more_posts(&self, req: MorePostsRequest) -> Result<Option<MorePostsView>, Error> {
        let mut uow = self.database.begin().await?;
        let topic = uow.get_topic(req.topic_id).await?;

        let permissions = permissions(uow.as_mut(), topic.category_id, &req.context).await?;
        if permissions.deny_access() {
            return Ok(None);
        }

        let order = PostOrderBy::parse(req.order.as_deref());
        let viewer = viewer(uow.as_mut(), &req.context).await?;
        let favourites = match &viewer {
            Some(viewer) => uow.get_favourites_by_member(viewer.member_id).await?,
            None => Vec::new(),
        };
        let rules = self.settings.voting_rules();
        let posts = uow
            .get_paged_posts_by_topic(
                topic.topic_id,
                req.page_index,
                self.settings.posts_per_page,
                order,
            )
            .await?
            .map(|post| {
                PostView::map(post, viewer.as_ref(), &permissions, &favourites, &rules)
            });

        Ok(Some(MorePostsView {
            topic,
            permissions,
            posts,
        }))
    }
}

impl<D, M, S, E> Service<MorePostsRequest> for DomainLogic<D, M, S, E>
where
    D: DatabasePort + 'static,
    M: MemberPort + 'static,
    S: SpamPort + 'static,
    E: EmailPort + 'static,
{
    type Response = Option<MorePostsView>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: MorePostsRequest) -> Self::Future {
        let logic = self.clone();
        Box::pin(async move { logic.more_posts(req).await })
    }
}
