use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use tower::Service;
use uuid::Uuid;

use crate::{
    domain::views::CreateTopicButtonView,
    ports::{database::DatabasePort, email::EmailPort, member::MemberPort, spam::SpamPort},
};

use super::{permissions, DomainLogic, Error, RequestContext};

pub struct CreateTopicButtonRequest {
    pub context: RequestContext,
    /// Set when the button is rendered on a category page
    pub current_category: Option<Uuid>,
}

impl<D, M, S, E> DomainLogic<D, M, S, E>
where
    D: DatabasePort,
    M: MemberPort,
    S: SpamPort,
    E: EmailPort,
{
    pub async fn create_topic_button(
        &self,
        req: CreateTopicButtonRequest,
    ) -> Result<CreateTopicButtonView, Error> {
        if req.context.member.is_none() {
            return Ok(CreateTopicButtonView {
                logged_on: false,
                user_can_post_topics: false,
                category_id: None,
            });
        }

        let mut uow = self.database.begin().await?;
        let mut user_can_post_topics = false;
        for category in uow.get_all_categories().await? {
            let set = permissions(uow.as_mut(), category.category_id, &req.context).await?;
            if set.can_create_topics() {
                user_can_post_topics = true;
                break;
            }
        }

        Ok(CreateTopicButtonView {
            logged_on: true,
            user_can_post_topics,
            category_id: req.current_category,
        })
    }
}

impl<D, M, S, E> Service<CreateTopicButtonRequest> for DomainLogic<D, M, S, E>
where
    D: DatabasePort + 'static,
    M: MemberPort + 'static,
    S: SpamPort + 'static,
    E: EmailPort + 'static,
{
    type Response = CreateTopicButtonView;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: CreateTopicButtonRequest) -> Self::Future {
        let logic = self.clone();
        Box::pin(async move { logic.create_topic_button(req).await })
    }
}
