use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use tower::Service;
use uuid::Uuid;

use crate::ports::{database::DatabasePort, email::EmailPort, member::MemberPort, spam::SpamPort};

use super::{commit_or_rollback, DomainLogic, Error, RequestContext};

/// Moderator approval of a pending topic
pub struct ApproveTopicRequest {
    pub context: RequestContext,
    pub topic_id: Uuid,
}

impl<D, M, S, E> DomainLogic<D, M, S, E>
where
    D: DatabasePort,
    M: MemberPort,
    S: SpamPort,
    E: EmailPort,
{
    #[tracing::instrument(skip(self, req), fields(topic_id = %req.topic_id))]
    pub async fn approve_topic(&self, req: ApproveTopicRequest) -> Result<(), Error> {
        if !req.context.is_ajax {
            return Err(Error::NotAjax);
        }
        if !req.context.member.as_ref().is_some_and(|member| member.is_admin()) {
            return Err(Error::NoPermission);
        }

        let mut uow = self.database.begin().await?;
        let mut topic = uow.get_topic(req.topic_id).await?;
        topic.pending = false;
        uow.update_topic(&topic).await?;
        commit_or_rollback(uow.as_mut()).await?;

        tracing::info!(topic_id = %topic.topic_id, "topic approved");
        Ok(())
    }
}

impl<D, M, S, E> Service<ApproveTopicRequest> for DomainLogic<D, M, S, E>
where
    D: DatabasePort + 'static,
    M: MemberPort + 'static,
    S: SpamPort + 'static,
    E: EmailPort + 'static,
{
    type Response = ();
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: ApproveTopicRequest) -> Self::Future {
        let logic = self.clone();
        Box::pin(async move { logic.approve_topic(req).await })
    }
}
