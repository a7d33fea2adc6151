use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use tower::Service;
use uuid::Uuid;

use crate::{
    domain::solve_topic,
    ports::{database::DatabasePort, email::EmailPort, member::MemberPort, spam::SpamPort},
};

use super::{commit_or_rollback, rollback, DomainLogic, Error, RequestContext};

pub struct MarkAsSolutionRequest {
    pub context: RequestContext,
    pub post_id: Uuid,
}

#[derive(Debug, PartialEq, Eq)]
pub struct MarkAsSolutionResponse {
    /// `false` when the topic was already solved
    pub solved: bool,
}

impl<D, M, S, E> DomainLogic<D, M, S, E>
where
    D: DatabasePort,
    M: MemberPort,
    S: SpamPort,
    E: EmailPort,
{
    #[tracing::instrument(skip(self, req), fields(post_id = %req.post_id))]
    pub async fn mark_as_solution(
        &self,
        req: MarkAsSolutionRequest,
    ) -> Result<MarkAsSolutionResponse, Error> {
        if !req.context.is_ajax {
            return Err(Error::NotAjax);
        }
        let marker = req.context.member.as_ref().ok_or(Error::Unauthenticated)?;
        if marker.is_blocked() {
            tracing::warn!(member_id = %marker.member_id, "blocked member tried to mark a solution");
            self.member.log_off(marker.member_id).await?;
            return Err(Error::NoAccess);
        }

        let mut uow = self.database.begin().await?;
        let mut post = uow.get_post(req.post_id).await?;
        let mut topic = uow.get_topic(post.topic_id).await?;

        // Only the member who started the topic picks its solution
        if marker.member_id != topic.member_id {
            tracing::warn!(member_id = %marker.member_id, topic_id = %topic.topic_id, "not the topic creator");
            return Err(Error::Generic);
        }

        let rules = self.settings.voting_rules();
        let Some(ledger_entry) = solve_topic(&mut topic, &mut post, marker.member_id, &rules) else {
            return Ok(MarkAsSolutionResponse { solved: false });
        };

        let res: Result<(), Error> = async {
            uow.update_topic(&topic).await?;
            uow.update_post(&post).await?;
            if let Some(entry) = ledger_entry {
                uow.add_member_points(entry).await?;
            }
            commit_or_rollback(uow.as_mut()).await
        }
        .await;
        if let Err(err) = res {
            tracing::error!(error = %err, "failed to mark solution");
            rollback(uow.as_mut()).await;
            return Err(Error::Generic);
        }

        tracing::info!(topic_id = %topic.topic_id, writer_id = %post.member_id, "topic solved");
        Ok(MarkAsSolutionResponse { solved: true })
    }
}

impl<D, M, S, E> Service<MarkAsSolutionRequest> for DomainLogic<D, M, S, E>
where
    D: DatabasePort + 'static,
    M: MemberPort + 'static,
    S: SpamPort + 'static,
    E: EmailPort + 'static,
{
    type Response = MarkAsSolutionResponse;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: MarkAsSolutionRequest) -> Self::Future {
        let logic = self.clone();
        Box::pin(async move { logic.mark_as_solution(req).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{commands::test_support::Forum, config::Settings};
    use rstest::*;
    use speculoos::prelude::*;
    use tower::{BoxError, ServiceExt};

    #[fixture]
    fn settings() -> Settings {
        Settings {
            points_added_for_solution: 4,
            ..Settings::default()
        }
    }

    #[rstest]
    #[tokio::test]
    async fn test_creator_marks_solution(settings: Settings) -> Result<(), BoxError> {
        // GIVEN a topic by A with a reply by B
        let mut forum = Forum::new(settings);
        let a = forum.member("a", 0).await;
        let b = forum.member("b", 0).await;
        let (topic, _) = forum.topic(&a, "Question").await;
        let answer = forum.reply(&topic, &b).await;

        // WHEN A marks B's reply as the solution
        let req = MarkAsSolutionRequest {
            context: RequestContext::for_member(a).ajax(),
            post_id: answer.post_id,
        };
        let res = forum.logic.ready().await?.call(req).await;

        // THEN
        // * the topic is solved
        // * B earns the solution points
        assert_that!(res)
            .is_ok()
            .is_equal_to(MarkAsSolutionResponse { solved: true });
        assert_that!(forum.topic_by_id(topic.topic_id).await.solved).is_true();
        assert_that!(forum.post(answer.post_id).await.is_solution).is_true();
        assert_that!(forum.points(&b).await).is_equal_to(4);

        Ok(())
    }

    #[rstest]
    #[tokio::test]
    async fn test_already_solved(settings: Settings) -> Result<(), BoxError> {
        let mut forum = Forum::new(settings);
        let a = forum.member("a", 0).await;
        let b = forum.member("b", 0).await;
        let (topic, _) = forum.topic(&a, "Question").await;
        let first = forum.reply(&topic, &b).await;
        let second = forum.reply(&topic, &b).await;
        let req = MarkAsSolutionRequest {
            context: RequestContext::for_member(a.clone()).ajax(),
            post_id: first.post_id,
        };
        forum.logic.ready().await?.call(req).await?;

        let req = MarkAsSolutionRequest {
            context: RequestContext::for_member(a).ajax(),
            post_id: second.post_id,
        };
        let res = forum.logic.ready().await?.call(req).await;

        assert_that!(res)
            .is_ok()
            .is_equal_to(MarkAsSolutionResponse { solved: false });
        assert_that!(forum.post(second.post_id).await.is_solution).is_false();
        assert_that!(forum.points(&b).await).is_equal_to(4);

        Ok(())
    }

    #[rstest]
    #[tokio::test]
    async fn test_only_creator_may_mark(settings: Settings) -> Result<(), BoxError> {
        let mut forum = Forum::new(settings);
        let a = forum.member("a", 0).await;
        let b = forum.member("b", 0).await;
        let (topic, _) = forum.topic(&a, "Question").await;
        let answer = forum.reply(&topic, &b).await;

        let req = MarkAsSolutionRequest {
            context: RequestContext::for_member(b.clone()).ajax(),
            post_id: answer.post_id,
        };
        let res = forum.logic.ready().await?.call(req).await;

        assert_that!(res)
            .is_err()
            .matches(|err| matches!(err, Error::Generic));
        assert_that!(forum.topic_by_id(topic.topic_id).await.solved).is_false();
        assert_that!(forum.points(&b).await).is_equal_to(0);

        Ok(())
    }

    #[rstest]
    #[tokio::test]
    async fn test_blocked_marker(settings: Settings) -> Result<(), BoxError> {
        let mut forum = Forum::new(settings);
        let mut a = forum.member("a", 0).await;
        let (_, starter) = forum.topic(&a, "Question").await;
        a.is_approved = false;

        let req = MarkAsSolutionRequest {
            context: RequestContext::for_member(a.clone()).ajax(),
            post_id: starter.post_id,
        };
        let res = forum.logic.ready().await?.call(req).await;

        assert_that!(res)
            .is_err()
            .matches(|err| matches!(err, Error::NoAccess));
        assert_that!(forum.members.is_logged_off(a.member_id)?).is_true();

        Ok(())
    }
}
