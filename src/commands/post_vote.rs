use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use chrono::Utc;
use tower::Service;
use uuid::Uuid;

use crate::{
    domain::{apply_vote, ledger::check_eligibility, VoteDirection, VoteOutcome},
    ports::{
        database::{DatabasePort, UnitOfWork},
        email::EmailPort,
        member::MemberPort,
        spam::SpamPort,
    },
};

use super::{commit_or_rollback, rollback, DomainLogic, Error, RequestContext};

pub struct PostVoteRequest {
    pub context: RequestContext,
    pub post_id: Uuid,
    pub direction: VoteDirection,
}

#[derive(Debug, PartialEq, Eq)]
pub struct PostVoteResponse {
    /// Same-direction vote count when the vote was cast, unchanged net score otherwise
    pub count: i32,
    pub cast: bool,
}

impl<D, M, S, E> DomainLogic<D, M, S, E>
where
    D: DatabasePort,
    M: MemberPort,
    S: SpamPort,
    E: EmailPort,
{
    #[tracing::instrument(skip(self, req), fields(post_id = %req.post_id, direction = ?req.direction))]
    pub async fn post_vote(&self, req: PostVoteRequest) -> Result<PostVoteResponse, Error> {
        if !req.context.is_ajax {
            return Err(Error::NotAjax);
        }
        let profile = req.context.member.as_ref().ok_or(Error::Unauthenticated)?;
        // Quick check to see if the member is locked out
        if profile.is_blocked() {
            tracing::warn!(member_id = %profile.member_id, "blocked member tried to vote");
            self.member.log_off(profile.member_id).await?;
            return Err(Error::NoAccess);
        }

        let mut uow = self.database.begin().await?;
        let mut post = uow.get_post(req.post_id).await?;
        let voter = profile.with_points(uow.total_points(profile.member_id).await?);
        let rules = self.settings.voting_rules();

        if let Err(reason) = check_eligibility(&post, &voter, &rules) {
            tracing::info!(member_id = %voter.member_id, ?reason, "vote rejected");
            return Ok(PostVoteResponse {
                count: post.vote_count,
                cast: false,
            });
        }

        let author_profile = self.member.get_member(post.member_id).await?;
        let author = author_profile.with_points(uow.total_points(post.member_id).await?);

        let outcome = apply_vote(
            &mut post,
            &author,
            &voter,
            req.direction,
            &rules,
            Utc::now(),
        );
        let (vote, ledger_entry, count) = match outcome {
            VoteOutcome::Cast {
                vote,
                ledger_entry,
                reported_count,
            } => (vote, ledger_entry, reported_count),
            VoteOutcome::Rejected { vote_count, .. } => {
                return Ok(PostVoteResponse {
                    count: vote_count,
                    cast: false,
                })
            }
        };
        let delta = ledger_entry.points;

        let res: Result<(), Error> = async {
            uow.add_member_points(ledger_entry).await?;
            uow.add_vote(vote).await?;
            uow.update_post(&post).await?;
            commit_or_rollback(uow.as_mut()).await
        }
        .await;
        if let Err(err) = res {
            tracing::error!(error = %err, "failed to record vote");
            rollback(uow.as_mut()).await;
            return Err(Error::Generic);
        }

        tracing::info!(
            member_id = %voter.member_id,
            author_id = %author.member_id,
            delta,
            vote_count = post.vote_count,
            "vote cast"
        );
        Ok(PostVoteResponse { count, cast: true })
    }
}

impl<D, M, S, E> Service<PostVoteRequest> for DomainLogic<D, M, S, E>
where
    D: DatabasePort + 'static,
    M: MemberPort + 'static,
    S: SpamPort + 'static,
    E: EmailPort + 'static,
{
    type Response = PostVoteResponse;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: PostVoteRequest) -> Self::Future {
        let logic = self.clone();
        Box::pin(async move { logic.post_vote(req).await })
    }
}
