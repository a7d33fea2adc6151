use std::{
    collections::HashMap,
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use tower::Service;

use crate::{
    domain::views::LatestTopicsView,
    ports::{database::DatabasePort, email::EmailPort, member::MemberPort, spam::SpamPort},
};

use super::{permissions, DomainLogic, Error, RequestContext};

pub struct LatestTopicsRequest {
    pub context: RequestContext,
    pub page: Option<u32>,
}

impl<D, M, S, E> DomainLogic<D, M, S, E>
where
    D: DatabasePort,
    M: MemberPort,
    S: SpamPort,
    E: EmailPort,
{
    #[tracing::instrument(skip(self, req), fields(page = ?req.page))]
    pub async fn latest_topics(&self, req: LatestTopicsRequest) -> Result<LatestTopicsView, Error> {
        let mut uow = self.database.begin().await?;
        let topics = uow
            .get_recent_topics(
                req.page.unwrap_or(1),
                self.settings.topics_per_page,
                self.settings.active_topics_list_size,
            )
            .await?;

        let mut permission_sets = HashMap::new();
        for topic in topics.iter() {
            if !permission_sets.contains_key(&topic.category_id) {
                let set = permissions(uow.as_mut(), topic.category_id, &req.context).await?;
                permission_sets.insert(topic.category_id, set);
            }
        }

        Ok(LatestTopicsView {
            topics,
            permissions: permission_sets,
        })
    }
}

impl<D, M, S, E> Service<LatestTopicsRequest> for DomainLogic<D, M, S, E>
where
    D: DatabasePort + 'static,
    M: MemberPort + 'static,
    S: SpamPort + 'static,
    E: EmailPort + 'static,
{
    type Response = LatestTopicsView;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: LatestTopicsRequest) -> Self::Future {
        let logic = self.clone();
        Box::pin(async move { logic.latest_topics(req).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{commands::test_support::Forum, config::Settings, ports::database::DatabasePort};
    use chrono::{Duration, Utc};
    use speculoos::prelude::*;
    use tower::{BoxError, ServiceExt};

    #[tokio::test]
    async fn test_latest_topics() -> Result<(), BoxError> {
        // GIVEN three topics, the middle one pending, 1 per page
        let mut forum = Forum::new(Settings {
            topics_per_page: 1,
            ..Settings::default()
        });
        let a = forum.member("a", 0).await;
        let mut topics = Vec::new();
        for (n, name) in ["Old", "Pending", "New"].into_iter().enumerate() {
            let (mut topic, _) = forum.topic(&a, name).await;
            topic.last_activity = Utc::now() - Duration::hours(10 - n as i64);
            topic.pending = name == "Pending";
            let mut uow = forum.database.begin().await?;
            uow.update_topic(&topic).await?;
            uow.commit().await?;
            topics.push(topic);
        }

        // WHEN listing the first page
        let req = LatestTopicsRequest {
            context: RequestContext::anonymous(),
            page: None,
        };
        let view = forum.logic.ready().await?.call(req).await?;

        // THEN the newest live topic comes first, with its category permissions
        assert_that!(view.topics.total_count).is_equal_to(2);
        assert_that!(view.topics.items[0].topic_id).is_equal_to(topics[2].topic_id);
        assert_that!(view.permissions.get(&forum.category.category_id))
            .is_some()
            .matches(|set| set.read_only());

        Ok(())
    }
}
