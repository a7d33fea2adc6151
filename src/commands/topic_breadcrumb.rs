use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use tower::Service;

use crate::{
    domain::{views::BreadcrumbView, Topic},
    ports::{database::DatabasePort, email::EmailPort, member::MemberPort, spam::SpamPort},
};

use super::{DomainLogic, Error};

pub struct TopicBreadcrumbRequest {
    pub topic: Topic,
}

impl<D, M, S, E> DomainLogic<D, M, S, E>
where
    D: DatabasePort,
    M: MemberPort,
    S: SpamPort,
    E: EmailPort,
{
    pub async fn topic_breadcrumb(&self, req: TopicBreadcrumbRequest) -> Result<BreadcrumbView, Error> {
        let mut uow = self.database.begin().await?;
        let mut categories = uow.get_parent_categories(req.topic.category_id).await?;
        if categories.is_empty() {
            categories.push(uow.get_category(req.topic.category_id).await?);
        }

        Ok(BreadcrumbView {
            categories,
            topic: req.topic,
        })
    }
}

impl<D, M, S, E> Service<TopicBreadcrumbRequest> for DomainLogic<D, M, S, E>
where
    D: DatabasePort + 'static,
    M: MemberPort + 'static,
    S: SpamPort + 'static,
    E: EmailPort + 'static,
{
    type Response = BreadcrumbView;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: TopicBreadcrumbRequest) -> Self::Future {
        let logic = self.clone();
        Box::pin(async move { logic.topic_breadcrumb(req).await })
    }
}
