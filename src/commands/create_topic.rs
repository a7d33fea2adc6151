use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use tower::Service;
use uuid::Uuid;

use crate::{
    domain::{
        ledger::ledger_points,
        messages::GenericMessage,
        moderation::{contains_banned_link, sanitise_banned_words, slugify},
        Category, MemberPoints, Message, Poll as TopicPoll, PollAnswer, Post, Topic,
        TopicNotification,
    },
    ports::{
        database::{DatabasePort, UnitOfWork},
        email::{Email, EmailPort},
        member::MemberPort,
        spam::SpamPort,
    },
};

use super::{commit_or_rollback, permissions, rollback, DomainLogic, Error, RequestContext};

/// Fields posted by the new topic form
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CreateTopicForm {
    pub name: String,
    pub content: String,
    pub category_id: Uuid,
    /// Blank answers are ignored
    pub poll_answers: Vec<String>,
    pub subscribe_to_topic: bool,
}

pub struct CreateTopicRequest {
    pub context: RequestContext,
    pub form: CreateTopicForm,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CreateTopicResponse {
    /// Redirect to the new topic
    Created {
        topic_id: Uuid,
        url: String,
        messages: Vec<GenericMessage>,
    },
    /// Stored but hidden until a moderator approves it
    AwaitingModeration {
        topic_id: Uuid,
        message: GenericMessage,
    },
    RedirectHome(Message),
    /// Show the create form again with these messages
    RedirectToCreate(Vec<GenericMessage>),
}

impl CreateTopicResponse {
    fn back_to_form(message: Message) -> Self {
        CreateTopicResponse::RedirectToCreate(vec![GenericMessage::danger(message)])
    }
}

impl<D, M, S, E> DomainLogic<D, M, S, E>
where
    D: DatabasePort,
    M: MemberPort,
    S: SpamPort,
    E: EmailPort,
{
    #[tracing::instrument(skip(self, req), fields(category_id = %req.form.category_id))]
    pub async fn create_topic(&self, req: CreateTopicRequest) -> Result<CreateTopicResponse, Error> {
        let profile = req.context.member.as_ref().ok_or(Error::Unauthenticated)?;
        let form = req.form;

        if !req.context.anti_forgery_verified || form.name.trim().is_empty() {
            return Ok(CreateTopicResponse::back_to_form(Message::GenericMessage));
        }
        if profile.is_blocked() || profile.disable_posting {
            tracing::warn!(member_id = %profile.member_id, "member not allowed to post tried to create a topic");
            self.member.log_off(profile.member_id).await?;
            return Ok(CreateTopicResponse::RedirectHome(Message::NoPermission));
        }
        if contains_banned_link(&form.content, &self.settings.banned_links) {
            tracing::info!(member_id = %profile.member_id, "topic rejected for a banned link");
            return Ok(CreateTopicResponse::back_to_form(Message::BannedLink));
        }

        let mut uow = self.database.begin().await?;
        let category = uow.get_category(form.category_id).await?;
        let permissions = permissions(uow.as_mut(), category.category_id, &req.context).await?;
        if !permissions.can_create_topics() {
            return Ok(CreateTopicResponse::back_to_form(Message::NoPermission));
        }
        if form.content.trim().is_empty() {
            return Ok(CreateTopicResponse::back_to_form(Message::GenericMessage));
        }

        let name = sanitise_banned_words(form.name.trim(), &self.settings.banned_words);
        let content = sanitise_banned_words(&form.content, &self.settings.banned_words);
        let slug = unique_slug(uow.as_mut(), &slugify(&name)).await?;
        let mut topic = Topic::new(name, slug, category.category_id, profile.member_id);
        let mut messages = Vec::new();

        let answers: Vec<_> = form
            .poll_answers
            .iter()
            .map(|answer| answer.trim())
            .filter(|answer| !answer.is_empty())
            .collect();
        let poll = if answers.is_empty() {
            None
        } else if permissions.can_create_polls() {
            Some(TopicPoll {
                poll_id: Uuid::new_v4(),
                member_id: profile.member_id,
                answers: answers
                    .into_iter()
                    .map(|answer| PollAnswer {
                        answer_id: Uuid::new_v4(),
                        answer: answer.to_string(),
                        voter_ids: Vec::new(),
                    })
                    .collect(),
            })
        } else {
            messages.push(GenericMessage::info(Message::NoPermissionPolls));
            None
        };
        topic.poll_id = poll.as_ref().map(|poll| poll.poll_id);
        topic.pending = category.moderate_all_topics;

        let post = Post::new(topic.topic_id, profile.member_id, content, true);
        topic.last_post_id = Some(post.post_id);
        topic.last_activity = post.date_created;

        match self.spam.is_spam(&topic, &post.content).await {
            Ok(false) => {}
            Ok(true) => {
                tracing::info!(topic_id = %topic.topic_id, "topic flagged as spam, holding for moderation");
                topic.pending = true;
            }
            Err(err) => {
                tracing::error!(error = %err, "spam check failed, holding topic for moderation");
                topic.pending = true;
            }
        }

        let res: Result<(), Error> = async {
            if let Some(poll) = poll {
                uow.add_poll(poll).await?;
            }
            uow.add_topic(topic.clone()).await?;
            let post = uow.add_post(post).await?;
            uow.add_member_points(MemberPoints::new(
                profile.member_id,
                ledger_points(self.settings.points_added_per_new_post),
                Some(post.post_id),
            ))
            .await?;
            if form.subscribe_to_topic {
                uow.add_topic_notification(TopicNotification {
                    topic_id: topic.topic_id,
                    member_id: profile.member_id,
                })
                .await?;
            }
            commit_or_rollback(uow.as_mut()).await
        }
        .await;
        if let Err(err) = res {
            tracing::error!(error = %err, "failed to create topic");
            rollback(uow.as_mut()).await;
            return Ok(CreateTopicResponse::back_to_form(Message::GenericMessage));
        }

        if let Err(err) = self.member.add_post_count(profile.member_id).await {
            tracing::error!(error = %err, member_id = %profile.member_id, "failed to update post count");
        }

        tracing::info!(topic_id = %topic.topic_id, pending = topic.pending, "topic created");
        if topic.pending {
            return Ok(CreateTopicResponse::AwaitingModeration {
                topic_id: topic.topic_id,
                message: GenericMessage::info(Message::AwaitingModeration),
            });
        }

        if let Err(err) = self.notify_category_subscribers(&category, profile.member_id).await {
            tracing::error!(error = %err, category_id = %category.category_id, "failed to send new topic notifications");
        }

        Ok(CreateTopicResponse::Created {
            topic_id: topic.topic_id,
            url: format!("{}?postbadges=true", topic.url(&self.settings.forum_root_url)),
            messages,
        })
    }

    /// Mail everyone following the category, except the creator and members who opted out
    async fn notify_category_subscribers(
        &self,
        category: &Category,
        creator_id: Uuid,
    ) -> Result<usize, Error> {
        let mut uow = self.database.begin().await?;
        let subscriber_ids: Vec<_> = uow
            .get_category_subscribers(category.category_id)
            .await?
            .into_iter()
            .filter(|member_id| *member_id != creator_id)
            .collect();
        if subscriber_ids.is_empty() {
            return Ok(0);
        }

        let content = format!(
            "<p>{} {}</p><p>{}</p>",
            Message::NewTopicNotification,
            category.name,
            category.url(&self.settings.forum_root_url_with_domain)
        );
        let subject = format!(
            "{}{}",
            Message::NewTopicNotificationSubject,
            self.settings.forum_name
        );
        let emails: Vec<_> = self
            .member
            .get_members_by_id(subscriber_ids)
            .await?
            .into_iter()
            .filter(|member| !member.disable_email_notifications)
            .map(|member| Email {
                body: email_template(&member.user_name, &content),
                email_from: self.settings.notification_reply_email_address.clone(),
                email_to: member.email,
                name_to: member.user_name,
                subject: subject.clone(),
            })
            .collect();

        let sent = emails.len();
        if sent > 0 {
            self.email.send_mail(emails).await?;
        }
        Ok(sent)
    }
}

/// First free slug, appending `-1`, `-2`, ... to `base` as needed
async fn unique_slug(uow: &mut dyn UnitOfWork, base: &str) -> Result<String, Error> {
    if !uow.slug_exists(base).await? {
        return Ok(base.to_string());
    }
    let mut n = 1;
    loop {
        let slug = format!("{base}-{n}");
        if !uow.slug_exists(&slug).await? {
            return Ok(slug);
        }
        n += 1;
    }
}

fn email_template(user_name: &str, content: &str) -> String {
    format!("<p>Hi {user_name},</p>{content}")
}

impl<D, M, S, E> Service<CreateTopicRequest> for DomainLogic<D, M, S, E>
where
    D: DatabasePort + 'static,
    M: MemberPort + 'static,
    S: SpamPort + 'static,
    E: EmailPort + 'static,
{
    type Response = CreateTopicResponse;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: CreateTopicRequest) -> Self::Future {
        let logic = self.clone();
        Box::pin(async move { logic.create_topic(req).await })
    }
}
