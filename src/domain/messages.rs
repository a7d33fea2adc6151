use std::fmt;

use serde::{Deserialize, Serialize};

/// User-facing messages
///
/// The host application translates these through its dictionary using `key()`. `Display` gives
/// the English fallback.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Message {
    GenericMessage,
    NoAccess,
    NoPermission,
    NoPermissionPolls,
    BannedLink,
    AwaitingModeration,
    NewTopicNotification,
    NewTopicNotificationSubject,
}

impl Message {
    pub fn key(&self) -> &'static str {
        match self {
            Message::GenericMessage => "Errors.GenericMessage",
            Message::NoAccess => "Errors.NoAccess",
            Message::NoPermission => "Errors.NoPermission",
            Message::NoPermissionPolls => "Errors.NoPermissionPolls",
            Message::BannedLink => "Errors.BannedLink",
            Message::AwaitingModeration => "Moderate.AwaitingModeration",
            Message::NewTopicNotification => "Topic.Notification.NewTopics",
            Message::NewTopicNotificationSubject => "Topic.Notification.Subject",
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Message::GenericMessage => "Something went wrong, please try again",
            Message::NoAccess => "You do not have access to do this",
            Message::NoPermission => "You do not have permission to do this",
            Message::NoPermissionPolls => "You do not have permission to create polls",
            Message::BannedLink => "Your content contains a link that is not allowed",
            Message::AwaitingModeration => "Your topic is awaiting moderation",
            Message::NewTopicNotification => "A new topic has been posted in",
            Message::NewTopicNotificationSubject => "New topic on ",
        };
        f.write_str(text)
    }
}

/// Severity of a message shown to the user
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageType {
    Info,
    Danger,
}

/// Message queued for display on the next rendered page
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenericMessage {
    pub message: Message,
    pub message_type: MessageType,
}

impl GenericMessage {
    pub fn danger(message: Message) -> Self {
        Self {
            message,
            message_type: MessageType::Danger,
        }
    }

    pub fn info(message: Message) -> Self {
        Self {
            message,
            message_type: MessageType::Info,
        }
    }
}
