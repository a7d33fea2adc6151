use std::path::Path;

use serde::Deserialize;
use tokio::fs::read_to_string;

use crate::domain::VotingRules;

/// Forum settings
///
/// Every field has a default so a partial YAML file is enough.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Members need strictly more points than this to vote
    pub amount_of_points_before_a_user_can_vote: i32,
    pub points_added_for_positive_vote: u32,
    pub points_deducted_for_negative_vote: u32,
    pub points_added_per_new_post: u32,
    pub points_added_for_solution: u32,
    pub posts_per_page: usize,
    pub topics_per_page: usize,
    /// Upper bound on the number of topics listed as latest
    pub active_topics_list_size: usize,
    pub banned_words: Vec<String>,
    pub banned_links: Vec<String>,
    pub forum_name: String,
    /// Relative root of the forum, e.g. `/forum`
    pub forum_root_url: String,
    /// Absolute root of the forum, used in emails
    pub forum_root_url_with_domain: String,
    pub notification_reply_email_address: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            amount_of_points_before_a_user_can_vote: 1,
            points_added_for_positive_vote: 2,
            points_deducted_for_negative_vote: 1,
            points_added_per_new_post: 1,
            points_added_for_solution: 4,
            posts_per_page: 10,
            topics_per_page: 10,
            active_topics_list_size: 100,
            banned_words: Vec::default(),
            banned_links: Vec::default(),
            forum_name: "Forum".to_string(),
            forum_root_url: "/forum".to_string(),
            forum_root_url_with_domain: "http://localhost/forum".to_string(),
            notification_reply_email_address: "noreply@localhost".to_string(),
        }
    }
}

impl Settings {
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let content = read_to_string(path).await?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self, Error> {
        let mut settings: Settings = serde_yaml::from_str(content)?;
        settings.posts_per_page = settings.posts_per_page.max(1);
        settings.topics_per_page = settings.topics_per_page.max(1);
        settings.forum_root_url = settings.forum_root_url.trim_end_matches('/').to_string();
        Ok(settings)
    }

    pub fn voting_rules(&self) -> VotingRules {
        VotingRules {
            min_points_to_vote: self.amount_of_points_before_a_user_can_vote,
            points_for_up_vote: self.points_added_for_positive_vote,
            points_for_down_vote: self.points_deducted_for_negative_vote,
            points_for_solution: self.points_added_for_solution,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("cannot read settings: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid settings: {0}")]
    Parse(#[from] serde_yaml::Error),
}
