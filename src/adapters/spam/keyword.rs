use regex::Regex;

use crate::{
    domain::Topic,
    ports::spam::{Error, SpamPort},
};

/// Local spam heuristic for running without the third-party classifier
///
/// Flags content holding one of the keywords, or more links than allowed.
#[derive(Clone, Debug)]
pub struct KeywordSpamFilter {
    keywords: Vec<String>,
    max_links: usize,
    links: Regex,
}

impl KeywordSpamFilter {
    pub fn new(keywords: Vec<String>, max_links: usize) -> Result<Self, Error> {
        let links = Regex::new(r"(?i)https?://").map_err(|err| Error::Adapter(Box::new(err)))?;
        Ok(Self {
            keywords: keywords
                .into_iter()
                .map(|keyword| keyword.to_lowercase())
                .filter(|keyword| !keyword.is_empty())
                .collect(),
            max_links,
            links,
        })
    }

    fn check(&self, text: &str) -> bool {
        let lower = text.to_lowercase();
        self.keywords.iter().any(|keyword| lower.contains(keyword))
            || self.links.find_iter(text).count() > self.max_links
    }
}

#[async_trait::async_trait]
impl SpamPort for KeywordSpamFilter {
    async fn is_spam(&self, topic: &Topic, content: &str) -> Result<bool, Error> {
        let spam = self.check(&topic.name) || self.check(content);
        if spam {
            tracing::debug!(topic_id = %topic.topic_id, "content flagged as spam");
        }
        Ok(spam)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::*;
    use speculoos::prelude::*;
    use uuid::Uuid;

    #[rstest]
    #[case("Cheap pills", "hello", true)]
    #[case("Question", "buy CHEAP watches", true)]
    #[case("Question", "see http://a.com and https://b.com", false)]
    #[case("Question", "http://a.com http://b.com http://c.com", true)]
    #[case("Question", "how do I borrow?", false)]
    #[tokio::test]
    async fn test_is_spam(#[case] name: &str, #[case] content: &str, #[case] expected: bool) {
        let filter = KeywordSpamFilter::new(vec!["cheap".to_string()], 2).unwrap();
        let topic = Topic::new(
            name.to_string(),
            "slug".to_string(),
            Uuid::new_v4(),
            Uuid::new_v4(),
        );

        let res = filter.is_spam(&topic, content).await;

        assert_that!(res).is_ok().is_equal_to(expected);
    }
}
