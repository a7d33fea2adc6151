use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::Post;

/// Ordering of the posts within a topic
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PostOrderBy {
    /// Oldest first
    #[default]
    Standard,
    Newest,
    Votes,
    /// Oldest first, every post on a single page
    All,
}

impl FromStr for PostOrderBy {
    type Err = std::convert::Infallible;

    /// Unknown values fall back to `Standard`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let order = match s.to_ascii_lowercase().as_str() {
            "newest" => PostOrderBy::Newest,
            "votes" => PostOrderBy::Votes,
            "all" => PostOrderBy::All,
            _ => PostOrderBy::Standard,
        };
        Ok(order)
    }
}

impl PostOrderBy {
    /// Parse an optional query string value
    pub fn parse(value: Option<&str>) -> Self {
        value
            .filter(|value| !value.is_empty())
            .and_then(|value| value.parse().ok())
            .unwrap_or_default()
    }

    pub fn sort(&self, posts: &mut [Post]) {
        match self {
            PostOrderBy::Standard | PostOrderBy::All => {
                posts.sort_by_key(|post| post.date_created)
            }
            PostOrderBy::Newest => posts.sort_by(|a, b| b.date_created.cmp(&a.date_created)),
            PostOrderBy::Votes => posts.sort_by(|a, b| {
                b.vote_count
                    .cmp(&a.vote_count)
                    .then(a.date_created.cmp(&b.date_created))
            }),
        }
    }
}

/// One page out of a larger ordered list
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PagedList<T> {
    pub items: Vec<T>,
    /// One-based
    pub page_index: u32,
    pub page_size: usize,
    /// Number of items across all pages
    pub total_count: usize,
}

impl<T> PagedList<T> {
    /// Cut page `page_index` out of `items`
    ///
    /// `max` caps the number of items considered before paging. A page index of 0 is treated as
    /// the first page and a page size of 0 as 1.
    pub fn paginate(items: Vec<T>, page_index: u32, page_size: usize, max: Option<usize>) -> Self {
        let page_index = page_index.max(1);
        let page_size = page_size.max(1);
        let mut items = items;
        if let Some(max) = max {
            items.truncate(max);
        }
        let total_count = items.len();
        let skip = (page_index as usize - 1).saturating_mul(page_size);
        let items = items.into_iter().skip(skip).take(page_size).collect();

        Self {
            items,
            page_index,
            page_size,
            total_count,
        }
    }

    pub fn total_pages(&self) -> usize {
        self.total_count.div_ceil(self.page_size.max(1))
    }

    pub fn has_next_page(&self) -> bool {
        (self.page_index as usize) < self.total_pages()
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PagedList<U> {
        PagedList {
            items: self.items.into_iter().map(f).collect(),
            page_index: self.page_index,
            page_size: self.page_size,
            total_count: self.total_count,
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }
}
