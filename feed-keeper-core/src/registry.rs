use crate::{
    error::{KeeperError, KeeperResult},
    types::{FeedId, TrackedFeed},
};
use std::collections::HashMap;
use tracing::debug;

/// Tracked feeds of a single cycle, kept in configuration order.
#[derive(Debug, Clone)]
pub struct FeedRegistry {
    feeds: Vec<TrackedFeed>,
    index: HashMap<FeedId, usize>,
}

impl FeedRegistry {
    /// Builds a fresh registry with every price unset.
    ///
    /// Fails on an empty symbol list, a duplicated symbol, or a symbol that
    /// cannot be packed into a feed id.
    pub fn new<S: AsRef<str>>(symbols: &[S]) -> KeeperResult<Self> {
        if symbols.is_empty() {
            return Err(KeeperError::EmptyFeedSet);
        }

        let mut feeds = Vec::with_capacity(symbols.len());
        let mut index = HashMap::with_capacity(symbols.len());
        for symbol in symbols {
            let feed = TrackedFeed::new(symbol.as_ref())?;
            if index.insert(feed.feed_id, feeds.len()).is_some() {
                return Err(KeeperError::DuplicateSymbol(feed.symbol));
            }
            feeds.push(feed);
        }

        debug!(count = feeds.len(), "Initialized feed registry");
        Ok(Self { feeds, index })
    }

    pub fn get(&self, feed_id: &FeedId) -> Option<&TrackedFeed> {
        self.index.get(feed_id).map(|&i| &self.feeds[i])
    }

    pub fn get_mut(&mut self, feed_id: &FeedId) -> Option<&mut TrackedFeed> {
        match self.index.get(feed_id) {
            Some(&i) => Some(&mut self.feeds[i]),
            None => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &TrackedFeed> {
        self.feeds.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut TrackedFeed> {
        self.feeds.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.feeds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.feeds.is_empty()
    }
}
