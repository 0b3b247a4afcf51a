//! Stateful page cursor.

use crate::db::{DbError, SearchQueries};
use crate::search::page::Page;

/// A cursor over the pages of one search.
///
/// The cursor owns the parameters fixed at `begin` time and remembers the
/// page it last served. Movement never fails at the boundaries: stepping past
/// either end clamps to the nearest valid page and serves that page again,
/// with fresh data.
#[derive(Debug, Clone)]
pub struct SearchCursor<P> {
    parameters: P,
    page_index: u32,
    page_count: u32,
}

impl<P> SearchCursor<P> {
    /// Creates a cursor positioned on the first page. No data is fetched
    /// until one of the page methods runs.
    pub fn new(parameters: P) -> Self {
        Self { parameters, page_index: 1, page_count: 1 }
    }

    pub fn parameters(&self) -> &P {
        &self.parameters
    }

    pub fn page_index(&self) -> u32 {
        self.page_index
    }

    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    /// Re-fetches the current page.
    pub async fn page_current<Q>(&mut self, queries: &mut Q) -> Result<Page<Q::Item>, DbError>
    where
        Q: SearchQueries<P> + Send + ?Sized,
        P: Sync,
    {
        let requested = self.page_index;
        self.fetch(queries, requested).await
    }

    /// Fetches the next page, or the last page again if the cursor is already
    /// on it.
    pub async fn page_next<Q>(&mut self, queries: &mut Q) -> Result<Page<Q::Item>, DbError>
    where
        Q: SearchQueries<P> + Send + ?Sized,
        P: Sync,
    {
        let requested = self.page_index.saturating_add(1);
        self.fetch(queries, requested).await
    }

    /// Fetches the previous page, or the first page again if the cursor is
    /// already on it.
    pub async fn page_previous<Q>(&mut self, queries: &mut Q) -> Result<Page<Q::Item>, DbError>
    where
        Q: SearchQueries<P> + Send + ?Sized,
        P: Sync,
    {
        let requested = self.page_index.saturating_sub(1).max(1);
        self.fetch(queries, requested).await
    }

    /// Runs the query and records where the store actually landed. The store
    /// clamps the requested index against the current page count, so the
    /// cursor position always names a page that existed at fetch time.
    async fn fetch<Q>(&mut self, queries: &mut Q, requested: u32) -> Result<Page<Q::Item>, DbError>
    where
        Q: SearchQueries<P> + Send + ?Sized,
        P: Sync,
    {
        let page = queries.search_page(&self.parameters, requested).await?;
        self.page_index = page.page_index;
        self.page_count = page.page_count;
        Ok(page)
    }
}
