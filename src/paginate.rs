use std::mem;

use crate::{
    dynamic::{DynamicList, DynamicObject},
    error::{Error, Result},
    request::RequestBuilder,
    transport::Transport,
};

/// Page-by-page walk over a list scope.
///
/// The paginator remembers the cursor of the next page, so a failed page can
/// be fetched again without repeating the pages before it. Items accumulate
/// in arrival order until the last page arrives.
#[derive(Debug, Clone)]
pub struct Paginator<T> {
    builder: RequestBuilder<T>,
    start: Option<String>,
    cursor: Option<String>,
    items: Vec<DynamicObject>,
    pages: usize,
}

impl<T: Transport> Paginator<T> {
    /// Start at `builder`'s continue token, or at the first page.
    pub fn new(builder: &RequestBuilder<T>) -> Self {
        let start = builder.state().continue_token.clone();
        Paginator {
            builder: builder.clone(),
            cursor: start.clone(),
            start,
            items: Vec::new(),
            pages: 0,
        }
    }

    /// Cursor the next page will be requested with.
    pub fn cursor(&self) -> Option<&str> {
        self.cursor.as_deref()
    }

    /// Pages fetched since the walk (re)started.
    pub fn pages(&self) -> usize {
        self.pages
    }

    /// Drop collected items and go back to the starting cursor.
    pub fn restart(&mut self) {
        self.cursor = self.start.clone();
        self.items.clear();
        self.pages = 0;
    }

    /// Fetch the next page.
    ///
    /// Returns the assembled list once the last page has arrived and `None`
    /// while more pages remain. On error the paginator is left untouched,
    /// so calling again re-requests the same page.
    ///
    /// # Errors
    /// Request failures, [`Error::NotAList`] for a non-list page and
    /// [`Error::RepeatedContinueToken`] when the server hands back the
    /// cursor it was just sent.
    pub async fn fetch_page(&mut self) -> Result<Option<DynamicList>> {
        let page_builder = match &self.cursor {
            Some(cursor) => self.builder.continue_token(cursor.clone()),
            None => self.builder.clone(),
        };
        let mut page = page_builder.list().await?;
        if !page.is_list() {
            return Err(Error::NotAList {
                kind: page.kind().unwrap_or_default().to_string(),
            });
        }
        let next = page.continue_token().map(str::to_string);
        if next.is_some() && next == self.cursor {
            return Err(Error::RepeatedContinueToken {
                token: next.unwrap_or_default(),
            });
        }

        self.pages += 1;
        tracing::debug!(
            kind = self.builder.kind(),
            page = self.pages,
            items = page.items.len(),
            "fetched page"
        );
        self.items.append(&mut page.items);

        match next {
            Some(token) => {
                self.cursor = Some(token);
                Ok(None)
            }
            None => {
                page.items = mem::take(&mut self.items);
                page.metadata.continue_ = None;
                self.restart();
                Ok(Some(page))
            }
        }
    }

    /// Fetch the remaining pages.
    pub async fn collect(mut self) -> Result<DynamicList> {
        loop {
            if let Some(list) = self.fetch_page().await? {
                return Ok(list);
            }
        }
    }
}

/// List every page of `builder`'s scope, following `metadata.continue`.
///
/// Pages are fetched one after another. The returned list is the last page
/// with the items of all pages in arrival order and no continuation cursor.
/// Any failed or non-list page fails the whole call.
pub async fn paginate<T: Transport>(builder: &RequestBuilder<T>) -> Result<DynamicList> {
    Paginator::new(builder).collect().await
}
