use std::future::Future;

use futures::future::BoxFuture;
use tokio::time::sleep;

use super::{Attempts, RetryPolicy, retry_with_policy};
use crate::{
    dynamic::{DynamicList, DynamicObject},
    error::Error,
    paginate::Paginator,
    request::RequestBuilder,
    transport::Transport,
};

/// Retry extension methods for [`RequestBuilder`].
///
/// Only read operations get dedicated helpers; writes can be wrapped with
/// [`retry`](Self::retry) when the caller knows they are safe to repeat.
pub trait RequestRetryExt<T> {
    fn retry<R, F>(&self, policy: RetryPolicy, operation: F) -> impl Future<Output = Result<R, Error>>
    where
        F: for<'a> FnMut(&'a RequestBuilder<T>) -> BoxFuture<'a, Result<R, Error>>;

    fn list_with_retry<'a>(
        &'a self,
        policy: RetryPolicy,
    ) -> impl Future<Output = Result<DynamicList, Error>> + 'a;

    fn get_with_retry<'a>(
        &'a self,
        policy: RetryPolicy,
        name: &'a str,
    ) -> impl Future<Output = Result<DynamicObject, Error>> + 'a;

    /// Collect every page, retrying each failed page from its own cursor.
    ///
    /// Attempts are counted per page. When the server rejects a cursor as
    /// expired the walk starts over from the first page; such restarts are
    /// capped by the same attempt limit.
    fn paginate_with_retry<'a>(
        &'a self,
        policy: RetryPolicy,
    ) -> impl Future<Output = Result<DynamicList, Error>> + 'a;
}

impl<T: Transport> RequestRetryExt<T> for RequestBuilder<T> {
    fn retry<R, F>(&self, policy: RetryPolicy, operation: F) -> impl Future<Output = Result<R, Error>>
    where
        F: for<'a> FnMut(&'a RequestBuilder<T>) -> BoxFuture<'a, Result<R, Error>>,
    {
        async move {
            let mut operation = operation;
            retry_with_policy(&policy, || operation(self)).await
        }
    }

    fn list_with_retry<'a>(
        &'a self,
        policy: RetryPolicy,
    ) -> impl Future<Output = Result<DynamicList, Error>> + 'a {
        async move { retry_with_policy(&policy, || self.list()).await }
    }

    fn get_with_retry<'a>(
        &'a self,
        policy: RetryPolicy,
        name: &'a str,
    ) -> impl Future<Output = Result<DynamicObject, Error>> + 'a {
        async move { retry_with_policy(&policy, || self.get(name)).await }
    }

    fn paginate_with_retry<'a>(
        &'a self,
        policy: RetryPolicy,
    ) -> impl Future<Output = Result<DynamicList, Error>> + 'a {
        async move {
            let mut pager = Paginator::new(self);
            let mut attempts = Attempts::new(&policy);
            let mut restarts = Attempts::new(&policy);
            loop {
                let error = match pager.fetch_page().await {
                    Ok(Some(list)) => return Ok(list),
                    Ok(None) => {
                        attempts.reset();
                        continue;
                    }
                    Err(error) => error,
                };
                if error.is_expired_cursor() && pager.pages() > 0 {
                    if !restarts.take() {
                        return Err(error);
                    }
                    tracing::warn!(kind = self.kind(), pages = pager.pages(), "list cursor expired, restarting");
                    pager.restart();
                    attempts.reset();
                    continue;
                }
                match attempts.after_failure(&error) {
                    Some(wait) => {
                        tracing::warn!(
                            kind = self.kind(),
                            cursor = pager.cursor(),
                            attempt = attempts.made(),
                            ?wait,
                            error = %error,
                            "retrying page"
                        );
                        sleep(wait).await;
                    }
                    None => return Err(error),
                }
            }
        }
    }
}
