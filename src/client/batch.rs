//! Completion-ordered batch streaming over the concurrency queue.

use std::future::Future;

use futures_util::stream::{self, FuturesUnordered, Stream, StreamExt};
use tracing::{debug, instrument};

use super::SocketClient;
use crate::error::SocketError;
use crate::queue::{ConcurrencyQueue, QueueError};
use crate::result::{ApiResult, ApiValue};
use crate::types::PurlArtifact;

/// Package URLs sent per `purl` request.
pub const DEFAULT_BATCH_CHUNK_SIZE: usize = 100;

/// Concurrent `purl` requests.
pub const DEFAULT_BATCH_CONCURRENCY: usize = 10;

/// Tuning for [`SocketClient::batch_package_stream`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchStreamOptions {
    /// Package URLs per request (minimum 1).
    pub chunk_size: usize,
    /// Requests in flight at once (minimum 1).
    pub concurrency: usize,
    /// Query parameters sent with every chunk, e.g. `alerts=true`.
    pub query: Vec<(String, String)>,
}

impl Default for BatchStreamOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_BATCH_CHUNK_SIZE,
            concurrency: DEFAULT_BATCH_CONCURRENCY,
            query: Vec::new(),
        }
    }
}

/// Runs `task` for every item through `queue`, yielding outputs as they finish.
///
/// Nothing is enqueued until the stream is first polled. The stream is
/// finite and yields exactly one item per input, fastest first.
pub fn completion_stream<I, F, Fut, T>(
    queue: ConcurrencyQueue,
    items: I,
    mut task: F,
) -> impl Stream<Item = Result<T, QueueError>>
where
    I: IntoIterator,
    F: FnMut(I::Item) -> Fut,
    Fut: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    stream::once(async move {
        items
            .into_iter()
            .map(|item| {
                let future = task(item);
                queue.enqueue(move || future)
            })
            .collect::<FuturesUnordered<_>>()
    })
    .flatten()
}

impl SocketClient {
    /// Analyzes many package URLs, yielding one result per chunk in completion order.
    ///
    /// Components are split into `chunk_size` groups, each sent as a
    /// [`batch_package_fetch`](Self::batch_package_fetch) call with at most
    /// `concurrency` calls in flight.
    #[instrument(skip(self, components, options), fields(components = components.len()))]
    pub fn batch_package_stream(
        &self,
        components: Vec<String>,
        options: BatchStreamOptions,
    ) -> impl Stream<Item = ApiResult<Vec<ApiValue<PurlArtifact>>>> + use<> {
        let chunk_size = options.chunk_size.max(1);
        let concurrency = options.concurrency.max(1);
        let chunks: Vec<Vec<String>> = components
            .chunks(chunk_size)
            .map(<[String]>::to_vec)
            .collect();
        debug!(chunks = chunks.len(), concurrency, "streaming package batch");

        let queue = match ConcurrencyQueue::new(concurrency, None) {
            Ok(queue) => queue,
            Err(error) => {
                let failed = ApiResult::Error(SocketError::from_queue_error(&error));
                return stream::iter(vec![failed]).left_stream();
            }
        };

        let client = self.clone();
        let query = options.query;
        completion_stream(queue, chunks, move |chunk| {
            let client = client.clone();
            let query = query.clone();
            async move { client.batch_package_fetch(chunk, query).await }
        })
        .map(|outcome| match outcome {
            Ok(result) => result,
            Err(error) => ApiResult::Error(SocketError::from_queue_error(&error)),
        })
        .right_stream()
    }
}
