//! Chunked batch deletion with per-key failure isolation.
//!
//! Keys are split into chunks no larger than the provider's per-call limit.
//! A chunk that errors or times out marks only its own keys as failed; all
//! results are merged back in request order.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use futures::{StreamExt, stream};
use tracing::{debug, warn};

use super::config::StorageConfig;
use super::error::StorageError;
use super::types::{BatchItemResult, BatchOperationResult};

/// Provider confirmation for one key of a chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteConfirmation {
    /// The key.
    pub key: String,
    /// Whether the provider confirmed the deletion.
    pub deleted: bool,
    /// Provider-reported reason when not deleted.
    pub error: Option<String>,
}

impl DeleteConfirmation {
    /// A confirmed deletion.
    #[must_use]
    pub fn deleted(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            deleted: true,
            error: None,
        }
    }

    /// A rejected deletion.
    #[must_use]
    pub fn rejected(key: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            deleted: false,
            error: Some(error.into()),
        }
    }
}

/// One provider batch-delete call.
#[async_trait]
pub trait ChunkDeleter: Send + Sync {
    /// Delete up to one chunk of keys in a single provider call.
    ///
    /// `Err` means the whole call failed. `Ok` carries per-key confirmations;
    /// a key without a confirmation is treated as failed.
    async fn delete_chunk(&self, keys: &[String]) -> Result<Vec<DeleteConfirmation>, StorageError>;
}

/// Fans a key list out over a [`ChunkDeleter`].
#[derive(Debug, Clone)]
pub struct BatchCoordinator {
    chunk_size: usize,
    max_concurrent_chunks: usize,
    chunk_timeout: Duration,
}

impl BatchCoordinator {
    /// Create a coordinator issuing chunks sequentially.
    #[must_use]
    pub fn new(chunk_size: usize, chunk_timeout: Duration) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            max_concurrent_chunks: 1,
            chunk_timeout,
        }
    }

    /// Create a coordinator from storage configuration.
    #[must_use]
    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(config.batch_chunk_size, config.operation_timeout)
            .with_max_concurrent_chunks(config.max_concurrent_chunks)
    }

    /// Allow up to `n` chunks in flight. Results keep request order.
    #[must_use]
    pub fn with_max_concurrent_chunks(mut self, n: usize) -> Self {
        self.max_concurrent_chunks = n.max(1);
        self
    }

    /// Maximum keys per provider call.
    #[must_use]
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Delete every key, returning exactly one result per input key.
    pub async fn delete_all<D>(&self, deleter: &D, keys: &[String]) -> BatchOperationResult
    where
        D: ChunkDeleter + ?Sized,
    {
        if keys.is_empty() {
            return BatchOperationResult::from_results(Vec::new());
        }

        let chunk_results: Vec<Vec<BatchItemResult>> =
            stream::iter(
                keys.chunks(self.chunk_size)
                    .enumerate()
                    .map(|(index, chunk)| self.run_chunk(deleter, index, chunk))
                    .collect::<Vec<_>>(),
            )
            .buffered(self.max_concurrent_chunks)
                .collect()
                .await;

        let result =
            BatchOperationResult::from_results(chunk_results.into_iter().flatten().collect());
        debug!(
            total = result.total_count,
            succeeded = result.success_count,
            failed = result.failure_count,
            "Batch delete finished"
        );
        result
    }

    async fn run_chunk<D>(&self, deleter: &D, index: usize, chunk: &[String]) -> Vec<BatchItemResult>
    where
        D: ChunkDeleter + ?Sized,
    {
        match tokio::time::timeout(self.chunk_timeout, deleter.delete_chunk(chunk)).await {
            Ok(Ok(confirmations)) => merge_confirmations(chunk, confirmations),
            Ok(Err(err)) => {
                warn!(chunk = index, keys = chunk.len(), error = %err, "Batch delete chunk failed");
                fail_all(chunk, &err.to_string())
            }
            Err(_) => {
                let err = StorageError::Timeout {
                    operation: "delete_chunk",
                    after: self.chunk_timeout,
                };
                warn!(chunk = index, keys = chunk.len(), error = %err, "Batch delete chunk timed out");
                fail_all(chunk, &err.to_string())
            }
        }
    }
}

fn fail_all(chunk: &[String], reason: &str) -> Vec<BatchItemResult> {
    chunk
        .iter()
        .map(|key| BatchItemResult::failed(key.clone(), reason))
        .collect()
}

/// Map confirmations back onto the chunk's keys, in chunk order.
fn merge_confirmations(
    chunk: &[String],
    confirmations: Vec<DeleteConfirmation>,
) -> Vec<BatchItemResult> {
    let by_key: HashMap<String, DeleteConfirmation> = confirmations
        .into_iter()
        .map(|c| (c.key.clone(), c))
        .collect();

    chunk
        .iter()
        .map(|key| match by_key.get(key) {
            Some(c) if c.deleted => BatchItemResult::ok(key.clone()),
            Some(c) => BatchItemResult::failed(
                key.clone(),
                c.error
                    .clone()
                    .unwrap_or_else(|| "provider did not delete the object".to_string()),
            ),
            None => BatchItemResult::failed(key.clone(), "no confirmation returned by provider"),
        })
        .collect()
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    struct FlakyDeleter {
        fail_every: usize,
        calls: std::sync::atomic::AtomicUsize,
    }

    #[async_trait]
    impl ChunkDeleter for FlakyDeleter {
        async fn delete_chunk(
            &self,
            keys: &[String],
        ) -> Result<Vec<DeleteConfirmation>, StorageError> {
            let n = self
                .calls
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            if n % self.fail_every == 0 {
                return Err(StorageError::operation("flaky"));
            }
            Ok(keys.iter().map(DeleteConfirmation::deleted).collect())
        }
    }

    // For any key list and chunk size, the result has exactly one entry per
    // input key, in input order, whatever the provider does.
    proptest! {
        #[test]
        fn prop_result_matches_input(
            n in 0usize..300,
            chunk_size in 1usize..64,
            fail_every in 1usize..5,
        ) {
            let input: Vec<String> = (0..n).map(|i| format!("k/{i}")).collect();
            let deleter = FlakyDeleter {
                fail_every,
                calls: std::sync::atomic::AtomicUsize::new(0),
            };
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .build()
                .expect("runtime");

            let result = runtime.block_on(
                BatchCoordinator::new(chunk_size, Duration::from_secs(5))
                    .delete_all(&deleter, &input),
            );

            prop_assert_eq!(result.total_count, n);
            prop_assert_eq!(result.results.len(), n);
            prop_assert_eq!(result.success_count + result.failure_count, n);
            for (item, key) in result.results.iter().zip(&input) {
                prop_assert_eq!(&item.key, key);
            }
        }
    }
}
