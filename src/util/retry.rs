// Copyright 2025 Adobe. All rights reserved.
// This file is licensed to you under the Apache License,
// Version 2.0 (http://www.apache.org/licenses/LICENSE-2.0)
// or the MIT license (http://opensource.org/licenses/MIT),
// at your option.
//
// Unless required by applicable law or agreed to in writing,
// this software is distributed on an "AS IS" BASIS, WITHOUT
// WARRANTIES OR REPRESENTATIONS OF ANY KIND, either express or
// implied. See the LICENSE-MIT and LICENSE-APACHE files for the
// specific language governing permissions and limitations under
// each license.

use std::error::Error;
use std::future::Future;
use std::io;
use std::time::Duration;
use tracing::warn;

/// I/O error kinds of connection-level failures worth another attempt.
const RETRYABLE_KINDS: [io::ErrorKind; 4] = [
    io::ErrorKind::ConnectionReset,
    io::ErrorKind::BrokenPipe,
    io::ErrorKind::Interrupted,
    io::ErrorKind::TimedOut,
];

/// `error` followed by each of its transitive sources.
pub fn source_chain<'a>(
    error: &'a (dyn Error + 'static),
) -> impl Iterator<Item = &'a (dyn Error + 'static)> {
    std::iter::successors(Some(error), |e: &&'a (dyn Error + 'static)| (*e).source())
}

/// Whether `error` is a transient connection failure.
///
/// Classification is structural: answers about the object itself (missing,
/// already present, invalid path) are final, otherwise the source chain is
/// searched for an [`io::Error`] of a connection-level kind. Error messages
/// are never inspected since they embed caller-chosen object names.
pub fn is_retryable(error: &(dyn Error + 'static)) -> bool {
    for cause in source_chain(error) {
        if let Some(store_err) = cause.downcast_ref::<object_store::Error>() {
            if matches!(
                store_err,
                object_store::Error::NotFound { .. }
                    | object_store::Error::AlreadyExists { .. }
                    | object_store::Error::InvalidPath { .. }
            ) {
                return false;
            }
        }
        if let Some(io_err) = cause.downcast_ref::<io::Error>() {
            if RETRYABLE_KINDS.contains(&io_err.kind()) {
                return true;
            }
        }
    }
    false
}

/// Run `operation` until it succeeds, fails with a non-retryable error, or
/// `max_retries` extra attempts are used up.
///
/// Backoff doubles from 100ms and is capped at 2^10 * 100ms.
pub async fn retry_with_max_retries<F, Fut, T, E>(
    max_retries: usize,
    operation_name: &str,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Error + Send + Sync + 'static,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                if !is_retryable(&e) || attempt >= max_retries {
                    return Err(e);
                }

                warn!(
                    "Retryable error in {} (attempt {}/{}): {:?}",
                    operation_name,
                    attempt + 1,
                    max_retries,
                    e
                );

                let backoff_ms = 100 * (1u64 << attempt.min(10));
                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Debug)]
    struct TestError {
        message: String,
        source: Option<io::Error>,
    }

    impl fmt::Display for TestError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{}", self.message)
        }
    }

    impl Error for TestError {
        fn source(&self) -> Option<&(dyn Error + 'static)> {
            self.source.as_ref().map(|e| e as &(dyn Error + 'static))
        }
    }

    fn failing(message: &str) -> TestError {
        TestError {
            message: message.to_string(),
            source: None,
        }
    }

    fn transient(kind: io::ErrorKind) -> TestError {
        TestError {
            message: format!("request failed: {:?}", kind),
            source: Some(io::Error::from(kind)),
        }
    }

    #[test]
    fn test_is_retryable() {
        assert!(is_retryable(&transient(io::ErrorKind::ConnectionReset)));
        assert!(is_retryable(&transient(io::ErrorKind::TimedOut)));
        assert!(!is_retryable(&transient(io::ErrorKind::NotFound)));
        assert!(!is_retryable(&failing("ConnectionReset by peer")));
    }

    #[test]
    fn test_io_error_kinds_are_retryable() {
        let reset = io::Error::from(io::ErrorKind::ConnectionReset);
        let denied = io::Error::from(io::ErrorKind::PermissionDenied);
        assert!(is_retryable(&reset));
        assert!(!is_retryable(&denied));
    }

    #[test]
    fn test_object_names_do_not_affect_classification() {
        let missing = object_store::Error::NotFound {
            path: "TimedOut.csv".to_string(),
            source: Box::new(io::Error::new(
                io::ErrorKind::NotFound,
                "Interrupted/part-0 BrokenPipe",
            )),
        };
        assert!(!is_retryable(&missing));
    }

    #[test]
    fn test_final_object_store_answers_are_not_retried() {
        let exists = object_store::Error::AlreadyExists {
            path: "a/1".to_string(),
            source: Box::new(io::Error::from(io::ErrorKind::TimedOut)),
        };
        assert!(!is_retryable(&exists));

        let generic = object_store::Error::Generic {
            store: "S3",
            source: Box::new(io::Error::from(io::ErrorKind::ConnectionReset)),
        };
        assert!(is_retryable(&generic));
    }

    #[tokio::test]
    async fn test_retry_success_on_first_attempt() {
        let result =
            retry_with_max_retries(3, "test_operation", || async { Ok::<i32, TestError>(42) })
                .await;

        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_retry_success_after_retries() {
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = Arc::clone(&counter);

        let result = retry_with_max_retries(5, "test_operation", move || {
            let counter = Arc::clone(&counter_clone);
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(transient(io::ErrorKind::ConnectionReset))
                } else {
                    Ok(100)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 100);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_non_retryable_error() {
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = Arc::clone(&counter);

        let result = retry_with_max_retries(5, "test_operation", move || {
            let counter = Arc::clone(&counter_clone);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<i32, TestError>(failing("NotFound error"))
            }
        })
        .await;

        assert_eq!(result.unwrap_err().message, "NotFound error");
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_max_retries_exceeded() {
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = Arc::clone(&counter);

        let result = retry_with_max_retries(3, "test_operation", move || {
            let counter = Arc::clone(&counter_clone);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<i32, TestError>(transient(io::ErrorKind::TimedOut))
            }
        })
        .await;

        assert!(result.unwrap_err().message.contains("TimedOut"));
        // 0..=3
        assert_eq!(counter.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_retry_zero_max_retries() {
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = Arc::clone(&counter);

        let result = retry_with_max_retries(0, "test_operation", move || {
            let counter = Arc::clone(&counter_clone);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<i32, TestError>(transient(io::ErrorKind::ConnectionReset))
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_exponential_backoff() {
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = Arc::clone(&counter);
        let start = std::time::Instant::now();

        let result = retry_with_max_retries(2, "test_operation", move || {
            let counter = Arc::clone(&counter_clone);
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(transient(io::ErrorKind::TimedOut))
                } else {
                    Ok(400)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 400);
        // 100ms + 200ms
        assert!(start.elapsed().as_millis() >= 250);
    }
}
