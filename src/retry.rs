// Copyright 2023 Dmitry Tantsur <dtantsur@protonmail.com>
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Retrying failed requests.

use std::time::Duration;

use reqwest::StatusCode;

/// Default initial delay before the first retry.
pub const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_millis(500);

/// Default maximum delay between retries.
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(60);

/// How to retry requests that failed with a transient error.
///
/// Connection errors and time outs are retried up to `connect_retries` times. Responses with
/// HTTP 503 (and HTTP 409 for requests that opt in) are retried up to `status_code_retries`
/// times. The delay starts with `initial_backoff`, doubles on every attempt and never exceeds
/// `max_backoff`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Number of retries on connection errors.
    pub connect_retries: u32,
    /// Number of retries on retriable HTTP status codes.
    pub status_code_retries: u32,
    /// Delay before the first retry.
    pub initial_backoff: Duration,
    /// Maximum delay between retries.
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> RetryPolicy {
        RetryPolicy {
            connect_retries: 0,
            status_code_retries: 0,
            initial_backoff: DEFAULT_INITIAL_BACKOFF,
            max_backoff: DEFAULT_MAX_BACKOFF,
        }
    }
}

/// Why a request should be retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RetryReason {
    Connection,
    Status(StatusCode),
}

impl RetryPolicy {
    /// A policy that never retries.
    #[inline]
    pub fn none() -> RetryPolicy {
        RetryPolicy::default()
    }

    /// Set the number of retries on connection errors.
    #[inline]
    pub fn with_connect_retries(mut self, value: u32) -> RetryPolicy {
        self.connect_retries = value;
        self
    }

    /// Set the number of retries on retriable status codes.
    #[inline]
    pub fn with_status_code_retries(mut self, value: u32) -> RetryPolicy {
        self.status_code_retries = value;
        self
    }

    /// Set the initial and the maximum delay.
    #[inline]
    pub fn with_backoff(mut self, initial: Duration, max: Duration) -> RetryPolicy {
        self.initial_backoff = initial;
        self.max_backoff = max;
        self
    }

    /// Whether this policy ever retries.
    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.connect_retries > 0 || self.status_code_retries > 0
    }

    /// Delay before the given retry (starting with 0).
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.min(16));
        self.initial_backoff
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }

    /// Classify a response status.
    pub(crate) fn status_reason(
        &self,
        status: StatusCode,
        retry_on_conflict: bool,
    ) -> Option<RetryReason> {
        match status {
            StatusCode::SERVICE_UNAVAILABLE => Some(RetryReason::Status(status)),
            StatusCode::CONFLICT if retry_on_conflict => Some(RetryReason::Status(status)),
            _ => None,
        }
    }

    /// Classify a transport error.
    pub(crate) fn error_reason(&self, error: &reqwest::Error) -> Option<RetryReason> {
        if error.is_connect() || error.is_timeout() {
            Some(RetryReason::Connection)
        } else {
            None
        }
    }

    /// Whether one more retry is allowed after `done` retries for this reason.
    pub(crate) fn allows(&self, reason: RetryReason, done: u32) -> bool {
        match reason {
            RetryReason::Connection => done < self.connect_retries,
            RetryReason::Status(_) => done < self.status_code_retries,
        }
    }
}

#[cfg(test)]
pub mod test {
    use std::time::Duration;

    use reqwest::StatusCode;

    use super::{RetryPolicy, RetryReason};

    #[test]
    fn test_default_does_not_retry() {
        let policy = RetryPolicy::default();
        assert!(!policy.is_enabled());
        assert!(!policy.allows(RetryReason::Connection, 0));
    }

    #[test]
    fn test_backoff_is_capped() {
        let policy = RetryPolicy::default()
            .with_backoff(Duration::from_millis(100), Duration::from_millis(1000));
        assert_eq!(policy.backoff(0), Duration::from_millis(100));
        assert_eq!(policy.backoff(1), Duration::from_millis(200));
        assert_eq!(policy.backoff(3), Duration::from_millis(800));
        assert_eq!(policy.backoff(4), Duration::from_millis(1000));
        assert_eq!(policy.backoff(100), Duration::from_millis(1000));
    }

    #[test]
    fn test_status_reason() {
        let policy = RetryPolicy::default().with_status_code_retries(2);
        assert_eq!(
            policy.status_reason(StatusCode::SERVICE_UNAVAILABLE, false),
            Some(RetryReason::Status(StatusCode::SERVICE_UNAVAILABLE))
        );
        assert_eq!(policy.status_reason(StatusCode::CONFLICT, false), None);
        assert!(policy
            .status_reason(StatusCode::CONFLICT, true)
            .is_some());
        assert_eq!(policy.status_reason(StatusCode::NOT_FOUND, true), None);

        let reason = RetryReason::Status(StatusCode::SERVICE_UNAVAILABLE);
        assert!(policy.allows(reason, 1));
        assert!(!policy.allows(reason, 2));
        assert!(!policy.allows(RetryReason::Connection, 0));
    }
}
