//! Exponential backoff and error mapping shared by the HTTP collaborators.

use std::future::Future;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{DubError, Result};

const MAX_ATTEMPTS: u32 = 3;

const BASE_DELAY: Duration = Duration::from_millis(1000);

/// Retries transient failures, doubling the delay each time. Client errors
/// (4xx) and local errors such as a missing file are returned at once.
#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    attempts: u32,
    base_delay: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            attempts: MAX_ATTEMPTS,
            base_delay: BASE_DELAY,
        }
    }
}

impl Backoff {
    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    fn delay_before(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.pow(attempt.saturating_sub(1))
    }

    pub async fn run<T, F, Fut>(&self, service: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut last_error = None;

        for attempt in 0..self.attempts {
            if attempt > 0 {
                let delay = self.delay_before(attempt);
                debug!("{} retry {} after {:?}", service, attempt, delay);
                tokio::time::sleep(delay).await;
            }

            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if !is_transient(&e) => return Err(e),
                Err(e) => {
                    warn!("{} attempt {} failed: {}", service, attempt + 1, e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| DubError::Api(format!("{service}: no attempts made"))))
    }
}

fn is_transient(e: &DubError) -> bool {
    match e {
        DubError::Api(message) => !message.contains("API error (4"),
        DubError::Http(_) => true,
        _ => false,
    }
}

/// Turn a non-success response into an `Api` error, using the JSON error
/// message when the body carries one.
pub async fn error_from_response(service: &str, response: reqwest::Response) -> DubError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();

    let detail = match serde_json::from_str::<ApiErrorResponse>(&body) {
        Ok(parsed) if parsed.error.r#type.is_empty() => parsed.error.message,
        Ok(parsed) => format!("{} ({})", parsed.error.message, parsed.error.r#type),
        Err(_) => body,
    };

    DubError::Api(format!("{service} API error ({status}): {detail}"))
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
    #[serde(default)]
    r#type: String,
}
