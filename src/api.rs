//! Transport for the LLM sentiment backend.
//!
//! Prompts go out through `awful_aj` to an OpenAI-compatible endpoint. Rate
//! limits and flaky gateways are common there, so every call is wrapped in a
//! [`RetryAsk`] transport that backs off exponentially with a little jitter.

use awful_aj::api::ask;
use awful_aj::{config::AwfulJadeConfig, template::ChatTemplate};
use rand::{Rng, rng};
use std::error::Error;
use std::fmt;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{error, info, instrument, warn};

/// Something that turns a prompt into a model reply.
pub trait AskAsync {
    /// Send `prompt` and return the model's raw reply text.
    async fn ask(&self, prompt: &str) -> Result<String, Box<dyn Error>>;
}

/// How long to wait between attempts and when to stop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    /// Retries after the first failure; the total number of calls is one more.
    pub retries: usize,
    /// Pause before the first retry. Doubles on each later one.
    pub initial: Duration,
    /// Largest pause before jitter is added.
    pub ceiling: Duration,
    /// Upper bound of the random extra pause, in milliseconds.
    pub jitter_ms: u64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            retries: 3,
            initial: Duration::from_secs(2),
            ceiling: Duration::from_secs(10),
            jitter_ms: 250,
        }
    }
}

impl BackoffPolicy {
    /// Pause before retry `n` (1-based): `initial * 2^(n-1)`, capped, plus jitter.
    pub fn pause(&self, n: usize) -> Duration {
        let doublings = n.saturating_sub(1).min(16) as u32;
        let base = self.initial.saturating_mul(1 << doublings).min(self.ceiling);
        let extra = if self.jitter_ms == 0 {
            0
        } else {
            rng().random_range(0..=self.jitter_ms)
        };
        base + Duration::from_millis(extra)
    }
}

/// Retries the inner transport according to a [`BackoffPolicy`].
pub struct RetryAsk<T> {
    inner: T,
    policy: BackoffPolicy,
}

impl<T> RetryAsk<T> {
    pub fn new(inner: T, policy: BackoffPolicy) -> Self {
        Self { inner, policy }
    }
}

impl<T> fmt::Debug for RetryAsk<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryAsk").field("policy", &self.policy).finish()
    }
}

impl<T: AskAsync> AskAsync for RetryAsk<T> {
    #[instrument(level = "debug", skip_all, fields(retries = self.policy.retries))]
    async fn ask(&self, prompt: &str) -> Result<String, Box<dyn Error>> {
        let mut failures = 0usize;
        loop {
            match self.inner.ask(prompt).await {
                Ok(reply) => return Ok(reply),
                Err(e) if failures >= self.policy.retries => {
                    error!(attempts = failures + 1, error = %e, "Giving up on LLM request");
                    return Err(e);
                }
                Err(e) => {
                    failures += 1;
                    let pause = self.policy.pause(failures);
                    warn!(attempt = failures, ?pause, error = %e, "LLM request failed, retrying");
                    sleep(pause).await;
                }
            }
        }
    }
}

/// Sends prompts with `awful_aj::api::ask` using a fixed config and chat template.
#[derive(Debug)]
pub struct AskFnWrapper<'a> {
    /// Endpoint, model and API key.
    pub config: &'a AwfulJadeConfig,
    /// System prompt and message framing for the sentiment request.
    pub template: &'a ChatTemplate,
}

impl AskAsync for AskFnWrapper<'_> {
    async fn ask(&self, prompt: &str) -> Result<String, Box<dyn Error>> {
        ask(self.config, prompt.to_string(), self.template, None, None).await
    }
}

/// Send one sentiment prompt with the default backoff policy.
#[instrument(level = "info", skip_all, fields(prompt_chars = prompt.chars().count()))]
pub async fn ask_with_backoff(
    config: &AwfulJadeConfig,
    prompt: &str,
    template: &ChatTemplate,
) -> Result<String, Box<dyn Error>> {
    let started = Instant::now();
    let transport = RetryAsk::new(AskFnWrapper { config, template }, BackoffPolicy::default());
    let reply = transport.ask(prompt).await;
    let elapsed_ms = started.elapsed().as_millis();
    match &reply {
        Ok(text) => info!(elapsed_ms, reply_chars = text.chars().count(), "LLM reply received"),
        Err(e) => error!(elapsed_ms, error = %e, "LLM request failed"),
    }
    reply
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct Flaky {
        failures_left: Cell<usize>,
        calls: Cell<usize>,
    }

    impl AskAsync for Flaky {
        async fn ask(&self, prompt: &str) -> Result<String, Box<dyn Error>> {
            self.calls.set(self.calls.get() + 1);
            if self.failures_left.get() > 0 {
                self.failures_left.set(self.failures_left.get() - 1);
                return Err("503 upstream busy".into());
            }
            Ok(format!("{{\"sentiment\":\"积极\",\"echo\":\"{prompt}\"}}"))
        }
    }

    fn flaky(failures: usize) -> Flaky {
        Flaky {
            failures_left: Cell::new(failures),
            calls: Cell::new(0),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_transient_failures() {
        let transport = RetryAsk::new(flaky(2), BackoffPolicy::default());
        let reply = transport.ask("评论1: 看好").await.unwrap();
        assert!(reply.contains("评论1: 看好"));
        assert_eq!(transport.inner.calls.get(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_after_policy_retries() {
        let transport = RetryAsk::new(flaky(10), BackoffPolicy::default());
        assert!(transport.ask("评论1: 看空").await.is_err());
        assert_eq!(transport.inner.calls.get(), 4);
    }

    #[test]
    fn test_pause_doubles_then_caps() {
        let exact = BackoffPolicy {
            jitter_ms: 0,
            ..BackoffPolicy::default()
        };
        assert_eq!(exact.pause(1), Duration::from_secs(2));
        assert_eq!(exact.pause(2), Duration::from_secs(4));
        assert_eq!(exact.pause(3), Duration::from_secs(8));
        assert_eq!(exact.pause(9), Duration::from_secs(10));

        let jittered = BackoffPolicy::default().pause(1);
        assert!(jittered >= Duration::from_secs(2) && jittered <= Duration::from_millis(2250));
    }
}
