//! The retry loop
//!
//! Wraps "generate context → send → check success" in a bounded loop.
//! Success is a caller-supplied predicate; exhaustion is not an error, it
//! is visible only through the returned context's failure state.

use crate::context::RequestContext;

use super::RetryPolicy;

/// How an attempt sequence ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryOutcome {
    /// The predicate accepted an attempt.
    Succeeded { attempts: u32 },
    /// Every attempt was rejected; the last context is returned as-is.
    Exhausted { attempts: u32 },
}

/// Runs up to `policy.max_attempts` attempts, sleeping the policy delay
/// between them.
///
/// `generate` produces a fresh context per attempt; `success` judges a
/// finished context (pass `RequestContext::is_success` for the default
/// classification); `on_retry` fires once before every sleep, i.e. exactly
/// once per failed attempt that another attempt follows.
pub async fn send_with_retry<G, S, R>(
    policy: &RetryPolicy,
    mut generate: G,
    success: S,
    mut on_retry: R,
) -> (RequestContext, RetryOutcome)
where
    G: FnMut() -> RequestContext,
    S: Fn(&RequestContext) -> bool,
    R: FnMut(u32),
{
    let bound = policy.max_attempts.max(1);
    let mut attempt = 1u32;
    loop {
        let mut context = generate();
        context.run_to_completion().await;
        if success(&context) {
            return (context, RetryOutcome::Succeeded { attempts: attempt });
        }
        if attempt >= bound {
            return (context, RetryOutcome::Exhausted { attempts: attempt });
        }
        tracing::debug!(attempt, "attempt rejected, retrying");
        on_retry(attempt);
        tokio::time::sleep(policy.delay_for(attempt)).await;
        attempt += 1;
    }
}
