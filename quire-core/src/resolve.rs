//! Sequential, lazy, first-applicable resolution over an ordered candidate list

use std::future::Future;

/// Evaluate `attempt` on each candidate in order and return the first present outcome
///
/// Each attempt is awaited to completion before the next one starts. An
/// outcome of `None` means "does not apply" and moves on to the next
/// candidate; `Some` stops the resolution, whether it holds a success or a
/// failure. Returns `None` when no candidate applies.
pub async fn first_applicable<'a, C, T, E, F, Fut>(
    candidates: &'a [C],
    mut attempt: F,
) -> Option<Result<T, E>>
where
    F: FnMut(&'a C) -> Fut,
    Fut: Future<Output = Option<Result<T, E>>>,
{
    for candidate in candidates {
        if let Some(outcome) = attempt(candidate).await {
            return Some(outcome);
        }
    }
    None
}
