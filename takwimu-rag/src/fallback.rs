//! Ordered fallback over prioritized providers.
//!
//! The same shape recurs at two layers of the system: PDF extractors tried
//! primary-then-alternate, and generation backends tried in priority order.
//! Both go through [`first_success`]: each provider is attempted once, in
//! order, the first success wins, and a full miss returns every rejection
//! so callers can report exactly what was tried and why it failed.

use std::future::Future;

/// A provider that was tried and the error it produced.
pub(crate) struct Rejection<E> {
    pub provider: String,
    pub error: E,
}

/// Try providers strictly in order; return the first success together with
/// the winning provider's name, or every rejection if all fail.
///
/// No provider is ever attempted twice within one call.
pub(crate) async fn first_success<P, T, E, F, Fut>(
    providers: impl IntoIterator<Item = P>,
    name_of: impl Fn(&P) -> String,
    mut call: F,
) -> std::result::Result<(T, String), Vec<Rejection<E>>>
where
    F: FnMut(P) -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
{
    let mut rejections = Vec::new();
    for provider in providers {
        let name = name_of(&provider);
        match call(provider).await {
            Ok(value) => return Ok((value, name)),
            Err(error) => rejections.push(Rejection { provider: name, error }),
        }
    }
    Err(rejections)
}
