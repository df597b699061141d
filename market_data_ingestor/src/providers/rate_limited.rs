//! Request pacing for providers with a published rate limit.
//!
//! [`RateLimitedProvider`] waits on a `governor` token bucket before every
//! delegated call, so the caller can loop over symbols without sleeping itself.

use std::num::NonZeroU32;

use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use nonzero_ext::nonzero;
use tracing::trace;

use crate::{
    models::{bar::BarSeries, request_params::BarsRequestParams},
    providers::{DataProvider, ProviderError},
};

pub struct RateLimitedProvider<P> {
    inner: P,
    limiter: DefaultDirectRateLimiter,
}

impl<P> RateLimitedProvider<P> {
    pub fn new(inner: P, quota: Quota) -> Self {
        Self {
            inner,
            limiter: RateLimiter::direct(quota),
        }
    }

    /// Evenly spaced requests: `per_minute` calls per minute with no bursting.
    pub fn per_minute(inner: P, per_minute: NonZeroU32) -> Self {
        Self::new(inner, Quota::per_minute(per_minute).allow_burst(nonzero!(1u32)))
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }
}

#[async_trait]
impl<P: DataProvider> DataProvider for RateLimitedProvider<P> {
    async fn fetch_bars(&self, params: BarsRequestParams) -> Result<Vec<BarSeries>, ProviderError> {
        self.limiter.until_ready().await;
        trace!(symbols = ?params.symbols, "rate limiter released request");
        self.inner.fetch_bars(params).await
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        time::{Duration, Instant},
    };

    use chrono::Utc;

    use super::*;

    #[derive(Default)]
    struct Counting {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl DataProvider for Counting {
        async fn fetch_bars(&self, _params: BarsRequestParams) -> Result<Vec<BarSeries>, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn delegates_every_call() {
        let provider = RateLimitedProvider::new(
            Counting::default(),
            Quota::per_second(nonzero!(1000u32)),
        );
        for _ in 0..3 {
            provider
                .fetch_bars(BarsRequestParams::daily_lookback("BTC", 30, Utc::now()))
                .await
                .unwrap();
        }
        assert_eq!(provider.inner().calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn spaces_out_calls_without_burst() {
        // 20/s with burst 1: the 2nd and 3rd calls each wait ~50ms.
        let provider = RateLimitedProvider::new(
            Counting::default(),
            Quota::per_second(nonzero!(20u32)).allow_burst(nonzero!(1u32)),
        );
        let started = Instant::now();
        for _ in 0..3 {
            provider
                .fetch_bars(BarsRequestParams::daily_lookback("ETH", 30, Utc::now()))
                .await
                .unwrap();
        }
        assert!(started.elapsed() >= Duration::from_millis(90));
    }
}
