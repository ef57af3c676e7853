//! Tower middleware that gates a service behind a [`RateLimiter`].
//!
//! Requests are admitted or rejected on the spot. A rejected request fails
//! with [`LimiterError::RateLimited`] and never reaches the inner service;
//! nothing is queued.

use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::future::{self, BoxFuture, FutureExt, TryFutureExt};
use tower::{BoxError, Layer};
use tower_service::Service;

use crate::clock::{Clock, SystemClock};
use crate::error::LimiterError;
use crate::limiter::RateLimiter;

/// Layer producing [`RateLimitService`]s that share one limiter.
pub struct RateLimitLayer<C: Clock = SystemClock> {
    limiter: Arc<RateLimiter<C>>,
}

impl<C: Clock> RateLimitLayer<C> {
    /// Gate every wrapped service with `limiter`.
    pub fn new(limiter: Arc<RateLimiter<C>>) -> Self {
        Self { limiter }
    }
}

impl<C: Clock> Clone for RateLimitLayer<C> {
    fn clone(&self) -> Self {
        Self {
            limiter: Arc::clone(&self.limiter),
        }
    }
}

impl<S, C: Clock> Layer<S> for RateLimitLayer<C> {
    type Service = RateLimitService<S, C>;

    fn layer(&self, inner: S) -> Self::Service {
        RateLimitService {
            inner,
            limiter: Arc::clone(&self.limiter),
        }
    }
}

/// Service rejecting requests once the shared bucket is empty.
pub struct RateLimitService<S, C: Clock = SystemClock> {
    inner: S,
    limiter: Arc<RateLimiter<C>>,
}

impl<S, C: Clock> RateLimitService<S, C> {
    /// The limiter this service consults.
    pub fn limiter(&self) -> &Arc<RateLimiter<C>> {
        &self.limiter
    }
}

impl<S: Clone, C: Clock> Clone for RateLimitService<S, C> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            limiter: Arc::clone(&self.limiter),
        }
    }
}

impl<S, C, Req> Service<Req> for RateLimitService<S, C>
where
    S: Service<Req>,
    S::Error: Into<BoxError> + 'static,
    S::Future: Send + 'static,
    S::Response: Send + 'static,
    C: Clock,
{
    type Response = S::Response;
    type Error = BoxError;
    type Future = BoxFuture<'static, Result<S::Response, BoxError>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(Into::into)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        if !self.limiter.try_acquire() {
            return future::ready(Err(BoxError::from(LimiterError::RateLimited))).boxed();
        }
        self.inner.call(req).map_err(Into::<BoxError>::into).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::convert::Infallible;
    use tower::ServiceExt;

    fn echo() -> impl Service<u32, Response = u32, Error = Infallible, Future: Send + 'static> + Clone {
        tower::service_fn(|req: u32| async move { Ok::<_, Infallible>(req) })
    }

    /// Tests that requests beyond capacity fail with `RateLimited`.
    #[tokio::test]
    async fn test_rejects_once_bucket_is_empty() {
        let limiter = Arc::new(RateLimiter::with_clock(2, 1, 1000, ManualClock::new(0)).unwrap());
        let service = RateLimitLayer::new(Arc::clone(&limiter)).layer(echo());
        assert!(Arc::ptr_eq(service.limiter(), &limiter));

        assert_eq!(service.clone().oneshot(1).await.unwrap(), 1);
        assert_eq!(service.clone().oneshot(2).await.unwrap(), 2);

        let err = service.clone().oneshot(3).await.unwrap_err();
        let err = err.downcast_ref::<LimiterError>().unwrap();
        assert_eq!(*err, LimiterError::RateLimited);
        assert_eq!(service.limiter().available_tokens(), 0);
    }

    /// Tests that services built from one layer draw from the same bucket.
    #[tokio::test]
    async fn test_services_share_one_bucket() {
        let limiter = Arc::new(RateLimiter::with_clock(1, 1, 1000, ManualClock::new(0)).unwrap());
        let layer = RateLimitLayer::new(limiter);
        let first = layer.layer(echo());
        let second = layer.layer(echo());

        assert!(first.oneshot(1).await.is_ok());
        assert!(second.oneshot(1).await.is_err());
    }

    /// Tests that inner service errors are boxed and returned unchanged.
    #[tokio::test]
    async fn test_inner_errors_pass_through() {
        let limiter = Arc::new(RateLimiter::with_clock(1, 1, 1000, ManualClock::new(0)).unwrap());
        let failing = tower::service_fn(|_: ()| async { Err::<(), _>("upstream down") });
        let service = RateLimitLayer::new(limiter).layer(failing);

        let err = service.oneshot(()).await.unwrap_err();
        assert_eq!(err.to_string(), "upstream down");
    }

    /// Tests wrapping a service with an owned error type.
    #[tokio::test]
    async fn test_owned_inner_error_type() {
        let limiter = Arc::new(RateLimiter::with_clock(1, 1, 1000, ManualClock::new(0)).unwrap());
        let failing = tower::service_fn(|_: ()| async {
            Err::<(), _>(std::io::Error::other("reset"))
        });
        let service = RateLimitLayer::new(limiter).layer(failing);

        let err = service.clone().oneshot(()).await.unwrap_err();
        assert!(err.downcast_ref::<std::io::Error>().is_some());

        let err = service.oneshot(()).await.unwrap_err();
        assert!(err.downcast_ref::<LimiterError>().is_some());
    }
}
