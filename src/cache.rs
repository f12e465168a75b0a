use async_trait::async_trait;
use uuid::Uuid;

/// Read-side cache boundary. Derived views (availability listings, booking
/// pages) are invalidated after any booking or payment mutation. Failures
/// stay inside the implementation; callers never depend on the cache.
#[async_trait]
pub trait CacheInvalidator: Send + Sync {
    async fn invalidate_business(&self, business_id: Uuid);
}

/// Default implementation for deployments without a cache tier.
pub struct NoopCacheInvalidator;

#[async_trait]
impl CacheInvalidator for NoopCacheInvalidator {
    async fn invalidate_business(&self, business_id: Uuid) {
        tracing::debug!("Cache invalidation for business {}", business_id);
    }
}
