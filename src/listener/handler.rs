//! User callbacks invoked once per new resource

use async_trait::async_trait;

/// Callback receiving each newly discovered resource
///
/// Returning an error marks the resource as failed; it is still checkpointed and
/// will not be delivered again.
#[async_trait]
pub trait Handler<R>: Send + Sync {
    /// Process one resource
    async fn handle(&self, resource: &R) -> anyhow::Result<()>;
}

#[async_trait]
impl<R, F> Handler<R> for F
where
    R: Sync,
    F: Fn(&R) -> anyhow::Result<()> + Send + Sync,
{
    async fn handle(&self, resource: &R) -> anyhow::Result<()> {
        self(resource)
    }
}
