//! RPC dependency-injection context.

use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use turno_engine::service::QueueService;

/// Shared context passed to every RPC handler.
pub struct RpcContext {
    /// The queue engine façade.
    pub service: Arc<QueueService>,
    /// Cancelled by `system.shutdown` to begin graceful shutdown.
    pub shutdown: CancellationToken,
    /// Process start, for uptime reporting.
    pub server_start_time: Instant,
}

#[cfg(test)]
mod tests {
    use crate::handlers::test_helpers::make_test_context;

    #[tokio::test]
    async fn context_reaches_the_service() {
        let ctx = make_test_context();
        assert_eq!(ctx.service.waiting_session_count().unwrap(), 0);
    }

    #[test]
    fn shutdown_token_starts_unset() {
        let ctx = make_test_context();
        assert!(!ctx.shutdown.is_cancelled());
    }
}
