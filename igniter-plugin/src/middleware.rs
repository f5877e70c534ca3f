use igniter_core::{
    FinalizedResponse, FrameworkError, Middleware, MiddlewareOutcome, RequestContext,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error};

/// Result of running a middleware chain to completion.
pub enum PipelineOutcome {
    /// Every step continued; proceed to the next phase or the handler.
    Proceed,
    /// A step returned a response; skip the rest and serialize it.
    Early(FinalizedResponse),
    /// A step ended the pipeline without error; finalize without a
    /// handler result.
    Stopped,
    /// A step failed; classify the error.
    Failed(FrameworkError),
}

/// Runs global then action-local middleware, strictly sequentially.
///
/// Merges are applied as they happen, so later steps in the same phase see
/// them. An optional per-step timeout bounds each middleware.
pub struct MiddlewareExecutor {
    global: Vec<Arc<dyn Middleware>>,
    step_timeout: Option<Duration>,
}

impl MiddlewareExecutor {
    pub fn new() -> Self {
        Self {
            global: Vec::new(),
            step_timeout: None,
        }
    }

    pub fn with_step_timeout(mut self, timeout: Duration) -> Self {
        self.step_timeout = Some(timeout);
        self
    }

    /// Register a global middleware. Execution follows registration order.
    pub fn register(&mut self, middleware: Arc<dyn Middleware>) {
        debug!(middleware = %middleware.name(), "Registered global middleware");
        self.global.push(middleware);
    }

    pub fn global_count(&self) -> usize {
        self.global.len()
    }

    pub async fn run_global(&self, ctx: &mut RequestContext) -> PipelineOutcome {
        self.run_chain(&self.global, ctx).await
    }

    pub async fn run_action(
        &self,
        middleware: &[Arc<dyn Middleware>],
        ctx: &mut RequestContext,
    ) -> PipelineOutcome {
        self.run_chain(middleware, ctx).await
    }

    async fn run_chain(
        &self,
        chain: &[Arc<dyn Middleware>],
        ctx: &mut RequestContext,
    ) -> PipelineOutcome {
        for middleware in chain {
            debug!(middleware = %middleware.name(), "Executing middleware");

            let outcome = match self.step_timeout {
                Some(timeout) => {
                    match tokio::time::timeout(timeout, middleware.handle(ctx)).await {
                        Ok(outcome) => outcome,
                        Err(_) => MiddlewareOutcome::Failed(FrameworkError::internal(format!(
                            "middleware {} timed out",
                            middleware.name()
                        ))),
                    }
                }
                None => middleware.handle(ctx).await,
            };

            match outcome {
                MiddlewareOutcome::Continue | MiddlewareOutcome::Skip => {}
                MiddlewareOutcome::Merge(map) => ctx.merge_user_context(map),
                MiddlewareOutcome::EarlyReturn(response) => {
                    debug!(
                        middleware = %middleware.name(),
                        status = response.status,
                        "Middleware short-circuited with a response"
                    );
                    return PipelineOutcome::Early(response);
                }
                MiddlewareOutcome::Stop => {
                    debug!(middleware = %middleware.name(), "Middleware stopped the pipeline");
                    return PipelineOutcome::Stopped;
                }
                MiddlewareOutcome::Failed(e) => {
                    error!(middleware = %middleware.name(), error = %e, "Middleware failed");
                    return PipelineOutcome::Failed(e);
                }
            }
        }
        PipelineOutcome::Proceed
    }
}

impl Default for MiddlewareExecutor {
    fn default() -> Self {
        Self::new()
    }
}
