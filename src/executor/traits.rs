use std::sync::Arc;

use async_trait::async_trait;

use super::types::{ExecutionReport, PlanContext, UnitOfWork};
use crate::error::Result;

/// Performs units of work on behalf of the orchestrator.
///
/// `execute` is called exactly once per iteration and awaited before any
/// bookkeeping. An `Err` is treated as a failed unit, not as a session failure.
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    /// Selects the next unit. Defaults to [`PlanContext::default_unit`].
    async fn plan(&self, ctx: &PlanContext<'_>) -> Result<UnitOfWork> {
        Ok(ctx.default_unit())
    }

    async fn execute(&self, unit: &UnitOfWork) -> Result<ExecutionReport>;
}

#[async_trait]
impl<E: TaskExecutor + ?Sized> TaskExecutor for Arc<E> {
    async fn plan(&self, ctx: &PlanContext<'_>) -> Result<UnitOfWork> {
        (**self).plan(ctx).await
    }

    async fn execute(&self, unit: &UnitOfWork) -> Result<ExecutionReport> {
        (**self).execute(unit).await
    }
}
