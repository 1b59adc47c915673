use tracing::{info, instrument, warn};

use procura_purchasing::{Requirement, plan_requirements};

use super::context::PipelineContext;
use crate::store::StoreError;

/// Turns the latest analyst trend and the low-stock items into purchase requirements.
pub struct RequirementIntake {
    ctx: PipelineContext,
}

impl RequirementIntake {
    pub fn new(ctx: PipelineContext) -> Self {
        Self { ctx }
    }

    /// Requirements sorted by item id. Only a failed low-stock query is an error; an
    /// unreadable trend report counts as a flat trend.
    #[instrument(skip(self), err)]
    pub async fn requirements(&self) -> Result<Vec<Requirement>, StoreError> {
        let store = &self.ctx.store;
        let trend = match self
            .ctx
            .read("latest_analyst_report", || store.latest_analyst_report())
            .await
        {
            Ok(Some(report)) => report.trend_percent,
            Ok(None) => {
                warn!("no analyst report; assuming flat trend");
                0.0
            }
            Err(err) => {
                warn!(error = %err, "analyst report unreadable; assuming flat trend");
                0.0
            }
        };

        let items = self
            .ctx
            .read("low_stock_items", || store.low_stock_items())
            .await?;
        let requirements = plan_requirements(trend, &items);
        info!(
            trend_percent = trend,
            low_stock = items.len(),
            requirements = requirements.len(),
            "requirements planned"
        );
        Ok(requirements)
    }
}
