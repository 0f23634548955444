use sqlx::PgPool;
use studycal_planner::Planner;

use crate::{ApiConfig, config::Environment};

#[derive(Clone, Debug)]
pub struct ApiState {
    pub pool: PgPool,
    pub planner: Planner,
    pub environment: Environment,
}

impl ApiState {
    pub fn new(config: &ApiConfig, pool: PgPool) -> anyhow::Result<Self> {
        let planner = Planner::new(config.planner_config()?);
        tracing::debug!(config = ?planner.config(), "planner configured");

        Ok(Self {
            pool,
            planner,
            environment: config.env,
        })
    }
}
