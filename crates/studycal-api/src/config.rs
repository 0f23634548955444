use serde::Deserialize;
use studycal_planner::{PlannerConfig, PlannerError, SessionLimits, StrategyKind, topic::hours_to_minutes};

/// Deployment environment, read from `ENV`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl Environment {
    pub const fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }

    pub const fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

/// Server configuration, loaded from environment variables.
///
/// Field names map to upper-case variables (`database_url` ↔ `DATABASE_URL`).
#[derive(Clone, Debug, Deserialize)]
pub struct ApiConfig {
    pub database_url: String,
    #[serde(default)]
    pub env: Environment,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,
    /// Comma-separated list of origins allowed by CORS
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: String,
    #[serde(default = "default_min_session_hours")]
    pub min_session_hours: f64,
    #[serde(default = "default_max_session_hours")]
    pub max_session_hours: f64,
    /// Length of the review placed after a completed session
    #[serde(default = "default_review_session_hours")]
    pub review_session_hours: f64,
    /// `cycle`, `phased` or `auto`
    #[serde(default)]
    pub rotation_strategy: StrategyKind,
    /// Run the daily job that skips missed sessions and rebalances
    #[serde(default = "default_true")]
    pub missed_session_sweep: bool,
}

const fn default_port() -> u16 {
    3000
}

const fn default_db_max_connections() -> u32 {
    10
}

fn default_allowed_origins() -> String {
    "http://localhost:8080".to_string()
}

const fn default_min_session_hours() -> f64 {
    0.5
}

const fn default_max_session_hours() -> f64 {
    2.0
}

const fn default_review_session_hours() -> f64 {
    0.5
}

const fn default_true() -> bool {
    true
}

impl ApiConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::from_env()
    }

    pub fn parsed_allowed_origins(&self) -> Vec<String> {
        self.allowed_origins
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect()
    }

    /// Engine settings derived from the session-length variables.
    pub fn planner_config(&self) -> Result<PlannerConfig, PlannerError> {
        let limits = SessionLimits::from_hours(self.min_session_hours, self.max_session_hours)?;
        if !self.review_session_hours.is_finite() || self.review_session_hours <= 0.0 {
            return Err(PlannerError::InvalidCapacity(
                "REVIEW_SESSION_HOURS must be positive".to_string(),
            ));
        }

        Ok(PlannerConfig {
            limits,
            strategy: self.rotation_strategy,
            review_minutes: hours_to_minutes(self.review_session_hours),
            ..PlannerConfig::default()
        })
    }
}
