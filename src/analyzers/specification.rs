use super::did::fit_did;
use super::types::FittedModel;
use crate::config::StudyConfig;
use crate::error::{Result, StudyError};
use crate::panel::Panel;
use tracing::info;

/// Which rows a fit sees and where its cutover sits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSpecification {
    pub label: String,
    pub cutover_year: i32,
    /// Keep only years strictly before this one.
    pub before_year: Option<i32>,
}

impl ModelSpecification {
    /// Full panel, real cutover.
    pub fn primary(cutover_year: i32) -> Self {
        Self {
            label: "primary".to_string(),
            cutover_year,
            before_year: None,
        }
    }

    /// Pre-period only, with a synthetic cutover inside it.
    ///
    /// # Errors
    ///
    /// [`StudyError::Config`] if `synthetic_cutover` is not before `real_cutover`.
    pub fn placebo(real_cutover: i32, synthetic_cutover: i32) -> Result<Self> {
        if synthetic_cutover >= real_cutover {
            return Err(StudyError::config(
                "study.placebo_cutover_year",
                format!("{synthetic_cutover} must be before the cutover {real_cutover}"),
            ));
        }
        Ok(Self {
            label: "placebo".to_string(),
            cutover_year: synthetic_cutover,
            before_year: Some(real_cutover),
        })
    }

    /// The primary and placebo specifications for a study.
    pub fn from_config(config: &StudyConfig) -> Result<(Self, Self)> {
        let cutover = config.study.cutover_year;
        Ok((
            Self::primary(cutover),
            Self::placebo(cutover, config.study.placebo_cutover())?,
        ))
    }

    /// The subsample this specification fits, with `post` recomputed.
    pub fn sample(&self, panel: &Panel) -> Panel {
        let rows = match self.before_year {
            Some(limit) => panel.filter_years(|y| y < limit),
            None => panel.clone(),
        };
        rows.with_cutover(self.cutover_year)
    }

    pub fn fit(&self, panel: &Panel) -> Result<FittedModel> {
        let sample = self.sample(panel);
        info!(
            label = %self.label,
            cutover = self.cutover_year,
            years = ?sample.years(),
            rows = sample.len(),
            "Fitting model"
        );
        fit_did(&sample, self.cutover_year, &self.label)
    }
}
