//! Result types produced by the model fitter.

use serde::Serialize;
use std::fmt;

/// Regressors of the two-way interaction model, in design-matrix column order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Term {
    Intercept,
    Treated,
    Post,
    TreatedPost,
}

impl Term {
    pub const ALL: [Term; 4] = [Term::Intercept, Term::Treated, Term::Post, Term::TreatedPost];

    pub fn index(&self) -> usize {
        match self {
            Term::Intercept => 0,
            Term::Treated => 1,
            Term::Post => 2,
            Term::TreatedPost => 3,
        }
    }

    /// Label in the style of a regression table.
    pub fn label(&self) -> &'static str {
        match self {
            Term::Intercept => "Intercept",
            Term::Treated => "treated",
            Term::Post => "post",
            Term::TreatedPost => "treated:post",
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One row of the coefficient table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Coefficient {
    pub term: Term,
    pub estimate: f64,
    /// Cluster-robust standard error.
    pub std_err: f64,
    pub z_stat: f64,
    /// Two-sided p-value from the standard normal.
    pub p_value: f64,
    pub ci_lower: f64,
    pub ci_upper: f64,
    /// Homoskedastic OLS standard error, for comparison.
    pub std_err_classical: f64,
}

/// A fitted difference-in-differences regression.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FittedModel {
    pub label: String,
    pub cutover_year: i32,
    pub years: Vec<i32>,
    pub n_obs: usize,
    pub n_clusters: usize,
    pub r_squared: f64,
    pub rss: f64,
    /// Confidence level of `ci_lower` / `ci_upper`.
    pub confidence: f64,
    pub coefficients: Vec<Coefficient>,
    /// Cluster-robust covariance, row-major, in [`Term::ALL`] order.
    pub covariance: Vec<Vec<f64>>,
}

impl FittedModel {
    pub fn coefficient(&self, term: Term) -> &Coefficient {
        &self.coefficients[term.index()]
    }

    /// The treated × post coefficient: the difference-in-differences estimate.
    pub fn did(&self) -> &Coefficient {
        self.coefficient(Term::TreatedPost)
    }
}
