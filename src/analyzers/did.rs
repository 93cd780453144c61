//! Two-way interaction difference-in-differences regression.
//!
//! Fits `y = α + β₁·treated + β₂·post + δ·(treated×post) + ε` by OLS and
//! reports cluster-robust inference with units as clusters. δ is the
//! difference-in-differences estimate.
//!
//! # References
//!
//! - Angrist & Pischke, *Mostly Harmless Econometrics*, Ch. 5.

use super::cluster::{cluster_index, cluster_robust_covariance};
use super::types::{Coefficient, FittedModel, Term};
use crate::error::{Result, StudyError};
use crate::panel::{Panel, PanelRow, post_indicator};
use nalgebra::{DMatrix, DVector};
use statrs::distribution::{ContinuousCDF, Normal};
use statrs::function::erf::erfc;
use tracing::{debug, info};

const CONFIDENCE: f64 = 0.95;

/// Fits the interaction model on `panel` with `post` recomputed against `cutover_year`.
///
/// Rows are put in `(unit_key, year)` order before anything is summed, so the
/// estimates do not depend on how the panel was ordered.
///
/// # Errors
///
/// [`StudyError::ModelDegenerate`] when the panel is empty, any of the four
/// treated × post cells is empty (the design is then rank-deficient), there are
/// fewer than two clusters, or `X'X` cannot be inverted.
#[tracing::instrument(skip(panel), fields(rows = panel.len()))]
pub fn fit_did(panel: &Panel, cutover_year: i32, label: &str) -> Result<FittedModel> {
    let mut rows: Vec<&PanelRow> = panel.rows().iter().collect();
    if rows.is_empty() {
        return Err(StudyError::degenerate("panel has no observations"));
    }
    rows.sort_by(|a, b| a.unit_key.cmp(&b.unit_key).then(a.year.cmp(&b.year)));

    if let Some(row) = rows.iter().find(|r| r.unit_key.is_empty()) {
        return Err(StudyError::degenerate(format!(
            "row for {} has an empty cluster key",
            row.year
        )));
    }

    let posts: Vec<u8> = rows.iter().map(|r| post_indicator(r.year, cutover_year)).collect();
    check_cells(&rows, &posts, cutover_year)?;

    let n = rows.len();
    let k = Term::ALL.len();

    let mut x_data = Vec::with_capacity(n * k);
    for (row, &post) in rows.iter().zip(&posts) {
        let d = f64::from(row.treated);
        let p = f64::from(post);
        x_data.extend_from_slice(&[1.0, d, p, d * p]);
    }
    let x = DMatrix::from_row_slice(n, k, &x_data);
    let y = DVector::from_iterator(n, rows.iter().map(|r| r.employment as f64));

    let xt = x.transpose();
    let xtx = &xt * &x;
    let xty = &xt * &y;
    let xtx_inv = xtx
        .try_inverse()
        .ok_or_else(|| StudyError::degenerate("X'X is singular"))?;
    let beta = &xtx_inv * &xty;

    let resid = &y - &x * &beta;
    let rss: f64 = resid.iter().map(|e| e * e).sum();
    let y_mean = y.mean();
    let tss: f64 = y.iter().map(|v| (v - y_mean).powi(2)).sum();
    let r_squared = if tss > 0.0 { 1.0 - rss / tss } else { 0.0 };

    let clusters = cluster_index(rows.iter().map(|r| r.unit_key.as_str()));
    let vcov = cluster_robust_covariance(&x, &resid, &xtx_inv, &clusters)?;

    let sigma2 = rss / (n - k) as f64;
    let normal = Normal::new(0.0, 1.0).map_err(|e| StudyError::degenerate(e.to_string()))?;
    let critical = normal.inverse_cdf(0.5 + CONFIDENCE / 2.0);

    let coefficients = Term::ALL
        .iter()
        .map(|&term| {
            let j = term.index();
            let estimate = beta[j];
            let std_err = non_negative_sqrt(vcov[(j, j)]);
            let z_stat = if std_err > 0.0 { estimate / std_err } else { f64::NAN };
            Coefficient {
                term,
                estimate,
                std_err,
                z_stat,
                p_value: two_sided_p(z_stat),
                ci_lower: estimate - critical * std_err,
                ci_upper: estimate + critical * std_err,
                std_err_classical: non_negative_sqrt(sigma2 * xtx_inv[(j, j)]),
            }
        })
        .collect::<Vec<_>>();

    let mut years: Vec<i32> = rows.iter().map(|r| r.year).collect();
    years.sort_unstable();
    years.dedup();

    let covariance = (0..k)
        .map(|a| (0..k).map(|b| vcov[(a, b)]).collect())
        .collect();

    let model = FittedModel {
        label: label.to_string(),
        cutover_year,
        years,
        n_obs: n,
        n_clusters: clusters.len(),
        r_squared,
        rss,
        confidence: CONFIDENCE,
        coefficients,
        covariance,
    };

    let did = model.did();
    info!(
        label,
        estimate = did.estimate,
        std_err = did.std_err,
        p_value = did.p_value,
        n_obs = n,
        n_clusters = model.n_clusters,
        "Model fitted"
    );
    Ok(model)
}

/// Two-sided p-value of a standard-normal statistic.
pub fn two_sided_p(z: f64) -> f64 {
    if z.is_nan() {
        return f64::NAN;
    }
    erfc(z.abs() / std::f64::consts::SQRT_2)
}

/// Square root that clamps tiny negative round-off to zero but keeps NaN.
fn non_negative_sqrt(v: f64) -> f64 {
    if v < 0.0 { 0.0 } else { v.sqrt() }
}

/// All four treated × post cells must be populated for the design to have full rank.
fn check_cells(rows: &[&PanelRow], posts: &[u8], cutover_year: i32) -> Result<()> {
    let mut cells = [[0usize; 2]; 2];
    for (row, &post) in rows.iter().zip(posts) {
        cells[usize::from(row.treated.min(1))][usize::from(post)] += 1;
    }
    debug!(?cells, "Treated × post cell counts");

    let names = [["control/pre", "control/post"], ["treated/pre", "treated/post"]];
    let empty: Vec<&str> = (0..2)
        .flat_map(|t| (0..2).map(move |p| (t, p)))
        .filter(|&(t, p)| cells[t][p] == 0)
        .map(|(t, p)| names[t][p])
        .collect();

    if empty.is_empty() {
        Ok(())
    } else {
        Err(StudyError::degenerate(format!(
            "design matrix is rank-deficient with cutover {cutover_year}: no observations in {}",
            empty.join(", ")
        )))
    }
}
