//! Liang–Zeger cluster-robust (HC0 sandwich) covariance.
//!
//! `V = c · (X'X)⁻¹ B (X'X)⁻¹` with `B = Σ_g (X_g' e_g)(X_g' e_g)'` and the
//! finite-sample factor `c = G/(G−1) · (N−1)/(N−K)`. With no residual
//! degrees of freedom (`N = K`) the factor, and so the covariance, is NaN.
//!
//! # References
//!
//! - Cameron & Miller (2015), "A Practitioner's Guide to Cluster-Robust
//!   Inference." *Journal of Human Resources*.

use crate::error::{Result, StudyError};
use nalgebra::{DMatrix, DVector};
use std::collections::BTreeMap;

/// Row indices per cluster, ordered by cluster key.
pub fn cluster_index<'a>(
    cluster_ids: impl IntoIterator<Item = &'a str>,
) -> BTreeMap<&'a str, Vec<usize>> {
    let mut clusters: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (i, id) in cluster_ids.into_iter().enumerate() {
        clusters.entry(id).or_default().push(i);
    }
    clusters
}

/// Cluster-robust covariance matrix of the OLS coefficients.
///
/// # Errors
///
/// [`StudyError::ModelDegenerate`] if the inputs disagree in size, a cluster
/// is empty, or there are fewer than two clusters.
pub fn cluster_robust_covariance(
    x: &DMatrix<f64>,
    residuals: &DVector<f64>,
    xtx_inv: &DMatrix<f64>,
    clusters: &BTreeMap<&str, Vec<usize>>,
) -> Result<DMatrix<f64>> {
    let n = x.nrows();
    let k = x.ncols();

    if residuals.len() != n {
        return Err(StudyError::degenerate(format!(
            "{} residuals for {} design rows",
            residuals.len(),
            n
        )));
    }
    if clusters.values().any(|rows| rows.is_empty()) {
        return Err(StudyError::degenerate("a cluster has no observations"));
    }
    let g = clusters.len();
    if g < 2 {
        return Err(StudyError::degenerate(format!(
            "cluster-robust variance needs at least 2 clusters, got {g}"
        )));
    }

    let mut meat = DMatrix::<f64>::zeros(k, k);
    for rows in clusters.values() {
        // Score for cluster g: s_g = X_g' e_g
        let mut score = DVector::<f64>::zeros(k);
        for &i in rows {
            let e_i = residuals[i];
            for j in 0..k {
                score[j] += x[(i, j)] * e_i;
            }
        }
        meat += &score * score.transpose();
    }

    let g_f = g as f64;
    let n_f = n as f64;
    let k_f = k as f64;
    let correction = if n_f > k_f {
        (g_f / (g_f - 1.0)) * ((n_f - 1.0) / (n_f - k_f))
    } else {
        f64::NAN
    };

    Ok(xtx_inv * meat * xtx_inv * correction)
}
