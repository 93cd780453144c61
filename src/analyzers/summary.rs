//! Plain-text regression table.

use super::significance::significance_marker;
use super::types::FittedModel;
use std::fmt::Write;

const WIDTH: usize = 78;

impl FittedModel {
    /// Coefficient table with cluster-robust inference, one line per term.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        let rule = "=".repeat(WIDTH);
        let thin = "-".repeat(WIDTH);
        let lo = (1.0 - self.confidence) / 2.0;
        let hi = 1.0 - lo;
        let years = match (self.years.first(), self.years.last()) {
            (Some(first), Some(last)) => format!("{first}-{last}"),
            _ => "-".to_string(),
        };

        // Writing into a String cannot fail.
        let _ = writeln!(out, "{rule}");
        let title = format!("OLS Regression Results ({})", self.label);
        let _ = writeln!(out, "{title:^width$}", width = WIDTH);
        let _ = writeln!(out, "{rule}");
        let header = [
            ("Dep. Variable:", "employment".to_string()),
            ("R-squared:", format!("{:.4}", self.r_squared)),
            ("Cutover year:", self.cutover_year.to_string()),
            ("No. Observations:", self.n_obs.to_string()),
            ("Years:", years),
            ("No. Clusters:", self.n_clusters.to_string()),
            ("Covariance Type:", "cluster".to_string()),
            ("Residual SS:", format!("{:.1}", self.rss)),
        ];
        for pair in header.chunks(2) {
            let (left, right) = (&pair[0], &pair[1]);
            let _ = writeln!(
                out,
                "{:<20}{:>18}    {:<20}{:>16}",
                left.0, left.1, right.0, right.1
            );
        }
        let _ = writeln!(out, "{rule}");
        let _ = writeln!(
            out,
            "{:<14}{:>11}{:>11}{:>9}{:>9}{:>11}{:>11}",
            "",
            "coef",
            "std err",
            "z",
            "P>|z|",
            format!("[{lo:.3}"),
            format!("{hi:.3}]")
        );
        let _ = writeln!(out, "{thin}");
        for c in &self.coefficients {
            let _ = writeln!(
                out,
                "{:<14}{:>11.4}{:>11.4}{:>9.3}{:>9.3}{:>11.3}{:>11.3} {}",
                c.term.label(),
                c.estimate,
                c.std_err,
                c.z_stat,
                c.p_value,
                c.ci_lower,
                c.ci_upper,
                significance_marker(c.p_value)
            );
        }
        let _ = writeln!(out, "{rule}");
        let _ = writeln!(out, "Signif. codes: 0 '***' 0.001 '**' 0.01 '*' 0.05 '.' 0.1 ' ' 1");
        let _ = writeln!(
            out,
            "Standard errors are clustered by unit ({} clusters).",
            self.n_clusters
        );
        out
    }

    /// One line with the treated × post estimate and its p-value.
    pub fn headline(&self) -> String {
        let did = self.did();
        format!(
            "{} DiD estimate (treated:post, cutover {}): {:.4} (SE {:.4}, p = {:.4}){}",
            self.label,
            self.cutover_year,
            did.estimate,
            did.std_err,
            did.p_value,
            match significance_marker(did.p_value) {
                "" => String::new(),
                m => format!(" {m}"),
            }
        )
    }
}
