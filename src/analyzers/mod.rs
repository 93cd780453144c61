//! Difference-in-differences estimation.
//!
//! [`did::fit_did`] fits the two-way interaction model with unit-clustered
//! standard errors. [`specification::ModelSpecification`] describes which
//! subsample and cutover a fit uses (the primary model and the pre-period
//! placebo), and [`summary`] renders a fitted model as a regression table.

pub mod cluster;
pub mod did;
pub mod significance;
pub mod specification;
pub mod summary;
pub mod types;
pub mod utility;

pub use did::fit_did;
pub use specification::ModelSpecification;
pub use types::{Coefficient, FittedModel, Term};
