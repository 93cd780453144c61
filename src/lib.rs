//! Difference-in-differences study of employment around new transit stations.
//!
//! Stages: [`geography`] classifies block groups by distance to a station,
//! [`panel`] stacks yearly workplace counts into a unit × year panel, and
//! [`analyzers`] fits the primary and placebo models that [`report`] and
//! [`output`] turn into artifacts. [`pipeline`] wires them together.

pub mod analyzers;
pub mod config;
pub mod error;
pub mod geography;
pub mod output;
pub mod panel;
pub mod parser;
pub mod pipeline;
pub mod report;
pub mod source;
pub mod stats;

pub use config::StudyConfig;
pub use error::{Result, StudyError};
