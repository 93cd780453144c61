//! Yearly raw count inputs.
//!
//! A [`CountSource`] hands the panel builder one year of fine-grained
//! employment rows at a time. Whether a year exists is part of the contract:
//! `Ok(None)` means "no file for this year" and is not an error.

mod directory;
mod memory;

pub use directory::DirectorySource;
pub use memory::MemorySource;

use crate::error::Result;

/// One raw row: a fine-grained block geocode and its job count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmploymentRecord {
    pub geocode: String,
    pub jobs: u64,
}

impl EmploymentRecord {
    pub fn new(geocode: impl Into<String>, jobs: u64) -> Self {
        Self {
            geocode: geocode.into(),
            jobs,
        }
    }
}

pub trait CountSource {
    /// Human-readable location of `year`'s data, used in logs.
    fn describe(&self, year: i32) -> String;

    /// Loads every row for `year`, or `None` if that year is not available.
    fn load_year(&self, year: i32) -> Result<Option<Vec<EmploymentRecord>>>;
}
