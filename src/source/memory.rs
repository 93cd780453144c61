use super::{CountSource, EmploymentRecord};
use crate::error::Result;
use std::collections::BTreeMap;

/// In-memory [`CountSource`], keyed by year.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    years: BTreeMap<i32, Vec<EmploymentRecord>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_year(mut self, year: i32, records: Vec<EmploymentRecord>) -> Self {
        self.years.insert(year, records);
        self
    }
}

impl CountSource for MemorySource {
    fn describe(&self, year: i32) -> String {
        format!("memory:{year}")
    }

    fn load_year(&self, year: i32) -> Result<Option<Vec<EmploymentRecord>>> {
        Ok(self.years.get(&year).cloned())
    }
}
