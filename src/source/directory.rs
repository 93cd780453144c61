use super::{CountSource, EmploymentRecord};
use crate::config::StudyConfig;
use crate::error::Result;
use crate::parser::parse_counts;
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Reads LODES WAC files laid out the way the LEHD server names them:
/// `{dir}/{state}_wac_S000_JT00_{year}.csv.gz`.
///
/// An uncompressed `.csv` with the same stem is used when the `.gz` is absent.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    dir: PathBuf,
    state_abbr: String,
    geocode_column: String,
    count_column: String,
}

impl DirectorySource {
    pub fn new(
        dir: impl Into<PathBuf>,
        state_abbr: impl Into<String>,
        geocode_column: impl Into<String>,
        count_column: impl Into<String>,
    ) -> Self {
        Self {
            dir: dir.into(),
            state_abbr: state_abbr.into(),
            geocode_column: geocode_column.into(),
            count_column: count_column.into(),
        }
    }

    pub fn from_config(config: &StudyConfig) -> Self {
        Self::new(
            &config.sources.raw_dir,
            &config.region.state_abbr,
            &config.sources.geocode_column,
            &config.sources.count_column,
        )
    }

    /// Canonical (gzip) path for `year`.
    pub fn path_for(&self, year: i32) -> PathBuf {
        self.dir.join(format!("{}.csv.gz", self.stem(year)))
    }

    /// Whichever file for `year` exists, preferring the gzip one.
    pub fn existing_path(&self, year: i32) -> Option<PathBuf> {
        let gz = self.path_for(year);
        if gz.exists() {
            return Some(gz);
        }
        let plain = self.dir.join(format!("{}.csv", self.stem(year)));
        plain.exists().then_some(plain)
    }

    fn stem(&self, year: i32) -> String {
        format!("{}_wac_S000_JT00_{}", self.state_abbr.to_lowercase(), year)
    }
}

impl CountSource for DirectorySource {
    fn describe(&self, year: i32) -> String {
        self.path_for(year).display().to_string()
    }

    fn load_year(&self, year: i32) -> Result<Option<Vec<EmploymentRecord>>> {
        let Some(path) = self.existing_path(year) else {
            return Ok(None);
        };
        debug!(path = %path.display(), "Reading raw counts");
        let reader = open_maybe_gzip(&path)?;
        let records = parse_counts(reader, &self.geocode_column, &self.count_column)?;
        Ok(Some(records))
    }
}

/// Opens `path`, transparently decompressing when it ends in `.gz`.
fn open_maybe_gzip(path: &Path) -> Result<Box<dyn Read>> {
    let file = BufReader::new(File::open(path)?);
    if path.extension().and_then(|e| e.to_str()) == Some("gz") {
        Ok(Box::new(GzDecoder::new(file)))
    } else {
        Ok(Box::new(file))
    }
}
