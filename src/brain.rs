//! Brain objects: one recording session's samples x electrodes matrix
//!
//! Slicing selects any sub-rectangle of the matrix by sample and electrode
//! selectors and yields a self-consistent object whose locations follow the
//! selected columns.

use std::collections::BTreeMap;
use std::ops::{Range, RangeFull};

use chrono::{DateTime, Utc};
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SupereegError};
use crate::locations::{Location, LocationRegistry};

/// Selection along one axis of a brain object
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    All,
    Index(usize),
    Range(Range<usize>),
    /// Explicit indices; order is kept and repeats are allowed
    List(Vec<usize>),
}

impl Selector {
    /// Resolve to concrete indices for an axis of length `len`
    pub fn resolve(&self, len: usize) -> Result<Vec<usize>> {
        let check = |index: usize| {
            if index < len {
                Ok(index)
            } else {
                Err(SupereegError::Index { index, len })
            }
        };

        match self {
            Selector::All => Ok((0..len).collect()),
            Selector::Index(i) => Ok(vec![check(*i)?]),
            Selector::Range(range) => {
                if range.start > range.end {
                    return Err(SupereegError::Index {
                        index: range.start,
                        len,
                    });
                }
                if range.end > len {
                    return Err(SupereegError::Index {
                        index: range.end - 1,
                        len,
                    });
                }
                Ok(range.clone().collect())
            }
            Selector::List(indices) => indices.iter().map(|&i| check(i)).collect(),
        }
    }
}

impl From<usize> for Selector {
    fn from(index: usize) -> Self {
        Selector::Index(index)
    }
}

impl From<Range<usize>> for Selector {
    fn from(range: Range<usize>) -> Self {
        Selector::Range(range)
    }
}

impl From<RangeFull> for Selector {
    fn from(_: RangeFull) -> Self {
        Selector::All
    }
}

impl From<Vec<usize>> for Selector {
    fn from(indices: Vec<usize>) -> Self {
        Selector::List(indices)
    }
}

impl From<&[usize]> for Selector {
    fn from(indices: &[usize]) -> Self {
        Selector::List(indices.to_vec())
    }
}

/// Read-only summary of a brain object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrainInfo {
    pub n_samples: usize,
    pub n_elecs: usize,
    pub sample_rate: f64,
    pub session_id: String,
    pub duration_secs: f64,
    pub date_created: String,
}

impl std::fmt::Display for BrainInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Number of electrodes: {}", self.n_elecs)?;
        writeln!(f, "Number of samples: {}", self.n_samples)?;
        writeln!(f, "Sample rate: {} Hz", self.sample_rate)?;
        writeln!(f, "Recording length: {:.3}s", self.duration_secs)?;
        writeln!(f, "Session: {}", self.session_id)?;
        write!(f, "Date created: {}", self.date_created)
    }
}

/// A single session's recording and electrode positions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrainObject {
    data: DMatrix<f64>,
    /// One entry per column of `data`; may repeat after a duplicating slice
    locations: Vec<Location>,
    sample_rate: f64,
    session_id: String,
    meta: BTreeMap<String, serde_json::Value>,
    date_created: DateTime<Utc>,
}

impl BrainObject {
    /// Build a brain object from a samples x electrodes matrix.
    pub fn new(
        data: DMatrix<f64>,
        locations: Vec<Location>,
        sample_rate: f64,
        session_id: impl Into<String>,
    ) -> Result<Self> {
        if data.ncols() != locations.len() {
            return Err(SupereegError::Shape(format!(
                "data has {} electrode columns but {} locations were given",
                data.ncols(),
                locations.len()
            )));
        }
        if !sample_rate.is_finite() || sample_rate <= 0.0 {
            return Err(SupereegError::InvalidParameter(format!(
                "sample_rate must be positive, got {}",
                sample_rate
            )));
        }
        if let Some(bad) = locations.iter().find(|l| !l.is_finite()) {
            return Err(SupereegError::InvalidParameter(format!(
                "non-finite electrode location {}",
                bad
            )));
        }

        Ok(Self {
            data,
            locations,
            sample_rate,
            session_id: session_id.into(),
            meta: BTreeMap::new(),
            date_created: Utc::now(),
        })
    }

    pub fn with_meta(mut self, meta: BTreeMap<String, serde_json::Value>) -> Self {
        self.meta = meta;
        self
    }

    pub fn data(&self) -> &DMatrix<f64> {
        &self.data
    }

    pub fn locations(&self) -> &[Location] {
        &self.locations
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn meta(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.meta
    }

    pub fn date_created(&self) -> DateTime<Utc> {
        self.date_created
    }

    pub fn n_samples(&self) -> usize {
        self.data.nrows()
    }

    pub fn n_elecs(&self) -> usize {
        self.data.ncols()
    }

    pub fn duration_secs(&self) -> f64 {
        self.n_samples() as f64 / self.sample_rate
    }

    /// Electrode locations as a registry; repeated columns are an `Alignment` error
    pub fn registry(&self) -> Result<LocationRegistry> {
        LocationRegistry::new(self.locations.clone())
    }

    /// New brain object holding the selected samples and electrodes, in selector order
    pub fn slice(
        &self,
        samples: impl Into<Selector>,
        electrodes: impl Into<Selector>,
    ) -> Result<BrainObject> {
        let rows = samples.into().resolve(self.n_samples())?;
        let cols = electrodes.into().resolve(self.n_elecs())?;

        log::debug!(
            "Slicing session {}: {}x{} -> {}x{}",
            self.session_id,
            self.n_samples(),
            self.n_elecs(),
            rows.len(),
            cols.len()
        );

        Ok(BrainObject {
            data: self.data.select_rows(&rows).select_columns(&cols),
            locations: cols.iter().map(|&c| self.locations[c]).collect(),
            sample_rate: self.sample_rate,
            session_id: self.session_id.clone(),
            meta: self.meta.clone(),
            date_created: self.date_created,
        })
    }

    /// Same as [`BrainObject::slice`] but replaces this object's contents.
    ///
    /// On error the object is left untouched.
    pub fn slice_inplace(
        &mut self,
        samples: impl Into<Selector>,
        electrodes: impl Into<Selector>,
    ) -> Result<()> {
        let sliced = self.slice(samples, electrodes)?;
        self.data = sliced.data;
        self.locations = sliced.locations;
        Ok(())
    }

    pub fn slice_samples(&self, samples: impl Into<Selector>) -> Result<BrainObject> {
        self.slice(samples, Selector::All)
    }

    pub fn slice_electrodes(&self, electrodes: impl Into<Selector>) -> Result<BrainObject> {
        self.slice(Selector::All, electrodes)
    }

    pub fn info(&self) -> BrainInfo {
        BrainInfo {
            n_samples: self.n_samples(),
            n_elecs: self.n_elecs(),
            sample_rate: self.sample_rate,
            session_id: self.session_id.clone(),
            duration_secs: self.duration_secs(),
            date_created: self.date_created.to_rfc3339(),
        }
    }
}
