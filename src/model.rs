//! Aggregated correlation models and their algebra
//!
//! A [`Model`] is an immutable value: an accumulator pair indexed by a sorted
//! location registry, the number of subjects folded into it, and a stability
//! flag. Models combine through [`combine`] (or [`Model::add`] /
//! [`Model::subtract`]), which first aligns both registries and then works
//! cell by cell. Subtraction always yields an unstable model, and unstable
//! models are refused by addition.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::accumulator::AccumulatorPair;
use crate::brain::{BrainObject, Selector};
use crate::config::{DiagonalPolicy, MatrixSpace, ModelConfig};
use crate::error::{Result, SupereegError};
use crate::locations::LocationRegistry;
use crate::stats::correlation_matrix;

/// Models above this many locations get a performance warning
const LARGE_MODEL_LOCATIONS: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombineKind {
    Add,
    Subtract,
}

impl std::fmt::Display for CombineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CombineKind::Add => write!(f, "add"),
            CombineKind::Subtract => write!(f, "subtract"),
        }
    }
}

/// Read-only summary of a model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub n_locs: usize,
    pub n_subs: usize,
    pub stable: bool,
    pub shape: (usize, usize),
    pub diagonal: DiagonalPolicy,
    pub date_created: String,
    pub meta: BTreeMap<String, serde_json::Value>,
}

impl std::fmt::Display for ModelInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Number of locations: {}", self.n_locs)?;
        writeln!(f, "Number of subjects: {}", self.n_subs)?;
        writeln!(f, "Stable: {}", self.stable)?;
        writeln!(f, "Shape: {}x{}", self.shape.0, self.shape.1)?;
        writeln!(f, "Diagonal: {:?}", self.diagonal)?;
        writeln!(f, "Date created: {}", self.date_created)?;
        write!(f, "Meta data: {:?}", self.meta)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Model {
    accumulator: AccumulatorPair,
    locations: LocationRegistry,
    n_subs: usize,
    stable: bool,
    config: ModelConfig,
    meta: BTreeMap<String, serde_json::Value>,
    date_created: DateTime<Utc>,
}

impl Model {
    /// Put locations in coordinate order, permuting the accumulator to match
    fn canonical(
        accumulator: AccumulatorPair,
        locations: LocationRegistry,
        n_subs: usize,
        stable: bool,
        config: ModelConfig,
        meta: BTreeMap<String, serde_json::Value>,
    ) -> Result<Self> {
        if accumulator.size() != locations.len() {
            return Err(SupereegError::Shape(format!(
                "{}x{} accumulator does not match {} locations",
                accumulator.size(),
                accumulator.size(),
                locations.len()
            )));
        }

        let (accumulator, locations) = if locations.is_sorted() {
            (accumulator, locations)
        } else {
            let (sorted, perm) = locations.sorted();
            (accumulator.select(&perm)?, sorted)
        };

        if locations.len() > LARGE_MODEL_LOCATIONS {
            log::warn!(
                "Model has {} locations; operations on it may be slow",
                locations.len()
            );
        }

        Ok(Self {
            accumulator,
            locations,
            n_subs,
            stable,
            config,
            meta,
            date_created: Utc::now(),
        })
    }

    /// Fold per-subject contributions over `locations` into a fresh, stable model.
    ///
    /// Contributions are summed in the order given.
    pub fn construct(
        contributions: &[AccumulatorPair],
        locations: LocationRegistry,
        n_subs: usize,
        config: ModelConfig,
    ) -> Result<Self> {
        config.validate()?;

        let mut accumulator = AccumulatorPair::empty(locations.len());
        for (i, contribution) in contributions.iter().enumerate() {
            if contribution.size() != locations.len() {
                return Err(SupereegError::Shape(format!(
                    "contribution {} is {}x{} but there are {} locations",
                    i,
                    contribution.size(),
                    contribution.size(),
                    locations.len()
                )));
            }
            accumulator = accumulator.add(contribution)?;
        }

        Self::canonical(accumulator, locations, n_subs, true, config, BTreeMap::new())
    }

    /// Model with no observations
    pub fn empty(locations: LocationRegistry, config: ModelConfig) -> Result<Self> {
        Self::construct(&[], locations, 0, config)
    }

    /// Wrap previously stored numerator/denominator matrices
    pub fn from_parts(
        numerator: DMatrix<f64>,
        denominator: DMatrix<f64>,
        locations: LocationRegistry,
        n_subs: usize,
        config: ModelConfig,
    ) -> Result<Self> {
        config.validate()?;
        let accumulator = AccumulatorPair::new(numerator, denominator)?;
        Self::canonical(accumulator, locations, n_subs, true, config, BTreeMap::new())
    }

    /// Single-subject model from a correlation matrix over `locations`
    pub fn from_correlation(
        corr: &DMatrix<f64>,
        locations: LocationRegistry,
        config: ModelConfig,
    ) -> Result<Self> {
        if corr.nrows() != locations.len() || corr.ncols() != locations.len() {
            return Err(SupereegError::Shape(format!(
                "correlation matrix is {}x{} but there are {} locations",
                corr.nrows(),
                corr.ncols(),
                locations.len()
            )));
        }
        let contribution = AccumulatorPair::from_correlation(corr, config.diagonal)?;
        Self::construct(&[contribution], locations, 1, config)
    }

    /// Single-subject model from one brain object's own electrodes
    pub fn from_brain(bo: &BrainObject, config: ModelConfig) -> Result<Self> {
        let locations = bo.registry()?;
        let corr = correlation_matrix(bo.data())?;
        Self::from_correlation(&corr, locations, config)
            .map(|model| model.with_meta(bo.meta().clone()))
    }

    pub fn with_meta(mut self, meta: BTreeMap<String, serde_json::Value>) -> Self {
        self.meta = meta;
        self
    }

    pub fn accumulator(&self) -> &AccumulatorPair {
        &self.accumulator
    }

    pub fn numerator(&self) -> &DMatrix<f64> {
        self.accumulator.numerator()
    }

    pub fn denominator(&self) -> &DMatrix<f64> {
        self.accumulator.denominator()
    }

    pub fn locations(&self) -> &LocationRegistry {
        &self.locations
    }

    pub fn n_locs(&self) -> usize {
        self.locations.len()
    }

    pub fn n_subs(&self) -> usize {
        self.n_subs
    }

    pub fn is_stable(&self) -> bool {
        self.stable
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn meta(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.meta
    }

    pub fn date_created(&self) -> DateTime<Utc> {
        self.date_created
    }

    pub fn add(&self, other: &Model) -> Result<Model> {
        combine(CombineKind::Add, self, other)
    }

    pub fn subtract(&self, other: &Model) -> Result<Model> {
        combine(CombineKind::Subtract, self, other)
    }

    /// Correlation matrix over `locations()`; unobserved pairs are NaN
    pub fn materialize(&self) -> DMatrix<f64> {
        self.materialize_in(MatrixSpace::Correlation)
    }

    pub fn materialize_in(&self, space: MatrixSpace) -> DMatrix<f64> {
        self.accumulator.materialize(self.config.diagonal, space)
    }

    /// Re-index onto `registry`.
    ///
    /// Locations missing from `registry` are dropped and new ones start
    /// unobserved; retained cells keep their exact values.
    pub fn with_locations(&self, registry: &LocationRegistry) -> Result<Model> {
        let (target, _) = registry.sorted();
        let tolerance = self.config.match_tolerance;

        let mut kept = Vec::new();
        let mut map = Vec::new();
        for (i, loc) in self.locations.iter().enumerate() {
            if let Some(t) = target.position(loc, tolerance)? {
                if map.contains(&t) {
                    return Err(SupereegError::Alignment(format!(
                        "two model locations map onto {} within tolerance {}",
                        loc, tolerance
                    )));
                }
                kept.push(i);
                map.push(t);
            }
        }

        let accumulator = self
            .accumulator
            .select(&kept)?
            .reindex(&map, target.len())?;

        Self::canonical(
            accumulator,
            target,
            self.n_subs,
            self.stable,
            self.config.clone(),
            self.meta.clone(),
        )
    }

    /// Sub-model over the selected locations (indices into `locations()`)
    pub fn slice_locations(&self, selector: impl Into<Selector>) -> Result<Model> {
        let indices = selector.into().resolve(self.n_locs())?;
        let locations = self.locations.select(&indices)?;
        let accumulator = self.accumulator.select(&indices)?;

        Self::canonical(
            accumulator,
            locations,
            self.n_subs,
            self.stable,
            self.config.clone(),
            self.meta.clone(),
        )
    }

    /// Drop locations that no subject has observed
    pub fn prune_unobserved(&self) -> Result<Model> {
        let observed = self.accumulator.observed_indices();
        if observed.len() == self.n_locs() {
            return Ok(self.clone());
        }
        self.slice_locations(observed)
    }

    pub fn info(&self) -> ModelInfo {
        ModelInfo {
            n_locs: self.n_locs(),
            n_subs: self.n_subs,
            stable: self.stable,
            shape: (self.accumulator.size(), self.accumulator.size()),
            diagonal: self.config.diagonal,
            date_created: self.date_created.to_rfc3339(),
            meta: self.meta.clone(),
        }
    }
}

/// Add or subtract two models after aligning their location registries.
///
/// Addition requires both operands to be stable and yields a stable model.
/// Subtraction accepts any operands and always yields an unstable model.
pub fn combine(kind: CombineKind, a: &Model, b: &Model) -> Result<Model> {
    if a.config.diagonal != b.config.diagonal {
        return Err(SupereegError::InvalidParameter(format!(
            "cannot {} models with diagonal policies {:?} and {:?}",
            kind, a.config.diagonal, b.config.diagonal
        )));
    }
    if kind == CombineKind::Add && !(a.stable && b.stable) {
        return Err(SupereegError::Instability(format!(
            "left operand stable: {}, right operand stable: {}",
            a.stable, b.stable
        )));
    }

    let n_subs = match kind {
        CombineKind::Add => a.n_subs + b.n_subs,
        CombineKind::Subtract => {
            a.n_subs
                .checked_sub(b.n_subs)
                .ok_or(SupereegError::NegativeSubjectCount {
                    left: a.n_subs,
                    right: b.n_subs,
                })?
        }
    };

    let tolerance = a.config.match_tolerance.max(b.config.match_tolerance);
    let alignment = a.locations.align(&b.locations, tolerance)?;
    let size = alignment.joint.len();
    let (left, right) = if alignment.is_identity() {
        (a.accumulator.clone(), b.accumulator.clone())
    } else {
        (
            a.accumulator.reindex(&alignment.left, size)?,
            b.accumulator.reindex(&alignment.right, size)?,
        )
    };

    let (accumulator, stable) = match kind {
        CombineKind::Add => (left.add(&right)?, true),
        CombineKind::Subtract => (left.subtract(&right)?, false),
    };

    log::debug!(
        "Combined models ({}): {} + {} locations -> {}, n_subs {}",
        kind,
        a.n_locs(),
        b.n_locs(),
        size,
        n_subs
    );

    // left operand wins on conflicting keys
    let mut meta = b.meta.clone();
    meta.extend(a.meta.clone());

    let config = ModelConfig {
        match_tolerance: tolerance,
        ..a.config.clone()
    };

    Model::canonical(accumulator, alignment.joint, n_subs, stable, config, meta)
}
