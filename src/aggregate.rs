//! Building models from collections of brain objects
//!
//! Contributions are computed per object and then folded in input order.

use rayon::prelude::*;

use crate::brain::BrainObject;
use crate::config::ModelConfig;
use crate::error::{Result, SupereegError};
use crate::locations::LocationRegistry;
use crate::model::Model;
use crate::profile_scope;

/// Builds models from collections of brain objects
///
/// Each object's contribution is computed independently (on the rayon pool
/// when `parallel` is set) and the results are folded with [`Model::add`] in
/// input order, so the same inputs always produce the same bits.
pub struct Aggregator {
    config: ModelConfig,
}

impl Aggregator {
    pub fn new(config: ModelConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Union of every object's electrode locations
    pub fn joint_locations(&self, objects: &[BrainObject]) -> Result<LocationRegistry> {
        let mut joint = LocationRegistry::empty();
        for bo in objects {
            joint = joint.union(&bo.registry()?, self.config.match_tolerance)?;
        }
        Ok(joint)
    }

    /// Per-object single-subject models, in input order
    pub fn contributions(&self, objects: &[BrainObject]) -> Result<Vec<Model>> {
        profile_scope!(format!("contributions ({} objects)", objects.len()));

        if self.config.parallel {
            objects
                .par_iter()
                .map(|bo| Model::from_brain(bo, self.config.clone()))
                .collect()
        } else {
            objects
                .iter()
                .map(|bo| Model::from_brain(bo, self.config.clone()))
                .collect()
        }
    }

    /// Build one stable model from all `objects`
    pub fn aggregate(&self, objects: &[BrainObject]) -> Result<Model> {
        profile_scope!("aggregate");

        if objects.is_empty() {
            return Err(SupereegError::EmptyInput(
                "at least one brain object is required".to_string(),
            ));
        }

        let joint = self.joint_locations(objects)?;
        log::info!(
            "Aggregating {} brain objects over {} locations",
            objects.len(),
            joint.len()
        );

        let contributions = self.contributions(objects)?;
        let start = Model::empty(joint, self.config.clone())?;
        let model = self.fold(start, &contributions)?;

        log::info!(
            "Aggregated model: {} locations, {} subjects",
            model.n_locs(),
            model.n_subs()
        );
        Ok(model)
    }

    /// Fold already-built models together in order
    pub fn merge(&self, models: &[Model]) -> Result<Model> {
        let (first, rest) = models.split_first().ok_or_else(|| {
            SupereegError::EmptyInput("at least one model is required".to_string())
        })?;
        self.fold(first.clone(), rest)
    }

    /// Add the contributions of `objects` to an existing model
    pub fn update(&self, model: &Model, objects: &[BrainObject]) -> Result<Model> {
        let addition = self.aggregate(objects)?;
        model.add(&addition)
    }

    fn fold(&self, start: Model, models: &[Model]) -> Result<Model> {
        models.iter().try_fold(start, |acc, m| acc.add(m))
    }
}

/// Aggregate with the given configuration
pub fn aggregate(objects: &[BrainObject], config: ModelConfig) -> Result<Model> {
    Aggregator::new(config)?.aggregate(objects)
}
