//! # Ensemble
//!
//! Turns the configured model paths into scorers, one per path, in path
//! order. Scorer `n` is tagged `F{n}` and weighted 1.

use std::sync::Arc;
use tracing::info;
use crate::artifact::ModelStore;
use crate::config::DecodingConfig;
use crate::context::ExecutionContext;
use crate::error::Result;
use crate::models::for_translation;
use crate::scorer::{ModelScorer, Scorer};

pub const SCORER_WEIGHT: f32 = 1.0;

/// Tag of the `ordinal`-th ensemble member.
pub fn scorer_name(ordinal: usize) -> String {
    format!("F{ordinal}")
}

/// Loads every model listed under `model` through `store`.
///
/// Each artifact's embedded metadata is merged with the global options
/// before the model is built. Any unreadable artifact or malformed metadata
/// fails the whole ensemble.
pub fn load_ensemble(config: &DecodingConfig, store: &dyn ModelStore) -> Result<Vec<Box<dyn Scorer>>> {
    let paths = config.model_paths()?;
    let mut scorers: Vec<Box<dyn Scorer>> = Vec::with_capacity(paths.len());

    for (ordinal, path) in paths.into_iter().enumerate() {
        let artifact = store.load(&path)?;
        let options = config.options().merge_model_metadata(artifact.metadata());
        let model = for_translation(&options, &artifact)?;
        let name = scorer_name(ordinal);
        info!(
            scorer = %name,
            path = ?path,
            model_type = model.model_type(),
            vocab = model.target_vocab_size(),
            "loaded ensemble member"
        );
        scorers.push(Box::new(ModelScorer::new(name, SCORER_WEIGHT, path, model)));
    }
    Ok(scorers)
}

/// Binds every scorer to `context`.
pub fn init_ensemble(scorers: &mut [Box<dyn Scorer>], context: &Arc<ExecutionContext>) -> Result<()> {
    for scorer in scorers.iter_mut() {
        scorer.init(context)?;
    }
    Ok(())
}
