//! Training stage: featurize the train split, fit the HMM, label states.

use thiserror::Error;
use tracing::info;

use regimelab_core::domain::DailyBar;
use regimelab_core::features::{FeatureError, ObservationMatrix};
use regimelab_core::hmm::{label_states, state_distribution, GaussianHmm, HmmError};

use crate::bundle::{ModelBundle, TrainingInfo, BUNDLE_SCHEMA_VERSION};
use crate::config::{ConfigError, PipelineConfig};
use crate::data_loader::train_slice;

#[derive(Debug, Error)]
pub enum TrainError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("no bars on or before train_end {0}")]
    EmptyTrainingSet(chrono::NaiveDate),

    #[error("only {got} valid observations in the training split, need at least {required}")]
    InsufficientObservations { got: usize, required: usize },

    #[error("feature error: {0}")]
    Feature(#[from] FeatureError),

    #[error("model error: {0}")]
    Hmm(#[from] HmmError),
}

/// Fit and label a model on the bars up to `config.data.train_end`.
pub fn train_model(
    bars: &[DailyBar],
    config: &PipelineConfig,
    dataset_hash: &str,
) -> Result<ModelBundle, TrainError> {
    config.validate()?;
    let train = train_slice(bars, config.data.train_end);
    let (first, last) = match (train.first(), train.last()) {
        (Some(f), Some(l)) => (f.date, l.date),
        _ => return Err(TrainError::EmptyTrainingSet(config.data.train_end)),
    };
    info!(
        start = %first,
        end = %last,
        days = train.len(),
        "training split"
    );

    let featurizer = config.model.featurizer()?;
    let obs = ObservationMatrix::build(train, &featurizer);
    let required = config.model.n_states.max(2);
    if obs.len() < required {
        return Err(TrainError::InsufficientObservations {
            got: obs.len(),
            required,
        });
    }
    info!(
        observations = obs.len(),
        featurizer = featurizer.name(),
        "prepared observations"
    );

    let (model, fit) = GaussianHmm::fit(obs.rows(), &config.model.fit_options())?;
    let labeling = label_states(&model)?;
    let states = model.infer(obs.rows())?;
    let distribution = state_distribution(&states);

    for (state, mean) in model.means().iter().enumerate() {
        info!(
            state,
            label = %labeling.label(state).map(|l| l.to_string()).unwrap_or_default(),
            mean_return = mean[0],
            mean_energy = mean[1],
            days = distribution.get(&state).copied().unwrap_or(0),
            "fitted state"
        );
    }

    Ok(ModelBundle {
        schema_version: BUNDLE_SCHEMA_VERSION,
        training: TrainingInfo {
            ticker: config.data.ticker.clone(),
            n_states: config.model.n_states,
            window: config.model.window,
            scale: config.model.scale,
            n_iter: config.model.n_iter,
            seed: config.model.seed,
            train_start: first,
            train_end: last,
            n_observations: obs.len(),
        },
        model,
        labeling,
        fit,
        dataset_hash: dataset_hash.to_string(),
        state_distribution: distribution,
    })
}
