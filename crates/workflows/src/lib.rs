// Image-processing features built on the deepsky engine

pub mod decon_support;
pub mod denoise;
pub mod lum_mask;
pub mod luminance;
pub mod stretch;
pub mod transfer;

pub use decon_support::DeconSupport;
pub use denoise::DeepDenoise;
pub use lum_mask::LumMask;
pub use stretch::SimpleStretch;
pub use transfer::{mtf, AutoStretch};

use deepsky_config::{debug, shared, HostConfig, JsonFileStore, SharedStore};
use deepsky_engine::{EngineError, Feature, FeatureHandle, FeatureRegistry};

/// Every feature this crate provides, freshly constructed.
pub fn features() -> Vec<Box<dyn Feature>> {
    vec![
        Box::new(SimpleStretch::new()),
        Box::new(DeepDenoise::new()),
        Box::new(LumMask::new()),
        Box::new(DeconSupport::new()),
    ]
}

/// Register every feature, each with the store `store_for` returns for its name.
///
/// Stops at the first failure. Features registered before it stay registered.
pub fn register_all<F>(registry: &mut FeatureRegistry, mut store_for: F) -> Result<Vec<FeatureHandle>, EngineError>
where
    F: FnMut(&str) -> SharedStore,
{
    features()
        .into_iter()
        .map(|feature| {
            let store = store_for(feature.name());
            registry.register_with_store(feature, store)
        })
        .collect()
}

/// Register every feature against the host configuration: debug flags go to
/// the process-wide debug registry and settings persist as JSON files in the
/// configured settings directory.
pub fn register_from_config(
    registry: &mut FeatureRegistry,
    config: &HostConfig,
) -> Result<Vec<FeatureHandle>, EngineError> {
    debug::registry().apply(&config.debug);

    let dir = config.settings_dir();
    log::info!("Settings directory: {}", dir.display());
    register_all(registry, |name| -> SharedStore { shared(JsonFileStore::for_feature(&dir, name)) })
}
