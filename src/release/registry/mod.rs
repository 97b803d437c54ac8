pub mod binary_channel;
pub mod source_index;

pub use binary_channel::BinaryChannelTarget;
pub use source_index::SourceIndexTarget;

use {
    crate::{
        config::{RegistryConfig, ReleaseConfig},
        release::publisher::RegistryTarget,
    },
    std::sync::Arc,
};

/// Targets described by the configuration, with credentials read from the environment.
pub fn targets_from_config(config: &ReleaseConfig) -> Vec<Arc<dyn RegistryTarget>> {
    config
        .registries()
        .into_iter()
        .map(|registry| -> Arc<dyn RegistryTarget> {
            match registry {
                RegistryConfig::SourceIndex(c) => {
                    Arc::new(SourceIndexTarget::from_env(c, &config.package.name))
                }
                RegistryConfig::BinaryChannel(c) => {
                    Arc::new(BinaryChannelTarget::from_env(c, config.package.clone()))
                }
            }
        })
        .collect()
}
