use crate::errors::ConfigError;
use config::{Config, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::{env::VarError, str::FromStr};
use typed_builder::TypedBuilder;

/// Environment variable that overrides [`CacheOptions::prune`].
pub const PRUNE_ENV: &str = "SOURCE_CACHE_PRUNE";
/// Environment variable that overrides [`CacheOptions::label`].
pub const LABEL_ENV: &str = "SOURCE_CACHE_LABEL";

/// Settings for a [`SubscriptionCache`](crate::SubscriptionCache).
///
/// Can be built in code, read from TOML with [`get_options_from_str`] or
/// [`get_options_from_file`], or read from the environment with
/// [`CacheOptions::try_from_env`].
#[derive(
    TypedBuilder, Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize,
)]
#[serde(rename_all = "kebab-case")]
pub struct CacheOptions {
    /// When entries with no handles are torn down.
    #[builder(default)]
    #[serde(default)]
    pub prune: PrunePolicy,
    /// A name for the cache, included in log output.
    #[builder(default, setter(strip_option, into))]
    #[serde(default)]
    pub label: Option<String>,
}

impl CacheOptions {
    /// Reads the options from the environment, using the defaults for anything not set.
    pub fn try_from_env() -> Result<Self, ConfigError> {
        Self::default().with_env_overrides()
    }

    /// Replaces any option that is set in the environment.
    pub fn with_env_overrides(mut self) -> Result<Self, ConfigError> {
        if let Some(prune) = env_wo_default(PRUNE_ENV)? {
            self.prune = prune.parse()?;
        }
        if let Some(label) = env_wo_default(LABEL_ENV)? {
            self.label = Some(label);
        }
        Ok(self)
    }
}

/// Decides when entries that dropped to zero handles are torn down.
///
/// Either way, an entry that is re-acquired before it is pruned is reused without opening
/// the source again, and [`SubscriptionCache::prune`](crate::SubscriptionCache::prune) can
/// always be called directly.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum PrunePolicy {
    /// Entries are only torn down when `prune` is called.
    #[default]
    Manual,
    /// The first release to zero queues a prune on the
    /// [`any_spawner`] executor, which runs after the current task yields.
    /// If no executor is initialized, a warning is logged and entries wait
    /// for a manual prune.
    NextTick,
}

impl FromStr for PrunePolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "manual" => Ok(PrunePolicy::Manual),
            "next-tick" | "next_tick" | "nexttick" => Ok(PrunePolicy::NextTick),
            _ => Err(ConfigError::InvalidPrunePolicy(s.to_string())),
        }
    }
}

/// Parses options from TOML text, then applies environment overrides.
///
/// ```rust
/// use source_cache::{get_options_from_str, PrunePolicy};
///
/// let options = get_options_from_str(
///     r#"
///     prune = "next-tick"
///     label = "users"
///     "#,
/// )
/// .unwrap();
/// assert_eq!(options.prune, PrunePolicy::NextTick);
/// ```
pub fn get_options_from_str(text: &str) -> Result<CacheOptions, ConfigError> {
    let config = Config::builder()
        .add_source(File::from_str(text, FileFormat::Toml))
        .build()?;
    let options: CacheOptions = config.try_deserialize()?;
    options.with_env_overrides()
}

/// Reads options from a TOML file, then applies environment overrides.
pub fn get_options_from_file(path: &str) -> Result<CacheOptions, ConfigError> {
    let config = Config::builder()
        .add_source(File::new(path, FileFormat::Toml))
        .build()?;
    let options: CacheOptions = config.try_deserialize()?;
    options.with_env_overrides()
}

fn env_wo_default(key: &str) -> Result<Option<String>, ConfigError> {
    match std::env::var(key) {
        Ok(val) => Ok(Some(val)),
        Err(VarError::NotPresent) => Ok(None),
        Err(VarError::NotUnicode(_)) => Err(ConfigError::EnvError(key.into())),
    }
}
