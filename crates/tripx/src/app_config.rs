//! 🔧 App Configuration -- the sacred TOML-to-struct pipeline.
//!
//! 📡 "Config not found: We looked everywhere. Under the seat. Behind the driver.
//! In the lost property bin at the depot. Nothing." -- every developer at 3am 🦆
//!
//! 🏗️ Powered by Figment, because manually parsing env vars is a form of
//! self-harm that even the borrow checker wouldn't approve of.
//!
//! Layering, lowest to highest priority:
//!   1. `TRIPX_*` environment variables (nested keys split on `__`)
//!   2. the optional TOML file
//!   3. command line overrides (whatever the CLI actually got told)

use anyhow::{Context, bail};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

pub use crate::collector::CollectionConfig;
pub use crate::feed::FeedConfig;
pub use crate::ground_truth::GroundTruthConfig;

/// 📦 The AppConfig: one struct to rule them all, one struct to find them,
/// one struct to bring them all, and in the Figment bind them.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    /// 📡 Where the live trip updates come from, and how we ask politely.
    pub feed: FeedConfig,
    /// 🗺️ The static stop lists used to fill in the stops the feed skipped.
    #[serde(default)]
    pub ground_truth: GroundTruthConfig,
    /// ⏱️ How long, how often, where to, and how much disk we are allowed to eat.
    pub collection: CollectionConfig,
}

/// 🎛️ Knobs the command line is allowed to twist after the file and env had their say.
///
/// Every field is optional. `None` means "the CLI had no opinion", and the serializer
/// skips it so it never clobbers a value from a lower layer.
#[derive(Debug, Default, Clone, Serialize)]
pub struct CollectionOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_time_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_delay_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub save_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_batch_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_storage_bytes: Option<u64>,
}

// 📬 Figment wants a whole document, not a loose bag of fields. Wrap it in a `collection` key.
#[derive(Serialize)]
struct OverrideLayer<'a> {
    collection: &'a CollectionOverrides,
}

/// 🚀 Load the config from env vars and an optional TOML file.
///
/// - `config_file_name` is None → env vars only.
/// - `config_file_name` is Some → env vars + TOML file, merged. TOML wins on conflicts.
pub fn load_config(config_file_name: Option<&Path>) -> anyhow::Result<AppConfig> {
    load_config_with(config_file_name, &CollectionOverrides::default())
}

/// 🚀 Same as [`load_config`], plus a final layer of command line overrides on top.
///
/// 💀 Returns an error if config is unparseable, or if it parses into something we refuse to run
/// with (a batch size of zero, for example, which would flush forever and save nothing).
pub fn load_config_with(
    config_file_name: Option<&Path>,
    overrides: &CollectionOverrides,
) -> anyhow::Result<AppConfig> {
    info!(
        "🔧 Loading configuration: {:#?}",
        config_file_name.unwrap_or(Path::new(""))
    );

    // 🏗️ env vars are the sourdough starter. everything else gets folded in on top.
    let config = Figment::new().merge(Env::prefixed("TRIPX_").split("__"));

    let config = match config_file_name {
        Some(file_name) => config.merge(Toml::file(file_name)),
        None => config,
    };

    let config = config.merge(Serialized::defaults(OverrideLayer {
        collection: overrides,
    }));

    let context_msg = match config_file_name {
        Some(path) => format!(
            "💀 Failed to parse configuration from file '{}', environment variables (TRIPX_*) \
             and command line overrides. One of the three is lying to us.",
            path.display()
        ),
        None => "💀 Failed to parse configuration from environment variables (TRIPX_*) and \
                 command line overrides. No file was provided, so this one's on the environment."
            .to_string(),
    };

    let app_config: AppConfig = config.extract().context(context_msg)?;
    app_config.validate()?;
    Ok(app_config)
}

impl AppConfig {
    /// 🔒 Reject configs that would parse fine and then do something silly.
    fn validate(&self) -> anyhow::Result<()> {
        if self.collection.max_batch_size == 0 {
            bail!(
                "💀 collection.max_batch_size is 0. A batch that can hold nothing flushes nothing, \
                 forever. Pick a number of trips >= 1."
            );
        }
        if self.collection.run_time_secs == 0 {
            bail!("💀 collection.run_time_secs is 0. We would be done before we started.");
        }
        Ok(())
    }
}
