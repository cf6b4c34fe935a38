use crate::prelude::*;

pub mod console;
pub mod database;
pub mod datalog;
pub mod influx;
pub mod mqtt;
pub mod pvoutput;

use async_trait::async_trait;
use enum_dispatch::*;

pub use console::Console;
pub use database::Database;
pub use datalog::Datalog;
pub use influx::Influx;
pub use mqtt::Mqtt;
pub use pvoutput::PvOutput;

/// What every output sink does with a fresh reading.
#[async_trait]
pub trait Output {
    async fn process(&self, reading: &Reading) -> Result<()>;
}

#[enum_dispatch]
pub trait PluginCommon {
    fn name(&self) -> &'static str;

    /// One line describing where this plugin sends data, for the startup log.
    fn describe(&self) -> String {
        self.name().to_string()
    }
}

#[enum_dispatch(PluginCommon)]
#[derive(Debug, Clone)]
pub enum Plugin {
    Console(Console),
    Datalog(Datalog),
    Mqtt(Mqtt),
    Influx(Influx),
    Database(Database),
    PvOutput(PvOutput),
}

impl Plugin {
    pub const NAMES: [&'static str; 6] = ["console", "datalog", "mqtt", "influx", "database", "pvoutput"];

    /// Looks a plugin up by its configured name. Plugins that need their own
    /// config section fail to load when it is missing.
    pub fn from_name(name: &str, config: &config::Plugins) -> Result<Self> {
        let key = name.trim().to_lowercase();

        fn section<T: Clone>(name: &str, section: &Option<T>) -> Result<T> {
            section.clone().ok_or_else(|| {
                warn!("plugin {} is enabled but has no config section", name);
                Error::PluginLoad(name.to_string()).into()
            })
        }

        fn unloadable(name: &str, err: anyhow::Error) -> anyhow::Error {
            warn!("plugin {} could not be set up: {:#}", name, err);
            Error::PluginLoad(name.to_string()).into()
        }

        let plugin: Plugin = match key.as_str() {
            "console" => Console::new().into(),
            "datalog" => Datalog::new(section(&key, &config.datalog)?).into(),
            "mqtt" => Mqtt::new(section(&key, &config.mqtt)?).into(),
            "influx" => Influx::new(section(&key, &config.influx)?).into(),
            "database" => Database::new(section(&key, &config.database)?)
                .map_err(|e| unloadable(&key, e))?
                .into(),
            "pvoutput" => PvOutput::new(section(&key, &config.pvoutput)?)
                .map_err(|e| unloadable(&key, e))?
                .into(),
            _ => {
                warn!("unknown plugin {}, expected one of {:?}", name.trim(), Self::NAMES);
                bail!(Error::PluginLoad(name.trim().to_string()))
            }
        };

        Ok(plugin)
    }
}

#[async_trait]
impl Output for Plugin {
    async fn process(&self, reading: &Reading) -> Result<()> {
        match self {
            Plugin::Console(p) => p.process(reading).await,
            Plugin::Datalog(p) => p.process(reading).await,
            Plugin::Mqtt(p) => p.process(reading).await,
            Plugin::Influx(p) => p.process(reading).await,
            Plugin::Database(p) => p.process(reading).await,
            Plugin::PvOutput(p) => p.process(reading).await,
        }
    }
}

/// What happened during one `Registry::broadcast`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub succeeded: Vec<&'static str>,
    pub failed: Vec<(&'static str, String)>,
}

impl BroadcastReport {
    pub fn invoked(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

impl std::fmt::Display for BroadcastReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} of {} plugins succeeded", self.succeeded.len(), self.invoked())
    }
}

/// The enabled output plugins, in configured order.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    plugins: Vec<Plugin>,
}

impl Registry {
    /// Loads one plugin per name. Any failure fails the whole registration.
    pub fn register<S: AsRef<str>>(names: &[S], config: &config::Plugins) -> Result<Self> {
        let mut plugins = Vec::with_capacity(names.len());

        for name in names {
            debug!("Importing output plugin {}", name.as_ref().trim());
            let plugin = Plugin::from_name(name.as_ref(), config)?;
            info!("  plugin {}: {}", plugin.name(), plugin.describe());
            plugins.push(plugin);
        }

        Ok(Self { plugins })
    }

    pub fn from_plugins(plugins: Vec<Plugin>) -> Self {
        Self { plugins }
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.plugins.iter().map(|p| p.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Hands `reading` to every plugin in order. A failing plugin is logged and
    /// recorded in the report; it never stops the ones after it.
    pub async fn broadcast(&self, reading: &Reading) -> BroadcastReport {
        let mut report = BroadcastReport::default();

        for plugin in &self.plugins {
            debug!("Run plugin {}", plugin.name());

            match plugin.process(reading).await {
                Ok(()) => report.succeeded.push(plugin.name()),
                Err(err) => {
                    error!("plugin {} failed: {:#}", plugin.name(), err);
                    report.failed.push((plugin.name(), format!("{:#}", err)));
                }
            }
        }

        report
    }
}
