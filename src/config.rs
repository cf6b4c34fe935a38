use crate::prelude::*;

use serde::Deserialize;
use serde_with::{serde_as, DurationSecondsWithFrac};
use std::time::Duration;

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    pub logger: Logger,
    pub plugins: Plugins,

    #[serde(default = "Config::default_loglevel")]
    pub loglevel: String,

    /// Optional file to log to instead of stderr
    pub log_file: Option<String>,
}

// Logger {{{
#[serde_as]
#[derive(Clone, Debug, Deserialize)]
pub struct Logger {
    pub host: String,
    #[serde(default = "Config::default_logger_port")]
    pub port: u16,

    #[serde_as(as = "DurationSecondsWithFrac<f64>")]
    #[serde(default = "Config::default_timeout")]
    pub timeout: Duration,

    pub serial: u64,

    #[serde(default)]
    pub strict_checksum: bool,
}
impl Logger {
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn serial(&self) -> u64 {
        self.serial
    }

    pub fn strict_checksum(&self) -> bool {
        self.strict_checksum
    }
} // }}}

// Plugins {{{
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Plugins {
    #[serde(default)]
    pub enabled: Vec<String>,

    pub datalog: Option<Datalog>,
    pub mqtt: Option<Mqtt>,
    pub influx: Option<Influx>,
    pub database: Option<Database>,
    pub pvoutput: Option<PvOutput>,
}
impl Plugins {
    pub fn enabled(&self) -> &[String] {
        &self.enabled
    }
} // }}}

// Datalog {{{
#[derive(Clone, Debug, Deserialize)]
pub struct Datalog {
    pub path: String,
}
impl Datalog {
    pub fn path(&self) -> &str {
        &self.path
    }
} // }}}

// Mqtt {{{
#[derive(Clone, Debug, Deserialize)]
pub struct Mqtt {
    pub host: String,
    #[serde(default = "Config::default_mqtt_port")]
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,

    #[serde(default = "Config::default_mqtt_namespace")]
    pub namespace: String,

    #[serde(default)]
    pub retain: bool,
}
impl Mqtt {
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn username(&self) -> &Option<String> {
        &self.username
    }

    pub fn password(&self) -> &Option<String> {
        &self.password
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn retain(&self) -> bool {
        self.retain
    }
} // }}}

// Influx {{{
#[derive(Clone, Debug, Deserialize)]
pub struct Influx {
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,

    pub database: String,
}
impl Influx {
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn username(&self) -> &Option<String> {
        &self.username
    }

    pub fn password(&self) -> &Option<String> {
        &self.password
    }

    pub fn database(&self) -> &str {
        &self.database
    }
} // }}}

// Database {{{
#[derive(Clone, Debug, Deserialize)]
pub struct Database {
    pub url: String,
}
impl Database {
    pub fn url(&self) -> &str {
        &self.url
    }
} // }}}

// PvOutput {{{
#[derive(Clone, Debug, Deserialize)]
pub struct PvOutput {
    #[serde(default = "Config::default_pvoutput_url")]
    pub url: String,
    pub api_key: String,
    pub system_id: String,
}
impl PvOutput {
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn system_id(&self) -> &str {
        &self.system_id
    }
} // }}}

impl Config {
    /// Reads `file` without validating it; `apply_options` validates once
    /// the command line overrides are in.
    pub fn new(file: &str) -> Result<Self> {
        let content = std::fs::read_to_string(file)
            .map_err(|err| file_error!("error reading {}: {}", file, err))?;

        Ok(serde_yaml::from_str(&content)?)
    }

    /// Applies command line overrides and re-validates.
    pub fn apply_options(&mut self, options: &Options) -> Result<()> {
        if let Some(plugins) = options.plugins() {
            self.plugins.enabled = plugins;
        }
        if let Some(serial) = options.serial {
            self.logger.serial = serial;
        }
        if let Some(loglevel) = &options.loglevel {
            self.loglevel = loglevel.clone();
        }

        self.validate()
    }

    pub fn log_summary(&self) {
        info!("Configuration loaded successfully:");
        info!("  Logger:");
        info!("    Host: {}", self.logger.host);
        info!("    Port: {}", self.logger.port);
        info!("    Serial: {}", self.logger.serial);
        info!("    Timeout: {:?}", self.logger.timeout);
        info!("    Strict Checksum: {}", self.logger.strict_checksum);
        info!("  Plugins: {}", self.plugins.enabled.join(", "));
        if let Some(datalog) = &self.plugins.datalog {
            info!("    Datalog Path: {}", datalog.path);
        }
        if let Some(mqtt) = &self.plugins.mqtt {
            info!("    MQTT: {}:{} namespace {}", mqtt.host, mqtt.port, mqtt.namespace);
        }
        if let Some(influx) = &self.plugins.influx {
            info!("    InfluxDB: {} database {}", influx.url, influx.database);
        }
        if let Some(database) = &self.plugins.database {
            info!("    Database: {}", database.url);
        }
        if let Some(pvoutput) = &self.plugins.pvoutput {
            info!("    PVOutput: {} system {}", pvoutput.url, pvoutput.system_id);
        }
        info!("  Log Level: {}", self.loglevel);
    }

    pub fn validate(&self) -> Result<()> {
        if self.logger.host.is_empty() {
            bail!("logger.host cannot be empty");
        }
        if self.logger.port == 0 {
            bail!("logger.port must be between 1 and 65535");
        }
        if self.logger.timeout.is_zero() {
            bail!("logger.timeout must be greater than zero");
        }

        if self.plugins.enabled.iter().all(|p| p.trim().is_empty()) {
            bail!("plugins.enabled must name at least one plugin");
        }

        if let Some(mqtt) = &self.plugins.mqtt {
            if mqtt.port == 0 {
                bail!("plugins.mqtt.port must be between 1 and 65535");
            }
            if mqtt.host.is_empty() {
                bail!("plugins.mqtt.host cannot be empty");
            }
        }

        if let Some(influx) = &self.plugins.influx {
            if let Err(e) = url::Url::parse(&influx.url) {
                bail!("Invalid InfluxDB URL: {}", e);
            }
            if influx.database.is_empty() {
                bail!("plugins.influx.database cannot be empty");
            }
        }

        if let Some(database) = &self.plugins.database {
            if let Err(e) = url::Url::parse(&database.url) {
                bail!("Invalid database URL: {}", e);
            }
        }

        if let Some(pvoutput) = &self.plugins.pvoutput {
            if let Err(e) = url::Url::parse(&pvoutput.url) {
                bail!("Invalid PVOutput URL: {}", e);
            }
            if pvoutput.api_key.is_empty() || pvoutput.system_id.is_empty() {
                bail!("plugins.pvoutput needs api_key and system_id");
            }
        }

        Ok(())
    }

    fn default_logger_port() -> u16 {
        8899
    }

    fn default_timeout() -> Duration {
        Duration::from_secs(10)
    }

    fn default_mqtt_port() -> u16 {
        1883
    }

    fn default_mqtt_namespace() -> String {
        "omnik".to_string()
    }

    fn default_pvoutput_url() -> String {
        "https://pvoutput.org/service/r2/addstatus.jsp".to_string()
    }

    fn default_loglevel() -> String {
        "info".to_string()
    }
}

impl FromStr for Config {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }
}
