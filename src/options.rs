use clap::Parser;

/// omnik-export - polls an Omnik Wi-Fi logger once and hands the reading to output plugins
#[derive(Debug, Default, Parser)]
#[clap(author, version)]
pub struct Options {
    /// Config file to read
    #[clap(short = 'c', long = "config", default_value = "config.yaml")]
    pub config_file: String,

    /// Output plugins to use, comma separated; overrides plugins.enabled
    #[clap(short = 'p', long = "plugins")]
    pub plugins: Option<String>,

    /// Logger serial number; overrides logger.serial
    #[clap(short = 's', long = "serial")]
    pub serial: Option<u64>,

    /// Log level; overrides loglevel
    #[clap(short = 'l', long = "loglevel")]
    pub loglevel: Option<String>,
}

impl Options {
    pub fn new() -> Self {
        Self::parse()
    }

    pub fn plugins(&self) -> Option<Vec<String>> {
        self.plugins.as_ref().map(|p| {
            p.split(',')
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty())
                .collect()
        })
    }
}
