pub use anyhow::{anyhow, bail, Result};
pub use log::{debug, error, info, trace, warn};
pub use std::str::FromStr;

pub use crate::{
    config,
    config::Config,
    coordinator::{Coordinator, Outcome},
    error::Error,
    omnik,
    omnik::packet::{Classification, Reading, TerminalReason},
    options::Options,
    plugins,
    plugins::{Output, Plugin, PluginCommon, Registry},
    utils::Utils,
};

pub use crate::{file_error, file_error_with_source};
