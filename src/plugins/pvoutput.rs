use crate::prelude::*;

use async_trait::async_trait;
use chrono::{DateTime, Local};
use std::time::Duration;

const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Posts each reading to the PVOutput add-status service.
#[derive(Debug, Clone)]
pub struct PvOutput {
    config: config::PvOutput,
    client: reqwest::Client,
}

impl PvOutput {
    pub fn new(config: config::PvOutput) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self { config, client })
    }

    /// Form fields for one status: energy (Wh), power (W), temperature and
    /// PV voltage.
    pub fn params(reading: &Reading, now: DateTime<Local>) -> Vec<(&'static str, String)> {
        let mut r = vec![
            ("d", now.format("%Y%m%d").to_string()),
            ("t", now.format("%H:%M").to_string()),
            ("v1", format!("{}", (reading.e_today * 1000.0).round() as u64)),
            ("v2", format!("{}", reading.p_ac)),
            ("v5", format!("{}", reading.temperature)),
        ];

        if let Some(voltage) = reading.v_pv_1 {
            r.push(("v6", format!("{}", voltage)));
        }

        r
    }
}

impl PluginCommon for PvOutput {
    fn name(&self) -> &'static str {
        "pvoutput"
    }

    fn describe(&self) -> String {
        format!("{} system {}", self.config.url(), self.config.system_id())
    }
}

#[async_trait]
impl Output for PvOutput {
    async fn process(&self, reading: &Reading) -> Result<()> {
        let params = Self::params(reading, Local::now());

        let response = self
            .client
            .post(self.config.url())
            .header("X-Pvoutput-Apikey", self.config.api_key())
            .header("X-Pvoutput-SystemId", self.config.system_id())
            .form(&params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("PVOutput returned {}: {}", status, body.trim());
        }

        debug!("PVOutput accepted status for {}", reading.id);

        Ok(())
    }
}
