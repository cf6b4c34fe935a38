use crate::prelude::*;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rinfluxdb::line_protocol::{r#async::Client, Line, LineBuilder};

static MEASUREMENT: &str = "omnik_inverter";

/// Writes each reading as one InfluxDB point.
#[derive(Debug, Clone)]
pub struct Influx {
    config: config::Influx,
}

impl Influx {
    pub fn new(config: config::Influx) -> Self {
        Self { config }
    }

    pub fn line(reading: &Reading, timestamp: DateTime<Utc>) -> Line {
        let mut line = LineBuilder::new(MEASUREMENT)
            .insert_tag("inverter", reading.id.as_str())
            .set_timestamp(timestamp);

        for (name, value) in reading.fields() {
            line = line.insert_field(name, value);
        }

        line.build()
    }

    fn database(&self) -> String {
        self.config.database().to_string()
    }
}

impl PluginCommon for Influx {
    fn name(&self) -> &'static str {
        "influx"
    }

    fn describe(&self) -> String {
        format!("{} database {}", self.config.url(), self.config.database())
    }
}

#[async_trait]
impl Output for Influx {
    async fn process(&self, reading: &Reading) -> Result<()> {
        let client = {
            let config = &self.config;
            let url = reqwest::Url::parse(config.url())?;
            let credentials = match (config.username(), config.password()) {
                (Some(u), Some(p)) => Some((u, p)),
                _ => None,
            };

            Client::new(url, credentials)?
        };

        let points = vec![Self::line(reading, Utc::now())];
        trace!("Sending to InfluxDB: {:?}", points);

        client
            .send(&self.database(), &points)
            .await
            .map_err(|e| anyhow!("InfluxDB push failed: {:?}", e))?;

        debug!("sent {} point to InfluxDB", points.len());

        Ok(())
    }
}
