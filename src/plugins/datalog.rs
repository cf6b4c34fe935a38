use crate::prelude::*;

use async_trait::async_trait;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

/// Appends one JSON object per reading to a file.
#[derive(Debug, Clone)]
pub struct Datalog {
    config: config::Datalog,
}

impl Datalog {
    pub fn new(config: config::Datalog) -> Self {
        Self { config }
    }

    pub fn path(&self) -> &str {
        self.config.path()
    }

    pub fn to_json(reading: &Reading, timestamp: i64) -> Result<String> {
        let mut json = match serde_json::to_value(reading)? {
            serde_json::Value::Object(map) => map,
            other => bail!("reading serialised to {:?}, expected an object", other),
        };

        json.insert("utc_timestamp".to_string(), serde_json::Value::from(timestamp));
        json.insert(
            "run_state_label".to_string(),
            serde_json::Value::from(reading.run_state_label()),
        );

        Ok(serde_json::to_string(&serde_json::Value::Object(json))?)
    }

    fn write_line(&self, line: &str) -> Result<()> {
        let path = self.path();

        // Ensure the directory exists
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| file_error_with_source!(e, "Failed to open datalog file {}", path))?;

        writeln!(file, "{}", line)
            .map_err(|e| file_error_with_source!(e, "Failed to write to datalog file {}", path))?;
        file.flush()?;

        Ok(())
    }
}

impl PluginCommon for Datalog {
    fn name(&self) -> &'static str {
        "datalog"
    }

    fn describe(&self) -> String {
        format!("JSON lines to {}", self.path())
    }
}

#[async_trait]
impl Output for Datalog {
    async fn process(&self, reading: &Reading) -> Result<()> {
        let line = Self::to_json(reading, chrono::Utc::now().timestamp())?;
        self.write_line(&line)?;
        debug!("reading for {} appended to {}", reading.id, self.path());

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn reading() -> Reading {
        let mut f = vec![0u8; 130];
        f[0] = 0x68;
        f[15..23].copy_from_slice(b"NLDN4020");
        f[31..33].copy_from_slice(&250i16.to_be_bytes());
        f[69..71].copy_from_slice(&512u16.to_be_bytes());
        f[101..108].copy_from_slice(b"V1.0-77");
        omnik::packet::decode_reading(&f).unwrap()
    }

    #[tokio::test]
    async fn appends_one_line_per_reading() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("sub").join("readings.json");
        let plugin = Datalog::new(config::Datalog {
            path: path.to_string_lossy().to_string(),
        });

        plugin.process(&reading()).await?;
        plugin.process(&reading()).await?;

        let contents = std::fs::read_to_string(&path)?;
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);

        let json: serde_json::Value = serde_json::from_str(lines[0])?;
        assert_eq!(json["id"], "NLDN4020");
        assert_eq!(json["temperature"], 25.0);
        assert_eq!(json["e_today"], 5.12);
        assert_eq!(json["main_fw"], "V1.0-77");
        assert_eq!(json["run_state_label"], "Wait");
        assert!(json["utc_timestamp"].is_i64());

        Ok(())
    }

    #[tokio::test]
    async fn unwritable_path_fails() -> Result<()> {
        let dir = TempDir::new()?;
        // a directory cannot be opened for appending
        let plugin = Datalog::new(config::Datalog {
            path: dir.path().to_string_lossy().to_string(),
        });

        assert!(plugin.process(&reading()).await.is_err());

        Ok(())
    }

    #[test]
    fn to_json_keeps_absent_channels_as_null() -> Result<()> {
        let mut r = reading();
        r.v_pv_2 = None;
        let json: serde_json::Value = serde_json::from_str(&Datalog::to_json(&r, 1700000000)?)?;
        assert!(json["v_pv_2"].is_null());
        assert_eq!(json["utc_timestamp"], 1700000000);

        Ok(())
    }
}
