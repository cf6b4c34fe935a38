use crate::prelude::*;

use async_trait::async_trait;
use std::io::Write;

/// Prints each reading to stdout.
#[derive(Debug, Clone, Default)]
pub struct Console;

impl Console {
    pub fn new() -> Self {
        Self
    }

    pub fn render(reading: &Reading) -> String {
        let mut lines = vec![
            format!("Inverter ID: {}", reading.id),
            format!("Main firmware: {}", reading.main_fw),
            format!("Slave firmware: {}", reading.slave_fw),
            format!("Run state: {} ({})", reading.run_state_label(), reading.run_state),
        ];

        for (name, value) in reading.fields() {
            lines.push(format!("{}: {}", name, value));
        }

        lines.join("\n")
    }
}

impl PluginCommon for Console {
    fn name(&self) -> &'static str {
        "console"
    }

    fn describe(&self) -> String {
        "stdout".to_string()
    }
}

#[async_trait]
impl Output for Console {
    async fn process(&self, reading: &Reading) -> Result<()> {
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{}", Self::render(reading))?;
        stdout.flush()?;

        Ok(())
    }
}
