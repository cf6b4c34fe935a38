use crate::prelude::*;
use crate::omnik::logger::{Connection, Frame};
use crate::omnik::packet::{Parser, Request};
use crate::plugins::BroadcastReport;

use anyhow::Context;

use std::sync::Arc;

/// Where a poll has got to. Every run finishes in `Closed`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum State {
    Idle,
    Connected,
    Sent,
    Receiving,
    Terminal,
    DataDecoded,
    Dispatched,
    Skipped,
    Closed,
}

/// How a successful poll ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// The logger had nothing new; no plugin ran.
    Terminal(TerminalReason),
    Dispatched(BroadcastReport),
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Terminal(reason) => write!(f, "terminal response ({})", reason),
            Outcome::Dispatched(report) => write!(f, "reading dispatched, {}", report),
        }
    }
}

/// Runs one connect/query/decode/dispatch cycle against the logger.
#[derive(Clone)]
pub struct Coordinator {
    config: config::Logger,
    registry: Arc<Registry>,
}

impl Coordinator {
    pub fn new(config: config::Logger, registry: Arc<Registry>) -> Self {
        Self { config, registry }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub async fn run(&self) -> Result<Outcome> {
        // a bad serial must fail before any network activity
        let request = Request::new(self.config.serial())?;
        self.transition(State::Idle);

        let mut connection =
            Connection::open(self.config.host(), self.config.port(), self.config.timeout())
                .await
                .with_context(|| {
                    format!(
                        "Could not open socket to {}:{}",
                        self.config.host(),
                        self.config.port()
                    )
                })?;
        self.transition(State::Connected);

        let result = self.poll(&mut connection, &request).await;

        connection.close().await;
        self.transition(State::Closed);

        result
    }

    async fn poll(&self, connection: &mut Connection, request: &Request) -> Result<Outcome> {
        let frame = self.exchange(connection, request).await?;

        match frame.classification {
            Classification::Terminal(reason) => {
                self.transition(State::Terminal);
                match reason {
                    TerminalReason::SendComplete => debug!(
                        "Exit Status: {}",
                        Parser::status_text(&frame.bytes).unwrap_or_default()
                    ),
                    TerminalReason::NoInverter => info!(
                        "Inverter(s) are in sleep mode: {} received",
                        Parser::status_text(&frame.bytes).unwrap_or_default()
                    ),
                }
                self.transition(State::Skipped);

                Ok(Outcome::Terminal(reason))
            }
            Classification::Data => {
                let reading = self.decode(&frame)?;
                self.transition(State::DataDecoded);

                let report = self.registry.broadcast(&reading).await;
                if !report.is_clean() {
                    warn!("{} plugin(s) failed: {:?}", report.failed.len(), report.failed);
                }
                self.transition(State::Dispatched);

                Ok(Outcome::Dispatched(report))
            }
            // the codec only yields complete frames
            Classification::Incomplete => bail!(Error::MalformedFrame(format!(
                "incomplete response of {} bytes",
                frame.bytes.len()
            ))),
        }
    }

    async fn exchange(&self, connection: &mut Connection, request: &Request) -> Result<Frame> {
        self.transition(State::Sent);
        self.transition(State::Receiving);
        connection.exchange(&request.bytes()).await
    }

    fn decode(&self, frame: &Frame) -> Result<Reading> {
        if self.config.strict_checksum() {
            Parser::validate_checksum(&frame.bytes)?;
        }

        let reading = Parser::parse(&frame.bytes)?;

        info!("Inverter ID: {}", reading.id);
        info!("Inverter main firmware version: {}", reading.main_fw);
        info!("Inverter slave firmware version: {}", reading.slave_fw);
        info!("RUN State: {} ({})", reading.run_state, reading.run_state_label());

        Ok(reading)
    }

    fn transition(&self, state: State) {
        trace!("poll of {}:{} -> {:?}", self.config.host(), self.config.port(), state);
    }
}
