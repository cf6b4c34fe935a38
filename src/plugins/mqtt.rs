use crate::prelude::*;

use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, EventLoop, Incoming, MqttOptions, Outgoing, QoS};
use std::time::Duration;

const PUBLISH_TIMEOUT_SECS: u64 = 10;

// Message {{{
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Message {
    pub topic: String,
    pub retain: bool,
    pub payload: String,
}

impl Message {
    pub fn for_reading(namespace: &str, reading: &Reading, retain: bool) -> Result<Message> {
        Ok(Message {
            topic: format!("{}/{}/reading", namespace, reading.id),
            retain,
            payload: serde_json::to_string(reading)?,
        })
    }
} // }}}

/// Publishes each reading as JSON to an MQTT broker.
#[derive(Debug, Clone)]
pub struct Mqtt {
    config: config::Mqtt,
}

impl Mqtt {
    pub fn new(config: config::Mqtt) -> Self {
        Self { config }
    }

    fn options(&self) -> MqttOptions {
        let c = &self.config;

        let mut options = MqttOptions::new(
            format!("omnik-export-{}", std::process::id()),
            c.host(),
            c.port(),
        );
        options.set_keep_alive(Duration::from_secs(60));
        if let (Some(u), Some(p)) = (c.username(), c.password()) {
            options.set_credentials(u, p);
        }

        options
    }

    // drive the event loop until the broker has acknowledged our publish
    async fn wait_for_ack(eventloop: &mut EventLoop) -> Result<()> {
        loop {
            match eventloop.poll().await? {
                Event::Incoming(Incoming::PubAck(_)) => return Ok(()),
                Event::Incoming(Incoming::ConnAck(ack)) => trace!("mqtt connected: {:?}", ack),
                _ => {}
            }
        }
    }

    async fn disconnect(client: AsyncClient, eventloop: &mut EventLoop) {
        if let Err(e) = client.disconnect().await {
            debug!("mqtt disconnect request failed: {}", e);
            return;
        }

        let _ = tokio::time::timeout(Duration::from_secs(1), async {
            loop {
                match eventloop.poll().await {
                    Ok(Event::Outgoing(Outgoing::Disconnect)) | Err(_) => break,
                    _ => {}
                }
            }
        })
        .await;
    }
}

impl PluginCommon for Mqtt {
    fn name(&self) -> &'static str {
        "mqtt"
    }

    fn describe(&self) -> String {
        format!(
            "mqtt://{}:{} under {}/",
            self.config.host(),
            self.config.port(),
            self.config.namespace()
        )
    }
}

#[async_trait]
impl Output for Mqtt {
    async fn process(&self, reading: &Reading) -> Result<()> {
        let message = Message::for_reading(self.config.namespace(), reading, self.config.retain())?;

        let (client, mut eventloop) = AsyncClient::new(self.options(), 10);

        client
            .publish(&message.topic, QoS::AtLeastOnce, message.retain, message.payload)
            .await?;

        match tokio::time::timeout(
            Duration::from_secs(PUBLISH_TIMEOUT_SECS),
            Self::wait_for_ack(&mut eventloop),
        )
        .await
        {
            Ok(Ok(())) => debug!("published {}", message.topic),
            Ok(Err(e)) => bail!("mqtt publish to {} failed: {}", message.topic, e),
            Err(_) => bail!(
                "mqtt publish to {} not acknowledged after {}s",
                message.topic,
                PUBLISH_TIMEOUT_SECS
            ),
        }

        Self::disconnect(client, &mut eventloop).await;

        Ok(())
    }
}
