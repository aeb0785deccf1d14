use crate::config::MqttConfig;
use log::{debug, error, info};
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{Receiver, Sender};


#[derive(Debug, Clone, PartialEq)]
pub struct PublishData {
    pub topic: String,
    pub payload: String,
    pub qos: u8,
    pub retain: bool,
}

pub fn to_qos(qos: u8) -> QoS {
    match qos {
        0 => QoS::AtMostOnce,
        1 => QoS::AtLeastOnce,
        2 => QoS::ExactlyOnce,
        _ => QoS::AtMostOnce,
    }
}

pub fn options_from_config(config: &MqttConfig) -> MqttOptions {
    let mut mqttoptions = MqttOptions::new(config.client_name.clone(), config.host.clone(), config.port);
    mqttoptions.set_keep_alive(Duration::from_secs(5));
    /* Anonymous unless both parts are given */
    if !config.user.is_empty() && !config.pass.is_empty() {
        mqttoptions.set_credentials(config.user.clone(), config.pass.clone());
    }
    mqttoptions
}

pub struct MqttManager {
    rx: Receiver<PublishData>,
    exit_thread: bool,
    client: AsyncClient,
    /// Set by the event loop between ConnAck and the next connection error
    connected: Arc<AtomicBool>,
    dropped: u64,
}

impl MqttManager {
    /// Must be called inside a tokio runtime, the event loop is spawned right away
    pub fn new(config: &MqttConfig) -> (Self, Sender<PublishData>) {
        let (mtx, mrx) = tokio::sync::mpsc::channel(100);

        info!("MQTT connection to {}:{} starting up", config.host, config.port);
        let (client, mut eventloop) = AsyncClient::new(options_from_config(config), 10);
        let connected = Arc::new(AtomicBool::new(false));
        let link = connected.clone();

        tokio::spawn(async move {
            info!("MQTT Eventloop started");
            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        info!("Connected to MQTT broker");
                        link.store(true, Ordering::Relaxed);
                    },
                    Ok(Event::Incoming(Packet::PubAck(ack))) => {
                        debug!("Publish {} acknowledged", ack.pkid);
                    },
                    Ok(_) => {},
                    Err(e) => {
                        /* start_thread drops readings until the next ConnAck */
                        link.store(false, Ordering::Relaxed);
                        error!("Error in MQTT {:?}, reconnecting", e);
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        });

        return (MqttManager {
            client: client,
            rx: mrx,
            exit_thread: false,
            connected: connected,
            dropped: 0,
        }, mtx);
    }

    pub async fn start_thread(&mut self) {
        while !self.exit_thread {
            let option = self.rx.recv().await;

            let publish_data = match option {
                Some(p) => p,
                None => {
                    debug!("Reading returned none, we exit now");
                    self.exit_thread = true;
                    continue;
                }
            };

            if !self.connected.load(Ordering::Relaxed) {
                error!("MQTT broker not connected, dropping {} {}", publish_data.topic, publish_data.payload);
                self.dropped += 1;
                continue;
            }

            match self.client.try_publish(
                publish_data.topic.clone(),
                to_qos(publish_data.qos),
                publish_data.retain,
                publish_data.payload
            ) {
                Err(e) => {
                    error!("MQTT publish to {} failed: {}", publish_data.topic, e);
                    self.dropped += 1;
                },
                Ok(_) => { debug!("Published to {} successfully", publish_data.topic); }
            }
        }

        info!("MQTT thread exit, {} readings dropped", self.dropped);
    }

    /// Readings that never reached the client because the broker was unavailable
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn test_qos_mapping() {
        assert_eq!(to_qos(0), QoS::AtMostOnce);
        assert_eq!(to_qos(1), QoS::AtLeastOnce);
        assert_eq!(to_qos(2), QoS::ExactlyOnce);
        assert_eq!(to_qos(9), QoS::AtMostOnce);
    }

    #[test]
    fn test_options() {
        let mut config = Config::from_yaml("mqtt:\n  host: broker\n  port: 1884\n  user: amr\n").unwrap().mqtt;
        let options = options_from_config(&config);
        assert_eq!(options.broker_address(), ("broker".to_string(), 1884));
        assert_eq!(options.client_id(), "amr2mqtt");
        /* password missing, stay anonymous */
        assert!(options.credentials().is_none());

        config.pass = "secret".to_string();
        let options = options_from_config(&config);
        assert!(options.credentials().is_some());
    }

    #[tokio::test]
    async fn test_thread_exits_when_senders_gone() {
        let config = Config::from_yaml("mqtt:\n  host: 127.0.0.1\n  port: 1\n").unwrap().mqtt;
        let (mut manager, tx) = MqttManager::new(&config);
        drop(tx);
        manager.start_thread().await;
        assert!(manager.exit_thread);
    }

    #[tokio::test]
    async fn test_unreachable_broker_drops_readings() {
        let config = Config::from_yaml("mqtt:\n  host: 127.0.0.1\n  port: 1\n").unwrap().mqtt;
        let (mut manager, tx) = MqttManager::new(&config);
        let worker = tokio::spawn(async move {
            manager.start_thread().await;
            manager
        });

        /* More than every queue on the way can hold, none of the sends may block */
        for n in 0..300 {
            let data = PublishData { topic: format!("amr/{n}"), payload: "{}".to_string(), qos: 1, retain: false };
            let sent = tokio::time::timeout(Duration::from_millis(200), tx.send(data)).await;
            assert!(matches!(sent, Ok(Ok(()))), "send {n} blocked");
        }
        drop(tx);

        let manager = worker.await.unwrap();
        assert_eq!(manager.dropped(), 300);
    }
}
