use amr2mqtt::{rtlamr::{forward_lines, RtlamrSupervisor}, AmrManager, Config, MqttManager, Registry};
use log::{error, info, warn};


#[tokio::main]
async fn main() -> std::io::Result<()> {
    // Initialize logging
    let default_filter = std::env::var("AMR2MQTT_LOG_LEVEL").unwrap_or("info".to_string());
    env_logger::init_from_env(env_logger::Env::new().default_filter_or(default_filter));

    let config_path = std::env::args().nth(1);
    let config = match Config::load(config_path.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            error!("{e}");
            std::process::exit(1);
        }
    };

    let registry = Registry::from_config(&config);
    let msg_types = registry.msg_types_arg();

    let (mut mqtt, publish_sender) = MqttManager::new(&config.mqtt);
    let (line_sender, line_receiver) = tokio::sync::mpsc::channel(100);
    let mut amr = AmrManager::new(publish_sender, registry, &config);

    let mut supervisor = RtlamrSupervisor::new(config.rtlamr.clone());
    if config.rtlamr.enabled {
        if let Err(e) = supervisor.start(&msg_types, line_sender).await {
            error!("{e}");
            supervisor.stop().await;
            std::process::exit(1);
        }
    } else {
        info!("Reading rtlamr output for message types {msg_types} from stdin");
        tokio::spawn(async move { forward_lines(tokio::io::stdin(), line_sender, "stdin").await });
    }

    let mut mqtt_thread = tokio::spawn(async move {
        mqtt.start_thread().await;
    });
    let mut amr_thread = tokio::spawn(async move {
        amr.start_thread(line_receiver).await;
    });

    info!("All modules started, now waiting for a signal to exit");
    tokio::select! {
        _ = shutdown_signal() => info!("Signal received, shutting down"),
        _ = &mut amr_thread => info!("AMR thread finished, shutting down"),
        _ = &mut mqtt_thread => error!("MQTT thread finished, shutting down"),
    }

    amr_thread.abort();
    mqtt_thread.abort();

    supervisor.stop().await;

    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
                return;
            }
            Err(e) => warn!("Unable to listen for SIGTERM: {e}"),
        }
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Unable to listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
}
