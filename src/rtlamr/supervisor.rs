use super::forward_lines;
use crate::config::RtlamrConfig;
use log::{error, info};
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::{Child, Command};
use tokio::sync::mpsc::Sender;

#[derive(Error, Debug)]
pub enum SupervisorError {
    #[error("Unable to start {0}: {1}")]
    Spawn(String, std::io::Error),
    #[error("{0} has no output pipe")]
    NoPipe(String),
}

/// Owns the rtl_tcp and rtlamr child processes
pub struct RtlamrSupervisor {
    config: RtlamrConfig,
    rtl_tcp: Option<Child>,
    rtlamr: Option<Child>,
}

impl RtlamrSupervisor {
    pub fn new(config: RtlamrConfig) -> Self {
        Self { config, rtl_tcp: None, rtlamr: None }
    }

    pub fn rtlamr_args(&self, msg_types: &str) -> Vec<String> {
        let mut args = vec![
            format!("-centerfreq={}", self.config.centerfreq),
            format!("-msgtype={msg_types}"),
            "-format=json".to_string(),
        ];
        args.extend(self.config.extra_args.iter().cloned());
        args
    }

    /// Start rtl_tcp, give it time to open the dongle, then start rtlamr.
    /// stdout and stderr of rtlamr both end up in `sender`.
    pub async fn start(&mut self, msg_types: &str, sender: Sender<String>) -> Result<(), SupervisorError> {
        let rtl_tcp = Command::new(&self.config.rtl_tcp)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SupervisorError::Spawn(self.config.rtl_tcp.clone(), e))?;
        info!("{} started with PID {:?}", self.config.rtl_tcp, rtl_tcp.id());
        self.rtl_tcp = Some(rtl_tcp);

        tokio::time::sleep(Duration::from_secs(self.config.startup_delay)).await;

        let args = self.rtlamr_args(msg_types);
        info!("Starting {} {}", self.config.rtlamr, args.join(" "));
        let mut rtlamr = Command::new(&self.config.rtlamr)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SupervisorError::Spawn(self.config.rtlamr.clone(), e))?;

        let stdout = rtlamr.stdout.take().ok_or_else(|| SupervisorError::NoPipe("rtlamr stdout".to_string()))?;
        let stderr = rtlamr.stderr.take().ok_or_else(|| SupervisorError::NoPipe("rtlamr stderr".to_string()))?;
        let stderr_sender = sender.clone();
        tokio::spawn(async move { forward_lines(stdout, sender, "rtlamr stdout").await });
        tokio::spawn(async move { forward_lines(stderr, stderr_sender, "rtlamr stderr").await });

        self.rtlamr = Some(rtlamr);
        Ok(())
    }

    /// Kill both children and reap them, errors are only logged
    pub async fn stop(&mut self) {
        for (name, child) in [("rtlamr", self.rtlamr.take()), ("rtl_tcp", self.rtl_tcp.take())] {
            if let Some(mut child) = child {
                match child.kill().await {
                    Ok(_) => info!("{name} stopped"),
                    Err(e) => error!("Stopping {name} failed: {e}"),
                }
            }
        }
    }
}
