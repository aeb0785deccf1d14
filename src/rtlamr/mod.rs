use log::{debug, info, warn};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc::Sender;

mod supervisor;

pub use supervisor::{RtlamrSupervisor, SupervisorError};

/// Forward every line of `reader` into the pipeline's line channel until EOF
/// or until the pipeline is gone
pub async fn forward_lines<R: AsyncRead + Unpin>(reader: R, sender: Sender<String>, source: &str) {
    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if sender.send(line).await.is_err() {
                    debug!("Pipeline gone, stop reading {source}");
                    return;
                }
            }
            Ok(None) => {
                info!("{source} closed");
                return;
            }
            Err(e) => {
                warn!("Reading {source} failed: {e}");
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_forward_lines() {
        let input: &[u8] = b"first\n{\"Time\":\"t\"}\nlast";
        let (tx, mut rx) = tokio::sync::mpsc::channel(10);
        forward_lines(input, tx, "test").await;
        assert_eq!(rx.recv().await.unwrap(), "first");
        assert_eq!(rx.recv().await.unwrap(), "{\"Time\":\"t\"}");
        assert_eq!(rx.recv().await.unwrap(), "last");
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_forward_stops_without_receiver() {
        let input: &[u8] = b"a\nb\n";
        let (tx, rx) = tokio::sync::mpsc::channel(10);
        drop(rx);
        forward_lines(input, tx, "test").await;
    }
}
