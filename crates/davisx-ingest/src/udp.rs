//! UDP driver: receives receiver lines forwarded over the network
//!
//! A datagram may carry several newline separated frames; they are queued
//! and returned one at a time.

use crate::{clean_line, IngestError, IngestResult, StationDriver};
use std::collections::VecDeque;
use std::net::SocketAddr;
use tokio::{
    net::UdpSocket,
    time::{timeout, Duration},
};

pub struct UdpFrameDriver {
    bind: SocketAddr,
    socket: Option<UdpSocket>,
    pending: VecDeque<String>,
    recv_timeout: Duration,
}

impl UdpFrameDriver {
    pub fn new(bind: SocketAddr) -> Self {
        Self {
            bind,
            socket: None,
            pending: VecDeque::new(),
            recv_timeout: Duration::from_secs(5),
        }
    }

    pub fn with_timeout(mut self, recv_timeout: Duration) -> Self {
        self.recv_timeout = recv_timeout;
        self
    }

    /// Bound address once started
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.socket.as_ref().and_then(|s| s.local_addr().ok())
    }
}

#[async_trait::async_trait]
impl StationDriver for UdpFrameDriver {
    fn name(&self) -> &str {
        "udp"
    }

    async fn start(&mut self) -> IngestResult<()> {
        if self.socket.is_some() {
            return Err(IngestError::DriverError("already started".into()));
        }
        let sock = UdpSocket::bind(self.bind).await?;
        tracing::info!("UDP driver listening on {}", sock.local_addr()?);
        self.socket = Some(sock);
        Ok(())
    }

    async fn stop(&mut self) -> IngestResult<()> {
        self.socket = None;
        self.pending.clear();
        Ok(())
    }

    async fn get_frame(&mut self) -> IngestResult<String> {
        let sock = self
            .socket
            .as_ref()
            .ok_or_else(|| IngestError::DriverError("not active".into()))?;

        let mut buf = vec![0u8; 2048];
        while self.pending.is_empty() {
            let (n, _peer) = timeout(self.recv_timeout, sock.recv_from(&mut buf))
                .await
                .map_err(|_| IngestError::Timeout)??;
            let text = String::from_utf8_lossy(&buf[..n]);
            self.pending
                .extend(text.lines().filter_map(clean_line).map(str::to_string));
        }

        self.pending.pop_front().ok_or(IngestError::Timeout)
    }

    fn is_active(&self) -> bool {
        self.socket.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[tokio::test]
    async fn test_udp_lines() {
        let bind = SocketAddr::from_str("127.0.0.1:0").unwrap();
        let mut driver = UdpFrameDriver::new(bind);
        driver.start().await.unwrap();
        let local = driver.local_addr().unwrap();

        let sock = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let datagram = "0 FFC0 80 3 80 0B 40 0 0 0 0 0\r\n\r\n0 FFC0 A0 3 80 5C 10 0 0 0 0 0\n";
        sock.send_to(datagram.as_bytes(), local).await.unwrap();

        assert_eq!(driver.get_frame().await.unwrap(), "0 FFC0 80 3 80 0B 40 0 0 0 0 0");
        assert_eq!(driver.get_frame().await.unwrap(), "0 FFC0 A0 3 80 5C 10 0 0 0 0 0");

        driver.stop().await.unwrap();
        assert!(!driver.is_active());
    }

    #[tokio::test]
    async fn test_timeout_when_idle() {
        let bind = SocketAddr::from_str("127.0.0.1:0").unwrap();
        let mut driver = UdpFrameDriver::new(bind).with_timeout(Duration::from_millis(20));
        driver.start().await.unwrap();
        assert!(matches!(driver.get_frame().await, Err(IngestError::Timeout)));
    }
}
