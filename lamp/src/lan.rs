//! Govee LAN driver (UDP).
//!
//! Discovery multicasts a scan to 239.255.255.250:4001 and listens on 4002;
//! commands go to the device on 4003; `devStatus` replies come back on 4002.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::UdpSocket;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::error::{LampError, LampResult};
use crate::protocol;
use crate::{DeviceStatus, LampDriver, Rgb};

pub const MULTICAST_ADDR: Ipv4Addr = Ipv4Addr::new(239, 255, 255, 250);
pub const SCAN_PORT: u16 = 4001;
pub const LISTEN_PORT: u16 = 4002;
pub const CONTROL_PORT: u16 = 4003;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy)]
pub struct LanPorts {
    pub scan: SocketAddr,
    pub listen: u16,
    pub control: u16,
}

impl Default for LanPorts {
    fn default() -> Self {
        Self {
            scan: SocketAddr::new(IpAddr::V4(MULTICAST_ADDR), SCAN_PORT),
            listen: LISTEN_PORT,
            control: CONTROL_PORT,
        }
    }
}

pub struct GoveeLan {
    mac: String,
    ip: Mutex<Option<IpAddr>>,
    ports: LanPorts,
    timeout: Duration,
}

impl GoveeLan {
    /// `ip` skips discovery when the device address is already known.
    pub fn new(mac: impl Into<String>, ip: Option<IpAddr>) -> Self {
        Self {
            mac: mac.into(),
            ip: Mutex::new(ip),
            ports: LanPorts::default(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_ports(mut self, ports: LanPorts) -> Self {
        self.ports = ports;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn listen_socket(&self) -> LampResult<UdpSocket> {
        Ok(UdpSocket::bind((Ipv4Addr::UNSPECIFIED, self.ports.listen)).await?)
    }

    async fn device_ip(&self) -> LampResult<IpAddr> {
        let mut cached = self.ip.lock().await;
        if let Some(ip) = *cached {
            return Ok(ip);
        }
        let ip = self.discover().await?;
        tracing::info!(%ip, mac = %self.mac, "Discovered Govee device");
        *cached = Some(ip);
        Ok(ip)
    }

    #[tracing::instrument(level = "debug", skip(self), fields(mac = %self.mac))]
    async fn discover(&self) -> LampResult<IpAddr> {
        let socket = self.listen_socket().await?;
        socket.send_to(&protocol::scan_request(), self.ports.scan).await?;

        let deadline = Instant::now() + self.timeout;
        let mut buf = [0u8; 2048];
        loop {
            let (len, _) = tokio::time::timeout_at(deadline, socket.recv_from(&mut buf))
                .await
                .map_err(|_| LampError::DeviceNotFound(self.mac.clone()))??;
            match protocol::parse_scan_reply(&buf[..len]) {
                Ok(reply) if reply.matches_mac(&self.mac) => {
                    return reply
                        .ip
                        .parse()
                        .map_err(|_| LampError::Protocol(format!("bad device ip '{}'", reply.ip)));
                }
                Ok(reply) => tracing::debug!(device = %reply.device, "Ignoring other Govee device"),
                Err(e) => tracing::debug!(error = %e, "Ignoring non-scan datagram"),
            }
        }
    }

    async fn send(&self, payload: &[u8]) -> LampResult<()> {
        let ip = self.device_ip().await?;
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await?;
        socket
            .send_to(payload, SocketAddr::new(ip, self.ports.control))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl LampDriver for GoveeLan {
    fn name(&self) -> &'static str {
        "govee-lan"
    }

    async fn set_color(&self, color: Rgb) -> LampResult<()> {
        tracing::debug!(%color, "LAN colorwc");
        self.send(&protocol::color_request(color)).await
    }

    async fn set_brightness(&self, brightness: u8) -> LampResult<()> {
        tracing::debug!(brightness, "LAN brightness");
        self.send(&protocol::brightness_request(brightness)).await
    }

    async fn set_power(&self, on: bool) -> LampResult<()> {
        tracing::debug!(on, "LAN turn");
        self.send(&protocol::turn_request(on)).await
    }

    async fn query_state(&self) -> LampResult<Option<DeviceStatus>> {
        let ip = self.device_ip().await?;
        let listener = self.listen_socket().await?;
        listener
            .send_to(
                &protocol::status_request(),
                SocketAddr::new(ip, self.ports.control),
            )
            .await?;

        let deadline = Instant::now() + self.timeout;
        let mut buf = [0u8; 2048];
        loop {
            let (len, from) = tokio::time::timeout_at(deadline, listener.recv_from(&mut buf))
                .await
                .map_err(|_| LampError::Timeout(self.timeout))??;
            if from.ip() != ip {
                continue;
            }
            match protocol::parse_status_reply(&buf[..len]) {
                Ok(status) => return Ok(status),
                Err(e) => tracing::debug!(error = %e, "Ignoring unexpected LAN reply"),
            }
        }
    }
}
