//! Background TCP connect probers for the latency sources.
//!
//! Each target gets its own tokio task that times a TCP handshake every
//! probe interval and records the outcome in a shared window. The sampler
//! only reads the latest outcome through a [`ProbeHandle`], so a slow or
//! unreachable target never delays a cycle.

use std::collections::VecDeque;
use std::io::ErrorKind;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, ToSocketAddrs};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::error::SourceError;
use crate::sources::latency::ProbeResult;
use crate::sources::RawReader;

/// Rolling record of the last `capacity` probe outcomes.
#[derive(Debug, Clone)]
pub struct ProbeWindow {
    outcomes: VecDeque<Option<f64>>,
    capacity: usize,
    seq: u64,
}

impl ProbeWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            outcomes: VecDeque::with_capacity(capacity),
            capacity,
            seq: 0,
        }
    }

    /// Record one attempt: the round trip in ms, or `None` if it was lost.
    pub fn record(&mut self, rtt_ms: Option<f64>) {
        if self.outcomes.len() >= self.capacity {
            self.outcomes.pop_front();
        }
        self.outcomes.push_back(rtt_ms);
        self.seq += 1;
    }

    /// Lost attempts over attempts in the window, percent.
    pub fn loss_percent(&self) -> f64 {
        if self.outcomes.is_empty() {
            return 0.0;
        }
        let lost = self.outcomes.iter().filter(|o| o.is_none()).count();
        lost as f64 / self.outcomes.len() as f64 * 100.0
    }

    /// Outcome of the latest attempt, `None` before the first one.
    pub fn latest(&self) -> Option<ProbeResult> {
        let rtt_ms = *self.outcomes.back()?;
        Some(ProbeResult {
            seq: self.seq,
            rtt_ms,
            loss_percent: self.loss_percent(),
        })
    }
}

fn lock(window: &Mutex<ProbeWindow>) -> MutexGuard<'_, ProbeWindow> {
    // A panicking prober cannot leave the window half-written
    window.lock().unwrap_or_else(|e| e.into_inner())
}

/// Reader side of a prober. Dropping it stops the prober task.
pub struct ProbeHandle {
    label: &'static str,
    window: Arc<Mutex<ProbeWindow>>,
    task: Option<JoinHandle<()>>,
}

impl ProbeHandle {
    /// Handle over a window fed by something other than a prober task.
    pub fn detached(label: &'static str, window: Arc<Mutex<ProbeWindow>>) -> Self {
        Self {
            label,
            window,
            task: None,
        }
    }
}

impl RawReader<ProbeResult> for ProbeHandle {
    fn read(&mut self) -> Result<ProbeResult, SourceError> {
        lock(&self.window)
            .latest()
            .ok_or(SourceError::NotReady(self.label))
    }
}

impl Drop for ProbeHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ProbeSettings {
    pub interval: Duration,
    pub timeout: Duration,
    pub window: usize,
}

/// Spawn a prober task on the current tokio runtime.
pub fn spawn_prober(
    label: &'static str,
    target: SocketAddr,
    settings: ProbeSettings,
) -> ProbeHandle {
    let window = Arc::new(Mutex::new(ProbeWindow::new(settings.window)));
    let shared = Arc::clone(&window);

    info!(target_addr = %target, probe = label, "starting latency prober");
    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(settings.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let outcome = probe_once(target, settings.timeout).await;
            lock(&shared).record(outcome);
        }
    });

    ProbeHandle {
        label,
        window,
        task: Some(task),
    }
}

/// Time one TCP handshake. A refused connection still proves the host
/// answered, so it counts as a round trip.
pub async fn probe_once(target: SocketAddr, timeout: Duration) -> Option<f64> {
    let start = Instant::now();
    let result = tokio::time::timeout(timeout, TcpStream::connect(target)).await;
    let rtt_ms = start.elapsed().as_secs_f64() * 1000.0;
    match result {
        Ok(Ok(_stream)) => Some(rtt_ms),
        Ok(Err(e)) if e.kind() == ErrorKind::ConnectionRefused => Some(rtt_ms),
        Ok(Err(e)) => {
            debug!(target_addr = %target, error = %e, "probe lost");
            None
        }
        Err(_) => {
            debug!(target_addr = %target, "probe timed out");
            None
        }
    }
}

// ── Target discovery ─────────────────────────────────────────────

/// Default gateway from the contents of `/proc/net/route`.
pub fn parse_default_gateway(route: &str) -> Option<Ipv4Addr> {
    route.lines().skip(1).find_map(|line| {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.get(1) != Some(&"00000000") {
            return None;
        }
        let raw = u32::from_str_radix(fields.get(2)?, 16).ok()?;
        // Kernel prints the address in host (little-endian) byte order
        let gateway = Ipv4Addr::from(raw.to_le_bytes());
        (!gateway.is_unspecified()).then_some(gateway)
    })
}

/// First `nameserver` entry of a resolv.conf.
pub fn parse_first_nameserver(resolv: &str) -> Option<IpAddr> {
    resolv.lines().find_map(|line| {
        let mut parts = line.split_whitespace();
        if parts.next()? != "nameserver" {
            return None;
        }
        parts.next()?.parse().ok()
    })
}

pub fn default_gateway() -> Option<Ipv4Addr> {
    read_optional("/proc/net/route").and_then(|s| parse_default_gateway(&s))
}

pub fn first_nameserver() -> Option<IpAddr> {
    read_optional("/etc/resolv.conf").and_then(|s| parse_first_nameserver(&s))
}

fn read_optional(path: impl AsRef<Path>) -> Option<String> {
    std::fs::read_to_string(path).ok()
}

/// Resolve `host[:port]`, using `default_port` when none is given.
pub fn resolve_target(target: &str, default_port: u16) -> Option<SocketAddr> {
    let target = target.trim();
    if let Ok(addr) = target.parse::<SocketAddr>() {
        return Some(addr);
    }
    if let Ok(ip) = target.parse::<IpAddr>() {
        return Some(SocketAddr::new(ip, default_port));
    }
    let with_port = if target.contains(':') {
        target.to_string()
    } else {
        format!("{target}:{default_port}")
    };
    with_port.to_socket_addrs().ok()?.next()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_loss_and_latest() {
        let mut window = ProbeWindow::new(4);
        assert!(window.latest().is_none());

        window.record(Some(10.0));
        window.record(None);
        let latest = window.latest().expect("attempted");
        assert_eq!(latest.rtt_ms, None);
        assert_eq!(latest.loss_percent, 50.0);
        assert_eq!(latest.seq, 2);

        window.record(Some(12.0));
        window.record(Some(11.0));
        window.record(Some(9.0));
        // The lost attempt has scrolled out
        window.record(Some(9.5));
        assert_eq!(window.loss_percent(), 0.0);
        assert_eq!(window.latest().expect("attempted").rtt_ms, Some(9.5));
    }

    #[test]
    fn handle_without_result_is_not_ready() {
        let window = Arc::new(Mutex::new(ProbeWindow::new(20)));
        let mut handle = ProbeHandle::detached("router prober", Arc::clone(&window));
        assert!(matches!(handle.read(), Err(SourceError::NotReady("router prober"))));

        lock(&window).record(Some(3.0));
        assert_eq!(handle.read().expect("result").rtt_ms, Some(3.0));
    }

    #[test]
    fn gateway_from_route_table() {
        let route = "Iface\tDestination\tGateway \tFlags\tRefCnt\tUse\tMetric\tMask\t\tMTU\tWindow\tIRTT\n\
                     wlp2s0\t0000A8C0\t00000000\t0001\t0\t0\t600\t00FFFFFF\t0\t0\t0\n\
                     wlp2s0\t00000000\t0100A8C0\t0003\t0\t0\t600\t00000000\t0\t0\t0\n";
        assert_eq!(parse_default_gateway(route), Some(Ipv4Addr::new(192, 168, 0, 1)));
        assert_eq!(parse_default_gateway("Iface\tDestination\n"), None);
    }

    #[test]
    fn nameserver_from_resolv_conf() {
        let resolv = "# generated\nsearch lan\nnameserver 192.168.1.1\nnameserver 8.8.8.8\n";
        assert_eq!(
            parse_first_nameserver(resolv),
            Some(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 1)))
        );
        assert_eq!(parse_first_nameserver("search lan\n"), None);
    }

    #[test]
    fn resolve_literal_targets() {
        assert_eq!(
            resolve_target("1.1.1.1:443", 80),
            Some("1.1.1.1:443".parse().expect("addr"))
        );
        assert_eq!(
            resolve_target(" 10.0.0.1 ", 53),
            Some("10.0.0.1:53".parse().expect("addr"))
        );
        assert_eq!(
            resolve_target("::1", 53),
            Some("[::1]:53".parse().expect("addr"))
        );
    }

    #[tokio::test]
    async fn probe_open_port_succeeds() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        let rtt = probe_once(addr, Duration::from_secs(2)).await;
        assert!(rtt.is_some_and(|ms| ms >= 0.0));
    }

    #[tokio::test]
    async fn probe_refused_port_counts_as_reply() {
        let addr = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
            listener.local_addr().expect("addr")
        };
        assert!(probe_once(addr, Duration::from_secs(2)).await.is_some());
    }

    #[tokio::test]
    async fn spawned_prober_fills_window() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        let mut handle = spawn_prober(
            "test prober",
            addr,
            ProbeSettings {
                interval: Duration::from_millis(20),
                timeout: Duration::from_millis(500),
                window: 5,
            },
        );
        tokio::time::sleep(Duration::from_millis(200)).await;
        let result = handle.read().expect("probed");
        assert!(result.rtt_ms.is_some());
        assert_eq!(result.loss_percent, 0.0);
    }
}
