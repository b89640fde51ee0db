//! Prometheus exporter for the current snapshot.
//!
//! When enabled via `--prometheus <addr>`, a tiny HTTP server on a background
//! thread answers `GET /metrics` with the publisher's current snapshot in the
//! Prometheus text exposition format. Scrapes read the publisher directly, so
//! they never wait on the sampler.

use std::fmt::Write as _;
use std::sync::Arc;
use std::thread::JoinHandle;

use tracing::{debug, info, warn};

use crate::constants::PROM_BUFFER_CAPACITY;
use crate::models::{SourceKind, StatsSnapshot, DEFINITIONS};
use crate::publisher::SnapshotPublisher;
use crate::tips;

const PREFIX: &str = "netbar_";
const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Bind `addr` and serve scrapes on a background thread.
pub fn start_server(
    addr: &str,
    publisher: Arc<SnapshotPublisher>,
) -> Result<JoinHandle<()>, String> {
    let server = tiny_http::Server::http(addr)
        .map_err(|e| format!("failed to bind Prometheus endpoint on {addr}: {e}"))?;
    info!(addr, "serving Prometheus metrics at /metrics");

    let handle = std::thread::spawn(move || {
        for request in server.incoming_requests() {
            let (status, body) = route(request.url(), &publisher);
            debug!(url = request.url(), status, "scrape");

            let mut response = tiny_http::Response::from_string(body).with_status_code(status);
            if status == 200 {
                if let Ok(header) = tiny_http::Header::from_bytes("Content-Type", CONTENT_TYPE) {
                    response = response.with_header(header);
                }
            }
            if let Err(e) = request.respond(response) {
                warn!(error = %e, "failed to answer scrape");
            }
        }
    });

    Ok(handle)
}

/// Status code and body for a request path.
fn route(url: &str, publisher: &SnapshotPublisher) -> (u16, String) {
    let path = url.split('?').next().unwrap_or(url);
    if path == "/metrics" {
        (200, render_metrics(&publisher.current()))
    } else {
        (404, "404 Not Found\n".to_string())
    }
}

// ── Rendering ────────────────────────────────────────────────

fn write_header(out: &mut String, name: &str, help: &str, mtype: &str) {
    let _ = writeln!(out, "# HELP {PREFIX}{name} {help}");
    let _ = writeln!(out, "# TYPE {PREFIX}{name} {mtype}");
}

/// One sample line; integral values print without a fraction.
fn push_sample(out: &mut String, name: &str, label: Option<(&str, &str)>, value: f64) {
    out.push_str(PREFIX);
    out.push_str(name);
    if let Some((k, v)) = label {
        out.push('{');
        out.push_str(k);
        out.push_str("=\"");
        for ch in v.chars() {
            match ch {
                '\\' => out.push_str("\\\\"),
                '"' => out.push_str("\\\""),
                '\n' => out.push_str("\\n"),
                _ => out.push(ch),
            }
        }
        out.push_str("\"}");
    }
    out.push(' ');
    if !value.is_finite() {
        out.push_str("NaN");
    } else if value.fract() == 0.0 && value.abs() < 1e15 {
        let _ = write!(out, "{}", value as i64);
    } else {
        let _ = write!(out, "{value:.6}");
    }
    out.push('\n');
}

fn gauge(out: &mut String, name: &str, help: &str, value: f64) {
    write_header(out, name, help, "gauge");
    push_sample(out, name, None, value);
}

fn counter(out: &mut String, name: &str, help: &str, value: f64) {
    write_header(out, name, help, "counter");
    push_sample(out, name, None, value);
}

/// Render a snapshot in Prometheus text exposition format.
pub fn render_metrics(snap: &StatsSnapshot) -> String {
    let mut out = String::with_capacity(PROM_BUFFER_CAPACITY);

    for def in DEFINITIONS.iter() {
        let help = format!("{} ({})", def.help, def.unit.symbol());
        gauge(&mut out, def.name, &help, snap.value(def.id));
    }

    gauge(
        &mut out,
        "battery_charging",
        "1 while the internal battery is charging.",
        if snap.battery.charging { 1.0 } else { 0.0 },
    );
    gauge(
        &mut out,
        "battery_minutes_remaining",
        "Minutes until the battery is empty, -1 when unknown.",
        snap.battery.minutes_remaining as f64,
    );
    gauge(
        &mut out,
        "memory_used_gigabytes",
        "Used memory in GiB.",
        snap.memory.used_gb,
    );
    gauge(
        &mut out,
        "disk_free_gigabytes",
        "Free space on the root volume in GiB.",
        snap.disk.free_gb,
    );
    counter(
        &mut out,
        "net_downloaded_bytes_total",
        "Bytes received since the sampler started.",
        snap.network.total_downloaded as f64,
    );
    counter(
        &mut out,
        "net_uploaded_bytes_total",
        "Bytes sent since the sampler started.",
        snap.network.total_uploaded as f64,
    );
    gauge(
        &mut out,
        "uptime_seconds",
        "Seconds since the sampler started.",
        snap.uptime_secs as f64,
    );
    counter(
        &mut out,
        "cycles_total",
        "Completed sampling cycles.",
        snap.cycle as f64,
    );

    write_header(
        &mut out,
        "source_stale",
        "1 when the source kept its previous value this cycle.",
        "gauge",
    );
    for kind in SourceKind::ALL {
        let stale = if snap.is_stale(kind) { 1.0 } else { 0.0 };
        push_sample(&mut out, "source_stale", Some(("source", kind.name())), stale);
    }

    gauge(
        &mut out,
        "tips_active",
        "Connection tips that currently apply.",
        tips::evaluate(snap).len() as f64,
    );

    out
}
