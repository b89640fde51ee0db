//! Connection tips derived from a snapshot.
//!
//! Rules are evaluated in a fixed order against one snapshot, so the
//! same snapshot always yields the same tips in the same order.

use serde::Serialize;

use crate::constants::{
    HIGH_JITTER_MS, HIGH_NOISE_DBM, LOW_LINK_RATE_MBPS, UNSTABLE_LOSS_PCT, WEAK_SIGNAL_DBM,
};
use crate::models::StatsSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TipKind {
    WeakSignal,
    LowLinkRate,
    HighInterference,
    UnstableConnection,
    HighJitter,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tip {
    pub kind: TipKind,
    pub message: &'static str,
}

struct Rule {
    kind: TipKind,
    message: &'static str,
    fires: fn(&StatsSnapshot) -> bool,
}

// Radio readings of exactly 0 are "not reported" and never fire.
static RULES: [Rule; 5] = [
    Rule {
        kind: TipKind::WeakSignal,
        message: "Weak Wi-Fi signal. Move closer to your router.",
        fires: |s| s.wireless.rssi_dbm != 0.0 && s.wireless.rssi_dbm < WEAK_SIGNAL_DBM,
    },
    Rule {
        kind: TipKind::LowLinkRate,
        message: "Low link rate. Wi-Fi might be slow.",
        fires: |s| {
            s.wireless.link_rate_mbps > 0.0 && s.wireless.link_rate_mbps < LOW_LINK_RATE_MBPS
        },
    },
    Rule {
        kind: TipKind::HighInterference,
        message: "High interference (Noise). Try changing Wi-Fi channel.",
        fires: |s| s.wireless.noise_dbm != 0.0 && s.wireless.noise_dbm > HIGH_NOISE_DBM,
    },
    Rule {
        kind: TipKind::UnstableConnection,
        message: "Packet loss detected to router. Connection unstable.",
        fires: |s| s.router.loss_percent > UNSTABLE_LOSS_PCT,
    },
    Rule {
        kind: TipKind::HighJitter,
        message: "High jitter detected. Calls may be choppy.",
        fires: |s| s.router.jitter_ms > HIGH_JITTER_MS,
    },
];

/// Tips that apply to `snapshot`, in rule order.
pub fn evaluate(snapshot: &StatsSnapshot) -> Vec<Tip> {
    RULES
        .iter()
        .filter(|rule| (rule.fires)(snapshot))
        .map(|rule| Tip {
            kind: rule.kind,
            message: rule.message,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> StatsSnapshot {
        StatsSnapshot::baseline(2)
    }

    fn kinds(snap: &StatsSnapshot) -> Vec<TipKind> {
        evaluate(snap).into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn baseline_has_no_tips() {
        assert!(evaluate(&snapshot()).is_empty());
    }

    #[test]
    fn weak_signal_boundary() {
        let expected = [(-70.0, false), (-80.0, true), (-76.0, true), (-75.0, false)];
        for (rssi, fires) in expected {
            let mut snap = snapshot();
            snap.wireless.rssi_dbm = rssi;
            assert_eq!(kinds(&snap).contains(&TipKind::WeakSignal), fires, "rssi {rssi}");
        }
    }

    #[test]
    fn zero_radio_readings_never_fire() {
        let mut snap = snapshot();
        snap.wireless.rssi_dbm = 0.0;
        snap.wireless.link_rate_mbps = 0.0;
        snap.wireless.noise_dbm = 0.0;
        assert!(evaluate(&snap).is_empty());
    }

    #[test]
    fn all_rules_in_order() {
        let mut snap = snapshot();
        snap.wireless.rssi_dbm = -82.0;
        snap.wireless.link_rate_mbps = 24.0;
        snap.wireless.noise_dbm = -70.0;
        snap.router.loss_percent = 5.0;
        snap.router.jitter_ms = 80.0;
        assert_eq!(
            kinds(&snap),
            vec![
                TipKind::WeakSignal,
                TipKind::LowLinkRate,
                TipKind::HighInterference,
                TipKind::UnstableConnection,
                TipKind::HighJitter,
            ]
        );
        assert_eq!(
            evaluate(&snap)[0].message,
            "Weak Wi-Fi signal. Move closer to your router."
        );
    }

    #[test]
    fn loss_and_jitter_thresholds_are_strict() {
        let mut snap = snapshot();
        snap.router.loss_percent = 1.0;
        snap.router.jitter_ms = 50.0;
        assert!(evaluate(&snap).is_empty());

        snap.router.loss_percent = 1.5;
        assert_eq!(kinds(&snap), vec![TipKind::UnstableConnection]);
    }

    #[test]
    fn quiet_noise_floor_is_fine() {
        let mut snap = snapshot();
        snap.wireless.noise_dbm = -92.0;
        snap.wireless.link_rate_mbps = 300.0;
        assert!(evaluate(&snap).is_empty());
    }
}
