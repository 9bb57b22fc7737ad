use crate::game::constants::{PING_INTERVAL_MS, ROTATION_INTERVAL_MS};
use std::time::{Duration, Instant};

pub const PING: u8 = 251;
pub const BOOST_START: u8 = 253;
pub const BOOST_STOP: u8 = 254;

/// Heading fits in one byte: `angle · 256 / 2π`, wrapped.
pub fn heading_byte(angle: f64) -> u8 {
    let scaled = angle * 256.0 / std::f64::consts::TAU;
    (scaled.floor() as i64).rem_euclid(256) as u8
}

pub fn heading_frame(angle: f64) -> Vec<u8> {
    vec![heading_byte(angle)]
}

pub fn boost_frame(on: bool) -> Vec<u8> {
    vec![if on { BOOST_START } else { BOOST_STOP }]
}

pub fn ping_frame() -> Vec<u8> {
    vec![PING]
}

/// Allows at most one heading packet per rotation interval.
#[derive(Debug, Default)]
pub struct HeadingGate {
    last_sent: Option<Instant>,
}

impl HeadingGate {
    pub fn permit(&mut self, now: Instant) -> bool {
        let interval = Duration::from_millis(ROTATION_INTERVAL_MS);
        match self.last_sent {
            Some(last) if now.duration_since(last) < interval => false,
            _ => {
                self.last_sent = Some(now);
                true
            }
        }
    }
}

/// Boost packets are edge-triggered: only a state change produces a frame.
#[derive(Debug, Default)]
pub struct BoostEdge {
    active: bool,
}

impl BoostEdge {
    pub fn transition(&mut self, on: bool) -> Option<Vec<u8>> {
        if on == self.active {
            return None;
        }
        self.active = on;
        Some(boost_frame(on))
    }
}

/// A new ping needs both the interval elapsed and the previous ping
/// answered; sending marks the gate in-flight until the pong clears it.
#[derive(Debug)]
pub struct PingGate {
    last_ping: Option<Instant>,
    pong_received: bool,
}

impl Default for PingGate {
    fn default() -> Self {
        Self {
            last_ping: None,
            pong_received: true,
        }
    }
}

impl PingGate {
    pub fn try_send(&mut self, now: Instant) -> bool {
        if !self.pong_received {
            return false;
        }
        let interval = Duration::from_millis(PING_INTERVAL_MS);
        if let Some(last) = self.last_ping {
            if now.duration_since(last) < interval {
                return false;
            }
        }
        self.last_ping = Some(now);
        self.pong_received = false;
        true
    }

    pub fn on_pong(&mut self) {
        self.pong_received = true;
    }

    pub fn in_flight(&self) -> bool {
        !self.pong_received
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heading_round_trips_within_one_step() {
        let step = std::f64::consts::TAU / 256.0;
        let mut angle = 0.0f64;
        while angle < std::f64::consts::TAU {
            let byte = heading_byte(angle);
            let decoded = byte as f64 * step;
            assert!(
                (decoded - angle).abs() < step,
                "angle {angle} decoded as {decoded}"
            );
            angle += 0.013;
        }
    }

    #[test]
    fn heading_byte_wraps_out_of_range_angles() {
        assert_eq!(heading_byte(std::f64::consts::TAU), heading_byte(0.0));
        assert_eq!(
            heading_byte(-std::f64::consts::FRAC_PI_2),
            heading_byte(3.0 * std::f64::consts::FRAC_PI_2)
        );
    }

    #[test]
    fn heading_gate_enforces_the_rotation_interval() {
        let mut gate = HeadingGate::default();
        let start = Instant::now();
        assert!(gate.permit(start));
        assert!(!gate.permit(start + Duration::from_millis(50)));
        assert!(gate.permit(start + Duration::from_millis(100)));
    }

    #[test]
    fn boost_is_edge_triggered() {
        let mut edge = BoostEdge::default();
        assert_eq!(edge.transition(false), None);
        assert_eq!(edge.transition(true), Some(vec![BOOST_START]));
        assert_eq!(edge.transition(true), None);
        assert_eq!(edge.transition(false), Some(vec![BOOST_STOP]));
        assert_eq!(edge.transition(false), None);
    }

    #[test]
    fn ping_gate_never_has_two_in_flight() {
        let mut gate = PingGate::default();
        let start = Instant::now();
        assert!(gate.try_send(start));
        assert!(gate.in_flight());
        // Interval elapsed but the pong has not arrived.
        assert!(!gate.try_send(start + Duration::from_millis(300)));
        gate.on_pong();
        // Pong arrived but we are inside the interval of the last send.
        assert!(!gate.try_send(start + Duration::from_millis(200)));
        assert!(gate.try_send(start + Duration::from_millis(300)));
    }
}
