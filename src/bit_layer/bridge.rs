//! Forwards low levels between two bus segments.

use std::cmp;

use super::pin::{Drive, LineState, Pins};
use super::synchronizer::BusSynchronizer;
use super::Error;

/// Shortest timeout that outlasts the bridge's own echo through the
/// synchronizers.
pub const MIN_BRIDGE_CYCLES: u16 = 4;
pub const DEFAULT_BRIDGE_CYCLES: u16 = 16;

/// Clock divider at which a bit outlasts the round trip through both
/// segments' synchronizers and a direction handoff, whatever the timeout.
pub const BRIDGE_SETTLED_DIVIDER: u16 = 7;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Ticks to wait for the far segment to come back high once the origin
    /// has released.
    pub max_cycles: u16,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        BridgeConfig {
            max_cycles: DEFAULT_BRIDGE_CYCLES,
        }
    }
}

impl BridgeConfig {
    pub fn new(max_cycles: u16) -> Result<Self, Error> {
        if max_cycles < MIN_BRIDGE_CYCLES {
            return Err(Error::InvalidBridgeTimeout(max_cycles));
        }
        Ok(BridgeConfig { max_cycles })
    }

    /// Smallest master clock divider whose bits still arrive intact on the
    /// far segment. When the data direction turns around the bridge can
    /// hold the old side for up to `max_cycles` ticks, so short timeouts
    /// allow faster clocks.
    pub fn min_clock_divider(&self) -> u16 {
        let half_timeout = (u32::from(self.max_cycles) + 1) / 2;
        cmp::min(half_timeout + 2, u32::from(BRIDGE_SETTLED_DIVIDER)) as u16
    }

    /// Rejects a master clock too fast to cross this bridge.
    pub fn check_clock_divider(&self, clock_divider: u16) -> Result<(), Error> {
        let min_clock_divider = self.min_clock_divider();
        if clock_divider < min_clock_divider {
            return Err(Error::InvalidBridgedDivider {
                clock_divider,
                min_clock_divider,
            });
        }
        Ok(())
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BridgeState {
    Idle,
    /// Segment A pulls data low, mirrored onto B.
    DriveA,
    /// Segment B pulls data low, mirrored onto A.
    DriveB,
}

pub struct BusBridge {
    config: BridgeConfig,
    state: BridgeState,
    a: BusSynchronizer,
    b: BusSynchronizer,
    cycles: u16,
    pins_a: Pins,
    pins_b: Pins,
}

impl BusBridge {
    pub fn new(config: BridgeConfig) -> Self {
        BusBridge {
            config,
            state: BridgeState::Idle,
            a: BusSynchronizer::default(),
            b: BusSynchronizer::default(),
            cycles: 0,
            pins_a: Pins::default(),
            pins_b: Pins::default(),
        }
    }

    pub fn state(&self) -> BridgeState {
        self.state
    }

    pub fn pins_a(&self) -> Pins {
        self.pins_a
    }

    pub fn pins_b(&self) -> Pins {
        self.pins_b
    }

    pub fn tick(&mut self, a: LineState, b: LineState) {
        self.a.sample(a.sda, a.scl);
        self.b.sample(b.sda, b.scl);

        let a_high = self.a.sda.value();
        let b_high = self.b.sda.value();

        let state = self.state;
        let next = match state {
            BridgeState::Idle if !a_high => BridgeState::DriveA,
            BridgeState::Idle if !b_high => BridgeState::DriveB,
            BridgeState::Idle => BridgeState::Idle,
            BridgeState::DriveA => self.hold_or_release(a_high, b_high),
            BridgeState::DriveB => self.hold_or_release(b_high, a_high),
        };

        if next != self.state {
            trace!("Bridge {:?} -> {:?}", self.state, next);
            self.state = next;
            self.cycles = 0;
        }

        self.pins_b.sda = match self.state {
            BridgeState::DriveA if !a_high => Drive::Low,
            _ => Drive::Release,
        };
        self.pins_a.sda = match self.state {
            BridgeState::DriveB if !b_high => Drive::Low,
            _ => Drive::Release,
        };
        self.pins_b.scl = if self.a.scl.value() {
            Drive::Release
        } else {
            Drive::Low
        };
    }

    fn hold_or_release(&mut self, origin_high: bool, far_high: bool) -> BridgeState {
        if !origin_high {
            self.cycles = 0;
            return self.state;
        }

        self.cycles = self.cycles.saturating_add(1);
        if far_high || self.cycles >= self.config.max_cycles {
            if !far_high {
                debug!("Bridge gave up waiting for the far segment after {} ticks", self.cycles);
            }
            BridgeState::Idle
        } else {
            self.state
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(sda: bool) -> LineState {
        LineState { sda, scl: true }
    }

    #[test]
    fn test_rejects_short_timeout() {
        assert_eq!(BridgeConfig::new(3), Err(Error::InvalidBridgeTimeout(3)));
        assert!(BridgeConfig::new(4).is_ok());
    }

    #[test]
    fn test_min_clock_divider() {
        assert_eq!(BridgeConfig::new(4).unwrap().min_clock_divider(), 4);
        assert_eq!(BridgeConfig::new(8).unwrap().min_clock_divider(), 6);
        assert_eq!(BridgeConfig::new(9).unwrap().min_clock_divider(), 7);
        assert_eq!(BridgeConfig::new(5).unwrap().min_clock_divider(), 5);
        assert_eq!(BridgeConfig::default().min_clock_divider(), 7);
        assert_eq!(BridgeConfig::new(u16::max_value()).unwrap().min_clock_divider(), 7);

        let config = BridgeConfig::default();
        assert_eq!(
            config.check_clock_divider(6),
            Err(Error::InvalidBridgedDivider {
                clock_divider: 6,
                min_clock_divider: 7
            })
        );
        assert!(config.check_clock_divider(7).is_ok());
    }

    #[test]
    fn test_idle_forwards_nothing() {
        let mut bridge = BusBridge::new(BridgeConfig::default());
        for _ in 0..10 {
            bridge.tick(lines(true), lines(true));
        }
        assert_eq!(bridge.state(), BridgeState::Idle);
        assert_eq!(bridge.pins_a(), Pins::default());
        assert_eq!(bridge.pins_b(), Pins::default());
    }

    #[test]
    fn test_a_low_is_mirrored_onto_b() {
        let mut bridge = BusBridge::new(BridgeConfig::default());
        bridge.tick(lines(false), lines(true));
        bridge.tick(lines(false), lines(true));
        assert_eq!(bridge.state(), BridgeState::DriveA);
        assert_eq!(bridge.pins_b().sda, Drive::Low);
        assert_eq!(bridge.pins_a().sda, Drive::Release);
    }

    #[test]
    fn test_b_low_is_mirrored_onto_a() {
        let mut bridge = BusBridge::new(BridgeConfig::default());
        bridge.tick(lines(true), lines(false));
        bridge.tick(lines(true), lines(false));
        assert_eq!(bridge.state(), BridgeState::DriveB);
        assert_eq!(bridge.pins_a().sda, Drive::Low);
    }

    #[test]
    fn test_a_wins_tie() {
        let mut bridge = BusBridge::new(BridgeConfig::default());
        bridge.tick(lines(false), lines(false));
        bridge.tick(lines(false), lines(false));
        assert_eq!(bridge.state(), BridgeState::DriveA);
    }

    #[test]
    fn test_timeout_when_far_side_stuck() {
        let mut bridge = BusBridge::new(BridgeConfig::new(8).unwrap());
        bridge.tick(lines(false), lines(true));
        bridge.tick(lines(false), lines(true));
        assert_eq!(bridge.state(), BridgeState::DriveA);

        // A released, B held low by someone else
        let mut ticks = 0;
        while bridge.state() == BridgeState::DriveA {
            bridge.tick(lines(true), lines(false));
            ticks += 1;
            assert!(ticks <= 12);
        }
        assert_eq!(bridge.pins_b().sda, Drive::Release);
    }

    #[test]
    fn test_clock_forwarded_low_dominant() {
        let mut bridge = BusBridge::new(BridgeConfig::default());
        let low_clock = LineState { sda: true, scl: false };
        bridge.tick(low_clock, lines(true));
        bridge.tick(low_clock, lines(true));
        assert_eq!(bridge.pins_b().scl, Drive::Low);
        assert_eq!(bridge.pins_a().scl, Drive::Release);

        bridge.tick(lines(true), lines(true));
        bridge.tick(lines(true), lines(true));
        assert_eq!(bridge.pins_b().scl, Drive::Release);
    }
}
