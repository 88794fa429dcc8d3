/// Two-stage sampler for one asynchronous bus line.
///
/// `value` lags the raw line by two ticks; the edge flags compare it with
/// the sample one tick older still.
#[derive(Copy, Clone, Debug)]
pub struct Synchronizer {
    first: bool,
    second: bool,
    previous: bool,
}

impl Default for Synchronizer {
    fn default() -> Self {
        Synchronizer::new(true)
    }
}

impl Synchronizer {
    pub fn new(level: bool) -> Self {
        Synchronizer {
            first: level,
            second: level,
            previous: level,
        }
    }

    pub fn sample(&mut self, raw: bool) {
        self.previous = self.second;
        self.second = self.first;
        self.first = raw;
    }

    pub fn value(&self) -> bool {
        self.second
    }

    pub fn previous(&self) -> bool {
        self.previous
    }

    pub fn rising(&self) -> bool {
        self.second && !self.previous
    }

    pub fn falling(&self) -> bool {
        !self.second && self.previous
    }
}

/// Synchronizers for both lines plus the START/STOP decisions built on them.
#[derive(Copy, Clone, Debug, Default)]
pub struct BusSynchronizer {
    pub sda: Synchronizer,
    pub scl: Synchronizer,
}

impl BusSynchronizer {
    pub fn sample(&mut self, sda: bool, scl: bool) {
        self.sda.sample(sda);
        self.scl.sample(scl);
    }

    fn scl_stable_high(&self) -> bool {
        self.scl.value() && self.scl.previous()
    }

    /// Data falls while the clock stays high.
    pub fn start(&self) -> bool {
        self.scl_stable_high() && self.sda.falling()
    }

    /// Data rises while the clock stays high.
    pub fn stop(&self) -> bool {
        self.scl_stable_high() && self.sda.rising()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_tick_delay() {
        let mut sync = Synchronizer::new(true);
        sync.sample(false);
        assert!(sync.value());
        assert!(!sync.falling());
        sync.sample(false);
        assert!(!sync.value());
        assert!(sync.falling());
        sync.sample(false);
        assert!(!sync.falling());
        sync.sample(true);
        sync.sample(true);
        assert!(sync.rising());
        sync.sample(true);
        assert!(!sync.rising());
    }

    #[test]
    fn test_single_tick_glitch_still_seen_once() {
        let mut sync = Synchronizer::new(true);
        sync.sample(false);
        sync.sample(true);
        assert!(sync.falling());
        sync.sample(true);
        assert!(sync.rising());
    }

    #[test]
    fn test_start_and_stop() {
        let mut bus = BusSynchronizer::default();
        bus.sample(false, true);
        bus.sample(false, true);
        assert!(bus.start());
        assert!(!bus.stop());

        bus.sample(true, true);
        bus.sample(true, true);
        assert!(bus.stop());
    }

    #[test]
    fn test_data_change_with_clock_fall_is_not_a_condition() {
        let mut bus = BusSynchronizer::default();
        bus.sample(false, false);
        bus.sample(false, false);
        assert!(!bus.start());
        assert!(bus.scl.falling());
    }
}
