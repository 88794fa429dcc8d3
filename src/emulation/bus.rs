//! Emulated wiring between engines.
//!
//! Each step resolves every segment from the drives the agents registered
//! on the previous tick, then ticks all agents with the resolved levels.

use std::iter;

use super::Device;
use crate::bit_layer::{
    resolve, BridgeConfig, BusBridge, Drive, Error, I2cMaster, LineState, PinType, Pins,
    RegisterFile, SlaveEvent, TransferConfig,
};

/// Outcome of one blocking master call.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Completion {
    pub data: u32,
    pub status: u32,
    /// Ticks from acceptance to the done pulse.
    pub ticks: u64,
}

/// Tick budget generous enough for the longest read at `config`'s divider.
pub fn default_watchdog(config: &TransferConfig) -> u64 {
    1024 * (u64::from(config.clock_divider) + 4) + 10_000
}

/// Resolves one segment. The second value tells whether more than one agent
/// drove a line high in this tick.
pub fn resolve_segment<I>(pins: I) -> (LineState, bool)
where
    I: IntoIterator<Item = Pins>,
{
    let pins: Vec<Pins> = pins.into_iter().collect();
    let mut conflict = false;

    for pin in &[PinType::Sda, PinType::Scl] {
        let high_drivers = pins.iter().filter(|p| p.get(*pin).is_high()).count();
        if high_drivers > 1 {
            warn!("{} agents drive {} high at once", high_drivers, pin);
            conflict = true;
        }
    }

    let lines = LineState {
        sda: resolve(pins.iter().map(|p| p.sda)),
        scl: resolve(pins.iter().map(|p| p.scl)),
    };

    (lines, conflict)
}

/// A master plus blocking helpers that step the whole emulation until the
/// master reports done.
pub trait Emulation {
    fn step(&mut self);

    fn master(&self) -> &I2cMaster;

    fn master_mut(&mut self) -> &mut I2cMaster;

    fn ticks(&self) -> u64;

    fn watchdog(&self) -> u64;

    fn run(&mut self, ticks: u64) {
        for _ in 0..ticks {
            self.step();
        }
    }

    fn run_until_done(&mut self) -> Result<Completion, Error> {
        let started = self.ticks();
        let budget = self.watchdog();

        loop {
            self.step();
            let elapsed = self.ticks() - started;

            if self.master().done() {
                return Ok(Completion {
                    data: self.master().read_data(),
                    status: self.master().status(),
                    ticks: elapsed,
                });
            }

            if elapsed >= budget {
                error!(
                    "Watchdog expired after {} ticks in {:?}",
                    elapsed,
                    self.master().state()
                );
                return Err(Error::BusStuck { ticks: elapsed });
            }
        }
    }

    fn write(&mut self, chip_address: u8, register: u32, data: u32) -> Result<Completion, Error> {
        self.master_mut().write(chip_address, register, data)?;
        self.run_until_done()
    }

    fn write_continue(&mut self, data: u32) -> Result<Completion, Error> {
        self.master_mut().write_continue(data)?;
        self.run_until_done()
    }

    fn read(&mut self, chip_address: u8, register: u32) -> Result<Completion, Error> {
        self.master_mut().read(chip_address, register)?;
        self.run_until_done()
    }

    fn read_continue(&mut self) -> Result<Completion, Error> {
        self.master_mut().read_continue()?;
        self.run_until_done()
    }

    fn stop(&mut self) -> Result<Completion, Error> {
        self.master_mut().stop()?;
        self.run_until_done()
    }
}

/// Master and devices sharing one segment.
pub struct Link<R>
where
    R: RegisterFile,
{
    master: I2cMaster,
    devices: Vec<Device<R>>,
    lines: LineState,
    ticks: u64,
    watchdog: u64,
    stretch: u64,
    high_conflicts: u64,
    events: Vec<(usize, SlaveEvent)>,
}

impl<R> Link<R>
where
    R: RegisterFile,
{
    pub fn new(config: TransferConfig) -> Self {
        Link {
            master: I2cMaster::new(config),
            devices: Vec::new(),
            lines: LineState::default(),
            ticks: 0,
            watchdog: default_watchdog(&config),
            stretch: 0,
            high_conflicts: 0,
            events: Vec::new(),
        }
    }

    /// Attaches a device and returns its index.
    pub fn attach(&mut self, config: TransferConfig, registers: R) -> usize {
        self.devices.push(Device::new(config, registers));
        self.devices.len() - 1
    }

    pub fn device(&self, index: usize) -> &Device<R> {
        &self.devices[index]
    }

    pub fn device_mut(&mut self, index: usize) -> &mut Device<R> {
        &mut self.devices[index]
    }

    pub fn lines(&self) -> LineState {
        self.lines
    }

    /// Slave events in order, tagged with the device index.
    pub fn events(&self) -> &[(usize, SlaveEvent)] {
        &self.events
    }

    pub fn clear_events(&mut self) {
        self.events.clear();
    }

    /// Ticks in which more than one agent drove a line high.
    pub fn high_conflicts(&self) -> u64 {
        self.high_conflicts
    }

    pub fn set_watchdog(&mut self, ticks: u64) {
        self.watchdog = ticks;
    }

    /// Lets an outside peripheral hold the clock low for `ticks` ticks.
    pub fn hold_scl_low(&mut self, ticks: u64) {
        self.stretch = ticks;
    }
}

impl<R> Emulation for Link<R>
where
    R: RegisterFile,
{
    fn step(&mut self) {
        let stretch = if self.stretch > 0 {
            self.stretch -= 1;
            Drive::Low
        } else {
            Drive::Release
        };
        let outside = Pins {
            sda: Drive::Release,
            scl: stretch,
        };

        let pins = iter::once(self.master.pins())
            .chain(iter::once(outside))
            .chain(self.devices.iter().map(Device::pins));
        let (lines, conflict) = resolve_segment(pins);
        if conflict {
            self.high_conflicts += 1;
        }
        self.lines = lines;

        self.master.tick(lines);
        for (index, device) in self.devices.iter_mut().enumerate() {
            if let Some(event) = device.tick(lines) {
                self.events.push((index, event));
            }
        }

        self.ticks += 1;
    }

    fn master(&self) -> &I2cMaster {
        &self.master
    }

    fn master_mut(&mut self) -> &mut I2cMaster {
        &mut self.master
    }

    fn ticks(&self) -> u64 {
        self.ticks
    }

    fn watchdog(&self) -> u64 {
        self.watchdog
    }
}

/// Master on segment A, devices on segment B, joined by a bridge.
pub struct BridgedLink<R>
where
    R: RegisterFile,
{
    master: I2cMaster,
    bridge: BusBridge,
    devices: Vec<Device<R>>,
    lines_a: LineState,
    lines_b: LineState,
    ticks: u64,
    watchdog: u64,
    high_conflicts: u64,
    events: Vec<(usize, SlaveEvent)>,
}

impl<R> BridgedLink<R>
where
    R: RegisterFile,
{
    /// Fails if the master's clock is too fast for `bridge`.
    pub fn new(config: TransferConfig, bridge: BridgeConfig) -> Result<Self, Error> {
        bridge.check_clock_divider(config.clock_divider)?;

        Ok(BridgedLink {
            master: I2cMaster::new(config),
            bridge: BusBridge::new(bridge),
            devices: Vec::new(),
            lines_a: LineState::default(),
            lines_b: LineState::default(),
            ticks: 0,
            watchdog: default_watchdog(&config),
            high_conflicts: 0,
            events: Vec::new(),
        })
    }

    pub fn attach(&mut self, config: TransferConfig, registers: R) -> usize {
        self.devices.push(Device::new(config, registers));
        self.devices.len() - 1
    }

    pub fn device(&self, index: usize) -> &Device<R> {
        &self.devices[index]
    }

    pub fn bridge(&self) -> &BusBridge {
        &self.bridge
    }

    pub fn lines_a(&self) -> LineState {
        self.lines_a
    }

    pub fn lines_b(&self) -> LineState {
        self.lines_b
    }

    pub fn events(&self) -> &[(usize, SlaveEvent)] {
        &self.events
    }

    pub fn clear_events(&mut self) {
        self.events.clear();
    }

    /// Ticks in which more than one agent drove a line high on either segment.
    pub fn high_conflicts(&self) -> u64 {
        self.high_conflicts
    }

    pub fn set_watchdog(&mut self, ticks: u64) {
        self.watchdog = ticks;
    }
}

impl<R> Emulation for BridgedLink<R>
where
    R: RegisterFile,
{
    fn step(&mut self) {
        let (lines_a, conflict_a) = resolve_segment(vec![self.master.pins(), self.bridge.pins_a()]);
        let pins_b = iter::once(self.bridge.pins_b()).chain(self.devices.iter().map(Device::pins));
        let (lines_b, conflict_b) = resolve_segment(pins_b);
        if conflict_a || conflict_b {
            self.high_conflicts += 1;
        }
        self.lines_a = lines_a;
        self.lines_b = lines_b;

        self.master.tick(lines_a);
        self.bridge.tick(lines_a, lines_b);
        for (index, device) in self.devices.iter_mut().enumerate() {
            if let Some(event) = device.tick(lines_b) {
                self.events.push((index, event));
            }
        }

        self.ticks += 1;
    }

    fn master(&self) -> &I2cMaster {
        &self.master
    }

    fn master_mut(&mut self) -> &mut I2cMaster {
        &mut self.master
    }

    fn ticks(&self) -> u64 {
        self.ticks
    }

    fn watchdog(&self) -> u64 {
        self.watchdog
    }
}
