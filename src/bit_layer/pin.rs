use std::fmt;

impl fmt::Display for PinType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match *self {
            PinType::Sda => "sda",
            PinType::Scl => "scl",
        })
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PinType {
    Sda,
    Scl,
}

/// What an agent does with one line during a tick.
///
/// Open-drain agents only ever `Release` or pull `Low`. `High` is reserved
/// for the driven (push-pull) mode, which is only sound point-to-point.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Drive {
    Release,
    Low,
    High,
}

impl Default for Drive {
    fn default() -> Self {
        Drive::Release
    }
}

impl Drive {
    /// Drive for a wanted level: low is always pulled, high is released
    /// unless the agent runs in driven mode.
    pub fn level(high: bool, open_drain: bool) -> Self {
        match (high, open_drain) {
            (false, _) => Drive::Low,
            (true, true) => Drive::Release,
            (true, false) => Drive::High,
        }
    }

    pub fn is_low(self) -> bool {
        self == Drive::Low
    }

    pub fn is_high(self) -> bool {
        self == Drive::High
    }
}

impl From<Option<bool>> for Drive {
    fn from(value: Option<bool>) -> Self {
        match value {
            None => Drive::Release,
            Some(false) => Drive::Low,
            Some(true) => Drive::High,
        }
    }
}

impl From<Drive> for Option<bool> {
    fn from(drive: Drive) -> Self {
        match drive {
            Drive::Release => None,
            Drive::Low => Some(false),
            Drive::High => Some(true),
        }
    }
}

/// Drives of one agent for both lines.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Pins {
    pub sda: Drive,
    pub scl: Drive,
}

impl Pins {
    pub fn get(&self, pin: PinType) -> Drive {
        match pin {
            PinType::Sda => self.sda,
            PinType::Scl => self.scl,
        }
    }
}

/// Resolved level of both lines as seen by every agent on a segment.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct LineState {
    pub sda: bool,
    pub scl: bool,
}

impl Default for LineState {
    fn default() -> Self {
        LineState { sda: true, scl: true }
    }
}

/// Wired-AND resolution: any pull low wins, otherwise the pull-up holds the
/// line high.
pub fn resolve<I>(drives: I) -> bool
where
    I: IntoIterator<Item = Drive>,
{
    drives.into_iter().all(|drive| !drive.is_low())
}
