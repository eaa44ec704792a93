//! System configuration
//!
//! The oscillator, watchdog, reset pin, brown-out and protection settings are
//! chosen from a fixed menu of presets and bundled in one immutable
//! [`SystemConfig`]. There are two ways to get one:
//!
//! - [`PRESET`], resolved at compile time from the crate's Cargo features;
//! - [`SystemConfig::builder`], validated when built.

use core::{error, fmt};

use crate::hardware::Port;

/// Pins per port handled by port initialization: bits 0..=7.
pub const DEFAULT_PORT_PINS: u16 = 0x00FF;

/// Frequencies derived from an oscillator preset.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ClockConfig {
    /// Oscillator source, before the PLL.
    pub primary_hz: u32,
    /// FOSC, after the PLL if any.
    pub system_hz: u32,
    /// FCY, one instruction every two FOSC cycles.
    pub instruction_hz: u32,
}

impl ClockConfig {
    const fn new(primary_hz: u32, system_hz: u32) -> Self {
        Self {
            primary_hz,
            system_hz,
            instruction_hz: system_hz / 2,
        }
    }
}

/// Oscillator source and PLL combination.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Oscillator {
    /// Internal 8 MHz through the PLL to 80 MHz.
    InternalPll,
    /// Internal FRC at 7.37 MHz.
    Internal,
    /// External 8 MHz crystal through the PLL to 80 MHz.
    ExternalPll,
    /// External 7.37 MHz source.
    External,
    /// Nothing selected: internal FRC at 7.37 MHz.
    Fallback,
}

impl Oscillator {
    pub const fn clock(self) -> ClockConfig {
        match self {
            Oscillator::InternalPll | Oscillator::ExternalPll => {
                ClockConfig::new(8_000_000, 80_000_000)
            }
            Oscillator::Internal | Oscillator::External | Oscillator::Fallback => {
                ClockConfig::new(7_370_000, 7_370_000)
            }
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Oscillator::InternalPll => "INTERNAL + PLL",
            Oscillator::Internal => "INTERNAL (no PLL)",
            Oscillator::ExternalPll => "EXTERNAL + PLL",
            Oscillator::External => "EXTERNAL (no PLL)",
            Oscillator::Fallback => "DEFAULT",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Watchdog {
    Off,
    /// Enabled with the normal timeout class.
    Normal,
    /// Enabled with the long timeout class.
    Long,
}

impl Watchdog {
    pub const fn label(self) -> &'static str {
        match self {
            Watchdog::Off => "OFF",
            Watchdog::Normal => "ON (normal)",
            Watchdog::Long => "ON (long)",
        }
    }
}

/// Brown-out reset trip point.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BrownOut {
    Off,
    V2_0,
    V2_7,
    V4_2,
}

impl BrownOut {
    pub const fn label(self) -> &'static str {
        match self {
            BrownOut::Off => "OFF",
            BrownOut::V2_0 => "ON (2.0V)",
            BrownOut::V2_7 => "ON (2.7V)",
            BrownOut::V4_2 => "ON (4.2V)",
        }
    }
}

/// A set of [`Port`]s.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PortSet(u8);

impl PortSet {
    pub const EMPTY: PortSet = PortSet(0);

    /// Ports bonded out on the dsPIC33FJ32MC204.
    pub const DSPIC33FJ32MC204: PortSet = PortSet::EMPTY.with(Port::A).with(Port::B).with(Port::C);

    pub const fn with(self, port: Port) -> Self {
        PortSet(self.0 | (1 << port.index()))
    }

    pub const fn contains(self, port: Port) -> bool {
        self.0 & (1 << port.index()) != 0
    }

    pub const fn is_subset_of(self, other: PortSet) -> bool {
        self.0 & !other.0 == 0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn iter(self) -> impl Iterator<Item = Port> {
        Port::ALL.into_iter().filter(move |p| self.contains(*p))
    }
}

/// Configuration errors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Two different oscillator presets were requested.
    ConflictingOscillators(Oscillator, Oscillator),
    /// A port was enabled that the device does not have.
    PortUnavailable(Port),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ConflictingOscillators(a, b) => {
                write!(f, "conflicting oscillator presets: {} and {}", a.label(), b.label())
            }
            ConfigError::PortUnavailable(port) => write!(f, "port {} is not available", port.letter()),
        }
    }
}

impl error::Error for ConfigError {}

/// Device configuration, fixed for the lifetime of the program.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SystemConfig {
    pub oscillator: Oscillator,
    pub watchdog: Watchdog,
    /// MCLR pin acts as reset.
    pub reset_pin: bool,
    pub brown_out: BrownOut,
    pub code_protect: bool,
    pub debug_pins: bool,
    pub clock_switching: bool,
    /// Ports the device has. Initialization never touches the others.
    pub available_ports: PortSet,
    /// Ports whose pins are driven as outputs.
    pub enabled_ports: PortSet,
    /// Pins of each port handled by initialization.
    pub port_pins: u16,
}

/// Configuration selected by the crate's Cargo features.
pub const PRESET: SystemConfig = SystemConfig::from_features();

impl SystemConfig {
    pub fn builder() -> SystemConfigBuilder {
        SystemConfigBuilder::new()
    }

    /// Resolve the Cargo feature selection.
    ///
    /// Categories with several features on take the first in the order the
    /// features are declared; build.rs warns about it.
    pub const fn from_features() -> Self {
        let oscillator = if cfg!(feature = "osc-internal-pll") {
            Oscillator::InternalPll
        } else if cfg!(feature = "osc-internal") {
            Oscillator::Internal
        } else if cfg!(feature = "osc-external-pll") {
            Oscillator::ExternalPll
        } else if cfg!(feature = "osc-external") {
            Oscillator::External
        } else {
            Oscillator::Fallback
        };

        let watchdog = if cfg!(feature = "wdt-normal") {
            Watchdog::Normal
        } else if cfg!(feature = "wdt-long") {
            Watchdog::Long
        } else {
            Watchdog::Off
        };

        let brown_out = if cfg!(feature = "bor-2v0") {
            BrownOut::V2_0
        } else if cfg!(feature = "bor-2v7") {
            BrownOut::V2_7
        } else if cfg!(feature = "bor-4v2") {
            BrownOut::V4_2
        } else {
            BrownOut::Off
        };

        let mut enabled_ports = PortSet::EMPTY;
        if cfg!(feature = "port-a") {
            enabled_ports = enabled_ports.with(Port::A);
        }
        if cfg!(feature = "port-b") {
            enabled_ports = enabled_ports.with(Port::B);
        }
        if cfg!(feature = "port-c") {
            enabled_ports = enabled_ports.with(Port::C);
        }
        if cfg!(feature = "port-d") {
            enabled_ports = enabled_ports.with(Port::D);
        }
        if cfg!(feature = "port-e") {
            enabled_ports = enabled_ports.with(Port::E);
        }
        if cfg!(feature = "port-f") {
            enabled_ports = enabled_ports.with(Port::F);
        }
        if cfg!(feature = "port-g") {
            enabled_ports = enabled_ports.with(Port::G);
        }

        // Features may enable ports the reference package lacks
        let available_ports = PortSet(PortSet::DSPIC33FJ32MC204.0 | enabled_ports.0);

        Self {
            oscillator,
            watchdog,
            reset_pin: !cfg!(feature = "mclr-disabled"),
            brown_out,
            code_protect: cfg!(feature = "code-protect"),
            debug_pins: cfg!(feature = "debug-pins"),
            clock_switching: cfg!(feature = "clock-switch"),
            available_ports,
            enabled_ports,
            port_pins: DEFAULT_PORT_PINS,
        }
    }

    pub const fn clock(&self) -> ClockConfig {
        self.oscillator.clock()
    }
}

/// Builder for [`SystemConfig`].
///
/// Defaults: no oscillator (resolves to [`Oscillator::Fallback`]), watchdog
/// off, MCLR enabled, brown-out off, no code protection, no debug pins, no
/// clock switching, dsPIC33FJ32MC204 ports with none enabled, pins 0..=7.
#[derive(Clone, Copy, Debug)]
pub struct SystemConfigBuilder {
    oscillator: Option<Oscillator>,
    conflict: Option<(Oscillator, Oscillator)>,
    config: SystemConfig,
}

impl SystemConfigBuilder {
    fn new() -> Self {
        Self {
            oscillator: None,
            conflict: None,
            config: SystemConfig {
                oscillator: Oscillator::Fallback,
                watchdog: Watchdog::Off,
                reset_pin: true,
                brown_out: BrownOut::Off,
                code_protect: false,
                debug_pins: false,
                clock_switching: false,
                available_ports: PortSet::DSPIC33FJ32MC204,
                enabled_ports: PortSet::EMPTY,
                port_pins: DEFAULT_PORT_PINS,
            },
        }
    }

    /// Select the oscillator preset. Selecting a second, different one makes
    /// [`SystemConfigBuilder::build`] fail.
    pub fn oscillator(mut self, oscillator: Oscillator) -> Self {
        match self.oscillator {
            Some(current) if current != oscillator => {
                if self.conflict.is_none() {
                    self.conflict = Some((current, oscillator));
                }
            }
            _ => self.oscillator = Some(oscillator),
        }
        self
    }

    pub fn watchdog(mut self, watchdog: Watchdog) -> Self {
        self.config.watchdog = watchdog;
        self
    }

    pub fn reset_pin(mut self, enabled: bool) -> Self {
        self.config.reset_pin = enabled;
        self
    }

    pub fn brown_out(mut self, brown_out: BrownOut) -> Self {
        self.config.brown_out = brown_out;
        self
    }

    pub fn code_protect(mut self, enabled: bool) -> Self {
        self.config.code_protect = enabled;
        self
    }

    pub fn debug_pins(mut self, enabled: bool) -> Self {
        self.config.debug_pins = enabled;
        self
    }

    pub fn clock_switching(mut self, enabled: bool) -> Self {
        self.config.clock_switching = enabled;
        self
    }

    pub fn available_ports(mut self, ports: PortSet) -> Self {
        self.config.available_ports = ports;
        self
    }

    pub fn enable_port(mut self, port: Port) -> Self {
        self.config.enabled_ports = self.config.enabled_ports.with(port);
        self
    }

    pub fn port_pins(mut self, pins: u16) -> Self {
        self.config.port_pins = pins;
        self
    }

    pub fn build(self) -> Result<SystemConfig, ConfigError> {
        if let Some((a, b)) = self.conflict {
            return Err(ConfigError::ConflictingOscillators(a, b));
        }

        let mut config = self.config;
        if let Some(port) = config
            .enabled_ports
            .iter()
            .find(|p| !config.available_ports.contains(*p))
        {
            return Err(ConfigError::PortUnavailable(port));
        }

        config.oscillator = match self.oscillator {
            Some(oscillator) => oscillator,
            None => {
                warn!("config: no oscillator preset selected, using internal FRC");
                Oscillator::Fallback
            }
        };

        Ok(config)
    }
}
