//! Analog-Digital Converter (ADC)
//!
//! Single-channel, single-shot driver for ADC1 of the dsPIC33F.
//!
//! The converter runs in manual mode: the driver routes a channel into the
//! CH0 multiplexer, holds `SAMP` high for the acquisition time and clears it,
//! which starts the conversion. Completion is signalled by `DONE`.
//!
//! ## Usage
//!
//! ```no_run
//! use dspic33f_periph::adc::{Adc, AdcConfig};
//! use dspic33f_periph::hardware::Dspic33fAdc;
//!
//! let regs = unsafe { Dspic33fAdc::steal() };
//! let mut adc = Adc::new(regs, AdcConfig::new());
//! adc.initialize();
//! let counts = adc.read_blocking(0).unwrap();
//! ```
//!
//! The blocking read gives up after [`AdcConfig::timeout`] polls. Use
//! [`Timeout::Never`] to wait for `DONE` forever.

use core::{error, fmt};

use crate::hardware::{AdcRegister, AdcRegisters};

/// Instruction cycles `SAMP` is held before conversion starts.
pub const ACQUISITION_CYCLES: u32 = 60;

/// Default `DONE` polls before a blocking read fails.
pub const DEFAULT_POLL_LIMIT: u32 = 10_000;

/// Inputs `CH0SA` can address, AN0..AN31.
pub const MAX_CHANNELS: u8 = 32;

/// Largest `SAMC` value.
pub const MAX_SAMPLE_TIME: u8 = 31;

bitfield::bitfield! {
    /// `AD1CON1`
    #[derive(Clone, Copy, Default)]
    struct AdCon1(u16);
    adon, set_adon: 15;
    /// 12-bit, 1-channel operation
    ad12b, set_ad12b: 10;
    /// Output format, 0 = unsigned integer
    u8, form, set_form: 9, 8;
    /// Conversion trigger source, 0 = clearing SAMP
    u8, ssrc, set_ssrc: 7, 5;
    /// Auto-sample
    asam, set_asam: 2;
    samp, set_samp: 1;
    done, set_done: 0;
}

bitfield::bitfield! {
    /// `AD1CON2`
    #[derive(Clone, Copy, Default)]
    struct AdCon2(u16);
    /// Conversions per interrupt, minus one
    u8, smpi, set_smpi: 5, 2;
}

bitfield::bitfield! {
    /// `AD1CON3`
    #[derive(Clone, Copy, Default)]
    struct AdCon3(u16);
    /// Auto-sample time, in Tad
    u8, samc, set_samc: 12, 8;
    /// Tad = (ADCS + 1) * Tcy
    u8, adcs, set_adcs: 7, 0;
}

bitfield::bitfield! {
    /// `AD1CHS0`
    #[derive(Clone, Copy, Default)]
    struct AdChs0(u16);
    /// Positive input of CH0 for MUX A
    u8, ch0sa, set_ch0sa: 4, 0;
}

/// Conversion resolution.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Resolution {
    Bits10,
    Bits12,
}

impl Resolution {
    pub const fn bits(self) -> u8 {
        match self {
            Resolution::Bits10 => 10,
            Resolution::Bits12 => 12,
        }
    }

    /// Largest result representable at this resolution.
    pub const fn max_value(self) -> u16 {
        (1u16 << self.bits()) - 1
    }
}

/// How long a blocking read polls `DONE`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Timeout {
    /// Poll forever. A converter that never finishes hangs the caller.
    Never,
    /// Give up after this many unsuccessful polls. `Polls(0)` still polls
    /// once.
    Polls(u32),
}

/// ADC configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AdcConfig {
    /// Auto-sample time `SAMC`, in Tad (0..=31).
    pub sample_time: u8,
    /// Conversion clock select `ADCS`: Tad = (ADCS + 1) * Tcy.
    pub clock_divider: u8,
    pub resolution: Resolution,
    /// Number of analog inputs, AN0 up to AN(channels - 1).
    pub channels: u8,
    /// Instruction cycles `SAMP` stays high before conversion.
    pub acquisition_cycles: u32,
    pub timeout: Timeout,
}

impl AdcConfig {
    /// Defaults for the dsPIC33FJ32MC204: SAMC = 4, ADCS = 4, 12-bit, AN0..AN8.
    pub const fn new() -> Self {
        Self {
            sample_time: 4,
            clock_divider: 4,
            resolution: Resolution::Bits12,
            channels: 9,
            acquisition_cycles: ACQUISITION_CYCLES,
            timeout: Timeout::Polls(DEFAULT_POLL_LIMIT),
        }
    }

    /// Auto-sample time in Tad, capped at [`MAX_SAMPLE_TIME`].
    pub const fn sample_time(mut self, tad: u8) -> Self {
        self.sample_time = if tad > MAX_SAMPLE_TIME { MAX_SAMPLE_TIME } else { tad };
        self
    }

    pub const fn clock_divider(mut self, adcs: u8) -> Self {
        self.clock_divider = adcs;
        self
    }

    pub const fn resolution(mut self, resolution: Resolution) -> Self {
        self.resolution = resolution;
        self
    }

    /// Number of analog inputs, capped at [`MAX_CHANNELS`].
    pub const fn channels(mut self, channels: u8) -> Self {
        self.channels = if channels > MAX_CHANNELS { MAX_CHANNELS } else { channels };
        self
    }

    pub const fn timeout(mut self, timeout: Timeout) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for AdcConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// ADC errors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AdcError {
    /// The channel is not one of the configured analog inputs.
    InvalidChannel(u8),
    /// `DONE` was not raised within the poll limit.
    Timeout,
}

impl fmt::Display for AdcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdcError::InvalidChannel(ch) => write!(f, "invalid ADC channel AN{}", ch),
            AdcError::Timeout => f.write_str("ADC conversion timed out"),
        }
    }
}

impl error::Error for AdcError {}

/// Analog to Digital Converter (ADC).
pub struct Adc<R> {
    regs: R,
    config: AdcConfig,
    last_result: u16,
}

impl<R: AdcRegisters> Adc<R> {
    /// Wrap the register block. The converter is left untouched until
    /// [`Adc::initialize`].
    pub fn new(regs: R, config: AdcConfig) -> Self {
        Self {
            regs,
            config,
            last_result: 0,
        }
    }

    /// Bring the converter up in manual-trigger, integer-output mode on AN0.
    pub fn initialize(&mut self) {
        // 1. Converter off while reconfiguring
        self.regs.modify(AdcRegister::Con1, |v| {
            let mut con1 = AdCon1(v);
            con1.set_adon(false);
            con1.0
        });

        // 2. Manual sampling, conversion on SAMP falling edge, integer output
        let mut con1 = AdCon1::default();
        con1.set_form(0);
        con1.set_ssrc(0);
        con1.set_asam(false);
        con1.set_ad12b(self.config.resolution == Resolution::Bits12);
        self.regs.write(AdcRegister::Con1, con1.0);

        // 3. One conversion per interrupt, no scanning
        let mut con2 = AdCon2::default();
        con2.set_smpi(0);
        self.regs.write(AdcRegister::Con2, con2.0);

        // 4. Timing
        let mut con3 = AdCon3::default();
        con3.set_samc(self.config.sample_time.min(MAX_SAMPLE_TIME));
        con3.set_adcs(self.config.clock_divider);
        self.regs.write(AdcRegister::Con3, con3.0);

        // 5. AN0 on CH0
        self.regs.write(AdcRegister::Chs0, AdChs0::default().0);

        // 6. Drop whatever is left in the buffer
        let _ = self.regs.read(AdcRegister::Buf0);
        self.last_result = 0;

        // 7. Converter on
        self.regs.modify(AdcRegister::Con1, |v| {
            let mut con1 = AdCon1(v);
            con1.set_adon(true);
            con1.0
        });

        debug!(
            "adc: on, samc={} adcs={} {}-bit",
            con3.samc(),
            self.config.clock_divider,
            self.config.resolution.bits()
        );
    }

    /// Route `channel` to the converter and start a conversion.
    ///
    /// Returns as soon as sampling ends. The conversion completes in the
    /// background, see [`Adc::is_conversion_done`].
    pub fn start_conversion(&mut self, channel: u8) -> Result<(), AdcError> {
        if channel >= self.config.channels || channel >= MAX_CHANNELS {
            warn!("adc: rejected channel AN{}", channel);
            return Err(AdcError::InvalidChannel(channel));
        }

        self.regs.modify(AdcRegister::Chs0, |v| {
            let mut chs0 = AdChs0(v);
            chs0.set_ch0sa(channel);
            chs0.0
        });

        self.regs.modify(AdcRegister::Con1, |v| {
            let mut con1 = AdCon1(v);
            con1.set_samp(true);
            con1.0
        });

        // Acquisition time
        self.regs.settle(self.config.acquisition_cycles);

        // SAMP falling edge starts the conversion
        self.regs.modify(AdcRegister::Con1, |v| {
            let mut con1 = AdCon1(v);
            con1.set_samp(false);
            con1.0
        });

        trace!("adc: converting AN{}", channel);
        Ok(())
    }

    /// Whether the last started conversion has finished.
    pub fn is_conversion_done(&self) -> bool {
        AdCon1(self.regs.read(AdcRegister::Con1)).done()
    }

    /// Convert `channel` and wait for the result.
    pub fn read_blocking(&mut self, channel: u8) -> Result<u16, AdcError> {
        self.start_conversion(channel)?;

        let mut polls: u32 = 0;
        while !self.is_conversion_done() {
            if let Timeout::Polls(limit) = self.config.timeout {
                polls += 1;
                if polls >= limit {
                    error!("adc: AN{} not done after {} polls", channel, polls);
                    return Err(AdcError::Timeout);
                }
            }
            core::hint::spin_loop();
        }

        Ok(self.fetch())
    }

    /// Read the result buffer again.
    ///
    /// This is a fresh hardware read, not a cached value: if another
    /// conversion has completed since the last read, its result is returned.
    pub fn last_result(&mut self) -> u16 {
        self.fetch()
    }

    /// The result stored by the last read, without touching hardware.
    pub fn stored_result(&self) -> u16 {
        self.last_result
    }

    /// Switch the pin behind `channel` to analog mode in `AD1PCFGL`.
    pub fn configure_analog_input(&mut self, channel: u8) -> Result<(), AdcError> {
        if channel >= self.config.channels || channel >= 16 {
            return Err(AdcError::InvalidChannel(channel));
        }
        self.regs
            .modify(AdcRegister::Pcfgl, |v| v & !(1u16 << channel));
        Ok(())
    }

    /// Configuration the driver was built with.
    pub fn config(&self) -> &AdcConfig {
        &self.config
    }

    /// Free underlying register block
    pub fn free(self) -> R {
        self.regs
    }

    fn fetch(&mut self) -> u16 {
        let raw = self.regs.read(AdcRegister::Buf0);
        self.last_result = raw & self.config.resolution.max_value();
        self.last_result
    }
}
