//! Potentiometer level meter.
//!
//! Reads AN0 (RA0) and shows the 8 most significant bits of the 12-bit
//! result on RB0..RB7, one reading every [`SAMPLE_PERIOD_MS`].

use embedded_hal::delay::DelayNs;

use crate::adc::{Adc, AdcError};
use crate::hardware::{AdcRegisters, InterruptControl, Port, PortRegister, PortRegisters};
use crate::system::System;

/// Time between readings, long enough for the LEDs to be visible.
pub const SAMPLE_PERIOD_MS: u32 = 50;

const INPUT_CHANNEL: u8 = 0;
const INPUT_PORT: Port = Port::A;
const INPUT_PIN: u16 = 1 << 0;
const DISPLAY_PORT: Port = Port::B;
const DISPLAY_PINS: u16 = 0x00FF;

/// LED pattern for a 12-bit sample: bits 11..4.
pub const fn bar_pattern(sample: u16) -> u8 {
    ((sample >> 4) & 0xFF) as u8
}

pub struct LevelMeter<R, D> {
    adc: Adc<R>,
    delay: D,
}

impl<R, D> LevelMeter<R, D>
where
    R: AdcRegisters,
    D: DelayNs,
{
    /// Take an already initialized ADC and a delay source.
    pub fn new(adc: Adc<R>, delay: D) -> Self {
        Self { adc, delay }
    }

    /// Configure the input and display pins.
    pub fn setup<P: PortRegisters>(&mut self, ports: &mut P) -> Result<(), AdcError> {
        // 1. AN0 analog, RA0 input
        self.adc.configure_analog_input(INPUT_CHANNEL)?;
        ports.modify(INPUT_PORT, PortRegister::Tris, |v| v | INPUT_PIN);

        // 2. RB0..RB7 outputs, latch cleared first
        ports.modify(DISPLAY_PORT, PortRegister::Lat, |v| v & !DISPLAY_PINS);
        ports.modify(DISPLAY_PORT, PortRegister::Tris, |v| v & !DISPLAY_PINS);
        Ok(())
    }

    /// Take one reading, show it and wait out the sample period.
    ///
    /// Returns the pattern written to the LEDs.
    pub fn step<P: PortRegisters>(&mut self, ports: &mut P) -> Result<u8, AdcError> {
        let sample = self.adc.read_blocking(INPUT_CHANNEL)?;
        let leds = bar_pattern(sample);

        // Upper half of LATB belongs to someone else
        ports.modify(DISPLAY_PORT, PortRegister::Lat, |v| {
            (v & !DISPLAY_PINS) | u16::from(leds)
        });
        trace!("meter: {} -> {}", sample, leds);

        self.delay.delay_ms(SAMPLE_PERIOD_MS);
        Ok(leds)
    }

    /// Main loop. A failed reading faults the system and is retried after one
    /// sample period.
    pub fn run<P, I>(&mut self, system: &mut System<'_, P, I>) -> !
    where
        P: PortRegisters,
        I: InterruptControl,
    {
        loop {
            if let Err(err) = self.step(system.ports_mut()) {
                system.report_fault(err.into());
                self.delay.delay_ms(SAMPLE_PERIOD_MS);
            }
        }
    }

    /// The ADC, for readings outside the loop.
    pub fn adc(&mut self) -> &mut Adc<R> {
        &mut self.adc
    }

    /// Free the ADC and delay source
    pub fn free(self) -> (Adc<R>, D) {
        (self.adc, self.delay)
    }
}
