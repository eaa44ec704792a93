//! In-memory doubles of the register traits, used by the unit tests.

use core::cell::Cell;

use embedded_hal::delay::DelayNs;

use crate::hardware::{AdcRegister, AdcRegisters, InterruptControl, Port, PortRegister, PortRegisters};

const CON1_SAMP: u16 = 1 << 1;
const CON1_DONE: u16 = 1 << 0;
const CON1_ADON: u16 = 1 << 15;
const CHS0_CH0SA: u16 = 0x001F;

fn adc_index(reg: AdcRegister) -> usize {
    match reg {
        AdcRegister::Buf0 => 0,
        AdcRegister::Con1 => 1,
        AdcRegister::Con2 => 2,
        AdcRegister::Con3 => 3,
        AdcRegister::Chs0 => 4,
        AdcRegister::Pcfgl => 5,
    }
}

/// ADC1 that converts on the falling edge of `SAMP`, like the real one.
///
/// `DONE` rises after `conversion_polls` further reads of `AD1CON1`, at which
/// point `ADC1BUF0` is loaded from `samples[channel]`.
pub struct FakeAdc {
    regs: [Cell<u16>; 6],
    pending: Cell<Option<u32>>,
    channel: Cell<u8>,
    buffer_reads: Cell<u32>,
    writes: Vec<(AdcRegister, u16)>,
    conversions: Vec<u8>,
    settled: u32,
    pub samples: [u16; 32],
    pub conversion_polls: u32,
    /// `DONE` never rises.
    pub stuck: bool,
}

impl FakeAdc {
    pub fn new() -> Self {
        Self {
            regs: Default::default(),
            pending: Cell::new(None),
            channel: Cell::new(0),
            buffer_reads: Cell::new(0),
            writes: Vec::new(),
            conversions: Vec::new(),
            settled: 0,
            samples: [0; 32],
            conversion_polls: 0,
            stuck: false,
        }
    }

    /// Current register content, bypassing the conversion model.
    pub fn get(&self, reg: AdcRegister) -> u16 {
        self.regs[adc_index(reg)].get()
    }

    /// Preload a register without recording a write.
    pub fn set(&mut self, reg: AdcRegister, value: u16) {
        self.regs[adc_index(reg)].set(value);
    }

    pub fn writes_to(&self, reg: AdcRegister) -> Vec<u16> {
        self.writes
            .iter()
            .filter(|(r, _)| *r == reg)
            .map(|(_, v)| *v)
            .collect()
    }

    pub fn buffer_reads(&self) -> u32 {
        self.buffer_reads.get()
    }

    /// Channel selected in `AD1CHS0` at each conversion start.
    pub fn conversions(&self) -> &[u8] {
        &self.conversions
    }

    pub fn settle_cycles(&self) -> u32 {
        self.settled
    }
}

impl AdcRegisters for FakeAdc {
    fn read(&self, reg: AdcRegister) -> u16 {
        match reg {
            AdcRegister::Con1 => {
                if let Some(left) = self.pending.get() {
                    if left == 0 {
                        self.pending.set(None);
                        let buf = self.samples[usize::from(self.channel.get())];
                        self.set_cell(AdcRegister::Buf0, buf);
                        self.set_cell(AdcRegister::Con1, self.get(AdcRegister::Con1) | CON1_DONE);
                    } else {
                        self.pending.set(Some(left - 1));
                    }
                }
            }
            AdcRegister::Buf0 => self.buffer_reads.set(self.buffer_reads.get() + 1),
            _ => {}
        }
        self.get(reg)
    }

    fn write(&mut self, reg: AdcRegister, value: u16) {
        self.writes.push((reg, value));
        let mut value = value;

        if reg == AdcRegister::Con1 {
            let before = self.get(AdcRegister::Con1);
            let sampling_started = value & CON1_SAMP != 0 && before & CON1_SAMP == 0;
            let sampling_ended = value & CON1_SAMP == 0 && before & CON1_SAMP != 0;

            if sampling_started {
                value &= !CON1_DONE;
            }
            if sampling_ended && value & CON1_ADON != 0 {
                value &= !CON1_DONE;
                let channel = (self.get(AdcRegister::Chs0) & CHS0_CH0SA) as u8;
                self.channel.set(channel);
                self.conversions.push(channel);
                self.pending
                    .set((!self.stuck).then_some(self.conversion_polls));
            }
        }

        self.set(reg, value);
    }

    fn settle(&mut self, cycles: u32) {
        self.settled += cycles;
    }
}

impl FakeAdc {
    fn set_cell(&self, reg: AdcRegister, value: u16) {
        self.regs[adc_index(reg)].set(value);
    }
}

/// I/O ports with reset-state TRIS (all inputs) and a write log.
pub struct FakePorts {
    tris: [u16; 7],
    port: [u16; 7],
    lat: [u16; 7],
    pub log: Vec<(Port, PortRegister, u16)>,
}

impl FakePorts {
    pub fn new() -> Self {
        Self {
            tris: [0xFFFF; 7],
            port: [0; 7],
            lat: [0; 7],
            log: Vec::new(),
        }
    }

    pub fn with_latches(value: u16) -> Self {
        let mut ports = Self::new();
        ports.lat = [value; 7];
        ports
    }

    pub fn tris(&self, port: Port) -> u16 {
        self.tris[port.index()]
    }

    pub fn lat(&self, port: Port) -> u16 {
        self.lat[port.index()]
    }

    pub fn touched(&self, port: Port) -> bool {
        self.log.iter().any(|(p, _, _)| *p == port)
    }

    /// Position of the first write to `reg` of `port` in the log.
    pub fn first_write(&self, port: Port, reg: PortRegister) -> Option<usize> {
        self.log
            .iter()
            .position(|(p, r, _)| *p == port && *r == reg)
    }
}

impl PortRegisters for FakePorts {
    fn read(&self, port: Port, reg: PortRegister) -> u16 {
        match reg {
            PortRegister::Tris => self.tris[port.index()],
            PortRegister::Port => self.port[port.index()],
            PortRegister::Lat => self.lat[port.index()],
        }
    }

    fn write(&mut self, port: Port, reg: PortRegister, value: u16) {
        self.log.push((port, reg, value));
        match reg {
            PortRegister::Tris => self.tris[port.index()] = value,
            PortRegister::Port => self.port[port.index()] = value,
            PortRegister::Lat => self.lat[port.index()] = value,
        }
    }
}

/// Interrupt mask that records every toggle.
pub struct FakeInterrupts {
    enabled: bool,
    pub log: Vec<bool>,
}

impl FakeInterrupts {
    pub fn new() -> Self {
        Self {
            enabled: false,
            log: Vec::new(),
        }
    }
}

impl InterruptControl for FakeInterrupts {
    fn enable(&mut self) {
        self.enabled = true;
        self.log.push(true);
    }

    fn disable(&mut self) {
        self.enabled = false;
        self.log.push(false);
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }
}

/// Delay that only accumulates the requested time.
#[derive(Default)]
pub struct FakeDelay {
    pub total_ns: u64,
}

impl DelayNs for FakeDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.total_ns += u64::from(ns);
    }
}
