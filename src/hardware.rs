//! Hardware Abstraction Module
//!
//! The drivers in this crate never touch memory directly. They go through the
//! register traits defined here, which name the dsPIC33F special function
//! registers they need:
//!
//! - [`AdcRegisters`]: the ADC1 control, channel select and result registers.
//! - [`PortRegisters`]: the TRISx/PORTx/LATx triple of every I/O port.
//! - [`InterruptControl`]: the CPU global interrupt mask.
//!
//! The `Dspic33f*` types implement the traits with volatile accesses at the
//! device's SFR addresses. Tests substitute in-memory doubles.

use core::ptr;

/// ADC1 special function registers used by the driver.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AdcRegister {
    /// `ADC1BUF0`, first conversion result buffer.
    Buf0,
    /// `AD1CON1`, operating mode, trigger source and sample/convert status.
    Con1,
    /// `AD1CON2`, voltage reference, scanning and interrupt rate.
    Con2,
    /// `AD1CON3`, conversion clock and auto-sample time.
    Con3,
    /// `AD1CHS0`, channel 0 input multiplexer.
    Chs0,
    /// `AD1PCFGL`, analog/digital pin selection (0 = analog).
    Pcfgl,
}

impl AdcRegister {
    /// Data-space address of the register on dsPIC33FJ devices.
    pub const fn address(self) -> usize {
        match self {
            AdcRegister::Buf0 => 0x0300,
            AdcRegister::Con1 => 0x0320,
            AdcRegister::Con2 => 0x0322,
            AdcRegister::Con3 => 0x0324,
            AdcRegister::Chs0 => 0x0328,
            AdcRegister::Pcfgl => 0x032C,
        }
    }
}

/// Access to the ADC1 register block.
pub trait AdcRegisters {
    /// Read a register. Reads have no side effects on the converter.
    fn read(&self, reg: AdcRegister) -> u16;

    /// Write a whole register.
    fn write(&mut self, reg: AdcRegister, value: u16);

    /// Read-modify-write a register.
    fn modify<F>(&mut self, reg: AdcRegister, f: F)
    where
        F: FnOnce(u16) -> u16,
    {
        let value = self.read(reg);
        self.write(reg, f(value));
    }

    /// Burn `cycles` instruction cycles, one NOP each.
    fn settle(&mut self, cycles: u32) {
        for _ in 0..cycles {
            core::hint::spin_loop();
        }
    }
}

/// General purpose I/O port.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Port {
    A,
    B,
    C,
    D,
    E,
    F,
    G,
}

impl Port {
    /// Every port of the family, in register order.
    pub const ALL: [Port; 7] = [
        Port::A,
        Port::B,
        Port::C,
        Port::D,
        Port::E,
        Port::F,
        Port::G,
    ];

    /// Position in [`Port::ALL`], which also orders the SFR blocks.
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Name used in the data sheet and the configuration report.
    pub const fn letter(self) -> char {
        match self {
            Port::A => 'A',
            Port::B => 'B',
            Port::C => 'C',
            Port::D => 'D',
            Port::E => 'E',
            Port::F => 'F',
            Port::G => 'G',
        }
    }
}

/// One of the three registers every port has.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PortRegister {
    /// `TRISx`, direction (1 = input, 0 = output).
    Tris,
    /// `PORTx`, pin levels.
    Port,
    /// `LATx`, output latch.
    Lat,
}

impl PortRegister {
    /// Data-space address of `self` for `port`.
    pub const fn address(self, port: Port) -> usize {
        let base = 0x02C0 + 8 * port.index();
        match self {
            PortRegister::Tris => base,
            PortRegister::Port => base + 2,
            PortRegister::Lat => base + 4,
        }
    }
}

/// Access to the I/O port registers.
pub trait PortRegisters {
    fn read(&self, port: Port, reg: PortRegister) -> u16;

    fn write(&mut self, port: Port, reg: PortRegister, value: u16);

    /// Read-modify-write a port register.
    fn modify<F>(&mut self, port: Port, reg: PortRegister, f: F)
    where
        F: FnOnce(u16) -> u16,
    {
        let value = self.read(port, reg);
        self.write(port, reg, f(value));
    }
}

/// The processor's global interrupt mask.
pub trait InterruptControl {
    fn enable(&mut self);

    fn disable(&mut self);

    fn is_enabled(&self) -> bool;
}

// --- dsPIC33F memory-mapped backend ---

/// `SR`, CPU status register. IPL<2:0> lives in bits 7:5.
const SR_ADDRESS: usize = 0x0042;
const SR_IPL_MASK: u16 = 0b111 << 5;

/// ADC1 of the running device.
pub struct Dspic33fAdc {
    _private: (),
}

impl Dspic33fAdc {
    /// # Safety
    ///
    /// Only one handle may exist at a time, and the program must run on a
    /// dsPIC33F where the ADC1 SFRs are mapped at [`AdcRegister::address`].
    pub const unsafe fn steal() -> Self {
        Self { _private: () }
    }
}

impl AdcRegisters for Dspic33fAdc {
    fn read(&self, reg: AdcRegister) -> u16 {
        // Safety: address is a valid, aligned SFR per `steal`'s contract
        unsafe { ptr::read_volatile(reg.address() as *const u16) }
    }

    fn write(&mut self, reg: AdcRegister, value: u16) {
        // Safety: see `read`
        unsafe { ptr::write_volatile(reg.address() as *mut u16, value) }
    }
}

/// I/O ports of the running device.
pub struct Dspic33fPorts {
    _private: (),
}

impl Dspic33fPorts {
    /// # Safety
    ///
    /// Only one handle may exist at a time, and the program must run on a
    /// dsPIC33F. Callers must not touch ports the package does not bond out.
    pub const unsafe fn steal() -> Self {
        Self { _private: () }
    }
}

impl PortRegisters for Dspic33fPorts {
    fn read(&self, port: Port, reg: PortRegister) -> u16 {
        // Safety: address is a valid, aligned SFR per `steal`'s contract
        unsafe { ptr::read_volatile(reg.address(port) as *const u16) }
    }

    fn write(&mut self, port: Port, reg: PortRegister, value: u16) {
        // Safety: see `read`
        unsafe { ptr::write_volatile(reg.address(port) as *mut u16, value) }
    }
}

/// Global interrupt mask via the CPU priority level in `SR`.
///
/// Raising IPL to 7 masks every maskable source, lowering it to 0 lets them
/// all through.
pub struct Dspic33fInterrupts {
    _private: (),
}

impl Dspic33fInterrupts {
    /// # Safety
    ///
    /// The program must run on a dsPIC33F, and nothing else may rely on the
    /// CPU priority level being preserved across these calls.
    pub const unsafe fn steal() -> Self {
        Self { _private: () }
    }

    fn update(&mut self, ipl: u16) {
        // Safety: SR is always mapped on dsPIC33F
        unsafe {
            let sr = SR_ADDRESS as *mut u16;
            let value = ptr::read_volatile(sr);
            ptr::write_volatile(sr, (value & !SR_IPL_MASK) | ((ipl << 5) & SR_IPL_MASK));
        }
    }
}

impl InterruptControl for Dspic33fInterrupts {
    fn enable(&mut self) {
        self.update(0);
    }

    fn disable(&mut self) {
        self.update(7);
    }

    fn is_enabled(&self) -> bool {
        // Safety: SR is always mapped on dsPIC33F
        let sr = unsafe { ptr::read_volatile(SR_ADDRESS as *const u16) };
        sr & SR_IPL_MASK != SR_IPL_MASK
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adc_register_map() {
        assert_eq!(AdcRegister::Buf0.address(), 0x0300);
        assert_eq!(AdcRegister::Con1.address(), 0x0320);
        assert_eq!(AdcRegister::Chs0.address(), 0x0328);
        assert_eq!(AdcRegister::Pcfgl.address(), 0x032C);
    }

    #[test]
    fn port_register_map() {
        assert_eq!(PortRegister::Tris.address(Port::A), 0x02C0);
        assert_eq!(PortRegister::Lat.address(Port::A), 0x02C4);
        assert_eq!(PortRegister::Tris.address(Port::B), 0x02C8);
        assert_eq!(PortRegister::Port.address(Port::B), 0x02CA);
        assert_eq!(PortRegister::Lat.address(Port::B), 0x02CC);
        assert_eq!(PortRegister::Tris.address(Port::G), 0x02F0);
    }
}
