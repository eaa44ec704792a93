//! SPDX-License-Identifier: MIT OR Apache-2.0
//!
//! # dsPIC33F ADC and System Drivers
//!
//! Peripheral drivers for the dsPIC33F family (reference device:
//! dsPIC33FJ32MC204), organised as:
//! - **Hardware Module:** register traits and the memory-mapped backend (`hardware.rs`).
//! - **ADC:** single-channel, single-shot conversions (`adc.rs`).
//! - **Lifecycle:** typed state machine holding the system state (`lifecycle.rs`).
//! - **System:** ports, interrupts, clock and configuration report (`system.rs`, `config.rs`).
//! - **Level meter:** the reference board application, AN0 shown on RB0..RB7 (`meter.rs`).
//!
//! ## Wiring it up
//!
//! ```no_run
//! use dspic33f_periph::adc::{Adc, AdcConfig};
//! use dspic33f_periph::config::PRESET;
//! use dspic33f_periph::hardware::{Dspic33fAdc, Dspic33fInterrupts, Dspic33fPorts};
//! use dspic33f_periph::lifecycle::Lifecycle;
//! use dspic33f_periph::system::System;
//!
//! // Shared with the interrupt handler that calls `LIFECYCLE.wakeup()`
//! static LIFECYCLE: Lifecycle = Lifecycle::new();
//!
//! let (ports, irq, regs) = unsafe {
//!     (Dspic33fPorts::steal(), Dspic33fInterrupts::steal(), Dspic33fAdc::steal())
//! };
//!
//! let mut system = System::new(PRESET, ports, irq, &LIFECYCLE);
//! system.initialize();
//! system.print_configuration(&mut ());
//!
//! let mut adc = Adc::new(regs, AdcConfig::new());
//! adc.initialize();
//! match adc.read_blocking(0) {
//!     Ok(counts) => { let _ = counts; }
//!     Err(err) => system.report_fault(err.into()),
//! }
//! ```

#![cfg_attr(not(test), no_std)]

// --- Modules ---
#[macro_use]
mod fmt;

pub mod adc;
pub mod config;
pub mod hardware;
pub mod lifecycle;
pub mod meter;
pub mod sink;
pub mod system;

#[cfg(test)]
mod mock;

// --- Re-exports ---
pub use adc::{Adc, AdcConfig, AdcError};
pub use config::{SystemConfig, PRESET};
pub use lifecycle::{Fault, Lifecycle, SystemState};
pub use system::System;
