//! System Module
//!
//! Platform bookkeeping on top of the [`Lifecycle`]: port direction setup,
//! global interrupt masking, clock frequency and the configuration report.
//! All of it is driven by one [`SystemConfig`].

use crate::adc::AdcError;
use crate::config::SystemConfig;
use crate::hardware::{InterruptControl, PortRegister, PortRegisters};
use crate::lifecycle::{Fault, Lifecycle, SystemState};
use crate::sink::{write_fmt_line, TextSink};

impl From<AdcError> for Fault {
    fn from(err: AdcError) -> Self {
        match err {
            AdcError::Timeout => Fault::ConversionTimeout,
            AdcError::InvalidChannel(_) => Fault::InvalidArgument,
        }
    }
}

/// Device-level control: lifecycle transitions plus the hardware they imply.
pub struct System<'a, P, I> {
    config: SystemConfig,
    ports: P,
    irq: I,
    lifecycle: &'a Lifecycle,
}

impl<'a, P, I> System<'a, P, I>
where
    P: PortRegisters,
    I: InterruptControl,
{
    /// Bundle the configuration, the hardware and the shared lifecycle.
    ///
    /// Nothing is touched until [`System::initialize`].
    pub fn new(config: SystemConfig, ports: P, irq: I, lifecycle: &'a Lifecycle) -> Self {
        Self {
            config,
            ports,
            irq,
            lifecycle,
        }
    }

    /// Set up the ports and move to [`SystemState::Ready`].
    ///
    /// Runs with interrupts masked and enables them on the way out. Calling
    /// it again from Ready redoes the port setup and stays in Ready.
    pub fn initialize(&mut self) {
        // 1. Nothing may observe half-configured ports
        self.irq.disable();

        // 2. Port directions
        self.init_ports();

        // 3. Ready
        self.lifecycle.initialized();

        // 4. Interrupts back on
        self.irq.enable();

        info!("system: ready, FCY = {} Hz", self.clock_frequency());
    }

    /// Release the enabled ports back to inputs and return to
    /// [`SystemState::Init`].
    pub fn deinitialize(&mut self) {
        let pins = self.config.port_pins;
        for port in self.config.enabled_ports.iter() {
            self.ports.modify(port, PortRegister::Tris, |v| v | pins);
        }
        self.lifecycle.deinitialized();
        info!("system: deinitialized");
    }

    /// Enter [`SystemState::Sleep`] and block until another context calls
    /// [`Lifecycle::wakeup`] (or otherwise moves the state on).
    pub fn enter_sleep(&self) {
        debug!("system: sleeping");
        self.lifecycle.enter_sleep();
        debug!("system: awake in {}", self.lifecycle.state());
    }

    /// Sleep → Ready. No-op otherwise.
    pub fn wakeup(&self) {
        self.lifecycle.wakeup();
    }

    /// Return to [`SystemState::Init`] and park the CPU.
    ///
    /// No hardware reset is issued: the program idles here until an external
    /// reset (MCLR, watchdog, debugger) takes over.
    pub fn reset(&self) -> ! {
        self.lifecycle.reset_requested();
        warn!("system: software reset requested, halting");
        loop {
            core::hint::spin_loop();
        }
    }

    pub fn enable_interrupts(&mut self) {
        self.irq.enable();
    }

    pub fn disable_interrupts(&mut self) {
        self.irq.disable();
    }

    pub fn interrupts_enabled(&self) -> bool {
        self.irq.is_enabled()
    }

    /// Instruction cycle frequency (FCY) in Hz.
    pub fn clock_frequency(&self) -> u32 {
        self.config.clock().instruction_hz
    }

    pub fn state(&self) -> SystemState {
        self.lifecycle.state()
    }

    /// Move to [`SystemState::Error`], e.g. after a conversion timed out.
    pub fn report_fault(&self, fault: Fault) {
        error!("system: fault {}", fault);
        self.lifecycle.fault(fault);
    }

    /// Ready → Busy, for modules layered on top of this one.
    pub fn begin_work(&self) -> SystemState {
        self.lifecycle.work_started()
    }

    /// Busy → Ready.
    pub fn end_work(&self) -> SystemState {
        self.lifecycle.work_finished()
    }

    /// Write the configuration report to `sink`, one line per setting.
    pub fn print_configuration<S: TextSink + ?Sized>(&self, sink: &mut S) {
        let config = &self.config;
        let on_off = |enabled: bool| if enabled { "ON" } else { "OFF" };

        write_fmt_line(sink, format_args!("System configuration:"));
        write_fmt_line(sink, format_args!("  Oscillator: {}", config.oscillator.label()));
        write_fmt_line(sink, format_args!("  WDT: {}", config.watchdog.label()));
        write_fmt_line(
            sink,
            format_args!(
                "  MCLR: {}",
                if config.reset_pin { "ENABLED" } else { "DISABLED" }
            ),
        );
        write_fmt_line(sink, format_args!("  BOR: {}", config.brown_out.label()));
        write_fmt_line(sink, format_args!("  Code Protect: {}", on_off(config.code_protect)));

        let mut letters: heapless::String<7> = heapless::String::new();
        for port in config.enabled_ports.iter() {
            let _ = letters.push(port.letter());
        }
        write_fmt_line(
            sink,
            format_args!(
                "  Ports: {}",
                if letters.is_empty() { "none" } else { letters.as_str() }
            ),
        );

        write_fmt_line(sink, format_args!("  FCY: {} Hz", self.clock_frequency()));
    }

    pub fn config(&self) -> &SystemConfig {
        &self.config
    }

    pub fn lifecycle(&self) -> &'a Lifecycle {
        self.lifecycle
    }

    pub fn ports_mut(&mut self) -> &mut P {
        &mut self.ports
    }

    /// Free underlying hardware
    pub fn free(self) -> (P, I) {
        (self.ports, self.irq)
    }

    fn init_ports(&mut self) {
        let pins = self.config.port_pins;
        for port in self.config.available_ports.iter() {
            if self.config.enabled_ports.contains(port) {
                // Latch low before the driver turns on to avoid glitches
                self.ports.modify(port, PortRegister::Lat, |v| v & !pins);
                self.ports.modify(port, PortRegister::Tris, |v| v & !pins);
                debug!("system: port {} outputs", port);
            } else {
                // High impedance
                self.ports.modify(port, PortRegister::Tris, |v| v | pins);
            }
        }
    }
}
