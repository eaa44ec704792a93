//! Device lifecycle state machine.
//!
//! The one process-wide [`SystemState`] lives in a [`Lifecycle`]. It is meant
//! to sit in a `static` so the main loop and interrupt handlers share it: the
//! main context drives it through [`crate::system::System`], and an interrupt
//! handler holding `&'static Lifecycle` may call [`Lifecycle::wakeup`] to
//! release a pending [`Lifecycle::enter_sleep`].
//!
//! Every transition runs inside a short critical section.

use core::cell::RefCell;

use critical_section::Mutex;
use typed_fsm::{state_machine, Transition};

/// Overall device lifecycle phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum SystemState {
    Init,
    Ready,
    Busy,
    Error,
    Sleep,
}

/// Why the system went to [`SystemState::Error`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Fault {
    /// An ADC conversion did not complete in time.
    ConversionTimeout,
    /// A driver was handed an argument outside its valid range.
    InvalidArgument,
}

// FSM Context
pub struct LifecycleContext {
    pub state: SystemState,
    pub last_fault: Option<Fault>,
    pub transitions: u32,
}

impl LifecycleContext {
    const fn new() -> Self {
        Self {
            state: SystemState::Init,
            last_fault: None,
            transitions: 0,
        }
    }

    fn enter(&mut self, state: SystemState) {
        self.state = state;
        self.transitions = self.transitions.wrapping_add(1);
    }
}

// FSM Events
#[derive(Clone, Copy, Debug)]
pub enum LifecycleEvent {
    Initialized,
    Deinitialized,
    SleepRequested,
    WakeRequested,
    ResetRequested,
    WorkStarted,
    WorkFinished,
    Fault(Fault),
}

// State Machine Definition
state_machine! {
    Name: LifecycleFsm,
    Context: LifecycleContext,
    Event: LifecycleEvent,
    States: {
        // Power-on, or after deinitialize/reset
        Init => {
            entry: |ctx| {
                ctx.enter(SystemState::Init);
            }
            process: |ctx, evt| {
                match evt {
                    LifecycleEvent::Initialized => Transition::To(LifecycleFsm::Ready),
                    LifecycleEvent::SleepRequested => Transition::To(LifecycleFsm::Asleep),
                    LifecycleEvent::Fault(fault) => {
                        ctx.last_fault = Some(*fault);
                        Transition::To(LifecycleFsm::Faulted)
                    }
                    _ => Transition::None,
                }
            }
        },

        Ready => {
            entry: |ctx| {
                ctx.enter(SystemState::Ready);
            }
            process: |ctx, evt| {
                match evt {
                    LifecycleEvent::Deinitialized | LifecycleEvent::ResetRequested => {
                        Transition::To(LifecycleFsm::Init)
                    }
                    LifecycleEvent::SleepRequested => Transition::To(LifecycleFsm::Asleep),
                    LifecycleEvent::WorkStarted => Transition::To(LifecycleFsm::Busy),
                    LifecycleEvent::Fault(fault) => {
                        ctx.last_fault = Some(*fault);
                        Transition::To(LifecycleFsm::Faulted)
                    }
                    _ => Transition::None, // Already initialized
                }
            }
        },

        // Held by a layered peripheral module
        Busy => {
            entry: |ctx| {
                ctx.enter(SystemState::Busy);
            }
            process: |ctx, evt| {
                match evt {
                    LifecycleEvent::Initialized | LifecycleEvent::WorkFinished => {
                        Transition::To(LifecycleFsm::Ready)
                    }
                    LifecycleEvent::Deinitialized | LifecycleEvent::ResetRequested => {
                        Transition::To(LifecycleFsm::Init)
                    }
                    LifecycleEvent::SleepRequested => Transition::To(LifecycleFsm::Asleep),
                    LifecycleEvent::Fault(fault) => {
                        ctx.last_fault = Some(*fault);
                        Transition::To(LifecycleFsm::Faulted)
                    }
                    _ => Transition::None,
                }
            }
        },

        Faulted => {
            entry: |ctx| {
                ctx.enter(SystemState::Error);
            }
            process: |ctx, evt| {
                match evt {
                    LifecycleEvent::Initialized => Transition::To(LifecycleFsm::Ready),
                    LifecycleEvent::Deinitialized | LifecycleEvent::ResetRequested => {
                        Transition::To(LifecycleFsm::Init)
                    }
                    LifecycleEvent::SleepRequested => Transition::To(LifecycleFsm::Asleep),
                    LifecycleEvent::Fault(fault) => {
                        ctx.last_fault = Some(*fault);
                        Transition::None
                    }
                    _ => Transition::None,
                }
            }
        },

        Asleep => {
            entry: |ctx| {
                ctx.enter(SystemState::Sleep);
            }
            process: |ctx, evt| {
                match evt {
                    LifecycleEvent::WakeRequested | LifecycleEvent::Initialized => {
                        Transition::To(LifecycleFsm::Ready)
                    }
                    LifecycleEvent::Deinitialized | LifecycleEvent::ResetRequested => {
                        Transition::To(LifecycleFsm::Init)
                    }
                    LifecycleEvent::Fault(fault) => {
                        ctx.last_fault = Some(*fault);
                        Transition::To(LifecycleFsm::Faulted)
                    }
                    _ => Transition::None,
                }
            }
        }
    }
}

/// Owner of the process-wide [`SystemState`].
pub struct Lifecycle {
    machine: Mutex<RefCell<Option<LifecycleFsm>>>,
    context: Mutex<RefCell<LifecycleContext>>,
}

impl Lifecycle {
    /// A lifecycle in [`SystemState::Init`].
    pub const fn new() -> Self {
        Self {
            machine: Mutex::new(RefCell::new(None)),
            context: Mutex::new(RefCell::new(LifecycleContext::new())),
        }
    }

    /// Current state.
    pub fn state(&self) -> SystemState {
        critical_section::with(|cs| self.context.borrow_ref(cs).state)
    }

    /// Fault recorded by the last [`Lifecycle::fault`], if any.
    pub fn last_fault(&self) -> Option<Fault> {
        critical_section::with(|cs| self.context.borrow_ref(cs).last_fault)
    }

    /// Number of states entered so far, the initial one included.
    pub fn transitions(&self) -> u32 {
        critical_section::with(|cs| self.context.borrow_ref(cs).transitions)
    }

    /// Init, Error, Busy or Sleep → Ready.
    pub fn initialized(&self) -> SystemState {
        self.dispatch(LifecycleEvent::Initialized)
    }

    /// Any state → Init.
    pub fn deinitialized(&self) -> SystemState {
        self.dispatch(LifecycleEvent::Deinitialized)
    }

    /// Any state → Init, as the first step of a reset.
    pub fn reset_requested(&self) -> SystemState {
        self.dispatch(LifecycleEvent::ResetRequested)
    }

    /// Sleep → Ready. No-op in every other state.
    ///
    /// Safe to call from interrupt context.
    pub fn wakeup(&self) -> SystemState {
        self.dispatch(LifecycleEvent::WakeRequested)
    }

    /// Ready → Busy.
    pub fn work_started(&self) -> SystemState {
        self.dispatch(LifecycleEvent::WorkStarted)
    }

    /// Busy → Ready.
    pub fn work_finished(&self) -> SystemState {
        self.dispatch(LifecycleEvent::WorkFinished)
    }

    /// Any state → Error, remembering `fault`.
    pub fn fault(&self, fault: Fault) -> SystemState {
        self.dispatch(LifecycleEvent::Fault(fault))
    }

    /// Enter Sleep and block until some other context moves the state away
    /// from it, usually an interrupt handler calling [`Lifecycle::wakeup`].
    ///
    /// There is no timeout: without a wakeup this never returns.
    pub fn enter_sleep(&self) {
        self.dispatch(LifecycleEvent::SleepRequested);

        while self.state() == SystemState::Sleep {
            core::hint::spin_loop();
        }
    }

    fn dispatch(&self, event: LifecycleEvent) -> SystemState {
        critical_section::with(|cs| {
            let mut machine = self.machine.borrow_ref_mut(cs);
            let mut ctx = self.context.borrow_ref_mut(cs);

            if machine.is_none() {
                let mut fsm = LifecycleFsm::Init;
                fsm.init(&mut *ctx);
                *machine = Some(fsm);
            }

            if let Some(fsm) = machine.as_mut() {
                let from = ctx.state;
                fsm.dispatch(&mut *ctx, &event);
                if from != ctx.state {
                    debug!("lifecycle: {} -> {}", from, ctx.state);
                }
            }

            ctx.state
        })
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::thread;
    use std::time::Duration;

    #[test]
    fn starts_in_init() {
        let lifecycle = Lifecycle::new();
        assert_eq!(lifecycle.state(), SystemState::Init);
        assert_eq!(lifecycle.last_fault(), None);
    }

    #[test]
    fn initialize_is_idempotent() {
        let lifecycle = Lifecycle::new();
        assert_eq!(lifecycle.initialized(), SystemState::Ready);
        let entered = lifecycle.transitions();
        assert_eq!(lifecycle.initialized(), SystemState::Ready);
        assert_eq!(lifecycle.transitions(), entered);
    }

    #[test]
    fn deinitialize_returns_to_init_from_anywhere() {
        let lifecycle = Lifecycle::new();
        lifecycle.initialized();
        assert_eq!(lifecycle.deinitialized(), SystemState::Init);

        lifecycle.initialized();
        lifecycle.work_started();
        assert_eq!(lifecycle.deinitialized(), SystemState::Init);

        lifecycle.fault(Fault::ConversionTimeout);
        assert_eq!(lifecycle.deinitialized(), SystemState::Init);
        assert_eq!(lifecycle.deinitialized(), SystemState::Init);
    }

    #[test]
    fn wakeup_outside_sleep_is_noop() {
        let lifecycle = Lifecycle::new();
        assert_eq!(lifecycle.wakeup(), SystemState::Init);
        lifecycle.initialized();
        assert_eq!(lifecycle.wakeup(), SystemState::Ready);
        lifecycle.fault(Fault::InvalidArgument);
        assert_eq!(lifecycle.wakeup(), SystemState::Error);
    }

    #[test]
    fn busy_round_trip() {
        let lifecycle = Lifecycle::new();
        // Busy is only reachable from Ready
        assert_eq!(lifecycle.work_started(), SystemState::Init);
        lifecycle.initialized();
        assert_eq!(lifecycle.work_started(), SystemState::Busy);
        assert_eq!(lifecycle.work_finished(), SystemState::Ready);
        assert_eq!(lifecycle.work_finished(), SystemState::Ready);
    }

    #[test]
    fn fault_records_cause() {
        let lifecycle = Lifecycle::new();
        lifecycle.initialized();
        assert_eq!(lifecycle.fault(Fault::ConversionTimeout), SystemState::Error);
        assert_eq!(lifecycle.last_fault(), Some(Fault::ConversionTimeout));

        assert_eq!(lifecycle.fault(Fault::InvalidArgument), SystemState::Error);
        assert_eq!(lifecycle.last_fault(), Some(Fault::InvalidArgument));

        assert_eq!(lifecycle.initialized(), SystemState::Ready);
    }

    #[test]
    fn reset_request_returns_to_init() {
        let lifecycle = Lifecycle::new();
        lifecycle.initialized();
        assert_eq!(lifecycle.reset_requested(), SystemState::Init);
    }

    #[test]
    fn sleep_ends_on_wakeup_from_other_context() {
        let lifecycle = Lifecycle::new();
        lifecycle.initialized();

        thread::scope(|s| {
            s.spawn(|| {
                while lifecycle.state() != SystemState::Sleep {
                    thread::yield_now();
                }
                thread::sleep(Duration::from_millis(10));
                lifecycle.wakeup();
            });

            lifecycle.enter_sleep();
        });

        assert_eq!(lifecycle.state(), SystemState::Ready);
    }

    #[test]
    fn sleep_ends_on_fault_from_other_context() {
        let lifecycle = Lifecycle::new();

        thread::scope(|s| {
            s.spawn(|| {
                while lifecycle.state() != SystemState::Sleep {
                    thread::yield_now();
                }
                lifecycle.fault(Fault::ConversionTimeout);
            });

            lifecycle.enter_sleep();
        });

        assert_eq!(lifecycle.state(), SystemState::Error);
    }
}
