//! Stimulus drivers: the power-on reset pulse and the clock generator.
//!
//! Both are ordinary components that pace themselves with
//! [`StepContext::wait`]; the scheduler knows nothing special about them.

use strobe_sim::{Component, Netlist, Signal, SimError, StepContext, Visitor};

/// Power-on reset: inactive for 3 time units, asserted for 3, then released
/// for the rest of the run.
pub struct Reset {
    /// Active-high reset output.
    pub reset: Signal,
    /// Active-low complement.
    pub resetn: Signal,
    state: u8,
}

impl Reset {
    /// Creates the driver and its output signals.
    pub fn new(nets: &mut Netlist) -> Self {
        Self {
            reset: nets.signal_init(false),
            resetn: nets.signal_init(true),
            state: 0,
        }
    }
}

impl Component for Reset {
    fn visit(&mut self, v: &mut dyn Visitor) {
        v.signal("reset", self.reset);
        v.signal("resetn", self.resetn);
    }

    fn evaluate(&mut self, cx: &mut StepContext<'_>) -> Result<(), SimError> {
        match self.state {
            0 => {
                cx.nets.drive(self.reset, 0);
                cx.nets.drive(self.resetn, 1);
                self.state = 1;
                cx.wait(3);
            }
            1 => {
                cx.nets.drive(self.reset, 1);
                cx.nets.drive(self.resetn, 0);
                self.state = 2;
                cx.wait(3);
            }
            _ => {
                cx.nets.drive(self.reset, 0);
                cx.nets.drive(self.resetn, 1);
            }
        }
        Ok(())
    }
}

/// Free-running clock generator.
///
/// After a one-half-period startup delay, toggles its output every
/// half-period (5 time units by default) until the configured number of
/// cycles has elapsed or [`ClockGen::stop`] is called. Once it stops
/// scheduling itself the rest of the circuit settles and the run quiesces.
pub struct ClockGen {
    /// The generated clock.
    pub clock: Signal,
    half_period: u64,
    half_periods_left: u32,
    started: bool,
    running: bool,
}

impl ClockGen {
    /// Creates a generator that will produce `cycles` full clock cycles.
    pub fn new(nets: &mut Netlist, cycles: u32) -> Self {
        Self {
            clock: nets.signal_init(false),
            half_period: 5,
            half_periods_left: cycles * 2,
            started: false,
            running: true,
        }
    }

    /// Overrides the default half-period of 5 time units.
    pub fn with_half_period(mut self, half_period: u64) -> Self {
        self.half_period = half_period;
        self
    }

    /// Ends generation early; consulted by this driver only, never by the
    /// scheduler.
    pub fn stop(&mut self) {
        self.running = false;
    }
}

impl Component for ClockGen {
    fn visit(&mut self, v: &mut dyn Visitor) {
        v.signal("clock", self.clock);
    }

    fn evaluate(&mut self, cx: &mut StepContext<'_>) -> Result<(), SimError> {
        if !self.started {
            self.started = true;
            cx.wait(self.half_period);
        } else if self.half_periods_left != 0 && self.running {
            cx.wait(self.half_period);
            let next = !cx.nets.high(self.clock);
            cx.nets.drive(self.clock, next as u64);
            self.half_periods_left -= 1;
        }
        Ok(())
    }
}
