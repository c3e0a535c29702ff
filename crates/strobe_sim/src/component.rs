//! The hierarchical component model and per-step evaluation protocol.
//!
//! A [`Component`] is a node in a static tree. It declares its named signals
//! and children once through [`Component::visit`] — an explicit structural
//! description consumed both by the scheduler's one-time registration walk
//! (which assigns names, paths, and flat indices) and by the per-step
//! evaluation walk. One description means the two walks cannot disagree.
//!
//! During evaluation a component may read any committed value reachable from
//! its wiring and stage future values on any signal it holds a handle to;
//! same-step feedback flows only through the current/future separation.

use crate::error::SimError;
use crate::signal::{Bus, Netlist, Signal};

/// A node in the component hierarchy.
///
/// Implementations own their child components as fields and hold `Copy`
/// handles for their wiring. Feedback wiring is expressed by passing the same
/// handle for an output and an input; handles are ids, so no object-identity
/// tricks are involved.
pub trait Component {
    /// Declares owned signals, buses, and child components, in field order.
    ///
    /// Called by the scheduler: once before the run starts to register the
    /// hierarchy, and once per step to drive evaluation in registration
    /// order. Implementations must report the same structure every time.
    fn visit(&mut self, v: &mut dyn Visitor);

    /// One evaluation pass: read `current` values, stage `future` values.
    ///
    /// Must not read back a value it staged in the same call. The default
    /// does nothing, which suits purely structural components.
    fn evaluate(&mut self, cx: &mut StepContext<'_>) -> Result<(), SimError> {
        let _ = cx;
        Ok(())
    }
}

/// Receives a component's structural declaration.
///
/// The engine provides the implementations; components only call these
/// methods from [`Component::visit`].
pub trait Visitor {
    /// Declares a named single-bit signal owned or wired by this component.
    fn signal(&mut self, name: &str, sig: Signal);

    /// Declares a named bus owned or wired by this component.
    fn bus(&mut self, name: &str, bus: Bus);

    /// Declares a named child component and descends into it.
    fn child(&mut self, name: &str, child: &mut dyn Component);
}

/// Everything a component may touch during one evaluation pass.
///
/// Grants access to the signal store, the simulated clock, and this
/// component's activation slot.
pub struct StepContext<'a> {
    /// The flat signal store; read current values, stage future values.
    pub nets: &'a mut Netlist,
    time: u64,
    next_activation: &'a mut u64,
}

impl<'a> StepContext<'a> {
    /// Builds a context for one component evaluation.
    ///
    /// The scheduler constructs these during the evaluation walk; the
    /// constructor is public so components can be driven directly in tests.
    pub fn new(nets: &'a mut Netlist, time: u64, next_activation: &'a mut u64) -> Self {
        Self {
            nets,
            time,
            next_activation,
        }
    }

    /// The current simulated time.
    pub fn time(&self) -> u64 {
        self.time
    }

    /// Requests that this component not be evaluated again until the
    /// simulated time reaches `time() + delay`.
    ///
    /// Only takes effect if the pending activation has already been reached,
    /// so a wait that is still running is never shortened. A component that
    /// never waits is due on every step.
    pub fn wait(&mut self, delay: u64) {
        if self.time >= *self.next_activation {
            *self.next_activation = self.time + delay;
        }
    }
}
