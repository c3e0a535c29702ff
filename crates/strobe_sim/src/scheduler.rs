//! The simulation scheduler: hierarchy registration, the evaluate/commit
//! loop, discrete-time advancement, and trace orchestration.
//!
//! [`Scheduler`] owns the [`Netlist`] and the flat component index built from
//! a single pre-run walk of the component tree. One *step* is an evaluate
//! phase (every due component, in registration order) followed by a commit
//! phase ([`Netlist::settle`]). Steps repeat at the same time point while
//! commits keep changing values; a quiet step triggers the advance-time
//! decision: jump to the earliest pending activation, or terminate when none
//! exists (quiescence).
//!
//! Two bounds guard against broken models: the commit loop's iteration bound
//! inside `settle`, and the per-time-point round bound here, which catches
//! models that oscillate under re-evaluation instead of looping forever.

use serde::{Deserialize, Serialize};

use crate::component::{Component, StepContext, Visitor};
use crate::error::SimError;
use crate::signal::{Bus, Netlist, Signal, SignalId};
use crate::trace::{TraceWriter, VarId};
use crate::SimConfig;

/// The outcome of a completed run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimResult {
    /// Simulated time when the run ended.
    pub final_time: u64,
    /// Total evaluate/commit steps executed.
    pub steps: u64,
    /// True if the run ended in quiescence rather than at a caller limit.
    pub quiescent: bool,
}

/// One registered component: its field name, dotted path, and parent index.
#[derive(Debug)]
struct ComponentInfo {
    name: String,
    path: String,
    parent: Option<usize>,
}

/// One registered (component, signal) pair, traced as its own variable.
#[derive(Debug)]
struct TraceVar {
    owner: usize,
    name: String,
    signal: SignalId,
    width: u32,
}

/// The flat index produced by the registration walk.
#[derive(Debug, Default)]
struct Registry {
    components: Vec<ComponentInfo>,
    vars: Vec<TraceVar>,
}

/// Registration pass: records names, paths, and the flat order.
struct RegisterPass<'a> {
    registry: &'a mut Registry,
    current: usize,
}

impl Visitor for RegisterPass<'_> {
    fn signal(&mut self, name: &str, sig: Signal) {
        self.registry.vars.push(TraceVar {
            owner: self.current,
            name: name.to_string(),
            signal: sig.id,
            width: 1,
        });
    }

    fn bus(&mut self, name: &str, bus: Bus) {
        self.registry.vars.push(TraceVar {
            owner: self.current,
            name: name.to_string(),
            signal: bus.id,
            width: bus.width,
        });
    }

    fn child(&mut self, name: &str, child: &mut dyn Component) {
        let index = self.registry.components.len();
        let path = format!("{}.{}", self.registry.components[self.current].path, name);
        self.registry.components.push(ComponentInfo {
            name: name.to_string(),
            path,
            parent: Some(self.current),
        });
        let saved = self.current;
        self.current = index;
        child.visit(self);
        self.current = saved;
    }
}

/// Evaluation pass: walks the tree in registration order, evaluating every
/// component whose activation time has arrived.
struct EvalPass<'a> {
    nets: &'a mut Netlist,
    activations: &'a mut [u64],
    registry: &'a Registry,
    time: u64,
    cursor: usize,
    error: Option<SimError>,
}

impl EvalPass<'_> {
    fn evaluate_one(&mut self, index: usize, component: &mut dyn Component) {
        if self.error.is_some() || self.activations[index] > self.time {
            return;
        }
        self.activations[index] = self.time;
        let mut cx = StepContext::new(&mut *self.nets, self.time, &mut self.activations[index]);
        if let Err(source) = component.evaluate(&mut cx) {
            self.error = Some(SimError::ComponentFailed {
                path: self.registry.components[index].path.clone(),
                time: self.time,
                source: Box::new(source),
            });
        }
    }
}

impl Visitor for EvalPass<'_> {
    fn signal(&mut self, _name: &str, _sig: Signal) {}

    fn bus(&mut self, _name: &str, _bus: Bus) {}

    fn child(&mut self, _name: &str, child: &mut dyn Component) {
        let index = self.cursor;
        self.cursor += 1;
        self.evaluate_one(index, child);
        child.visit(self);
    }
}

/// The simulation scheduler.
///
/// Owns the netlist and the flat component/signal index; drives the
/// evaluate/commit/advance loop and the optional trace writer. There is no
/// ambient simulation state: a scheduler is an ordinary value serving one
/// component tree.
pub struct Scheduler {
    nets: Netlist,
    registry: Registry,
    activations: Vec<u64>,
    writer: Option<Box<dyn TraceWriter>>,
    /// Writer-side ids, parallel to `registry.vars`.
    trace_vars: Vec<VarId>,
    time: u64,
    steps: u64,
    registered: bool,
}

impl Scheduler {
    /// Creates a scheduler over a fully wired netlist.
    pub fn new(nets: Netlist) -> Self {
        Self {
            nets,
            registry: Registry::default(),
            activations: Vec::new(),
            writer: None,
            trace_vars: Vec::new(),
            time: 0,
            steps: 0,
            registered: false,
        }
    }

    /// Attaches a trace writer. Must be called before the first `run`, so
    /// the writer sees the hierarchy declarations and the initial dump.
    pub fn set_writer(&mut self, writer: Box<dyn TraceWriter>) {
        self.writer = Some(writer);
    }

    /// The signal store, for inspecting values between or after runs.
    pub fn nets(&self) -> &Netlist {
        &self.nets
    }

    /// Mutable signal store access, for external consumers that write input
    /// signals between runs; writes land as staged future values.
    pub fn nets_mut(&mut self) -> &mut Netlist {
        &mut self.nets
    }

    /// The current simulated time.
    pub fn time(&self) -> u64 {
        self.time
    }

    /// The number of registered components (0 before the first run).
    pub fn component_count(&self) -> usize {
        self.registry.components.len()
    }

    /// Runs the simulation to quiescence or to a configured limit.
    ///
    /// On the first call, walks the component tree exactly once to register
    /// every component and signal, emits the trace hierarchy and initial
    /// dump, and commits construction-time values. A scheduler serves one
    /// component tree; pass the same root on every call.
    pub fn run(
        &mut self,
        root: &mut dyn Component,
        config: &SimConfig,
    ) -> Result<SimResult, SimError> {
        if !self.registered {
            self.register(root, config)?;
            self.registered = true;
        }

        let mut rounds_at_time = 0u32;
        let mut quiescent = false;
        loop {
            if let Some(limit) = config.step_limit {
                if self.steps >= limit {
                    break;
                }
            }

            self.evaluate_tree(root)?;
            let changed = self
                .nets
                .settle(self.time, config.max_commit_iterations)?;
            self.steps += 1;

            if changed {
                rounds_at_time += 1;
                if rounds_at_time > config.max_delta_rounds {
                    return Err(SimError::DeltaCycleLimit {
                        time: self.time,
                        max: config.max_delta_rounds,
                    });
                }
                self.emit_changes()?;
                continue;
            }

            // Quiet at this time point: advance to the earliest pending
            // activation, or stop when nothing is scheduled.
            match self.next_activation() {
                Some(next) => {
                    if let Some(limit) = config.time_limit {
                        if next > limit {
                            break;
                        }
                    }
                    self.time = next;
                    rounds_at_time = 0;
                }
                None => {
                    quiescent = true;
                    break;
                }
            }
        }

        if let Some(writer) = &mut self.writer {
            writer.finish()?;
        }

        Ok(SimResult {
            final_time: self.time,
            steps: self.steps,
            quiescent,
        })
    }

    /// One-time hierarchy walk: flat index, trace declarations, initial
    /// settle and dump.
    fn register(&mut self, root: &mut dyn Component, config: &SimConfig) -> Result<(), SimError> {
        self.registry.components.push(ComponentInfo {
            name: "top".to_string(),
            path: "top".to_string(),
            parent: None,
        });
        let mut pass = RegisterPass {
            registry: &mut self.registry,
            current: 0,
        };
        root.visit(&mut pass);
        self.activations = vec![0; self.registry.components.len()];

        self.declare_trace_vars()?;

        // Commit values staged during construction before the first dump.
        self.nets.settle(self.time, config.max_commit_iterations)?;

        if let Some(writer) = &mut self.writer {
            let values: Vec<u64> = self
                .registry
                .vars
                .iter()
                .map(|var| self.nets.slot_current(var.signal))
                .collect();
            writer.dump_initial(&values)?;
        }
        Ok(())
    }

    /// Emits the nested scope/variable declarations to the trace writer.
    ///
    /// Variables are declared in pre-order, each component's own signals
    /// before its children, named `component_signal` under the component's
    /// scope. The writer-side ids are kept parallel to `registry.vars`.
    fn declare_trace_vars(&mut self) -> Result<(), SimError> {
        let Some(writer) = &mut self.writer else {
            return Ok(());
        };

        let count = self.registry.components.len();
        let mut children: Vec<Vec<usize>> = vec![Vec::new(); count];
        for (index, info) in self.registry.components.iter().enumerate().skip(1) {
            if let Some(parent) = info.parent {
                children[parent].push(index);
            }
        }
        let mut vars_of: Vec<Vec<usize>> = vec![Vec::new(); count];
        for (var_index, var) in self.registry.vars.iter().enumerate() {
            vars_of[var.owner].push(var_index);
        }

        // Iterative pre-order walk; keeps declare order aligned with vars
        // per component while nesting scopes correctly.
        let mut declared: Vec<Option<VarId>> = vec![None; self.registry.vars.len()];
        let mut stack: Vec<(usize, bool)> = vec![(0, false)];
        while let Some((index, closing)) = stack.pop() {
            if closing {
                writer.end_scope()?;
                continue;
            }
            let info = &self.registry.components[index];
            writer.begin_scope(&info.name)?;
            for &var_index in &vars_of[index] {
                let var = &self.registry.vars[var_index];
                let name = format!("{}_{}", info.name, var.name);
                declared[var_index] = Some(writer.declare_var(&name, var.width)?);
            }
            stack.push((index, true));
            for &child in children[index].iter().rev() {
                stack.push((child, false));
            }
        }

        // Every registered var was declared exactly once above.
        self.trace_vars = declared.into_iter().flatten().collect();
        debug_assert_eq!(self.trace_vars.len(), self.registry.vars.len());
        Ok(())
    }

    /// Evaluate phase: every due component once, in registration order.
    fn evaluate_tree(&mut self, root: &mut dyn Component) -> Result<(), SimError> {
        let mut pass = EvalPass {
            nets: &mut self.nets,
            activations: &mut self.activations,
            registry: &self.registry,
            time: self.time,
            cursor: 1,
            error: None,
        };
        pass.evaluate_one(0, root);
        root.visit(&mut pass);
        match pass.error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// Streams this step's committed changes, one line per registered pair.
    fn emit_changes(&mut self) -> Result<(), SimError> {
        let Some(writer) = &mut self.writer else {
            return Ok(());
        };
        for (var, &id) in self.registry.vars.iter().zip(&self.trace_vars) {
            if self.nets.slot_changed(var.signal) {
                writer.record_change(self.time, id, self.nets.slot_current(var.signal))?;
            }
        }
        Ok(())
    }

    /// The earliest activation time strictly after the current time.
    fn next_activation(&self) -> Option<u64> {
        self.activations
            .iter()
            .copied()
            .filter(|&t| t > self.time)
            .min()
    }
}
