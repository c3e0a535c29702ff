//! Discrete-event digital-logic simulation engine for the Strobe bit-slice
//! workbench.
//!
//! This crate implements a step-based simulation kernel for models of
//! synchronous and combinational hardware: registers, buses, ALU slices,
//! microsequencers, and compositions of them. Signal state is split into a
//! committed `current` value and a staged `future` value, so "simultaneous"
//! hardware behavior is modeled by two-phase update rather than by real
//! concurrency; a bounded commit loop and a bounded per-time-point round
//! count turn non-settling models into hard errors instead of hangs.
//!
//! # Architecture
//!
//! All signal storage lives in a flat [`Netlist`]; components hold `Copy`
//! handles and declare their structure once through [`Component::visit`].
//! The [`Scheduler`] walks the tree a single time before the run to build a
//! flat index, then drives the evaluate/commit/advance loop to quiescence,
//! streaming committed changes to a [`TraceWriter`].
//!
//! # Usage
//!
//! ```ignore
//! use strobe_sim::{simulate, Netlist, SimConfig};
//!
//! let mut nets = Netlist::new();
//! let mut top = Testbench::new(&mut nets);
//! let result = simulate(nets, &mut top, &SimConfig::default())?;
//! println!("quiescent at {}", result.final_time);
//! ```
//!
//! # Modules
//!
//! - `error` — engine error types
//! - `signal` — the Netlist and the Signal/Bus/Slice value model
//! - `component` — the component trait and per-step evaluation protocol
//! - `scheduler` — the evaluate/commit/advance loop
//! - `trace` — waveform trace output (VCD)

#![warn(missing_docs)]

pub mod component;
pub mod error;
pub mod scheduler;
pub mod signal;
pub mod trace;

use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

pub use component::{Component, StepContext, Visitor};
pub use error::SimError;
pub use scheduler::{Scheduler, SimResult};
pub use signal::{Bus, Netlist, Signal, SignalId, Sink, Slice, Source};
pub use trace::{TraceWriter, VcdWriter};

/// Configuration for a simulation run.
///
/// Controls trace output, caller-imposed run bounds, and the two
/// safety bounds that catch non-settling models.
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Optional path for VCD trace output.
    pub trace_path: Option<PathBuf>,
    /// Optional simulated-time bound; the run stops rather than advance
    /// past it.
    pub time_limit: Option<u64>,
    /// Optional bound on total evaluate/commit steps.
    pub step_limit: Option<u64>,
    /// Commit-loop iteration bound within one step.
    pub max_commit_iterations: u32,
    /// Bound on consecutive value-changing rounds at one time point.
    pub max_delta_rounds: u32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            trace_path: None,
            time_limit: None,
            step_limit: None,
            max_commit_iterations: 100,
            max_delta_rounds: 100,
        }
    }
}

/// High-level entry point: runs a fully wired component tree to quiescence.
///
/// Creates a [`Scheduler`] over the netlist, attaches a buffered-file
/// [`VcdWriter`] when `config.trace_path` is set, and executes the run.
/// Use a [`Scheduler`] directly when final signal values need to be
/// inspected afterwards.
pub fn simulate(
    nets: Netlist,
    root: &mut dyn Component,
    config: &SimConfig,
) -> Result<SimResult, SimError> {
    let mut scheduler = Scheduler::new(nets);

    if let Some(path) = &config.trace_path {
        let file = File::create(path)?;
        let writer = BufWriter::new(file);
        scheduler.set_writer(Box::new(VcdWriter::new(writer)));
    }

    scheduler.run(root, config)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Toggles its output every `period` time units, `remaining` times.
    struct Blinker {
        out: Signal,
        period: u64,
        remaining: u32,
    }

    impl Component for Blinker {
        fn visit(&mut self, v: &mut dyn Visitor) {
            v.signal("out", self.out);
        }

        fn evaluate(&mut self, cx: &mut StepContext<'_>) -> Result<(), SimError> {
            if self.remaining > 0 {
                let next = !cx.nets.high(self.out);
                cx.nets.drive(self.out, next as u64);
                self.remaining -= 1;
                cx.wait(self.period);
            }
            Ok(())
        }
    }

    /// Mirrors its input onto its output through a one-bit register.
    struct Follower {
        clock: Signal,
        input: Signal,
        out: Signal,
    }

    impl Component for Follower {
        fn visit(&mut self, v: &mut dyn Visitor) {
            v.signal("clock", self.clock);
            v.signal("input", self.input);
            v.signal("out", self.out);
        }

        fn evaluate(&mut self, cx: &mut StepContext<'_>) -> Result<(), SimError> {
            if cx.nets.rising_edge(self.clock) {
                let value = cx.nets.high(self.input);
                cx.nets.drive(self.out, value as u64);
            }
            Ok(())
        }
    }

    /// A bench wiring a blinker clock to a follower.
    struct Bench {
        blinker: Blinker,
        follower: Follower,
    }

    impl Component for Bench {
        fn visit(&mut self, v: &mut dyn Visitor) {
            v.child("blinker", &mut self.blinker);
            v.child("follower", &mut self.follower);
        }
    }

    #[test]
    fn sim_config_default() {
        let config = SimConfig::default();
        assert!(config.trace_path.is_none());
        assert!(config.time_limit.is_none());
        assert!(config.step_limit.is_none());
        assert_eq!(config.max_commit_iterations, 100);
        assert_eq!(config.max_delta_rounds, 100);
    }

    #[test]
    fn simulate_runs_to_quiescence() {
        let mut nets = Netlist::new();
        let out = nets.signal();
        let mut root = Blinker {
            out,
            period: 5,
            remaining: 4,
        };
        let result = simulate(nets, &mut root, &SimConfig::default()).unwrap();
        assert!(result.quiescent);
        assert_eq!(result.final_time, 20);
    }

    #[test]
    fn clocked_register_follows_input() {
        let mut nets = Netlist::new();
        let clock = nets.signal();
        let input = nets.signal_init(true);
        let out = nets.signal();
        let mut root = Bench {
            blinker: Blinker {
                out: clock,
                period: 5,
                remaining: 2,
            },
            follower: Follower { clock, input, out },
        };
        let mut scheduler = Scheduler::new(nets);
        let result = scheduler.run(&mut root, &SimConfig::default()).unwrap();
        assert!(result.quiescent);
        assert!(scheduler.nets().high(out));
    }

    #[test]
    fn simulate_writes_vcd_trace() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blinker.vcd");

        let mut nets = Netlist::new();
        let out = nets.signal();
        let mut root = Blinker {
            out,
            period: 5,
            remaining: 3,
        };
        let config = SimConfig {
            trace_path: Some(path.clone()),
            ..SimConfig::default()
        };
        simulate(nets, &mut root, &config).unwrap();

        let output = std::fs::read_to_string(&path).unwrap();
        assert!(output.contains("$timescale"));
        assert!(output.contains("$scope module top $end"));
        assert!(output.contains("$var wire 1 ! top_out $end"));
        assert!(output.contains("$enddefinitions $end"));
        assert!(output.contains("$dumpvars"));
        assert!(output.contains("#0"));
        assert!(output.contains("#5"));
        assert!(output.contains("#10"));
        assert!(output.contains("1!"));
        assert!(output.contains("0!"));
    }

    #[test]
    fn trace_declares_nested_scopes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bench.vcd");

        let mut nets = Netlist::new();
        let clock = nets.signal();
        let input = nets.signal();
        let out = nets.signal();
        let mut root = Bench {
            blinker: Blinker {
                out: clock,
                period: 5,
                remaining: 2,
            },
            follower: Follower { clock, input, out },
        };
        let config = SimConfig {
            trace_path: Some(path.clone()),
            ..SimConfig::default()
        };
        simulate(nets, &mut root, &config).unwrap();

        let output = std::fs::read_to_string(&path).unwrap();
        assert!(output.contains("$scope module top $end"));
        assert!(output.contains("$scope module blinker $end"));
        assert!(output.contains("$scope module follower $end"));
        // The clock is wired into both components, so it is declared in
        // each scope under its local name.
        assert!(output.contains("blinker_out"));
        assert!(output.contains("follower_clock"));
        assert_eq!(output.matches("$upscope $end").count(), 3);
    }
}
