//! Bit-slice hardware model library for the Strobe logic simulator.
//!
//! Concrete components built purely on the `strobe_sim` contracts: stimulus
//! drivers, word memories with hex-image loading, a 4-bit ALU slice, a 4-bit
//! microsequencer with an address stack, and a microprogrammed CPU composed
//! from several of each. Besides being useful parts, they are the
//! validation workload that exercises the engine: bus fan-out, clocked
//! register updates, cross-slice carry chaining, and hierarchical
//! composition.
//!
//! # Modules
//!
//! - `drivers` — reset pulse and clock generator
//! - `image` — line-oriented hex memory images
//! - `memory` — RAM and ROM word arrays
//! - `alu` — 4-bit ALU slice with carry chain and register file
//! - `sequencer` — 4-bit microprogram sequencer with address stack
//! - `cpu` — the composed microprogrammed CPU

#![warn(missing_docs)]

pub mod alu;
pub mod cpu;
pub mod drivers;
pub mod image;
pub mod memory;
pub mod sequencer;

pub use alu::AluSlice;
pub use cpu::Cpu;
pub use drivers::{ClockGen, Reset};
pub use image::read_hex_image;
pub use memory::{Ram, Rom};
pub use sequencer::Sequencer;

#[cfg(test)]
mod tests {
    use super::drivers::{ClockGen, Reset};
    use strobe_sim::{
        Bus, Component, Netlist, Scheduler, Signal, SimConfig, SimError, StepContext, Visitor,
    };

    /// A D flip-flop with asynchronous-style reset and edge bookkeeping for
    /// the test assertions.
    struct DFlipFlop {
        clock: Signal,
        resetn: Signal,
        d: Signal,
        q: Signal,
        qn: Signal,
        rising_seen: u32,
        high_seen: u32,
    }

    impl Component for DFlipFlop {
        fn visit(&mut self, v: &mut dyn Visitor) {
            v.signal("clock", self.clock);
            v.signal("resetn", self.resetn);
            v.signal("d", self.d);
            v.signal("q", self.q);
            v.signal("qn", self.qn);
        }

        fn evaluate(&mut self, cx: &mut StepContext<'_>) -> Result<(), SimError> {
            let nets = &mut *cx.nets;
            if !nets.high(self.resetn) {
                nets.drive(self.q, 0);
                nets.drive(self.qn, 1);
            } else if nets.rising_edge(self.clock) {
                self.rising_seen += 1;
                if nets.high(self.q) {
                    self.high_seen += 1;
                }
                let d = nets.high(self.d);
                nets.drive(self.q, d as u64);
                nets.drive(self.qn, !d as u64);
            }
            Ok(())
        }
    }

    /// Counts rising edges up to a ceiling of 10.
    struct SatCounter {
        clock: Signal,
        resetn: Signal,
        out: Bus,
    }

    impl Component for SatCounter {
        fn visit(&mut self, v: &mut dyn Visitor) {
            v.signal("clock", self.clock);
            v.signal("resetn", self.resetn);
            v.bus("out", self.out);
        }

        fn evaluate(&mut self, cx: &mut StepContext<'_>) -> Result<(), SimError> {
            let nets = &mut *cx.nets;
            if !nets.high(self.resetn) {
                nets.drive(self.out, 0);
            } else if nets.rising_edge(self.clock) {
                let value = nets.value(self.out);
                if value < 10 {
                    nets.drive(self.out, value + 1);
                }
            }
            Ok(())
        }
    }

    struct FlipFlopBench {
        reset: Reset,
        clock: ClockGen,
        dff: DFlipFlop,
    }

    impl Component for FlipFlopBench {
        fn visit(&mut self, v: &mut dyn Visitor) {
            v.child("reset", &mut self.reset);
            v.child("clock", &mut self.clock);
            v.child("dff", &mut self.dff);
        }
    }

    struct CounterBench {
        reset: Reset,
        clock: ClockGen,
        counter: SatCounter,
    }

    impl Component for CounterBench {
        fn visit(&mut self, v: &mut dyn Visitor) {
            v.child("reset", &mut self.reset);
            v.child("clock", &mut self.clock);
            v.child("counter", &mut self.counter);
        }
    }

    #[test]
    fn toggle_flip_flop_counts_edges() {
        let mut nets = Netlist::new();
        let reset = Reset::new(&mut nets);
        let clock = ClockGen::new(&mut nets, 11);
        // Inverted feedback: the register's data input is its own
        // complement output, so it toggles on every counted edge.
        let feedback = nets.signal();
        let q = nets.signal();
        let dff = DFlipFlop {
            clock: clock.clock,
            resetn: reset.resetn,
            d: feedback,
            q,
            qn: feedback,
            rising_seen: 0,
            high_seen: 0,
        };
        let mut bench = FlipFlopBench { reset, clock, dff };

        let mut scheduler = Scheduler::new(nets);
        let result = scheduler.run(&mut bench, &SimConfig::default()).unwrap();
        assert!(result.quiescent);
        // The first clock edge falls inside the reset pulse; the register
        // observes the remaining 10 and is high on alternate ones.
        assert_eq!(bench.dff.rising_seen, 10);
        assert_eq!(bench.dff.high_seen, 5);
    }

    #[test]
    fn saturating_counter_stops_at_ten() {
        let mut nets = Netlist::new();
        let reset = Reset::new(&mut nets);
        let clock = ClockGen::new(&mut nets, 20);
        let out = nets.bus(4);
        let counter = SatCounter {
            clock: clock.clock,
            resetn: reset.resetn,
            out,
        };
        let mut bench = CounterBench {
            reset,
            clock,
            counter,
        };

        let mut scheduler = Scheduler::new(nets);
        let result = scheduler.run(&mut bench, &SimConfig::default()).unwrap();
        assert!(result.quiescent);
        assert_eq!(scheduler.nets().value(out), 10);
    }
}
