//! A 4-bit microprogram sequencer with an address stack.
//!
//! Next-address selection muxes between the program counter, the holding
//! register, the stack top, and the direct input, under `s0`/`s1`. The
//! output can be OR-modified and forced to zero (active low `zero`); the
//! carry chain (`cin`/`cout`) lets slices concatenate into wider address
//! spaces. The PC, holding register, and stack pointer update on the rising
//! clock edge; the stack itself is a child [`Ram`] of four words.

use strobe_sim::{Bus, Component, Netlist, Signal, SimError, StepContext, Visitor};

use crate::memory::Ram;

/// One 4-bit sequencer slice.
///
/// Reset is synchronous and level-sensitive: while `reset` is high the PC,
/// holding register, and stack pointer are driven to their power-on values
/// each step.
pub struct Sequencer {
    /// Synchronous reset input.
    pub reset: Signal,
    /// Register updates happen on this clock's rising edge.
    pub clock: Signal,
    /// Direct next-address input.
    pub din: Bus,
    /// Holding-register load input.
    pub rin: Bus,
    /// OR-modifier applied to the address output.
    pub orin: Bus,
    /// Source select, low bit.
    pub s0: Signal,
    /// Source select, high bit.
    pub s1: Signal,
    /// Active-low output zero force.
    pub zero: Signal,
    /// Increment carry input.
    pub cin: Signal,
    /// Active-low holding-register load enable.
    pub re: Signal,
    /// Active-low stack file enable.
    pub fe: Signal,
    /// Stack direction: high pushes, low pops.
    pub pup: Signal,
    /// Next-address output.
    pub yout: Bus,
    /// Increment carry output, for chaining slices.
    pub cout: Signal,
    /// The microprogram counter.
    pub pc: Bus,
    /// The holding register.
    pub ar: Bus,
    /// The stack pointer.
    pub sp: Bus,
    mux: Bus,
    stack_in: Bus,
    stack_wr: Signal,
    stack_out: Bus,
    stack_addr: Bus,
    stack: Ram,
}

impl Sequencer {
    /// Creates a sequencer wired to the given ports, allocating its
    /// internal registers and four-word stack. The `din`, `rin`, `orin`,
    /// and `yout` buses are expected 4 bits wide.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        nets: &mut Netlist,
        reset: Signal,
        clock: Signal,
        din: Bus,
        rin: Bus,
        orin: Bus,
        s0: Signal,
        s1: Signal,
        zero: Signal,
        cin: Signal,
        re: Signal,
        fe: Signal,
        pup: Signal,
        yout: Bus,
        cout: Signal,
    ) -> Self {
        let pc = nets.bus(4);
        let ar = nets.bus(4);
        let sp = nets.bus(2);
        let mux = nets.bus(4);
        let stack_in = nets.bus(4);
        let stack_wr = nets.signal();
        let stack_out = nets.bus(4);
        let stack_addr = nets.bus(2);
        let stack = Ram::new(clock, stack_in, stack_wr, stack_addr, stack_out, 4);
        Self {
            reset,
            clock,
            din,
            rin,
            orin,
            s0,
            s1,
            zero,
            cin,
            re,
            fe,
            pup,
            yout,
            cout,
            pc,
            ar,
            sp,
            mux,
            stack_in,
            stack_wr,
            stack_out,
            stack_addr,
            stack,
        }
    }
}

impl Component for Sequencer {
    fn visit(&mut self, v: &mut dyn Visitor) {
        v.signal("reset", self.reset);
        v.signal("clock", self.clock);
        v.bus("din", self.din);
        v.bus("rin", self.rin);
        v.bus("orin", self.orin);
        v.signal("s0", self.s0);
        v.signal("s1", self.s1);
        v.signal("zero", self.zero);
        v.signal("cin", self.cin);
        v.signal("re", self.re);
        v.signal("fe", self.fe);
        v.signal("pup", self.pup);
        v.bus("yout", self.yout);
        v.signal("cout", self.cout);
        v.bus("pc", self.pc);
        v.bus("ar", self.ar);
        v.bus("sp", self.sp);
        v.bus("mux", self.mux);
        v.child("stack", &mut self.stack);
    }

    fn evaluate(&mut self, cx: &mut StepContext<'_>) -> Result<(), SimError> {
        let nets = &mut *cx.nets;
        if nets.high(self.reset) {
            nets.drive(self.pc, 0);
            nets.drive(self.ar, 0);
            nets.drive(self.sp, 3);
        }

        match (nets.high(self.s1), nets.high(self.s0)) {
            (false, false) => nets.assign(self.mux, self.pc)?,
            (false, true) => nets.assign(self.mux, self.ar)?,
            (true, false) => nets.assign(self.mux, self.stack_out)?,
            (true, true) => nets.assign(self.mux, self.din)?,
        }

        let mux = nets.value(self.mux);
        let carry = nets.high(self.cin) && mux == 0xf;
        nets.drive(self.cout, carry as u64);
        if !nets.high(self.zero) {
            nets.drive(self.yout, 0);
        } else {
            nets.drive(self.yout, mux | nets.value(self.orin));
        }

        nets.assign(self.stack_in, self.pc)?;
        nets.drive(self.stack_wr, 0);
        if !nets.high(self.fe) {
            if nets.high(self.pup) {
                nets.drive(self.stack_wr, 1);
                // Look ahead to the incremented pointer so the push lands
                // on the new top.
                nets.drive(self.stack_addr, nets.value(self.sp) + 1);
            } else {
                nets.assign(self.stack_addr, self.sp)?;
            }
        }

        if nets.rising_edge(self.clock) {
            if nets.high(self.cin) {
                nets.drive(self.pc, mux + 1);
            }
            if !nets.high(self.re) {
                nets.assign(self.ar, self.rin)?;
            }
            if !nets.high(self.fe) {
                let sp = nets.value(self.sp);
                if nets.high(self.pup) {
                    nets.drive(self.sp, sp + 1);
                } else {
                    nets.drive(self.sp, sp.wrapping_sub(1));
                }
            }
        }
        Ok(())
    }
}
