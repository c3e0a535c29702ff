//! A 4-bit ALU slice with carry chain, Q accumulator, and register file.
//!
//! The slice computes one of eight functions over one of eight source
//! pairings each step, deriving the carry, zero, high-bit, and overflow
//! flags combinationally. The Q accumulator and the addressed register are
//! updated on the rising clock edge according to the destination mode,
//! which also selects the Y output and the arithmetic shift variants.
//! Slices chain through `cin`/`cout` to form wider datapaths.

use strobe_sim::{Bus, Component, Netlist, Signal, SimError, StepContext, Visitor};

/// Source pairing: R = A register, S = Q accumulator.
pub const SRC_AQ: u64 = 0;
/// Source pairing: R = A register, S = B register.
pub const SRC_AB: u64 = 1;
/// Source pairing: R = 0, S = Q accumulator.
pub const SRC_ZQ: u64 = 2;
/// Source pairing: R = 0, S = B register.
pub const SRC_ZB: u64 = 3;
/// Source pairing: R = 0, S = A register.
pub const SRC_ZA: u64 = 4;
/// Source pairing: R = direct input, S = A register.
pub const SRC_DA: u64 = 5;
/// Source pairing: R = direct input, S = Q accumulator.
pub const SRC_DQ: u64 = 6;
/// Source pairing: R = direct input, S = 0.
pub const SRC_DZ: u64 = 7;

/// R + S + carry-in.
pub const OP_ADD: u64 = 0;
/// S - R - 1 + carry-in (subtract R with borrow).
pub const OP_SUBR: u64 = 1;
/// R - S - 1 + carry-in (subtract S with borrow).
pub const OP_SUBS: u64 = 2;
/// R | S.
pub const OP_OR: u64 = 3;
/// R & S.
pub const OP_AND: u64 = 4;
/// Complement of R plus S, without carry-in (S - R - 1).
pub const OP_INVADD: u64 = 5;
/// R ^ S.
pub const OP_XOR: u64 = 6;
/// ~(R ^ S).
pub const OP_XNOR: u64 = 7;

/// Y = F; Q loads F.
pub const DEST_QREG: u64 = 0;
/// Y = F; nothing stored.
pub const DEST_NOP: u64 = 1;
/// Y = A register; B register loads F.
pub const DEST_RAMA: u64 = 2;
/// Y = F; B register loads F.
pub const DEST_RAMF: u64 = 3;
/// Y = F; B register and Q both shift down (F/2, Q/2).
pub const DEST_RAMQD: u64 = 4;
/// Y = F; B register loads F shifted down.
pub const DEST_RAMD: u64 = 5;
/// Y = F; B register and Q both shift up (2F, 2Q).
pub const DEST_RAMQU: u64 = 6;
/// Y = F; B register loads F shifted up.
pub const DEST_RAMU: u64 = 7;

/// One 4-bit ALU slice.
///
/// All ports are wired in at construction; the Q accumulator is an owned
/// 4-bit bus and the 16-word register file is plain clocked state, written
/// only on the rising edge.
pub struct AluSlice {
    /// Register and Q updates happen on this clock's rising edge.
    pub clock: Signal,
    /// Direct data input.
    pub din: Bus,
    /// A-side register address.
    pub a_sel: Bus,
    /// B-side register address.
    pub b_sel: Bus,
    /// Source pairing select (see the `SRC_*` constants).
    pub src: Bus,
    /// Operation select (see the `OP_*` constants).
    pub op: Bus,
    /// Destination mode (see the `DEST_*` constants).
    pub dest: Bus,
    /// Carry input from the previous slice.
    pub cin: Signal,
    /// Result output, selected by the destination mode.
    pub y: Bus,
    /// Carry output to the next slice.
    pub cout: Signal,
    /// Result-is-zero flag.
    pub f0: Signal,
    /// High bit of the result.
    pub f3: Signal,
    /// Arithmetic overflow flag (carry into the high bit xor carry out).
    pub ovr: Signal,
    /// The Q accumulator.
    pub q: Bus,
    /// The 16-word register file.
    pub regs: [u8; 16],
}

impl AluSlice {
    /// Creates a slice wired to the given ports, allocating its Q
    /// accumulator. The buses are expected 4 bits wide except `src`, `op`,
    /// and `dest`, which are 3 bits.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        nets: &mut Netlist,
        clock: Signal,
        din: Bus,
        a_sel: Bus,
        b_sel: Bus,
        src: Bus,
        op: Bus,
        dest: Bus,
        cin: Signal,
        y: Bus,
        cout: Signal,
        f0: Signal,
        f3: Signal,
        ovr: Signal,
    ) -> Self {
        Self {
            clock,
            din,
            a_sel,
            b_sel,
            src,
            op,
            dest,
            cin,
            y,
            cout,
            f0,
            f3,
            ovr,
            q: nets.bus(4),
            regs: [0; 16],
        }
    }
}

/// Carry-into-high-bit xor carry-out for a 4-bit add of `x + y + c`.
fn arith_overflow(x: i64, y: i64, c: i64) -> u64 {
    let c3 = ((x & 0x7) + (y & 0x7) + c) >> 3 & 1;
    let c4 = (x + y + c) >> 4 & 1;
    (c3 ^ c4) as u64
}

impl Component for AluSlice {
    fn visit(&mut self, v: &mut dyn Visitor) {
        v.signal("clock", self.clock);
        v.bus("din", self.din);
        v.bus("a_sel", self.a_sel);
        v.bus("b_sel", self.b_sel);
        v.bus("src", self.src);
        v.bus("op", self.op);
        v.bus("dest", self.dest);
        v.signal("cin", self.cin);
        v.bus("y", self.y);
        v.signal("cout", self.cout);
        v.signal("f0", self.f0);
        v.signal("f3", self.f3);
        v.signal("ovr", self.ovr);
        v.bus("q", self.q);
    }

    fn evaluate(&mut self, cx: &mut StepContext<'_>) -> Result<(), SimError> {
        let nets = &mut *cx.nets;
        let a = (self.regs[nets.value(self.a_sel) as usize & 0xf] & 0xf) as i64;
        let b_addr = nets.value(self.b_sel) as usize & 0xf;
        let b = (self.regs[b_addr] & 0xf) as i64;
        let d = nets.value(self.din) as i64;
        let q = nets.value(self.q) as i64;
        let carry = nets.value(self.cin) as i64;

        let (r, s) = match nets.value(self.src) {
            SRC_AQ => (a, q),
            SRC_AB => (a, b),
            SRC_ZQ => (0, q),
            SRC_ZB => (0, b),
            SRC_ZA => (0, a),
            SRC_DA => (d, a),
            SRC_DQ => (d, q),
            _ => (d, 0),
        };

        let op = nets.value(self.op);
        let f: i64 = match op {
            OP_ADD => r + s + carry,
            OP_SUBR => s + (!r & 0xf) + carry,
            OP_SUBS => r + (!s & 0xf) + carry,
            OP_OR => r | s,
            OP_AND => r & s,
            OP_INVADD => !r + s,
            OP_XOR => r ^ s,
            _ => !(r ^ s),
        };

        nets.drive(self.cout, ((f >> 4) & 1) as u64);
        let f = (f & 0xf) as u64;
        nets.drive(self.f0, (f == 0) as u64);
        nets.drive(self.f3, (f >> 3) & 1);

        let ovr = match op {
            OP_ADD => arith_overflow(r, s, carry),
            OP_SUBR => arith_overflow(s, !r & 0xf, carry),
            OP_SUBS => arith_overflow(r, !s & 0xf, carry),
            _ => 0,
        };
        nets.drive(self.ovr, ovr);

        let dest = nets.value(self.dest);
        if dest == DEST_RAMA {
            nets.drive(self.y, a as u64);
        } else {
            nets.drive(self.y, f);
        }

        if nets.rising_edge(self.clock) {
            let q_now = q as u64;
            match dest {
                DEST_QREG => nets.drive(self.q, f),
                DEST_NOP => {}
                DEST_RAMA | DEST_RAMF => self.regs[b_addr] = f as u8,
                DEST_RAMQD => {
                    self.regs[b_addr] = (f >> 1) as u8;
                    nets.drive(self.q, q_now >> 1);
                }
                DEST_RAMD => self.regs[b_addr] = (f >> 1) as u8,
                DEST_RAMQU => {
                    self.regs[b_addr] = ((f << 1) & 0xf) as u8;
                    nets.drive(self.q, (q_now << 1) & 0xf);
                }
                _ => self.regs[b_addr] = ((f << 1) & 0xf) as u8,
            }
        }
        Ok(())
    }
}
