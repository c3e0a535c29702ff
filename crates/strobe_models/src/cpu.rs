//! A microprogrammed CPU composed from the library parts.
//!
//! Three chained [`Sequencer`] slices form a 12-bit microcode address into a
//! [`Rom`] of 48-bit microwords. The addressed word is latched into the
//! pipeline register on the rising clock edge, and its fields fan out to the
//! sequencers and to two chained [`AluSlice`]s forming an 8-bit datapath.
//!
//! Microword layout, LSB first:
//!
//! | field        | bits  | meaning                                   |
//! |--------------|-------|-------------------------------------------|
//! | `F_BRANCH0`  | 0..4  | direct address, low sequencer slice       |
//! | `F_BRANCH1`  | 4..8  | direct address, middle slice              |
//! | `F_BRANCH2`  | 8..12 | direct address, high slice                |
//! | `F_FILE_EN`  | 12    | stack file enable, active low             |
//! | `F_PUSH_POP` | 13    | stack direction, high pushes              |
//! | `F_SRC0`     | 14    | address source select, low bit            |
//! | `F_SRC1`     | 15    | address source select, high bit           |
//! | `F_ZERO`     | 16    | address output enable, low forces zero    |
//! | `F_ALU_SRC`  | 17..20| ALU source pairing                        |
//! | `F_ALU_OP`   | 20..23| ALU operation                             |
//! | `F_ALU_DEST` | 23..26| ALU destination mode                      |
//! | `F_A_SEL`    | 26..30| ALU A-side register address               |
//! | `F_B_SEL`    | 30..34| ALU B-side register address               |
//! | `F_DATA`     | 34..42| ALU direct input, split across the slices |
//! | `F_ALU_CIN`  | 42    | datapath carry-in                         |

use strobe_sim::{Bus, Component, Netlist, Signal, SimError, Slice, StepContext, Visitor};

use crate::alu::AluSlice;
use crate::memory::Rom;
use crate::sequencer::Sequencer;

/// Direct address field for the low sequencer slice.
pub const F_BRANCH0: (u32, u32) = (0, 4);
/// Direct address field for the middle sequencer slice.
pub const F_BRANCH1: (u32, u32) = (4, 4);
/// Direct address field for the high sequencer slice.
pub const F_BRANCH2: (u32, u32) = (8, 4);
/// Stack file enable, active low.
pub const F_FILE_EN: (u32, u32) = (12, 1);
/// Stack direction: high pushes, low pops.
pub const F_PUSH_POP: (u32, u32) = (13, 1);
/// Address source select, low bit.
pub const F_SRC0: (u32, u32) = (14, 1);
/// Address source select, high bit.
pub const F_SRC1: (u32, u32) = (15, 1);
/// Address output enable: low forces the microcode address to zero.
pub const F_ZERO: (u32, u32) = (16, 1);
/// ALU source pairing (see the `SRC_*` constants in [`crate::alu`]).
pub const F_ALU_SRC: (u32, u32) = (17, 3);
/// ALU operation (see the `OP_*` constants in [`crate::alu`]).
pub const F_ALU_OP: (u32, u32) = (20, 3);
/// ALU destination mode (see the `DEST_*` constants in [`crate::alu`]).
pub const F_ALU_DEST: (u32, u32) = (23, 3);
/// ALU A-side register address.
pub const F_A_SEL: (u32, u32) = (26, 4);
/// ALU B-side register address.
pub const F_B_SEL: (u32, u32) = (30, 4);
/// ALU direct input; the low nibble feeds the low slice.
pub const F_DATA: (u32, u32) = (34, 8);
/// Carry into the low ALU slice.
pub const F_ALU_CIN: (u32, u32) = (42, 1);

/// Width of the microword and the pipeline register.
pub const MICROWORD_BITS: u32 = 48;
/// Width of the microcode address.
pub const ADDRESS_BITS: u32 = 12;

/// ORs `value` into `word` at the given field position.
pub fn pack(word: u64, field: (u32, u32), value: u64) -> u64 {
    let (start, width) = field;
    let mask = (u64::MAX >> (64 - width)) << start;
    (word & !mask) | ((value << start) & mask)
}

/// The composed microprogrammed CPU.
///
/// Load microcode with [`Cpu::load_microcode`] before the run; the register
/// files and pipeline register are inspectable afterwards through the
/// public fields.
pub struct Cpu {
    /// Synchronous reset input.
    pub reset: Signal,
    /// The CPU clock.
    pub clock: Signal,
    /// The concatenated microcode address.
    pub uc_addr: Bus,
    /// The microword currently addressed in the ROM.
    pub uc_data: Bus,
    /// The pipeline register holding the executing microword.
    pub pipeline: Bus,
    /// The microcode ROM.
    pub rom: Rom,
    /// Low address slice.
    pub seq0: Sequencer,
    /// Middle address slice.
    pub seq1: Sequencer,
    /// High address slice.
    pub seq2: Sequencer,
    /// Low datapath slice.
    pub alu0: AluSlice,
    /// High datapath slice.
    pub alu1: AluSlice,
    /// Carry out of the high sequencer slice.
    pub seq_cout: Signal,
    /// Carry out of the high ALU slice.
    pub alu_cout: Signal,

    seq_din0: Bus,
    seq_din1: Bus,
    seq_din2: Bus,
    seq_rin: Bus,
    seq_orin: Bus,
    seq_s0: Signal,
    seq_s1: Signal,
    seq_zero: Signal,
    seq_re: Signal,
    seq_fe: Signal,
    seq_pup: Signal,
    seq_cin: Signal,
    seq_y0: Bus,
    seq_y1: Bus,
    seq_y2: Bus,

    alu_din0: Bus,
    alu_din1: Bus,
    alu_a_sel: Bus,
    alu_b_sel: Bus,
    alu_src: Bus,
    alu_op: Bus,
    alu_dest: Bus,
    alu_cin: Signal,
    alu_y0: Bus,
    alu_y1: Bus,

    pl_br0: Slice,
    pl_br1: Slice,
    pl_br2: Slice,
    pl_fe: Slice,
    pl_pup: Slice,
    pl_s0: Slice,
    pl_s1: Slice,
    pl_zero: Slice,
    pl_alu_src: Slice,
    pl_alu_op: Slice,
    pl_alu_dest: Slice,
    pl_a_sel: Slice,
    pl_b_sel: Slice,
    pl_d0: Slice,
    pl_d1: Slice,
    pl_cin: Slice,
    ua_lo: Slice,
    ua_mid: Slice,
    ua_hi: Slice,
}

impl Cpu {
    /// Builds the CPU around externally supplied reset and clock signals.
    pub fn new(nets: &mut Netlist, reset: Signal, clock: Signal) -> Result<Self, SimError> {
        let uc_addr = nets.bus(ADDRESS_BITS);
        let uc_data = nets.bus(MICROWORD_BITS);
        let pipeline = nets.bus(MICROWORD_BITS);
        let rom = Rom::new(uc_addr, uc_data, 1 << ADDRESS_BITS);

        let seq_din0 = nets.bus(4);
        let seq_din1 = nets.bus(4);
        let seq_din2 = nets.bus(4);
        let seq_rin = nets.bus(4);
        let seq_orin = nets.bus(4);
        let seq_s0 = nets.signal();
        let seq_s1 = nets.signal();
        let seq_zero = nets.signal();
        let seq_re = nets.signal_init(true);
        let seq_fe = nets.signal();
        let seq_pup = nets.signal();
        let seq_cin = nets.signal_init(true);
        let carry01 = nets.signal();
        let carry12 = nets.signal();
        let seq_cout = nets.signal();
        let seq_y0 = nets.bus(4);
        let seq_y1 = nets.bus(4);
        let seq_y2 = nets.bus(4);

        let seq0 = Sequencer::new(
            nets, reset, clock, seq_din0, seq_rin, seq_orin, seq_s0, seq_s1, seq_zero, seq_cin,
            seq_re, seq_fe, seq_pup, seq_y0, carry01,
        );
        let seq1 = Sequencer::new(
            nets, reset, clock, seq_din1, seq_rin, seq_orin, seq_s0, seq_s1, seq_zero, carry01,
            seq_re, seq_fe, seq_pup, seq_y1, carry12,
        );
        let seq2 = Sequencer::new(
            nets, reset, clock, seq_din2, seq_rin, seq_orin, seq_s0, seq_s1, seq_zero, carry12,
            seq_re, seq_fe, seq_pup, seq_y2, seq_cout,
        );

        let alu_din0 = nets.bus(4);
        let alu_din1 = nets.bus(4);
        let alu_a_sel = nets.bus(4);
        let alu_b_sel = nets.bus(4);
        let alu_src = nets.bus(3);
        let alu_op = nets.bus(3);
        let alu_dest = nets.bus(3);
        let alu_cin = nets.signal();
        let alu_carry = nets.signal();
        let alu_cout = nets.signal();
        let alu_y0 = nets.bus(4);
        let alu_y1 = nets.bus(4);
        let alu0_f0 = nets.signal();
        let alu0_f3 = nets.signal();
        let alu0_ovr = nets.signal();
        let alu1_f0 = nets.signal();
        let alu1_f3 = nets.signal();
        let alu1_ovr = nets.signal();

        let alu0 = AluSlice::new(
            nets, clock, alu_din0, alu_a_sel, alu_b_sel, alu_src, alu_op, alu_dest, alu_cin,
            alu_y0, alu_carry, alu0_f0, alu0_f3, alu0_ovr,
        );
        let alu1 = AluSlice::new(
            nets, clock, alu_din1, alu_a_sel, alu_b_sel, alu_src, alu_op, alu_dest, alu_carry,
            alu_y1, alu_cout, alu1_f0, alu1_f3, alu1_ovr,
        );

        let field = |f: (u32, u32)| pipeline.slice(f.0, f.0 + f.1);
        Ok(Self {
            reset,
            clock,
            uc_addr,
            uc_data,
            pipeline,
            rom,
            seq0,
            seq1,
            seq2,
            alu0,
            alu1,
            seq_cout,
            alu_cout,
            seq_din0,
            seq_din1,
            seq_din2,
            seq_rin,
            seq_orin,
            seq_s0,
            seq_s1,
            seq_zero,
            seq_re,
            seq_fe,
            seq_pup,
            seq_cin,
            seq_y0,
            seq_y1,
            seq_y2,
            alu_din0,
            alu_din1,
            alu_a_sel,
            alu_b_sel,
            alu_src,
            alu_op,
            alu_dest,
            alu_cin,
            alu_y0,
            alu_y1,
            pl_br0: field(F_BRANCH0)?,
            pl_br1: field(F_BRANCH1)?,
            pl_br2: field(F_BRANCH2)?,
            pl_fe: field(F_FILE_EN)?,
            pl_pup: field(F_PUSH_POP)?,
            pl_s0: field(F_SRC0)?,
            pl_s1: field(F_SRC1)?,
            pl_zero: field(F_ZERO)?,
            pl_alu_src: field(F_ALU_SRC)?,
            pl_alu_op: field(F_ALU_OP)?,
            pl_alu_dest: field(F_ALU_DEST)?,
            pl_a_sel: field(F_A_SEL)?,
            pl_b_sel: field(F_B_SEL)?,
            pl_d0: pipeline.slice(F_DATA.0, F_DATA.0 + 4)?,
            pl_d1: pipeline.slice(F_DATA.0 + 4, F_DATA.0 + 8)?,
            pl_cin: field(F_ALU_CIN)?,
            ua_lo: uc_addr.slice(0, 4)?,
            ua_mid: uc_addr.slice(4, 8)?,
            ua_hi: uc_addr.slice(8, 12)?,
        })
    }

    /// Fills the microcode ROM from address 0.
    pub fn load_microcode(&mut self, words: &[u64]) {
        self.rom.load_words(words);
    }
}

impl Component for Cpu {
    fn visit(&mut self, v: &mut dyn Visitor) {
        v.signal("reset", self.reset);
        v.signal("clock", self.clock);
        v.bus("uc_addr", self.uc_addr);
        v.bus("uc_data", self.uc_data);
        v.bus("pipeline", self.pipeline);
        v.signal("seq_cout", self.seq_cout);
        v.signal("alu_cout", self.alu_cout);
        v.bus("alu_y0", self.alu_y0);
        v.bus("alu_y1", self.alu_y1);
        v.child("rom", &mut self.rom);
        v.child("seq0", &mut self.seq0);
        v.child("seq1", &mut self.seq1);
        v.child("seq2", &mut self.seq2);
        v.child("alu0", &mut self.alu0);
        v.child("alu1", &mut self.alu1);
    }

    fn evaluate(&mut self, cx: &mut StepContext<'_>) -> Result<(), SimError> {
        let nets = &mut *cx.nets;

        // Sequencer control from the executing microword.
        nets.assign(self.seq_din0, self.pl_br0)?;
        nets.assign(self.seq_din1, self.pl_br1)?;
        nets.assign(self.seq_din2, self.pl_br2)?;
        nets.assign(self.seq_fe, self.pl_fe)?;
        nets.assign(self.seq_pup, self.pl_pup)?;
        nets.assign(self.seq_s0, self.pl_s0)?;
        nets.assign(self.seq_s1, self.pl_s1)?;
        nets.assign(self.seq_zero, self.pl_zero)?;
        nets.drive(self.seq_rin, 0);
        nets.drive(self.seq_orin, 0);
        nets.drive(self.seq_re, 1);
        nets.drive(self.seq_cin, 1);

        // Concatenated next address into the microcode ROM.
        nets.assign(self.ua_lo, self.seq_y0)?;
        nets.assign(self.ua_mid, self.seq_y1)?;
        nets.assign(self.ua_hi, self.seq_y2)?;

        // Datapath control.
        nets.assign(self.alu_din0, self.pl_d0)?;
        nets.assign(self.alu_din1, self.pl_d1)?;
        nets.assign(self.alu_a_sel, self.pl_a_sel)?;
        nets.assign(self.alu_b_sel, self.pl_b_sel)?;
        nets.assign(self.alu_src, self.pl_alu_src)?;
        nets.assign(self.alu_op, self.pl_alu_op)?;
        nets.assign(self.alu_dest, self.pl_alu_dest)?;
        nets.assign(self.alu_cin, self.pl_cin)?;

        if nets.rising_edge(self.clock) {
            nets.assign(self.pipeline, self.uc_data)?;
        }
        Ok(())
    }
}
