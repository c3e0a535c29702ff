//! Signal storage and the two-phase value model.
//!
//! All signal state lives in a single flat [`Netlist`]. Components hold only
//! cheap `Copy` handles ([`Signal`], [`Bus`], [`Slice`]) that index into it.
//! Each slot keeps three values: `current` (visible to every reader during a
//! step), `future` (staged by writers during the step), and `prior` (the
//! value before the most recent commit phase, used for edge detection).
//!
//! The scheduler drives the commit machinery: [`Netlist::settle`] captures
//! priors once, then repeatedly copies `future` into `current` until a pass
//! changes nothing, bounded to catch non-converging models.

use serde::{Deserialize, Serialize};

use crate::error::SimError;

/// Opaque flat identifier of a signal slot in a [`Netlist`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct SignalId(u32);

impl SignalId {
    /// Creates a `SignalId` from a raw index.
    pub fn from_raw(index: u32) -> Self {
        Self(index)
    }

    /// Returns the raw index.
    pub fn as_raw(self) -> u32 {
        self.0
    }
}

/// One signal's storage: the current/future/prior triple plus width metadata.
#[derive(Clone, Debug)]
struct Slot {
    current: u64,
    future: u64,
    prior: u64,
    width: u32,
    mask: u64,
}

impl Slot {
    fn new(width: u32, init: u64) -> Self {
        let mask = width_mask(width);
        let init = init & mask;
        Self {
            current: init,
            future: init,
            prior: init,
            width,
            mask,
        }
    }
}

fn width_mask(width: u32) -> u64 {
    u64::MAX >> (64 - width)
}

/// A single-bit signal handle.
///
/// Reads see the committed `current` value; writes stage the `future` value.
/// Edge predicates compare `current` against the `prior` captured at the
/// start of the most recent commit phase, so they hold for exactly one step
/// after the change lands.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Signal {
    pub(crate) id: SignalId,
}

/// A fixed-width bit-vector handle, 1 to 64 bits wide.
///
/// The value is read and written as an unsigned integer masked to the
/// declared width.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Bus {
    pub(crate) id: SignalId,
    pub(crate) width: u32,
}

impl Bus {
    /// Returns the declared bit width.
    pub fn width(self) -> u32 {
        self.width
    }

    /// Returns a view over bits `start..stop` (half-open) of this bus.
    ///
    /// The view holds no storage of its own: reads extract from the parent's
    /// current value, writes merge into the parent's future value through a
    /// mask. Fails with [`SimError::SliceRange`] if `start >= stop` or the
    /// range exceeds the bus width.
    pub fn slice(self, start: u32, stop: u32) -> Result<Slice, SimError> {
        if start >= stop || stop > self.width {
            return Err(SimError::SliceRange {
                start,
                stop,
                width: self.width,
            });
        }
        Ok(Slice {
            id: self.id,
            start,
            width: stop - start,
        })
    }

    /// Returns a one-bit view of bit `index`.
    pub fn bit(self, index: u32) -> Result<Slice, SimError> {
        self.slice(index, index + 1)
    }
}

/// A non-owning view over a contiguous bit range of a [`Bus`].
///
/// Its identity is (parent, start, width). Writes through disjoint slices of
/// the same bus compose within one step; overlapping writes are
/// last-write-wins in call order.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Slice {
    pub(crate) id: SignalId,
    pub(crate) start: u32,
    pub(crate) width: u32,
}

impl Slice {
    /// Returns the width of the viewed range.
    pub fn width(self) -> u32 {
        self.width
    }
}

/// A value-producing operand: anything whose current value can be read.
pub trait Source: Copy {
    /// Bit width of the operand.
    fn width(&self) -> u32;
    /// Reads the committed current value.
    fn read(&self, nets: &Netlist) -> u64;
}

/// A writable target: anything whose future value can be staged.
pub trait Sink: Copy {
    /// Bit width of the target.
    fn width(&self) -> u32;
    /// Stages `value` (masked to the target width) as the future value.
    fn write(&self, nets: &mut Netlist, value: u64);
}

impl Source for Signal {
    fn width(&self) -> u32 {
        1
    }

    fn read(&self, nets: &Netlist) -> u64 {
        nets.slot(self.id).current
    }
}

impl Sink for Signal {
    fn width(&self) -> u32 {
        1
    }

    fn write(&self, nets: &mut Netlist, value: u64) {
        nets.slot_mut(self.id).future = value & 1;
    }
}

impl Source for Bus {
    fn width(&self) -> u32 {
        self.width
    }

    fn read(&self, nets: &Netlist) -> u64 {
        nets.slot(self.id).current
    }
}

impl Sink for Bus {
    fn width(&self) -> u32 {
        self.width
    }

    fn write(&self, nets: &mut Netlist, value: u64) {
        let slot = nets.slot_mut(self.id);
        slot.future = value & slot.mask;
    }
}

impl Source for Slice {
    fn width(&self) -> u32 {
        self.width
    }

    fn read(&self, nets: &Netlist) -> u64 {
        (nets.slot(self.id).current >> self.start) & width_mask(self.width)
    }
}

impl Sink for Slice {
    fn width(&self) -> u32 {
        self.width
    }

    /// Merges the written bits into the parent's staged future value,
    /// leaving the other bits untouched by this write.
    fn write(&self, nets: &mut Netlist, value: u64) {
        let mask = width_mask(self.width) << self.start;
        let slot = nets.slot_mut(self.id);
        let merged = (slot.future & !mask) | ((value << self.start) & mask);
        slot.future = merged;
    }
}

/// The flat store of all signal state in a simulation.
///
/// Created by the driver, used to allocate every [`Signal`] and [`Bus`] while
/// wiring the component tree, then handed to the scheduler which drives the
/// commit machinery. There is no global instance; every operation that needs
/// signal state takes the netlist explicitly.
#[derive(Debug, Default)]
pub struct Netlist {
    slots: Vec<Slot>,
}

impl Netlist {
    /// Creates an empty netlist.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of allocated signals.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns true if no signals have been allocated.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Allocates a single-bit signal initialized low.
    pub fn signal(&mut self) -> Signal {
        self.signal_init(false)
    }

    /// Allocates a single-bit signal with the given initial value.
    pub fn signal_init(&mut self, init: bool) -> Signal {
        let id = self.alloc(1, init as u64);
        Signal { id }
    }

    /// Allocates a bus of the given width, initialized to zero.
    ///
    /// # Panics
    ///
    /// Panics if `width` is 0 or greater than 64: the host word is the
    /// backing storage, and a zero-width bus has no meaning.
    pub fn bus(&mut self, width: u32) -> Bus {
        self.bus_init(width, 0)
    }

    /// Allocates a bus of the given width with an initial value (masked).
    ///
    /// # Panics
    ///
    /// Panics if `width` is 0 or greater than 64.
    pub fn bus_init(&mut self, width: u32, init: u64) -> Bus {
        assert!(
            (1..=64).contains(&width),
            "bus width must be between 1 and 64, got {width}"
        );
        let id = self.alloc(width, init);
        Bus { id, width }
    }

    fn alloc(&mut self, width: u32, init: u64) -> SignalId {
        let id = SignalId(self.slots.len() as u32);
        self.slots.push(Slot::new(width, init));
        id
    }

    fn slot(&self, id: SignalId) -> &Slot {
        &self.slots[id.0 as usize]
    }

    fn slot_mut(&mut self, id: SignalId) -> &mut Slot {
        &mut self.slots[id.0 as usize]
    }

    /// Reads the committed current value of any operand.
    pub fn value(&self, src: impl Source) -> u64 {
        src.read(self)
    }

    /// Reads a single-bit signal as a boolean.
    pub fn high(&self, sig: Signal) -> bool {
        self.slot(sig.id).current != 0
    }

    /// True iff the most recent commit phase changed `sig` from 0 to 1.
    pub fn rising_edge(&self, sig: Signal) -> bool {
        let slot = self.slot(sig.id);
        slot.current != slot.prior && slot.current == 1
    }

    /// True iff the most recent commit phase changed `sig` from 1 to 0.
    pub fn falling_edge(&self, sig: Signal) -> bool {
        let slot = self.slot(sig.id);
        slot.current != slot.prior && slot.current == 0
    }

    /// Stages `value` as the future value of `dst`, masked to its width.
    ///
    /// Integer operands mask silently; use [`Netlist::assign`] for
    /// width-checked transfers between signals.
    pub fn drive(&mut self, dst: impl Sink, value: u64) {
        dst.write(self, value);
    }

    /// Width-checked transfer: stages the current value of `src` as the
    /// future value of `dst`.
    ///
    /// Fails fast with [`SimError::WidthMismatch`] when the operand widths
    /// differ; a transfer never silently truncates or zero-extends.
    pub fn assign(&mut self, dst: impl Sink, src: impl Source) -> Result<(), SimError> {
        if dst.width() != src.width() {
            return Err(SimError::WidthMismatch {
                dst: dst.width(),
                src: src.width(),
            });
        }
        let value = src.read(self);
        dst.write(self, value);
        Ok(())
    }

    /// Captures `current` into `prior` for every slot.
    ///
    /// Called exactly once per step, before the commit loop, so edge state
    /// survives the loop's repeated passes.
    pub(crate) fn latch_prior(&mut self) {
        for slot in &mut self.slots {
            slot.prior = slot.current;
        }
    }

    /// Copies `future` into `current` for every slot; reports whether any
    /// value changed.
    pub(crate) fn commit_all(&mut self) -> bool {
        let mut changed = false;
        for slot in &mut self.slots {
            changed |= slot.current != slot.future;
            slot.current = slot.future;
        }
        changed
    }

    /// Runs one commit phase: latches priors, then commits repeatedly until
    /// a pass changes nothing.
    ///
    /// Returns whether any value changed. Fails with
    /// [`SimError::NonConvergence`] if the loop exceeds `max_iterations`
    /// passes; `time` is reported in the error. Normally driven by the
    /// scheduler; public so components can be exercised in isolation.
    pub fn settle(&mut self, time: u64, max_iterations: u32) -> Result<bool, SimError> {
        self.latch_prior();
        let mut iterations = 0u32;
        loop {
            if !self.commit_all() {
                break;
            }
            iterations += 1;
            if iterations > max_iterations {
                return Err(SimError::NonConvergence { time, iterations });
            }
        }
        Ok(iterations > 0)
    }

    /// True iff the most recent commit phase changed the slot's value.
    pub(crate) fn slot_changed(&self, id: SignalId) -> bool {
        let slot = self.slot(id);
        slot.current != slot.prior
    }

    /// The committed current value of a slot, by raw id.
    pub(crate) fn slot_current(&self, id: SignalId) -> u64 {
        self.slot(id).current
    }

    /// The declared width of a slot, by raw id.
    pub(crate) fn slot_width(&self, id: SignalId) -> u32 {
        self.slot(id).width
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_id_roundtrip() {
        let id = SignalId::from_raw(42);
        assert_eq!(id.as_raw(), 42);
    }

    #[test]
    fn serde_roundtrip_signal_id() {
        let id = SignalId::from_raw(7);
        let json = serde_json::to_string(&id).unwrap();
        let back: SignalId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }

    #[test]
    fn signal_starts_at_init_value() {
        let mut nets = Netlist::new();
        let a = nets.signal();
        let b = nets.signal_init(true);
        assert!(!nets.high(a));
        assert!(nets.high(b));
    }

    #[test]
    fn write_is_invisible_until_commit() {
        let mut nets = Netlist::new();
        let y = nets.bus(4);
        nets.drive(y, 9);
        assert_eq!(nets.value(y), 0);
        assert!(nets.settle(0, 100).unwrap());
        assert_eq!(nets.value(y), 9);
    }

    #[test]
    fn bus_write_masks_to_width() {
        let mut nets = Netlist::new();
        let y = nets.bus(4);
        nets.drive(y, 0x1f2);
        nets.settle(0, 100).unwrap();
        assert_eq!(nets.value(y), 0x2);
    }

    #[test]
    fn bus_init_masks() {
        let mut nets = Netlist::new();
        let y = nets.bus_init(4, 0x35);
        assert_eq!(nets.value(y), 0x5);
    }

    #[test]
    #[should_panic(expected = "bus width")]
    fn zero_width_bus_panics() {
        let mut nets = Netlist::new();
        let _ = nets.bus(0);
    }

    #[test]
    #[should_panic(expected = "bus width")]
    fn oversized_bus_panics() {
        let mut nets = Netlist::new();
        let _ = nets.bus(65);
    }

    #[test]
    fn full_width_bus_holds_all_bits() {
        let mut nets = Netlist::new();
        let y = nets.bus(64);
        nets.drive(y, u64::MAX);
        nets.settle(0, 100).unwrap();
        assert_eq!(nets.value(y), u64::MAX);
    }

    #[test]
    fn slice_round_trip() {
        // 4-bit y: write 5 into the one-bit slice y[1:2], commit -> 0b0010;
        // then assign y[0:3] into x[1:4], commit -> 0b0100.
        let mut nets = Netlist::new();
        let x = nets.bus(4);
        let y = nets.bus(4);
        nets.drive(y.slice(1, 2).unwrap(), 5);
        nets.settle(0, 100).unwrap();
        assert_eq!(nets.value(y), 0b0010);
        nets.assign(x.slice(1, 4).unwrap(), y.slice(0, 3).unwrap())
            .unwrap();
        nets.settle(0, 100).unwrap();
        assert_eq!(nets.value(x), 0b0100);
    }

    #[test]
    fn slice_reads_extract_and_shift() {
        let mut nets = Netlist::new();
        let y = nets.bus_init(8, 0b1010_0110);
        assert_eq!(nets.value(y.slice(0, 4).unwrap()), 0b0110);
        assert_eq!(nets.value(y.slice(4, 8).unwrap()), 0b1010);
        assert_eq!(nets.value(y.bit(1).unwrap()), 1);
        assert_eq!(nets.value(y.bit(0).unwrap()), 0);
    }

    #[test]
    fn disjoint_slice_writes_compose() {
        let mut nets = Netlist::new();
        let y = nets.bus(8);
        nets.drive(y.slice(0, 4).unwrap(), 0x6);
        nets.drive(y.slice(4, 8).unwrap(), 0xa);
        nets.settle(0, 100).unwrap();
        assert_eq!(nets.value(y), 0xa6);
    }

    #[test]
    fn overlapping_slice_writes_last_wins() {
        let mut nets = Netlist::new();
        let y = nets.bus(8);
        nets.drive(y.slice(0, 4).unwrap(), 0xf);
        nets.drive(y.slice(2, 6).unwrap(), 0x0);
        nets.settle(0, 100).unwrap();
        // The second write cleared bits 2 and 3 staged by the first.
        assert_eq!(nets.value(y), 0b0000_0011);
    }

    #[test]
    fn slice_write_preserves_committed_bits() {
        let mut nets = Netlist::new();
        let y = nets.bus_init(8, 0xa6);
        nets.settle(0, 100).unwrap();
        nets.drive(y.slice(0, 4).unwrap(), 0x3);
        nets.settle(0, 100).unwrap();
        assert_eq!(nets.value(y), 0xa3);
    }

    #[test]
    fn slice_range_errors() {
        let mut nets = Netlist::new();
        let y = nets.bus(4);
        assert!(matches!(
            y.slice(2, 2),
            Err(SimError::SliceRange {
                start: 2,
                stop: 2,
                width: 4
            })
        ));
        assert!(matches!(y.slice(3, 1), Err(SimError::SliceRange { .. })));
        assert!(matches!(y.slice(0, 5), Err(SimError::SliceRange { .. })));
        assert!(matches!(y.bit(4), Err(SimError::SliceRange { .. })));
    }

    #[test]
    fn assign_checks_widths() {
        let mut nets = Netlist::new();
        let a = nets.bus(4);
        let b = nets.bus(8);
        assert!(matches!(
            nets.assign(a, b),
            Err(SimError::WidthMismatch { dst: 4, src: 8 })
        ));
        assert!(matches!(
            nets.assign(b, a),
            Err(SimError::WidthMismatch { dst: 8, src: 4 })
        ));
    }

    #[test]
    fn assign_signal_to_slice() {
        let mut nets = Netlist::new();
        let s = nets.signal_init(true);
        let y = nets.bus(4);
        nets.assign(y.bit(2).unwrap(), s).unwrap();
        nets.settle(0, 100).unwrap();
        assert_eq!(nets.value(y), 0b0100);
    }

    #[test]
    fn rising_edge_after_commit() {
        let mut nets = Netlist::new();
        let clk = nets.signal();
        nets.drive(clk, 1);
        nets.settle(0, 100).unwrap();
        assert!(nets.rising_edge(clk));
        assert!(!nets.falling_edge(clk));
    }

    #[test]
    fn falling_edge_after_commit() {
        let mut nets = Netlist::new();
        let clk = nets.signal_init(true);
        nets.drive(clk, 0);
        nets.settle(0, 100).unwrap();
        assert!(nets.falling_edge(clk));
        assert!(!nets.rising_edge(clk));
    }

    #[test]
    fn edges_clear_when_value_holds() {
        let mut nets = Netlist::new();
        let clk = nets.signal();
        nets.drive(clk, 1);
        nets.settle(0, 100).unwrap();
        assert!(nets.rising_edge(clk));
        // Next commit phase with no new write: value unchanged, edge gone.
        nets.settle(1, 100).unwrap();
        assert!(!nets.rising_edge(clk));
        assert!(!nets.falling_edge(clk));
    }

    #[test]
    fn edge_survives_multiple_commit_passes() {
        // A second signal changing in the same step forces an extra commit
        // pass; the clock's prior must not be overwritten by it.
        let mut nets = Netlist::new();
        let clk = nets.signal();
        let data = nets.bus(4);
        nets.drive(clk, 1);
        nets.drive(data, 7);
        nets.settle(0, 100).unwrap();
        assert!(nets.rising_edge(clk));
    }

    #[test]
    fn settle_reports_change() {
        let mut nets = Netlist::new();
        let y = nets.bus(4);
        assert!(!nets.settle(0, 100).unwrap());
        nets.drive(y, 3);
        assert!(nets.settle(0, 100).unwrap());
        assert!(!nets.settle(0, 100).unwrap());
    }

    #[test]
    fn netlist_len() {
        let mut nets = Netlist::new();
        assert!(nets.is_empty());
        let _ = nets.signal();
        let _ = nets.bus(8);
        assert_eq!(nets.len(), 2);
    }
}
