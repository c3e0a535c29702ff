//! Word-array memories: a clocked RAM and a combinational ROM.
//!
//! Both track `memory[address]` onto their output every step. The RAM
//! additionally commits a write on its own rising clock edge when the write
//! enable is asserted. Contents are loaded before the run, from a hex image
//! file or a word slice; there is no run-time load path.

use std::path::Path;

use strobe_sim::{Bus, Component, Signal, SimError, StepContext, Visitor};

use crate::image::read_hex_image;

/// A read/write word memory with combinational read and synchronous write.
pub struct Ram {
    clock: Signal,
    din: Bus,
    write: Signal,
    address: Bus,
    out: Bus,
    memory: Vec<u64>,
    mask: u64,
}

impl Ram {
    /// Creates a RAM of `words` entries; the word width is taken from the
    /// output bus.
    ///
    /// # Panics
    ///
    /// Panics if `words` is zero.
    pub fn new(clock: Signal, din: Bus, write: Signal, address: Bus, out: Bus, words: usize) -> Self {
        assert!(words > 0, "memory needs at least one word");
        let mask = u64::MAX >> (64 - out.width());
        Self {
            clock,
            din,
            write,
            address,
            out,
            memory: vec![0; words],
            mask,
        }
    }

    /// Overwrites memory from address 0 with the given words (masked to the
    /// word width); any remaining contents are untouched.
    pub fn load_words(&mut self, words: &[u64]) {
        for (slot, &word) in self.memory.iter_mut().zip(words) {
            *slot = word & self.mask;
        }
    }

    /// Loads a line-oriented hex image, one word per line from address 0.
    pub fn load_image(&mut self, path: &Path) -> Result<(), SimError> {
        let width = self.out.width();
        let words = read_hex_image(path, width)?;
        self.load_words(&words);
        Ok(())
    }

    /// The committed word at `address`, for inspection.
    pub fn word(&self, address: usize) -> u64 {
        self.memory[address % self.memory.len()]
    }
}

impl Component for Ram {
    fn visit(&mut self, v: &mut dyn Visitor) {
        v.signal("clock", self.clock);
        v.bus("din", self.din);
        v.signal("write", self.write);
        v.bus("address", self.address);
        v.bus("out", self.out);
    }

    fn evaluate(&mut self, cx: &mut StepContext<'_>) -> Result<(), SimError> {
        let nets = &mut *cx.nets;
        let address = nets.value(self.address) as usize % self.memory.len();
        nets.drive(self.out, self.memory[address]);
        if nets.rising_edge(self.clock) && nets.high(self.write) {
            self.memory[address] = nets.value(self.din) & self.mask;
        }
        Ok(())
    }
}

/// A read-only word memory with combinational read.
pub struct Rom {
    address: Bus,
    out: Bus,
    memory: Vec<u64>,
    mask: u64,
}

impl Rom {
    /// Creates a ROM of `words` zeroed entries; the word width is taken
    /// from the output bus.
    ///
    /// # Panics
    ///
    /// Panics if `words` is zero.
    pub fn new(address: Bus, out: Bus, words: usize) -> Self {
        assert!(words > 0, "memory needs at least one word");
        let mask = u64::MAX >> (64 - out.width());
        Self {
            address,
            out,
            memory: vec![0; words],
            mask,
        }
    }

    /// Fills the ROM from address 0 with the given words (masked).
    pub fn load_words(&mut self, words: &[u64]) {
        for (slot, &word) in self.memory.iter_mut().zip(words) {
            *slot = word & self.mask;
        }
    }

    /// Loads a line-oriented hex image, one word per line from address 0.
    pub fn load_image(&mut self, path: &Path) -> Result<(), SimError> {
        let width = self.out.width();
        let words = read_hex_image(path, width)?;
        self.load_words(&words);
        Ok(())
    }

    /// The word at `address`, for inspection.
    pub fn word(&self, address: usize) -> u64 {
        self.memory[address % self.memory.len()]
    }
}

impl Component for Rom {
    fn visit(&mut self, v: &mut dyn Visitor) {
        v.bus("address", self.address);
        v.bus("out", self.out);
    }

    fn evaluate(&mut self, cx: &mut StepContext<'_>) -> Result<(), SimError> {
        let address = cx.nets.value(self.address) as usize % self.memory.len();
        cx.nets.drive(self.out, self.memory[address]);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;
    use strobe_sim::Netlist;

    fn eval(ram: &mut Ram, nets: &mut Netlist) {
        let mut next = 0u64;
        let mut cx = StepContext::new(nets, 0, &mut next);
        ram.evaluate(&mut cx).unwrap();
        nets.settle(0, 100).unwrap();
    }

    struct RamFixture {
        nets: Netlist,
        ram: Ram,
        clock: Signal,
        din: Bus,
        write: Signal,
        address: Bus,
        out: Bus,
    }

    fn ram_fixture(words: usize) -> RamFixture {
        let mut nets = Netlist::new();
        let clock = nets.signal();
        let din = nets.bus(8);
        let write = nets.signal();
        let address = nets.bus(8);
        let out = nets.bus(8);
        let ram = Ram::new(clock, din, write, address, out, words);
        RamFixture {
            nets,
            ram,
            clock,
            din,
            write,
            address,
            out,
        }
    }

    #[test]
    fn read_tracks_address() {
        let mut f = ram_fixture(256);
        f.ram.load_words(&[0x11, 0x22, 0x33]);
        f.nets.drive(f.address, 1);
        f.nets.settle(0, 100).unwrap();
        eval(&mut f.ram, &mut f.nets);
        assert_eq!(f.nets.value(f.out), 0x22);
        f.nets.drive(f.address, 2);
        f.nets.settle(0, 100).unwrap();
        eval(&mut f.ram, &mut f.nets);
        assert_eq!(f.nets.value(f.out), 0x33);
    }

    #[test]
    fn write_commits_on_rising_edge_only() {
        let mut f = ram_fixture(16);
        f.nets.drive(f.address, 3);
        f.nets.drive(f.din, 0xab);
        f.nets.drive(f.write, 1);
        f.nets.settle(0, 100).unwrap();
        // No edge yet: evaluating must not write.
        eval(&mut f.ram, &mut f.nets);
        assert_eq!(f.ram.word(3), 0);
        // Rising edge lands the write.
        f.nets.drive(f.clock, 1);
        f.nets.settle(0, 100).unwrap();
        eval(&mut f.ram, &mut f.nets);
        assert_eq!(f.ram.word(3), 0xab);
    }

    #[test]
    fn write_requires_enable() {
        let mut f = ram_fixture(16);
        f.nets.drive(f.address, 3);
        f.nets.drive(f.din, 0xab);
        f.nets.settle(0, 100).unwrap();
        f.nets.drive(f.clock, 1);
        f.nets.settle(0, 100).unwrap();
        eval(&mut f.ram, &mut f.nets);
        assert_eq!(f.ram.word(3), 0);
    }

    #[test]
    fn address_wraps_at_capacity() {
        let mut f = ram_fixture(4);
        f.ram.load_words(&[0xa0, 0xa1, 0xa2, 0xa3]);
        f.nets.drive(f.address, 6);
        f.nets.settle(0, 100).unwrap();
        eval(&mut f.ram, &mut f.nets);
        assert_eq!(f.nets.value(f.out), 0xa2);
    }

    #[test]
    fn ram_loads_hex_image() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"de\nad\nbe\nef\n").unwrap();

        let mut f = ram_fixture(16);
        f.ram.load_image(file.path()).unwrap();
        assert_eq!(f.ram.word(0), 0xde);
        assert_eq!(f.ram.word(3), 0xef);
        assert_eq!(f.ram.word(4), 0);
    }

    #[test]
    fn rom_reads_loaded_words() {
        let mut nets = Netlist::new();
        let address = nets.bus(4);
        let out = nets.bus(12);
        let mut rom = Rom::new(address, out, 16);
        rom.load_words(&[0x123, 0x456]);
        nets.drive(address, 1);
        nets.settle(0, 100).unwrap();
        let mut next = 0u64;
        let mut cx = StepContext::new(&mut nets, 0, &mut next);
        rom.evaluate(&mut cx).unwrap();
        nets.settle(0, 100).unwrap();
        assert_eq!(nets.value(out), 0x456);
    }

    #[test]
    fn load_words_masks_to_width() {
        let mut nets = Netlist::new();
        let address = nets.bus(4);
        let out = nets.bus(4);
        let mut rom = Rom::new(address, out, 4);
        rom.load_words(&[0x1f]);
        assert_eq!(rom.word(0), 0xf);
    }
}
