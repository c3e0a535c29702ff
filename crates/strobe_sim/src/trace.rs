//! Waveform trace output.
//!
//! The [`TraceWriter`] trait abstracts trace output so the scheduler does not
//! care about the on-disk format. [`VcdWriter`] implements the IEEE 1364
//! Value Change Dump text format, viewable in GTKWave, Surfer, and similar
//! waveform viewers.
//!
//! The scheduler declares one variable per registered component/signal pair
//! (so a signal wired into several components appears once under each scope,
//! as an alias), writes a full initial dump, and then streams only committed
//! value changes under `#time` markers.

use std::io::Write;

use crate::error::SimError;

/// Identifier of a declared trace variable, in declaration order.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct VarId(u32);

/// Receives the signal hierarchy and the stream of committed value changes.
pub trait TraceWriter {
    /// Opens a hierarchy scope (one per component).
    fn begin_scope(&mut self, name: &str) -> Result<(), SimError>;

    /// Closes the current scope.
    fn end_scope(&mut self) -> Result<(), SimError>;

    /// Declares a variable inside the current scope and returns its id.
    fn declare_var(&mut self, name: &str, width: u32) -> Result<VarId, SimError>;

    /// Writes the full initial dump, one value per declared variable in
    /// declaration order.
    fn dump_initial(&mut self, values: &[u64]) -> Result<(), SimError>;

    /// Records one committed value change at the given time.
    fn record_change(&mut self, time: u64, var: VarId, value: u64) -> Result<(), SimError>;

    /// Flushes and finalizes the output.
    fn finish(&mut self) -> Result<(), SimError>;
}

/// VCD (Value Change Dump) trace writer.
///
/// Produces human-readable text: a header with the time unit, nested
/// `$scope` declarations mirroring the component tree, an initial
/// `$dumpvars` block, then `#time` markers with one line per changed
/// variable. Identifier codes use printable ASCII starting from `!`.
pub struct VcdWriter<W: Write> {
    writer: W,
    /// Per-variable (id code, width), in declaration order.
    vars: Vec<(String, u32)>,
    header_written: bool,
    last_time: Option<u64>,
}

impl<W: Write> VcdWriter<W> {
    /// Creates a VCD writer over any output sink.
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            vars: Vec::new(),
            header_written: false,
            last_time: None,
        }
    }

    fn write_header(&mut self) -> Result<(), SimError> {
        writeln!(self.writer, "$date")?;
        writeln!(self.writer, "  Simulation date")?;
        writeln!(self.writer, "$end")?;
        writeln!(self.writer, "$version")?;
        writeln!(self.writer, "  Strobe logic simulator")?;
        writeln!(self.writer, "$end")?;
        writeln!(self.writer, "$timescale")?;
        writeln!(self.writer, "  1ns")?;
        writeln!(self.writer, "$end")?;
        Ok(())
    }

    /// Generates an identifier code from a sequential index.
    ///
    /// Uses printable ASCII characters starting from `!` (0x21);
    /// multi-character codes are generated for indices >= 94.
    fn make_id_code(index: u32) -> String {
        let mut result = String::new();
        let mut idx = index;
        loop {
            let c = (b'!' + (idx % 94) as u8) as char;
            result.push(c);
            idx /= 94;
            if idx == 0 {
                break;
            }
            idx -= 1;
        }
        result
    }

    fn write_value(&mut self, var: VarId, value: u64) -> Result<(), SimError> {
        let (code, width) = &self.vars[var.0 as usize];
        if *width == 1 {
            writeln!(self.writer, "{}{}", value & 1, code)?;
        } else {
            let w = *width as usize;
            writeln!(self.writer, "b{value:0w$b} {code}")?;
        }
        Ok(())
    }
}

impl<W: Write> TraceWriter for VcdWriter<W> {
    fn begin_scope(&mut self, name: &str) -> Result<(), SimError> {
        if !self.header_written {
            self.write_header()?;
            self.header_written = true;
        }
        writeln!(self.writer, "$scope module {name} $end")?;
        Ok(())
    }

    fn end_scope(&mut self) -> Result<(), SimError> {
        writeln!(self.writer, "$upscope $end")?;
        Ok(())
    }

    fn declare_var(&mut self, name: &str, width: u32) -> Result<VarId, SimError> {
        let id = VarId(self.vars.len() as u32);
        let code = Self::make_id_code(id.0);
        writeln!(self.writer, "$var wire {width} {code} {name} $end")?;
        self.vars.push((code, width));
        Ok(id)
    }

    fn dump_initial(&mut self, values: &[u64]) -> Result<(), SimError> {
        writeln!(self.writer, "$enddefinitions $end")?;
        writeln!(self.writer, "$dumpvars")?;
        for (index, value) in values.iter().enumerate() {
            self.write_value(VarId(index as u32), *value)?;
        }
        writeln!(self.writer, "$end")?;
        Ok(())
    }

    fn record_change(&mut self, time: u64, var: VarId, value: u64) -> Result<(), SimError> {
        if self.last_time != Some(time) {
            writeln!(self.writer, "#{time}")?;
            self.last_time = Some(time);
        }
        self.write_value(var, value)
    }

    fn finish(&mut self) -> Result<(), SimError> {
        self.writer.flush()?;
        Ok(())
    }
}
