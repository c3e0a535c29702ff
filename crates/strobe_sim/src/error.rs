//! Error types for the discrete-event simulation engine.
//!
//! All failures during construction, wiring, or execution are represented as
//! variants of [`SimError`]. None of them are recoverable by the engine: a
//! failing step aborts the run, and any trace file written so far reflects
//! only the steps completed before the failure.

use std::io;

/// Errors that can occur while building or running a simulation.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    /// A checked transfer between operands of different bit widths.
    #[error("width mismatch: cannot assign a {src}-bit source to a {dst}-bit target")]
    WidthMismatch {
        /// Bit width of the assignment target.
        dst: u32,
        /// Bit width of the source operand.
        src: u32,
    },

    /// A bit-range request outside the parent bus.
    #[error("bit range {start}:{stop} is invalid for a {width}-bit bus")]
    SliceRange {
        /// First bit of the requested range (inclusive).
        start: u32,
        /// End of the requested range (exclusive).
        stop: u32,
        /// Width of the parent bus.
        width: u32,
    },

    /// The commit loop exceeded its iteration bound within a single step.
    #[error("commit loop failed to converge at time {time} after {iterations} iterations")]
    NonConvergence {
        /// Simulated time at which convergence failed.
        time: u64,
        /// Number of commit passes executed before giving up.
        iterations: u32,
    },

    /// Too many evaluation rounds at a single time point: the model is
    /// oscillating and will never settle.
    #[error("delta cycle limit exceeded at time {time} (max {max} rounds): model does not settle")]
    DeltaCycleLimit {
        /// Simulated time at which the limit was hit.
        time: u64,
        /// The configured per-time-point round limit.
        max: u32,
    },

    /// A memory image file line could not be parsed as a word of the
    /// expected width. Reported at load time, before any simulation step.
    #[error("bad memory image {path} at line {line}: {reason}")]
    MalformedImage {
        /// Path of the image file.
        path: String,
        /// The 1-based line number where parsing failed.
        line: usize,
        /// Description of the failure.
        reason: String,
    },

    /// A component's evaluation failed; carries the hierarchical path and
    /// the simulated time for debugging the hardware model.
    #[error("component {path} failed at time {time}: {source}")]
    ComponentFailed {
        /// Dotted hierarchical path of the failing component.
        path: String,
        /// Simulated time of the failing step.
        time: u64,
        /// The underlying failure.
        #[source]
        source: Box<SimError>,
    },

    /// An I/O error while writing trace output or reading a memory image.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
