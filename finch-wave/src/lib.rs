//! Compiles a declarative illumination schedule into a hardware-ready
//! pulse-step sequence.

mod compiler;
mod schedule;

pub use compiler::{compile, compile_sorted, BitEvent, CompileError, Level, PulseStep};
pub use schedule::schedule;
