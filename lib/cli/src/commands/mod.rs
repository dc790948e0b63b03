//! The commands available in the `emu-resolve` binary.
mod bundle;
mod library;
mod open;

pub use {bundle::*, library::*, open::*};
