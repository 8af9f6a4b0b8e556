//! Channels that present an interview to a person.

pub mod cli;

pub use cli::{Feed, InputSlot, TerminalInput, TerminalRenderer, spawn_stdin_reader};
