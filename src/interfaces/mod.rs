//! Interface adapters for driving the engine from outside the process.

pub mod csv;
