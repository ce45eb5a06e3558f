//! CSV in, CSV out: an operation stream for the binary and the closing
//! account statement it prints.

pub mod operation_reader;
pub mod statement_writer;
