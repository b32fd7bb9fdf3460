//! Deterministic, pure logic shared by every client adapter.
//!
//! Core modules must be free of I/O side effects: the exception taxonomy, the
//! pattern tables that classify raw client messages, the wire types, and the
//! pass/fail evaluation of fixture results.

pub mod exceptions;
pub mod fixtures;
pub mod mapper;
pub mod types;
