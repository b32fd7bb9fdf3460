//! Uniform harness over Ethereum execution-client transition tools.
//!
//! Each client ships a binary with its own CLI, process model and error
//! wording. This crate drives them through one interface and maps their
//! free-text errors onto a shared exception taxonomy.
//!
//! - **[`core`]**: Pure logic. The exception taxonomy, per-client pattern
//!   tables and the classifier, wire types, fixture pass/fail evaluation.
//! - **[`io`]**: Side effects. Subprocesses, the persistent server, the batch
//!   consumer, debug artifacts and configuration.
//! - **[`clients`]**: Which strategy and which table each client uses.

pub mod clients;
pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
