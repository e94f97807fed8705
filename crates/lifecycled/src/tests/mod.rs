//! Test suites for the daemon composition root.

mod behaviour;
mod support;
