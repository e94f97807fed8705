//! Test suites for the lifecycle engine and container.

mod support;
