//! Property-based tests for replica convergence

mod convergence;
