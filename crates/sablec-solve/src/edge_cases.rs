//! Edge case and end-to-end tests for the entailment solver.
