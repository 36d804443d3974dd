//! Cross-component tests for the bandit service.

mod stress_tests;
