//! Integration test suite for the orchestration engine.
//!
//! These tests exercise the full pipeline from request to final response,
//! including phased parallel execution and failure recovery. They verify
//! that all components work together correctly.
//!
//! # Test Categories
//!
//! - `pipeline_e2e`: Full routing pipeline tests
//! - `phased_execution`: Phase layering and bounded concurrency
//! - `recovery`: Retry, circuit-breaker, and partial-failure behavior
//!
//! # CI Compatibility
//!
//! All collaborators are mocked; no network calls are made, so the suite
//! is safe to run in CI environments.

mod fixtures;

mod phased_execution;
mod pipeline_e2e;
mod recovery;
