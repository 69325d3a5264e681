// SPDX-FileCopyrightText: 2026 Tipflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared test utilities for Tipflow integration tests.
//!
//! [`TestHarness`] wires a temp-file SQLite database to the full engine
//! with a scripted [`MockProcessor`] standing in for the payment
//! provider. Each harness is fully isolated; tests are independent and
//! order-insensitive.

pub mod harness;
pub mod mock_processor;

pub use harness::TestHarness;
pub use mock_processor::MockProcessor;
