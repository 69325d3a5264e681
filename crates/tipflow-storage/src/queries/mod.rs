// SPDX-FileCopyrightText: 2026 Tipflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed query modules, one per table.

pub mod summaries;
pub mod tips;
pub mod tokens;
pub mod webhook_events;
