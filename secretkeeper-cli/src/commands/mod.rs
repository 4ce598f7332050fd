// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! CLI command modules.

pub mod read;
pub mod serve;
pub mod status;
pub mod validate;
pub mod write;
