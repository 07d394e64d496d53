// ABOUTME: Unified error handling re-exported from saige-core
// ABOUTME: Keeps crate::errors as the import path used across the server
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Saige Dental Intelligence

pub use saige_core::errors::*;
