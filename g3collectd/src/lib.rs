/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

pub mod config;
pub mod export;
pub mod import;
pub mod log;
pub mod opts;
pub mod pipeline;
pub mod process;
pub mod serve;
pub mod signal;
pub mod types;
pub mod typesdb;

mod build;
