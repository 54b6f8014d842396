// Copyright 2026 Mapreviews Contributors
// SPDX-License-Identifier: Apache-2.0

//! Library half of the `mapreviews` binary: input decoding, output writers,
//! progress display and the environment check.

pub mod display;
pub mod doctor;
pub mod input;
pub mod output;
pub mod run;
