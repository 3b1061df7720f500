// Copyright 2025-Present GoSight Maintainers
// SPDX-License-Identifier: Apache-2.0

pub mod identity;
pub mod tag;
