/*
 * Copyright 2025 Paul Moore Parks and contributors
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

//! Version string exported across the ABI. Built once from
//! `CARGO_PKG_VERSION` plus the git hash / build date `build.rs` stamps
//! into the environment, rather than a hand-maintained literal.

use std::sync::OnceLock;

fn build_version_string() -> String {
    format!(
        "{}+{}.{}",
        env!("CARGO_PKG_VERSION"),
        option_env!("GIT_HASH").unwrap_or("unknown"),
        option_env!("BUILD_DATE").unwrap_or("unknown").replace([' ', ':'], "-")
    )
}

static VERSION: OnceLock<String> = OnceLock::new();

/// UTF-8 bytes of the version string, no trailing NUL, with process
/// lifetime - the only ABI value the kernel is allowed to hand back a
/// pointer into without the caller ever copying or freeing it.
pub fn version_bytes() -> &'static [u8] {
    VERSION.get_or_init(build_version_string).as_bytes()
}
