/*
 *  Copyright 2025-2026 Colliery Software
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! Library half of `n0n4ctl`: argument definitions and command handlers.

pub mod cli;
pub mod commands;

pub use cli::Cli;

/// Installs logging for a command-line run; `--verbose` turns on debug
/// output, otherwise only warnings are shown.
pub fn init_logging(cli: &Cli) {
    let level = if cli.verbose { "debug" } else { "warn" };
    n0n4::init_logging(Some(level), false);
}
