// TDB - TinyVM Debugger
// Copyright (C) 2024 Zhuo Zhang and Wuqi Zhang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Breakpoint and watchpoint records kept by the native controller.

use crate::types::WatchpointType;
use serde::{Deserialize, Serialize};

/// A software breakpoint. While enabled, the debuggee's text at the
/// breakpoint address holds the trap opcode and `saved_opcode` holds the
/// original instruction; the controller's text accessors hide the swap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoftwareBreakpoint {
    /// The instruction occupying the breakpoint address in the
    /// unpatched program.
    pub saved_opcode: String,
    pub enabled: bool,
}

impl SoftwareBreakpoint {
    pub fn new(saved_opcode: impl Into<String>, enabled: bool) -> Self {
        Self { saved_opcode: saved_opcode.into(), enabled }
    }
}

/// A hardware watchpoint occupying one debug register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Watchpoint {
    pub kind: WatchpointType,
    /// Index of the debug register this watchpoint occupies.
    pub debug_register: u8,
}
