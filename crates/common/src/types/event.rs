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

//! Stop reasons reported by the debuggee and the debug events the
//! controller maps them to.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Why the debuggee stopped, as reported over the process channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    SoftwareBreakpointHit,
    HardwareBreak,
    Singlestep,
    ExecutionBegin,
    ExecutionEnd,
}

/// Breakpoint flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BpType {
    Software,
    Hardware,
}

/// Watchpoint flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WatchpointType {
    Read,
    Write,
}

/// A debug event as reported to the user of the controller. After a
/// `BreakpointHit` is observed the debuggee's IP equals the breakpoint
/// address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DebugEvent {
    BreakpointHit { kind: BpType, address: u64 },
    WatchpointTrigger { kind: WatchpointType, address: u64 },
    Singlestep,
    ExecutionBegin,
    ExecutionEnd,
}

impl fmt::Display for DebugEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BreakpointHit { address, .. } => {
                write!(f, "breakpoint hit at address {address}")
            }
            Self::WatchpointTrigger { address, .. } => {
                write!(f, "watchpoint triggered at memory address {address}")
            }
            Self::Singlestep => write!(f, "singlestep done"),
            Self::ExecutionBegin => write!(f, "execution started"),
            Self::ExecutionEnd => write!(f, "execution ended"),
        }
    }
}
