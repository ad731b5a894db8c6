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

//! TDB Common - shared functionality for TDB components
//!
//! This crate provides the data model shared by the assembler, the
//! debugger engine and any front-end: the lexer and token model, the
//! operand/instruction/program representation, debug events, breakpoint
//! and watchpoint records, the architecture facts table, the error
//! taxonomy, the channel contract towards the running VM, and logging
//! setup.

pub mod arch;
pub mod error;
pub mod lexer;
pub mod logging;
pub mod macros;
pub mod messenger;
pub mod types;

pub use arch::*;
pub use error::*;
pub use lexer::*;
pub use messenger::*;
pub use types::*;
