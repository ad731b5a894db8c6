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

//! TDB Asm - parser for TinyVM assembly text
//!
//! Turns the textual representation of a TinyVM program (a sectioned
//! file with `.text` and `.data` segments) into the in-memory
//! [`Program`](tdb_common::Program) handed to the VM, and validates
//! single instructions for the debugger's text writes.

pub mod parser;

pub use parser::{parse_instruction, parse_program, Parser};
