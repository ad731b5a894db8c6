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

//! TDB Engine - core debugger logic
//!
//! This crate provides the debugging core a front-end drives: the
//! [`Process`] contract towards the running VM and its wire-protocol
//! client, the [`Native`] controller maintaining transparent software
//! breakpoints and hardware watchpoints over it, and the [`Source`]
//! controller layering line tables, debug-information entries, variable
//! resolution, type reconstruction and expression evaluation on top.

#![cfg_attr(not(test), warn(unused_crate_dependencies))]

pub mod native;
pub mod process;
pub mod source;
pub mod test_utils;

pub use native::Native;
pub use process::{Process, VmProcess};
pub use source::Source;
