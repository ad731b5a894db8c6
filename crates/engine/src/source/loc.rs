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

//! Location expressions and their interpreter.
//!
//! A location expression is a small stack-machine program attached to a
//! variable's debug-information entry; running it against the live
//! debuggee yields the place the variable currently lives: a register,
//! a memory address, or a register-relative slot.

use crate::native::Native;
use serde::{Deserialize, Serialize};
use std::fmt;
use tdb_common::InterpretError;

/// One instruction of a location program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LocExpr {
    /// Push the register itself (the variable lives in it).
    PushRegister(String),
    /// Push the frame-base register plus a fixed offset.
    FrameBaseOffset(i64),
    /// Push a fixed memory address.
    PushAddress(u64),
    /// Pop an addressable location, read one word there and push the
    /// read value as a memory address.
    Deref,
    /// Pop two locations and push their sum.
    Add,
}

/// Where a value lives in the executing program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Location {
    /// In the register itself.
    Register(String),
    /// In memory, at register value plus offset.
    Offset { reg: String, offset: i64 },
    /// In memory, at a fixed address.
    Address(u64),
    /// In memory, at the sum of two register values.
    RegisterSum(String, String),
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Register(reg) => write!(f, "{reg}"),
            Self::Offset { reg, offset } => write!(f, "[{reg} + {offset}]"),
            Self::Address(address) => write!(f, "[{address}]"),
            Self::RegisterSum(r1, r2) => write!(f, "[{r1} + {r2}]"),
        }
    }
}

/// The register local variable offsets are relative to unless a caller
/// overrides it.
pub const DEFAULT_FRAME_BASE: &str = "BP";

/// Stack machine reducing a location program to a concrete
/// [`Location`].
pub struct LocationInterpreter<'a> {
    stack: Vec<Location>,
    native: &'a mut Native,
    frame_base: &'a str,
}

impl<'a> LocationInterpreter<'a> {
    /// Interprets `exprs` with the default frame base register.
    pub fn interpret(exprs: &[LocExpr], native: &'a mut Native) -> Result<Location, InterpretError> {
        Self::interpret_with_frame_base(exprs, native, DEFAULT_FRAME_BASE)
    }

    /// Interprets `exprs`, resolving frame-base offsets against the
    /// given register.
    pub fn interpret_with_frame_base(
        exprs: &[LocExpr],
        native: &'a mut Native,
        frame_base: &'a str,
    ) -> Result<Location, InterpretError> {
        let mut vm = Self { stack: Vec::new(), native, frame_base };
        vm.run(exprs)?;
        let result = vm
            .stack
            .pop()
            .ok_or_else(|| InterpretError::new("empty stack at the end of calculation"))?;
        if !vm.stack.is_empty() {
            return Err(InterpretError::new(format!(
                "{} extra values left on the stack",
                vm.stack.len()
            )));
        }
        Ok(result)
    }

    fn run(&mut self, exprs: &[LocExpr]) -> Result<(), InterpretError> {
        for ins in exprs {
            match ins {
                LocExpr::PushRegister(name) => self.stack.push(Location::Register(name.clone())),
                LocExpr::FrameBaseOffset(offset) => self.stack.push(Location::Offset {
                    reg: self.frame_base.to_string(),
                    offset: *offset,
                }),
                LocExpr::PushAddress(address) => self.stack.push(Location::Address(*address)),
                LocExpr::Add => {
                    let rhs = self.pop()?;
                    let lhs = self.pop()?;
                    let sum = Self::add_operands(lhs, rhs)?;
                    self.stack.push(sum);
                }
                LocExpr::Deref => {
                    let loc = self.pop()?;
                    let address = self.resolve_address(&loc)?;
                    let value = self
                        .native
                        .read_memory(address, 1)
                        .map_err(|e| InterpretError::new(e.to_string()))?[0];
                    self.stack.push(Location::Address(value as u64));
                }
            }
        }
        Ok(())
    }

    fn pop(&mut self) -> Result<Location, InterpretError> {
        self.stack.pop().ok_or_else(|| InterpretError::new("stack underflow"))
    }

    fn add_operands(lhs: Location, rhs: Location) -> Result<Location, InterpretError> {
        match (lhs, rhs) {
            (Location::Address(a), Location::Address(b)) => Ok(Location::Address(a + b)),
            (Location::Register(reg), Location::Address(i))
            | (Location::Address(i), Location::Register(reg)) => {
                Ok(Location::Offset { reg, offset: i as i64 })
            }
            (Location::Register(r1), Location::Register(r2)) => {
                Ok(Location::RegisterSum(r1, r2))
            }
            (lhs, rhs) => Err(InterpretError::new(format!(
                "cannot add locations '{lhs}' and '{rhs}'"
            ))),
        }
    }

    /// The concrete memory address a location refers to. A bare
    /// register has no address and cannot be dereferenced.
    fn resolve_address(&mut self, loc: &Location) -> Result<u64, InterpretError> {
        let register = |native: &mut Native, name: &str| {
            native.get_register(name).map_err(|e| InterpretError::new(e.to_string()))
        };
        match loc {
            Location::Register(_) => Err(InterpretError::new(format!(
                "cannot dereference '{loc}', it is not addressable"
            ))),
            Location::Offset { reg, offset } => {
                let base = register(self.native, reg)?;
                Ok((base + offset) as u64)
            }
            Location::Address(address) => Ok(*address),
            Location::RegisterSum(r1, r2) => {
                let v1 = register(self.native, r1)?;
                let v2 = register(self.native, r2)?;
                Ok((v1 + v2) as u64)
            }
        }
    }
}
