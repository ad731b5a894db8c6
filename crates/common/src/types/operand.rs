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

//! Registers and instruction operands.
//!
//! `Display` emits the canonical assembly text form, so parsing an
//! operand and re-emitting it round-trips to a structurally identical
//! operand.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A register of the target machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Register {
    /// General purpose register `R<n>`.
    General(u32),
    /// Stack base pointer.
    Bp,
    /// Stack pointer.
    Sp,
    /// Program counter.
    Ip,
}

impl Register {
    /// Parses a register name. General purpose registers must begin
    /// with `R`; the only other accepted names are the `BP`/`SP`/`IP`
    /// aliases.
    pub fn parse_name(name: &str) -> Option<Self> {
        match name {
            "BP" => Some(Self::Bp),
            "SP" => Some(Self::Sp),
            "IP" => Some(Self::Ip),
            _ => {
                let digits = name.strip_prefix('R')?;
                if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                    return None;
                }
                digits.parse().ok().map(Self::General)
            }
        }
    }

    /// The register's name as the debuggee reports it.
    pub fn name(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::General(n) => write!(f, "R{n}"),
            Self::Bp => write!(f, "BP"),
            Self::Sp => write!(f, "SP"),
            Self::Ip => write!(f, "IP"),
        }
    }
}

/// A memory operand's addressing form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MemAddr {
    /// `[i]`
    Imm(i64),
    /// `[R]`
    Reg(Register),
    /// `[R + i]`
    RegImm(Register, i64),
    /// `[R + R]`
    RegReg(Register, Register),
    /// `[R * i]`
    RegScaled(Register, i64),
    /// `[R + R * i]`
    RegRegScaled(Register, Register, i64),
    /// `[R + i + R]`
    RegImmReg(Register, i64, Register),
    /// `[R + i + R * i]`
    RegImmRegScaled(Register, i64, Register, i64),
}

impl fmt::Display for MemAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Imm(i) => write!(f, "[{i}]"),
            Self::Reg(r) => write!(f, "[{r}]"),
            Self::RegImm(r, i) => write!(f, "[{r} + {i}]"),
            Self::RegReg(r1, r2) => write!(f, "[{r1} + {r2}]"),
            Self::RegScaled(r, i) => write!(f, "[{r} * {i}]"),
            Self::RegRegScaled(r1, r2, i) => write!(f, "[{r1} + {r2} * {i}]"),
            Self::RegImmReg(r1, i, r2) => write!(f, "[{r1} + {i} + {r2}]"),
            Self::RegImmRegScaled(r1, i1, r2, i2) => write!(f, "[{r1} + {i1} + {r2} * {i2}]"),
        }
    }
}

/// An instruction operand. `MOV` accepts the full set; other
/// instructions accept the restricted subsets their signatures list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operand {
    /// Immediate `i`.
    Imm(i64),
    /// Register `R`.
    Reg(Register),
    /// Register plus immediate `R + i`.
    RegImm(Register, i64),
    /// Memory access.
    Mem(MemAddr),
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Imm(i) => write!(f, "{i}"),
            Self::Reg(r) => write!(f, "{r}"),
            Self::RegImm(r, i) => write!(f, "{r} + {i}"),
            Self::Mem(m) => write!(f, "{m}"),
        }
    }
}
