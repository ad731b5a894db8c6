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

//! The bidirectional mapping between source lines and instruction
//! addresses.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Line-number table: each source line maps to at most one address,
/// while one address may be produced by several lines.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineMapping {
    line_to_addr: BTreeMap<usize, u64>,
}

impl LineMapping {
    pub fn new(line_to_addr: BTreeMap<usize, u64>) -> Self {
        Self { line_to_addr }
    }

    /// The address the given source line maps to.
    pub fn address(&self, line: usize) -> Option<u64> {
        self.line_to_addr.get(&line).copied()
    }

    /// Every source line that maps to the given address.
    pub fn lines(&self, address: u64) -> Vec<usize> {
        self.line_to_addr
            .iter()
            .filter(|(_, addr)| **addr == address)
            .map(|(line, _)| *line)
            .collect()
    }

    /// All `(line, address)` pairs in line order.
    pub fn entries(&self) -> impl Iterator<Item = (usize, u64)> + '_ {
        self.line_to_addr.iter().map(|(line, addr)| (*line, *addr))
    }
}
