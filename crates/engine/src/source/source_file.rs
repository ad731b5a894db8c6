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

//! Read-only view of the debugged program's source text.

use serde::{Deserialize, Serialize};

/// The registered source file, split into lines once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFile {
    lines: Vec<String>,
}

impl SourceFile {
    pub fn new(content: &str) -> Self {
        Self { lines: content.lines().map(str::to_string).collect() }
    }

    /// A single line, zero-indexed.
    pub fn line(&self, idx: usize) -> Option<&str> {
        self.lines.get(idx).map(String::as_str)
    }

    /// Up to `amount` lines starting at `idx`. Out-of-range requests
    /// stop at the end instead of failing.
    pub fn lines_range(&self, idx: usize, amount: usize) -> Vec<&str> {
        self.lines.iter().skip(idx).take(amount).map(String::as_str).collect()
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }
}
