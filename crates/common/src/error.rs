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

//! Error taxonomy of the debugger core.
//!
//! Three error kinds cross module boundaries: [`ParseError`] for lexical
//! or grammatical failures (fatal for the current parse, recoverable at
//! the session level), [`DebuggerError`] for violated preconditions on
//! the controller API and transport failures (the session remains
//! valid), and [`InterpretError`] for malformed location programs.
//! Invariant violations do not get an error type; they are programming
//! errors and panic.

use thiserror::Error;

/// A lexical or grammatical failure, stamped with the source position of
/// the offending token.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{row}:{col}: {message}")]
pub struct ParseError {
    pub row: usize,
    pub col: usize,
    pub message: String,
}

impl ParseError {
    pub fn new(row: usize, col: usize, message: impl Into<String>) -> Self {
        Self { row, col, message: message.into() }
    }
}

/// A violated precondition on the debugger API or a failure talking to
/// the debuggee. The operation had no visible effect; the session stays
/// usable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct DebuggerError {
    message: String,
}

impl DebuggerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }

    /// A transport-level failure, distinguishable from precondition
    /// violations by its message prefix.
    pub fn transport(message: impl Into<String>) -> Self {
        Self { message: format!("error communicating with the VM: {}", message.into()) }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// A malformed location program: stack underflow, an illegal operand
/// combination, or leftover stack values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct InterpretError {
    message: String,
}

impl InterpretError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

impl From<InterpretError> for DebuggerError {
    fn from(err: InterpretError) -> Self {
        DebuggerError::new(format!("location expression: {err}"))
    }
}

impl From<ParseError> for DebuggerError {
    fn from(err: ParseError) -> Self {
        DebuggerError::new(format!("parse error: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_carries_position() {
        let err = ParseError::new(3, 14, "unexpected token");
        assert_eq!(err.to_string(), "3:14: unexpected token");
    }

    #[test]
    fn test_transport_errors_are_distinguishable() {
        let err = DebuggerError::transport("connection reset");
        assert!(err.to_string().starts_with("error communicating with the VM"));
        let err = DebuggerError::new("No breakpoint at address 4!");
        assert!(!err.to_string().starts_with("error communicating with the VM"));
    }

    #[test]
    fn test_interpret_error_converts() {
        let err: DebuggerError = InterpretError::new("stack underflow").into();
        assert_eq!(err.to_string(), "location expression: stack underflow");
    }
}
