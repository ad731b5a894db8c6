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

//! Source-level debugging.
//!
//! [`Source`] owns the optional debug information of a session (line
//! table, DIE tree, source text) and layers source-level operations
//! over the native controller: line breakpoints, function lookup,
//! active-variable resolution, variable locations and types,
//! source-level stepping and expression evaluation.

pub mod die;
pub mod expr;
pub mod line_mapping;
pub mod loc;
pub mod parser;
pub mod source_file;
pub mod types;

use crate::native::Native;
use die::{Die, Tag};
use expr::{ExpressionEvaluator, TypedValue};
use line_mapping::LineMapping;
use loc::{Location, LocationInterpreter};
use parser::DebugInfo;
use source_file::SourceFile;
use std::collections::{BTreeMap, BTreeSet};
use tdb_common::{DebugEvent, DebuggerError};
use tracing::{debug, info, warn};
use types::{
    PointerType, PrimitiveKind, PrimitiveType, StructuredMember, StructuredType, Type,
};

/// Handles most logic behind source-level debugging.
#[derive(Default)]
pub struct Source {
    line_mapping: Option<LineMapping>,
    source_file: Option<SourceFile>,
    top_die: Option<Die>,
    type_cache: BTreeMap<usize, Type>,
    evaluated_expressions: Vec<TypedValue>,
}

impl Source {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a controller from everything a parsed debug-info file
    /// carries.
    pub fn from_debug_info(info: DebugInfo) -> Self {
        let mut source = Self::new();
        if let Some(mapping) = info.line_mapping {
            info!("Found line mapping in debug info");
            source.register_line_mapping(LineMapping::new(mapping));
        }
        if let Some(code) = info.source_code {
            info!("Found source code in debug info");
            source.register_source_file(SourceFile::new(&code));
        }
        if let Some(top_die) = info.top_die {
            info!("Found DIE information in debug info");
            source.register_debug_info(top_die);
        }
        source
    }

    pub fn register_line_mapping(&mut self, mapping: LineMapping) {
        self.line_mapping = Some(mapping);
    }

    pub fn register_source_file(&mut self, file: SourceFile) {
        self.source_file = Some(file);
    }

    pub fn register_debug_info(&mut self, top_die: Die) {
        self.top_die = Some(top_die);
        self.type_cache.clear();
    }

    /// Sets a software breakpoint at the address the source line maps
    /// to and returns that address.
    pub fn set_source_software_breakpoint(
        &self,
        native: &mut Native,
        line: usize,
    ) -> Result<u64, DebuggerError> {
        let address = self.line_address(line)?;
        native.set_breakpoint(address)?;
        Ok(address)
    }

    /// Removes the software breakpoint at the address the source line
    /// maps to and returns that address.
    pub fn unset_source_software_breakpoint(
        &self,
        native: &mut Native,
        line: usize,
    ) -> Result<u64, DebuggerError> {
        let address = self.line_address(line)?;
        native.unset_breakpoint(address)?;
        Ok(address)
    }

    pub fn enable_source_software_breakpoint(
        &self,
        native: &mut Native,
        line: usize,
    ) -> Result<u64, DebuggerError> {
        let address = self.line_address(line)?;
        native.enable_breakpoint(address)?;
        Ok(address)
    }

    pub fn disable_source_software_breakpoint(
        &self,
        native: &mut Native,
        line: usize,
    ) -> Result<u64, DebuggerError> {
        let address = self.line_address(line)?;
        native.disable_breakpoint(address)?;
        Ok(address)
    }

    fn line_address(&self, line: usize) -> Result<u64, DebuggerError> {
        let mapping = self
            .line_mapping
            .as_ref()
            .ok_or_else(|| DebuggerError::new("No debug info for line mapping"))?;
        mapping
            .address(line)
            .ok_or_else(|| DebuggerError::new(format!("No debug info for line '{line}'")))
    }

    /// The latest source line that produced the instruction at `addr`,
    /// if the line table knows it. Ties between lines break high.
    pub fn addr_to_line(&self, addr: u64) -> Option<usize> {
        self.line_mapping.as_ref()?.lines(addr).into_iter().max()
    }

    /// The address the source line compiled to.
    pub fn line_to_addr(&self, line: usize) -> Option<u64> {
        self.line_mapping.as_ref()?.address(line)
    }

    /// All `(line, address)` pairs of the line table.
    pub fn line_entries(&self) -> Vec<(usize, u64)> {
        self.line_mapping.as_ref().map(|m| m.entries().collect()).unwrap_or_default()
    }

    /// Name of the function owning the instruction at `address`.
    /// Nested functions are not supported; only compile-unit level
    /// function DIEs are searched.
    pub fn function_name_by_address(&self, address: u64) -> Option<&str> {
        let top_die = self.top_die.as_ref()?;
        for die in top_die.children() {
            if die.tag() != Tag::Function {
                continue;
            }
            let (Some(begin), Some(end)) = (die.begin_addr(), die.end_addr()) else { continue };
            if begin <= address && address < end {
                debug!(address, "found function DIE");
                return die.name();
            }
        }
        None
    }

    /// The `[begin, end)` address range of the named function.
    pub fn function_addr_by_name(&self, name: &str) -> Option<(u64, u64)> {
        let top_die = self.top_die.as_ref()?;
        for die in top_die.children() {
            if die.tag() != Tag::Function || die.name() != Some(name) {
                continue;
            }
            return Some((die.begin_addr()?, die.end_addr()?));
        }
        None
    }

    /// Resolves a user-entered string to an address: a number is taken
    /// as a source line, anything else as a function name whose entry
    /// address is returned.
    pub fn address_from_string(&self, s: &str) -> Result<u64, DebuggerError> {
        if let Ok(line) = s.parse::<usize>() {
            return self
                .line_to_addr(line)
                .ok_or_else(|| DebuggerError::new(format!("No debug info for line '{line}'")));
        }
        self.function_addr_by_name(s)
            .map(|(begin, _)| begin)
            .ok_or_else(|| DebuggerError::new(format!("No function named '{s}'")))
    }

    /// Names of all variables in scope at `address`.
    pub fn scoped_variables(&self, address: u64) -> BTreeSet<String> {
        self.active_variables(address).into_keys().collect()
    }

    /// The variable DIEs visible at `address`, by name. A scope or
    /// function is entered only when the address lies in its range;
    /// inner definitions shadow outer ones.
    fn active_variables(&self, address: u64) -> BTreeMap<String, &Die> {
        let mut result = BTreeMap::new();
        if let Some(top_die) = &self.top_die {
            Self::find_variables(address, top_die, &mut result);
        }
        result
    }

    fn find_variables<'d>(address: u64, die: &'d Die, result: &mut BTreeMap<String, &'d Die>) {
        if die.tag() == Tag::Variable {
            if let Some(name) = die.name() {
                result.insert(name.to_string(), die);
            }
            return;
        }
        if matches!(die.tag(), Tag::Scope | Tag::Function) {
            let in_range = match (die.begin_addr(), die.end_addr()) {
                (Some(begin), Some(end)) => begin <= address && address < end,
                _ => false,
            };
            if !in_range {
                return;
            }
        }
        for child in die.children() {
            Self::find_variables(address, child, result);
        }
    }

    /// The innermost DIE declaring `name` that is visible at `address`.
    pub(crate) fn variable_die(&self, address: u64, name: &str) -> Option<&Die> {
        self.active_variables(address).remove(name)
    }

    /// Computes where the named variable lives right now. Runs the
    /// variable's location expression against the debuggee, which can
    /// cost several process round trips.
    pub fn variable_location(
        &self,
        native: &mut Native,
        name: &str,
    ) -> Result<Option<Location>, DebuggerError> {
        if self.top_die.is_none() {
            return Ok(None);
        }
        let ip = native.get_ip()?;
        let Some(die) = self.variable_die(ip, name) else {
            return Ok(None);
        };
        let Some(location_program) = die.location_expr().filter(|l| !l.is_empty()) else {
            return Ok(None);
        };
        let location_program = location_program.to_vec();
        let location = LocationInterpreter::interpret(&location_program, native)?;
        Ok(Some(location))
    }

    /// Reconstructs the named variable's type at the current IP.
    pub fn variable_type_information(
        &mut self,
        native: &mut Native,
        name: &str,
    ) -> Result<Option<Type>, DebuggerError> {
        if self.top_die.is_none() {
            return Ok(None);
        }
        let ip = native.get_ip()?;
        let Some(type_id) = self.variable_die(ip, name).and_then(Die::type_ref) else {
            return Ok(None);
        };
        Ok(self.type_info(type_id))
    }

    /// Reconstructs the type with the given DIE id, memoized per id so
    /// shared and self-referential subtypes are built once.
    pub fn type_info(&mut self, id: usize) -> Option<Type> {
        let top_die = self.top_die.take()?;
        let result = Self::reconstruct_type(&top_die, &mut self.type_cache, id);
        self.top_die = Some(top_die);
        result
    }

    fn reconstruct_type(
        top_die: &Die,
        cache: &mut BTreeMap<usize, Type>,
        id: usize,
    ) -> Option<Type> {
        if let Some(cached) = cache.get(&id) {
            return Some(cached.clone());
        }
        let die = top_die.find_by_id(id)?;
        let reconstructed = match die.tag() {
            Tag::PrimitiveType => {
                let name = die.name()?;
                let Some(kind) = PrimitiveKind::from_keyword(name) else {
                    info!(id, name, "unsupported primitive type");
                    return None;
                };
                let Some(size) = die.size() else {
                    info!(id, "primitive type size not found");
                    return None;
                };
                Type::Primitive(PrimitiveType { kind, size })
            }
            Tag::StructuredType => {
                let name = die.name()?;
                let size = die.size().unwrap_or(0);
                let members = die
                    .members()
                    .unwrap_or(&[])
                    .iter()
                    .map(|member| StructuredMember {
                        name: member.name.clone(),
                        ty: Self::reconstruct_type(top_die, cache, member.type_id).map(Box::new),
                        offset: member.offset,
                    })
                    .collect();
                Type::Structured(StructuredType { name: name.to_string(), size, members })
            }
            Tag::PointerType => {
                let Some(pointee_id) = die.type_ref() else {
                    info!(id, "pointer type is missing its pointee");
                    return None;
                };
                let Some(size) = die.size() else {
                    info!(id, "pointer type is missing its size");
                    return None;
                };
                let pointee_name = top_die.find_by_id(pointee_id).and_then(Die::name)?;
                // The pointee stays an id reference; reconstructing it
                // here would chase reference cycles forever.
                Type::Pointer(PointerType {
                    pointee_id,
                    pointee_name: pointee_name.to_string(),
                    size,
                })
            }
            tag => panic!("DIE tag {tag:?} does not describe a type"),
        };
        cache.insert(id, reconstructed.clone());
        Some(reconstructed)
    }

    /// Source-level step into: steps instructions until one maps to a
    /// source line. The first step honors a breakpoint on the current
    /// instruction; stepping stops early on any non-singlestep event.
    ///
    /// Line number information should be complete when using this,
    /// otherwise parts of functions may be skipped over.
    pub fn step_in(&self, native: &mut Native) -> Result<DebugEvent, DebuggerError> {
        let mut event = native.perform_single_step()?;
        while event == DebugEvent::Singlestep && self.addr_to_line(native.get_ip()?).is_none() {
            event = native.do_raw_single_step()?;
        }
        Ok(event)
    }

    /// Source-level step over: like [`Source::step_in`] but calls are
    /// run to completion instead of being descended into.
    pub fn step_over(&self, native: &mut Native) -> Result<DebugEvent, DebuggerError> {
        let mut event = native.perform_step_over(true)?;
        while event == DebugEvent::Singlestep && self.addr_to_line(native.get_ip()?).is_none() {
            event = native.perform_step_over(false)?;
        }
        Ok(event)
    }

    /// Parses and evaluates an expression against live native state.
    /// The result is appended to the expression history and returned
    /// together with its index there, so it can be referenced later as
    /// `$index`.
    pub fn evaluate_expression(
        &mut self,
        native: &mut Native,
        expression: &str,
    ) -> Result<(TypedValue, usize), DebuggerError> {
        let parsed = expr::parse_expression(expression)
            .map_err(|e| DebuggerError::new(format!("expression parse error: {e}")))?;
        let value = ExpressionEvaluator::new(native, self).evaluate(&parsed)?;
        self.evaluated_expressions.push(value.clone());
        Ok((value, self.evaluated_expressions.len() - 1))
    }

    /// Previously evaluated expressions, indexable by their `$N`
    /// history number.
    pub fn evaluated_expressions(&self) -> &[TypedValue] {
        &self.evaluated_expressions
    }

    /// A line of the registered source program, if available.
    pub fn line(&self, idx: usize) -> Option<&str> {
        self.source_file.as_ref()?.line(idx)
    }

    /// Lines of the registered source program, clamped to its end.
    /// Empty when no source file was registered.
    pub fn lines_range(&self, idx: usize, amount: usize) -> Vec<&str> {
        self.source_file.as_ref().map(|f| f.lines_range(idx, amount)).unwrap_or_else(|| {
            warn!("no source file registered");
            Vec::new()
        })
    }
}
