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

//! Architecture facts for supported target machines.
//!
//! [`Arch`] is an immutable configuration value constructed before the
//! controller; everything the debugger needs to know about a machine
//! (trap opcode, stepping capabilities, debug register layout, call and
//! return instruction sets) is answered here.

use crate::error::DebuggerError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Supported target machines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Machine {
    #[default]
    TinyVm,
}

/// Facts about one target machine.
///
/// Debug register layout on TinyVM: `D0..D3` hold watched addresses,
/// `D4` is the control register. Its low four bits activate the
/// corresponding address register; after a hardware break, bits 8..12
/// carry a one-hot index of the register that fired.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Arch {
    machine: Machine,
}

impl Arch {
    pub fn new(machine: Machine) -> Self {
        Self { machine }
    }

    pub fn machine(&self) -> Machine {
        self.machine
    }

    pub fn supports_hardware_single_step(&self) -> bool {
        match self.machine {
            Machine::TinyVm => true,
        }
    }

    pub fn supports_hardware_watchpoints(&self) -> bool {
        match self.machine {
            Machine::TinyVm => true,
        }
    }

    /// The instruction the controller writes into text to interpose
    /// execution.
    pub fn trap_opcode(&self) -> &'static str {
        match self.machine {
            Machine::TinyVm => "BKPT",
        }
    }

    /// How many debug registers can hold watched addresses.
    pub fn debug_register_count(&self) -> usize {
        match self.machine {
            Machine::TinyVm => 4,
        }
    }

    /// Name of the debug register with the given index.
    pub fn debug_register_name(&self, idx: usize) -> String {
        format!("D{idx}")
    }

    /// Name of the debug control register.
    pub fn debug_control_register_name(&self) -> String {
        self.debug_register_name(self.debug_register_count())
    }

    /// Stores `address` into the debug register `idx` of the fetched
    /// register file.
    pub fn write_debug_register(
        &self,
        idx: usize,
        address: u64,
        regs: &mut BTreeMap<String, u64>,
    ) -> Result<(), DebuggerError> {
        self.check_debug_register_index(idx)?;
        *self.debug_register_slot(&self.debug_register_name(idx), regs)? = address;
        Ok(())
    }

    /// Marks the debug register `idx` active in the control register.
    pub fn activate_debug_register(
        &self,
        idx: usize,
        regs: &mut BTreeMap<String, u64>,
    ) -> Result<(), DebuggerError> {
        self.check_debug_register_index(idx)?;
        *self.debug_register_slot(&self.debug_control_register_name(), regs)? |= 1 << idx;
        Ok(())
    }

    /// Marks the debug register `idx` inactive in the control register.
    pub fn deactivate_debug_register(
        &self,
        idx: usize,
        regs: &mut BTreeMap<String, u64>,
    ) -> Result<(), DebuggerError> {
        self.check_debug_register_index(idx)?;
        *self.debug_register_slot(&self.debug_control_register_name(), regs)? &= !(1 << idx);
        Ok(())
    }

    /// Index of the debug register that caused the current hardware
    /// break, decoded from the control register's trigger bits.
    pub fn triggered_debug_register(
        &self,
        regs: &BTreeMap<String, u64>,
    ) -> Result<usize, DebuggerError> {
        let control_name = self.debug_control_register_name();
        let control = regs.get(&control_name).ok_or_else(|| {
            DebuggerError::new(format!("no '{control_name}' register in the debuggee"))
        })?;
        let mask = (control & 0xFF00) >> 8;
        if mask == 0 {
            return Err(DebuggerError::new(
                "hardware break reported, but no debug register is marked as triggered",
            ));
        }
        Ok(mask.trailing_zeros() as usize)
    }

    /// Mnemonics that enter a function.
    pub fn call_instructions(&self) -> &'static [&'static str] {
        match self.machine {
            Machine::TinyVm => &["CALL"],
        }
    }

    /// Mnemonics that can be used to exit a function.
    pub fn return_instructions(&self) -> &'static [&'static str] {
        match self.machine {
            Machine::TinyVm => &["RET"],
        }
    }

    fn check_debug_register_index(&self, idx: usize) -> Result<(), DebuggerError> {
        if idx >= self.debug_register_count() {
            return Err(DebuggerError::new(format!(
                "debug register index {idx} out of bounds (have {})",
                self.debug_register_count()
            )));
        }
        Ok(())
    }

    fn debug_register_slot<'r>(
        &self,
        name: &str,
        regs: &'r mut BTreeMap<String, u64>,
    ) -> Result<&'r mut u64, DebuggerError> {
        regs.get_mut(name)
            .ok_or_else(|| DebuggerError::new(format!("no '{name}' register in the debuggee")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn debug_registers(arch: &Arch) -> BTreeMap<String, u64> {
        (0..=arch.debug_register_count())
            .map(|i| (arch.debug_register_name(i), 0))
            .collect()
    }

    #[test]
    fn test_tinyvm_facts() {
        let arch = Arch::default();
        assert!(arch.supports_hardware_single_step());
        assert!(arch.supports_hardware_watchpoints());
        assert_eq!(arch.trap_opcode(), "BKPT");
        assert_eq!(arch.debug_register_count(), 4);
        assert_eq!(arch.debug_control_register_name(), "D4");
        assert_eq!(arch.call_instructions(), ["CALL"]);
        assert_eq!(arch.return_instructions(), ["RET"]);
    }

    #[test]
    fn test_debug_register_programming() {
        let arch = Arch::default();
        let mut regs = debug_registers(&arch);
        arch.write_debug_register(2, 100, &mut regs).unwrap();
        arch.activate_debug_register(2, &mut regs).unwrap();
        assert_eq!(regs["D2"], 100);
        assert_eq!(regs["D4"], 0b100);
        arch.deactivate_debug_register(2, &mut regs).unwrap();
        assert_eq!(regs["D4"], 0);
    }

    #[test]
    fn test_debug_register_out_of_bounds() {
        let arch = Arch::default();
        let mut regs = debug_registers(&arch);
        assert!(arch.write_debug_register(4, 0, &mut regs).is_err());
    }

    #[test]
    fn test_triggered_debug_register() {
        let arch = Arch::default();
        let mut regs = debug_registers(&arch);
        assert!(arch.triggered_debug_register(&regs).is_err());
        *regs.get_mut("D4").unwrap() = 0b10 << 8;
        assert_eq!(arch.triggered_debug_register(&regs).unwrap(), 1);
    }
}
