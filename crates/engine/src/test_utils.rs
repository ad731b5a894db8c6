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

//! Test utilities: an in-process debuggee.
//!
//! [`TestVm`] implements the [`Process`] contract directly, executing a
//! useful subset of the instruction set, so controller behavior can be
//! tested end-to-end without a VM process or a transport. The handle is
//! cheaply cloneable; tests keep a clone to probe raw target state
//! behind the controller's back.

use crate::process::Process;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use tdb_common::{DebuggerError, Instruction, MemAddr, Opcode, Operand, ParseError, StopReason};
use tracing::trace;

const STEP_FUEL: usize = 1_000_000;

/// A miniature TinyVM used as a debuggee in tests.
#[derive(Clone)]
pub struct TestVm {
    state: Rc<RefCell<VmState>>,
}

struct VmState {
    text: Vec<String>,
    memory: Vec<i64>,
    regs: BTreeMap<String, i64>,
    fregs: BTreeMap<String, f64>,
    dregs: BTreeMap<String, u64>,
    stop: Option<StopReason>,
    halted: bool,
    output: String,
}

impl TestVm {
    /// Builds a VM from assembly text. The data segment is loaded at
    /// the bottom of memory; the stack starts at the top.
    pub fn new(program: &str, reg_count: usize, memory_size: usize) -> Result<Self, ParseError> {
        let parsed = tdb_asm::parse_program(program)?;
        let mut memory = vec![0; memory_size];
        memory[..parsed.data.len()].copy_from_slice(&parsed.data);

        let mut regs: BTreeMap<String, i64> =
            (0..reg_count).map(|i| (format!("R{i}"), 0)).collect();
        regs.insert("IP".to_string(), 0);
        regs.insert("BP".to_string(), memory_size as i64);
        regs.insert("SP".to_string(), memory_size as i64);

        let fregs = (0..2).map(|i| (format!("F{i}"), 0.0)).collect();
        let dregs = (0..=4).map(|i| (format!("D{i}"), 0)).collect();

        let state = VmState {
            text: parsed.instructions.iter().map(|ins| ins.to_string()).collect(),
            memory,
            regs,
            fregs,
            dregs,
            stop: Some(StopReason::ExecutionBegin),
            halted: false,
            output: String::new(),
        };
        Ok(Self { state: Rc::new(RefCell::new(state)) })
    }

    /// Everything the program printed so far.
    pub fn output(&self) -> String {
        self.state.borrow().output.clone()
    }

    /// The instruction actually stored in the target's text, bypassing
    /// the controller's breakpoint hiding.
    pub fn raw_text(&self, address: u64) -> String {
        self.state.borrow().text[address as usize].clone()
    }

    /// Raw register value, bypassing the process interface.
    pub fn raw_register(&self, name: &str) -> i64 {
        self.state.borrow().regs[name]
    }
}

impl VmState {
    fn reg(&self, name: &str) -> Result<i64, DebuggerError> {
        self.regs
            .get(name)
            .copied()
            .ok_or_else(|| DebuggerError::new(format!("no register '{name}'")))
    }

    fn set_reg(&mut self, name: &str, value: i64) -> Result<(), DebuggerError> {
        let slot = self
            .regs
            .get_mut(name)
            .ok_or_else(|| DebuggerError::new(format!("no register '{name}'")))?;
        *slot = value;
        Ok(())
    }

    fn operand_value(&self, operand: &Operand) -> Result<i64, DebuggerError> {
        match operand {
            Operand::Imm(i) => Ok(*i),
            Operand::Reg(r) => self.reg(&r.name()),
            Operand::RegImm(r, i) => Ok(self.reg(&r.name())? + i),
            Operand::Mem(m) => {
                let address = self.mem_address(m)?;
                self.read_mem(address)
            }
        }
    }

    fn mem_address(&self, mem: &MemAddr) -> Result<u64, DebuggerError> {
        let value = match mem {
            MemAddr::Imm(i) => *i,
            MemAddr::Reg(r) => self.reg(&r.name())?,
            MemAddr::RegImm(r, i) => self.reg(&r.name())? + i,
            MemAddr::RegReg(r1, r2) => self.reg(&r1.name())? + self.reg(&r2.name())?,
            MemAddr::RegScaled(r, i) => self.reg(&r.name())? * i,
            MemAddr::RegRegScaled(r1, r2, i) => {
                self.reg(&r1.name())? + self.reg(&r2.name())? * i
            }
            MemAddr::RegImmReg(r1, i, r2) => {
                self.reg(&r1.name())? + i + self.reg(&r2.name())?
            }
            MemAddr::RegImmRegScaled(r1, i1, r2, i2) => {
                self.reg(&r1.name())? + i1 + self.reg(&r2.name())? * i2
            }
        };
        u64::try_from(value)
            .map_err(|_| DebuggerError::new(format!("negative memory address {value}")))
    }

    fn read_mem(&self, address: u64) -> Result<i64, DebuggerError> {
        self.memory
            .get(address as usize)
            .copied()
            .ok_or_else(|| DebuggerError::new(format!("memory access at {address} out of range")))
    }

    /// Writes one word; an active watchpoint on the address fires
    /// after the write went through.
    fn write_mem(&mut self, address: u64, value: i64) -> Result<Option<StopReason>, DebuggerError> {
        let size = self.memory.len();
        let slot = self.memory.get_mut(address as usize).ok_or_else(|| {
            DebuggerError::new(format!("memory access at {address} out of range (size {size})"))
        })?;
        *slot = value;

        let control = self.dregs["D4"];
        for idx in 0..4u64 {
            if control & (1 << idx) != 0 && self.dregs[&format!("D{idx}")] == address {
                let control = self.dregs.get_mut("D4").expect("control register exists");
                *control = (*control & !0xFF00) | (1 << idx) << 8;
                return Ok(Some(StopReason::HardwareBreak));
            }
        }
        Ok(None)
    }

    fn register_destination(ins: &Instruction) -> Result<String, DebuggerError> {
        match ins.operands.first() {
            Some(Operand::Reg(r)) => Ok(r.name()),
            _ => Err(DebuggerError::new(format!(
                "instruction '{ins}' needs a register destination"
            ))),
        }
    }

    /// Executes the instruction under IP. Returns the stop reason the
    /// instruction caused, if any.
    fn execute_one(&mut self) -> Result<Option<StopReason>, DebuggerError> {
        if self.halted {
            return Ok(Some(StopReason::ExecutionEnd));
        }
        let ip = self.reg("IP")?;
        let Some(text) = self.text.get(ip as usize).cloned() else {
            self.halted = true;
            return Ok(Some(StopReason::ExecutionEnd));
        };
        let ins = tdb_asm::parse_instruction(&text)
            .map_err(|e| DebuggerError::new(format!("invalid instruction in text: {e}")))?;
        trace!(ip, %ins, "executing");
        self.set_reg("IP", ip + 1)?;

        match ins.opcode {
            Opcode::Bkpt | Opcode::Break => return Ok(Some(StopReason::SoftwareBreakpointHit)),
            Opcode::Halt => {
                self.halted = true;
                return Ok(Some(StopReason::ExecutionEnd));
            }
            Opcode::Nop => {}
            Opcode::Mov => {
                let value = self.operand_value(&ins.operands[1])?;
                match &ins.operands[0] {
                    Operand::Reg(r) => self.set_reg(&r.name(), value)?,
                    Operand::Mem(m) => {
                        let address = self.mem_address(m)?;
                        if let Some(reason) = self.write_mem(address, value)? {
                            return Ok(Some(reason));
                        }
                    }
                    other => {
                        return Err(DebuggerError::new(format!(
                            "invalid MOV destination '{other}'"
                        )))
                    }
                }
            }
            Opcode::Lea => {
                let dest = Self::register_destination(&ins)?;
                let Operand::Mem(m) = &ins.operands[1] else {
                    return Err(DebuggerError::new("LEA source must be a memory operand"));
                };
                let address = self.mem_address(m)?;
                self.set_reg(&dest, address as i64)?;
            }
            Opcode::Add
            | Opcode::Sub
            | Opcode::Mul
            | Opcode::Div
            | Opcode::Imul
            | Opcode::Idiv
            | Opcode::And
            | Opcode::Or
            | Opcode::Xor
            | Opcode::Lsh
            | Opcode::Rsh => {
                let dest = Self::register_destination(&ins)?;
                let lhs = self.reg(&dest)?;
                let rhs = self.operand_value(&ins.operands[1])?;
                let result = match ins.opcode {
                    Opcode::Add => lhs.wrapping_add(rhs),
                    Opcode::Sub => lhs.wrapping_sub(rhs),
                    Opcode::Mul | Opcode::Imul => lhs.wrapping_mul(rhs),
                    Opcode::Div | Opcode::Idiv => {
                        if rhs == 0 {
                            return Err(DebuggerError::new("division by zero"));
                        }
                        lhs / rhs
                    }
                    Opcode::And => lhs & rhs,
                    Opcode::Or => lhs | rhs,
                    Opcode::Xor => lhs ^ rhs,
                    Opcode::Lsh => lhs.wrapping_shl(rhs as u32),
                    Opcode::Rsh => lhs.wrapping_shr(rhs as u32),
                    _ => unreachable!(),
                };
                self.set_reg(&dest, result)?;
            }
            Opcode::Inc | Opcode::Dec | Opcode::Neg | Opcode::Not => {
                let dest = Self::register_destination(&ins)?;
                let value = self.reg(&dest)?;
                let result = match ins.opcode {
                    Opcode::Inc => value.wrapping_add(1),
                    Opcode::Dec => value.wrapping_sub(1),
                    Opcode::Neg => value.wrapping_neg(),
                    Opcode::Not => !value,
                    _ => unreachable!(),
                };
                self.set_reg(&dest, result)?;
            }
            Opcode::Cmp => {
                // Flags are not modeled; evaluate for the side of
                // faulting on bad operands only.
                self.reg(&Self::register_destination(&ins)?)?;
                self.operand_value(&ins.operands[1])?;
            }
            Opcode::Push => {
                let value = self.operand_value(&ins.operands[0])?;
                let sp = self.reg("SP")? - 1;
                self.set_reg("SP", sp)?;
                if let Some(reason) = self.write_mem(sp as u64, value)? {
                    return Ok(Some(reason));
                }
            }
            Opcode::Pop => {
                let dest = Self::register_destination(&ins)?;
                let sp = self.reg("SP")?;
                let value = self.read_mem(sp as u64)?;
                self.set_reg("SP", sp + 1)?;
                self.set_reg(&dest, value)?;
            }
            Opcode::Call => {
                let target = self.operand_value(&ins.operands[0])?;
                let return_address = self.reg("IP")?;
                let sp = self.reg("SP")? - 1;
                self.set_reg("SP", sp)?;
                self.set_reg("IP", target)?;
                if let Some(reason) = self.write_mem(sp as u64, return_address)? {
                    return Ok(Some(reason));
                }
            }
            Opcode::Ret => {
                let sp = self.reg("SP")?;
                let return_address = self.read_mem(sp as u64)?;
                self.set_reg("SP", sp + 1)?;
                self.set_reg("IP", return_address)?;
            }
            Opcode::Jmp => {
                let target = self.operand_value(&ins.operands[0])?;
                self.set_reg("IP", target)?;
            }
            Opcode::Putchar => {
                let value = self.operand_value(&ins.operands[0])?;
                self.output.push(value as u8 as char);
            }
            Opcode::Putnum => {
                let value = self.operand_value(&ins.operands[0])?;
                self.output.push_str(&format!("{value}\n"));
            }
            Opcode::Getchar => {
                let dest = Self::register_destination(&ins)?;
                self.set_reg(&dest, 0)?;
            }
            other => {
                return Err(DebuggerError::new(format!(
                    "the test VM does not execute {other}"
                )))
            }
        }
        Ok(None)
    }
}

impl Process for TestVm {
    fn read_text(&mut self, address: u64, amount: usize) -> Result<Vec<String>, DebuggerError> {
        let state = self.state.borrow();
        let start = address as usize;
        let end = start + amount;
        if end > state.text.len() {
            return Err(DebuggerError::new(format!(
                "text access at {start}-{end} out of range (size {})",
                state.text.len()
            )));
        }
        Ok(state.text[start..end].to_vec())
    }

    fn write_text(&mut self, address: u64, text: &[String]) -> Result<(), DebuggerError> {
        let mut state = self.state.borrow_mut();
        let start = address as usize;
        if start + text.len() > state.text.len() {
            return Err(DebuggerError::new(format!(
                "text access at {start}-{} out of range (size {})",
                start + text.len(),
                state.text.len()
            )));
        }
        for ins in text {
            tdb_asm::parse_instruction(ins)
                .map_err(|e| DebuggerError::new(format!("error in parsing instruction: {e}")))?;
        }
        state.text[start..start + text.len()].clone_from_slice(text);
        Ok(())
    }

    fn text_size(&mut self) -> Result<usize, DebuggerError> {
        Ok(self.state.borrow().text.len())
    }

    fn fetch_registers(&mut self) -> Result<BTreeMap<String, i64>, DebuggerError> {
        Ok(self.state.borrow().regs.clone())
    }

    fn set_registers(&mut self, regs: &BTreeMap<String, i64>) -> Result<(), DebuggerError> {
        let mut state = self.state.borrow_mut();
        for (name, value) in regs {
            state.set_reg(name, *value)?;
        }
        Ok(())
    }

    fn fetch_float_registers(&mut self) -> Result<BTreeMap<String, f64>, DebuggerError> {
        Ok(self.state.borrow().fregs.clone())
    }

    fn set_float_registers(&mut self, regs: &BTreeMap<String, f64>) -> Result<(), DebuggerError> {
        let mut state = self.state.borrow_mut();
        for (name, value) in regs {
            let slot = state
                .fregs
                .get_mut(name)
                .ok_or_else(|| DebuggerError::new(format!("no float register '{name}'")))?;
            *slot = *value;
        }
        Ok(())
    }

    fn fetch_debug_registers(&mut self) -> Result<BTreeMap<String, u64>, DebuggerError> {
        Ok(self.state.borrow().dregs.clone())
    }

    fn set_debug_registers(&mut self, regs: &BTreeMap<String, u64>) -> Result<(), DebuggerError> {
        let mut state = self.state.borrow_mut();
        for (name, value) in regs {
            let slot = state
                .dregs
                .get_mut(name)
                .ok_or_else(|| DebuggerError::new(format!("no debug register '{name}'")))?;
            *slot = *value;
        }
        Ok(())
    }

    fn read_memory(&mut self, address: u64, amount: usize) -> Result<Vec<i64>, DebuggerError> {
        let state = self.state.borrow();
        (0..amount).map(|i| state.read_mem(address + i as u64)).collect()
    }

    fn write_memory(&mut self, address: u64, data: &[i64]) -> Result<(), DebuggerError> {
        let mut state = self.state.borrow_mut();
        for (i, value) in data.iter().enumerate() {
            // Debugger-initiated writes do not trip watchpoints.
            let address = (address + i as u64) as usize;
            let size = state.memory.len();
            let slot = state.memory.get_mut(address).ok_or_else(|| {
                DebuggerError::new(format!("memory access at {address} out of range (size {size})"))
            })?;
            *slot = *value;
        }
        Ok(())
    }

    fn wait(&mut self) -> Result<(), DebuggerError> {
        if self.state.borrow().stop.is_none() {
            return Err(DebuggerError::new("the debuggee is not stopped"));
        }
        Ok(())
    }

    fn get_reason(&mut self) -> Result<StopReason, DebuggerError> {
        self.state
            .borrow()
            .stop
            .ok_or_else(|| DebuggerError::new("the debuggee has not stopped yet"))
    }

    fn resume_execution(&mut self) -> Result<(), DebuggerError> {
        let mut state = self.state.borrow_mut();
        state.stop = None;
        for _ in 0..STEP_FUEL {
            if let Some(reason) = state.execute_one()? {
                state.stop = Some(reason);
                return Ok(());
            }
        }
        Err(DebuggerError::new("the program did not stop in time"))
    }

    fn singlestep(&mut self) -> Result<(), DebuggerError> {
        let mut state = self.state.borrow_mut();
        state.stop = None;
        let reason = state.execute_one()?;
        state.stop = Some(reason.unwrap_or(StopReason::Singlestep));
        Ok(())
    }

    fn terminate(&mut self) -> Result<(), DebuggerError> {
        let mut state = self.state.borrow_mut();
        state.halted = true;
        state.stop = Some(StopReason::ExecutionEnd);
        Ok(())
    }
}
