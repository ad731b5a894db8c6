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

//! The native, instruction-level debug controller.
//!
//! Maintains transparent software breakpoints over a target with no
//! native breakpoint support: enabled breakpoints keep the trap opcode
//! in the debuggee's text while every text access through the
//! controller sees the original program. Also owns the hardware
//! watchpoints, the step-over protocol and the mapping from raw stop
//! reasons to debug events.

use crate::process::Process;
use std::collections::BTreeMap;
use tdb_common::{
    Arch, BpType, DebugEvent, DebuggerError, SoftwareBreakpoint, StopReason, Watchpoint,
    WatchpointType,
};
use tracing::{debug, info};

/// Instruction-level debugger over a [`Process`].
///
/// Invariants kept by the controller: one breakpoint per address; while
/// a breakpoint is enabled the debuggee's text at its address holds the
/// trap opcode and `saved_opcode` the original instruction; each debug
/// register backs at most one watchpoint.
pub struct Native {
    process: Box<dyn Process>,
    arch: Arch,
    software_breakpoints: BTreeMap<u64, SoftwareBreakpoint>,
    watchpoints: BTreeMap<u64, Watchpoint>,
    /// An event that was observed while continuing and must be handed
    /// out by the next [`Native::wait_for_debug_event`].
    cached_event: Option<DebugEvent>,
}

impl Native {
    pub fn new(process: Box<dyn Process>, arch: Arch) -> Self {
        Self {
            process,
            arch,
            software_breakpoints: BTreeMap::new(),
            watchpoints: BTreeMap::new(),
            cached_event: None,
        }
    }

    /// Creates a new breakpoint at `address` and enables it.
    pub fn set_breakpoint(&mut self, address: u64) -> Result<(), DebuggerError> {
        if self.software_breakpoints.contains_key(&address) {
            return Err(DebuggerError::new(format!(
                "Breakpoint at {address} is already set!"
            )));
        }
        let bp = self.create_software_breakpoint(address)?;
        self.software_breakpoints.insert(address, bp);
        info!(address, "breakpoint set");
        Ok(())
    }

    /// Disables and removes the breakpoint at `address`.
    pub fn unset_breakpoint(&mut self, address: u64) -> Result<(), DebuggerError> {
        self.disable_breakpoint(address)?;
        self.software_breakpoints.remove(&address);
        info!(address, "breakpoint unset");
        Ok(())
    }

    /// Enables the breakpoint at `address`; a no-op if it is already
    /// enabled, an error if it does not exist.
    pub fn enable_breakpoint(&mut self, address: u64) -> Result<(), DebuggerError> {
        let bp = self
            .software_breakpoints
            .get(&address)
            .ok_or_else(|| DebuggerError::new(format!("No breakpoint at address {address}!")))?;
        if !bp.enabled {
            let bp = self.create_software_breakpoint(address)?;
            self.software_breakpoints.insert(address, bp);
        }
        Ok(())
    }

    /// Disables the breakpoint at `address`, restoring the original
    /// instruction in the debuggee; a no-op if it is already disabled,
    /// an error if it does not exist.
    pub fn disable_breakpoint(&mut self, address: u64) -> Result<(), DebuggerError> {
        let bp = self
            .software_breakpoints
            .get(&address)
            .ok_or_else(|| DebuggerError::new(format!("No breakpoint at address {address}!")))?;
        if bp.enabled {
            let saved = vec![bp.saved_opcode.clone()];
            self.process.write_text(address, &saved)?;
            self.software_breakpoints
                .get_mut(&address)
                .expect("breakpoint disappeared")
                .enabled = false;
        }
        Ok(())
    }

    /// Installs the trap at `address` and verifies the installation,
    /// returning the record with the saved original instruction.
    fn create_software_breakpoint(
        &mut self,
        address: u64,
    ) -> Result<SoftwareBreakpoint, DebuggerError> {
        let trap = self.arch.trap_opcode();
        let backup = self.read_one_opcode(address)?;
        self.process.write_text(address, &[trap.to_string()])?;
        let installed = self.read_one_opcode(address)?;
        if installed != trap {
            return Err(DebuggerError::new(format!(
                "Failed to set breakpoint! Expected opcode '{trap}', got '{installed}'"
            )));
        }
        Ok(SoftwareBreakpoint::new(backup, true))
    }

    fn read_one_opcode(&mut self, address: u64) -> Result<String, DebuggerError> {
        self.process
            .read_text(address, 1)?
            .into_iter()
            .next()
            .ok_or_else(|| DebuggerError::transport("empty READ_TEXT response"))
    }

    /// Reads `amount` instructions starting at `address`. Breakpoints
    /// never leak out: any address covered by one reports its saved
    /// instruction instead of the trap in the debuggee's text.
    pub fn read_text(&mut self, address: u64, amount: usize) -> Result<Vec<String>, DebuggerError> {
        let text_size = self.text_size()?;
        if address as usize + amount > text_size {
            return Err(DebuggerError::new(format!(
                "Reading text at range {}-{}, but text size is {}",
                address,
                address as usize + amount,
                text_size
            )));
        }
        let mut text = self.process.read_text(address, amount)?;
        for (i, slot) in text.iter_mut().enumerate() {
            if let Some(bp) = self.software_breakpoints.get(&(address + i as u64)) {
                *slot = bp.saved_opcode.clone();
            }
        }
        Ok(text)
    }

    /// Writes instructions starting at `address`. Where a write lands
    /// on an enabled breakpoint, the caller's instruction goes into the
    /// breakpoint's saved slot and the trap stays in the debuggee, so
    /// the breakpoint survives the write and a later disable restores
    /// the caller's value.
    pub fn write_text(&mut self, address: u64, text: Vec<String>) -> Result<(), DebuggerError> {
        let text_size = self.text_size()?;
        if address as usize + text.len() > text_size {
            return Err(DebuggerError::new(format!(
                "Writing text at range {}-{}, but text size is {}",
                address,
                address as usize + text.len(),
                text_size
            )));
        }
        let mut outgoing = text;
        for (i, slot) in outgoing.iter_mut().enumerate() {
            if let Some(bp) = self.software_breakpoints.get_mut(&(address + i as u64)) {
                bp.saved_opcode = slot.clone();
                if bp.enabled {
                    *slot = self.arch.trap_opcode().to_string();
                }
            }
        }
        self.process.write_text(address, &outgoing)
    }

    pub fn text_size(&mut self) -> Result<usize, DebuggerError> {
        self.process.text_size()
    }

    /// Steps over one instruction. If an enabled breakpoint covers the
    /// current instruction it is transparently stepped over, otherwise
    /// this is a raw single step.
    pub fn perform_single_step(&mut self) -> Result<DebugEvent, DebuggerError> {
        if !self.arch.supports_hardware_single_step() {
            return Err(DebuggerError::new(
                "Singlestep is not supported for current architecture",
            ));
        }
        let ip = self.get_ip()?;
        let covered_by_enabled_bp =
            self.software_breakpoints.get(&ip).map(|bp| bp.enabled).unwrap_or(false);
        if covered_by_enabled_bp {
            self.step_over_breakpoint(ip)
        } else {
            self.do_raw_single_step()
        }
    }

    /// Executes the instruction at `address` even though a breakpoint
    /// covers it: disable, step, re-enable. The breakpoint is left
    /// enabled exactly when it was enabled before.
    pub fn step_over_breakpoint(&mut self, address: u64) -> Result<DebugEvent, DebuggerError> {
        let was_enabled =
            self.software_breakpoints.get(&address).map(|bp| bp.enabled).unwrap_or(false);
        if !was_enabled {
            return self.perform_single_step();
        }
        self.disable_breakpoint(address)?;
        // perform_single_step cannot recurse into this path again; the
        // breakpoint is off now.
        let event = self.perform_single_step()?;
        self.enable_breakpoint(address)?;
        Ok(event)
    }

    /// Single step without any breakpoint handling.
    pub fn do_raw_single_step(&mut self) -> Result<DebugEvent, DebuggerError> {
        self.process.singlestep()?;
        self.wait_for_debug_event()
    }

    /// Steps over the current instruction, not descending into calls:
    /// for a call instruction, runs the callee to completion behind a
    /// transient breakpoint at the return address. `skip_bp` steps over
    /// an enabled breakpoint on the current instruction first.
    pub fn perform_step_over(&mut self, skip_bp: bool) -> Result<DebugEvent, DebuggerError> {
        if !self.arch.supports_hardware_single_step() {
            return Err(DebuggerError::new(
                "Singlestep is not supported for current architecture",
            ));
        }
        let ip = self.get_ip()?;
        let text = self.read_one_controller_opcode(ip)?;
        let is_call = self.arch.call_instructions().iter().any(|ins| text.starts_with(ins));
        if !is_call {
            return if skip_bp { self.perform_single_step() } else { self.do_raw_single_step() };
        }

        let return_address = ip + 1;
        let bp_exists = self.software_breakpoints.contains_key(&return_address);
        if !bp_exists {
            self.set_breakpoint(return_address)?;
        }
        if skip_bp {
            self.perform_single_step()?;
        }
        self.continue_execution()?;
        let event = self.wait_for_debug_event()?;
        if !bp_exists {
            self.unset_breakpoint(return_address)?;
        }
        if self.get_ip()? != return_address {
            // Stopped somewhere inside the callee, e.g. on a user
            // breakpoint; report that instead of a completed step.
            Ok(event)
        } else {
            Ok(DebugEvent::Singlestep)
        }
    }

    fn read_one_controller_opcode(&mut self, address: u64) -> Result<String, DebuggerError> {
        Ok(self
            .read_text(address, 1)?
            .into_iter()
            .next()
            .expect("read_text returned an empty range"))
    }

    /// Resumes the debuggee. An enabled breakpoint on the current
    /// instruction is stepped over first; if that step already produced
    /// a reportable event, it is cached for the next
    /// [`Native::wait_for_debug_event`] and the debuggee stays stopped.
    pub fn continue_execution(&mut self) -> Result<(), DebuggerError> {
        let ip = self.get_ip()?;
        let has_enabled_bp =
            self.software_breakpoints.get(&ip).map(|bp| bp.enabled).unwrap_or(false);
        if has_enabled_bp {
            let event = self.step_over_breakpoint(ip)?;
            if event != DebugEvent::Singlestep {
                debug!(?event, "caching event observed while continuing");
                self.cached_event = Some(event);
                return Ok(());
            }
        }
        self.process.resume_execution()
    }

    /// Waits for the next debug event. After a
    /// [`DebugEvent::BreakpointHit`] the debuggee's IP equals the
    /// breakpoint address.
    pub fn wait_for_debug_event(&mut self) -> Result<DebugEvent, DebuggerError> {
        // An event observed by an inner operation (continue_execution)
        // is handed out first. It was already fixed up when produced.
        if let Some(event) = self.cached_event.take() {
            return Ok(event);
        }
        self.process.wait()?;
        let reason = self.process.get_reason()?;
        self.map_reason_to_event(reason)
    }

    fn map_reason_to_event(&mut self, reason: StopReason) -> Result<DebugEvent, DebuggerError> {
        Ok(match reason {
            StopReason::SoftwareBreakpointHit => {
                // The trap advanced the IP one past the breakpoint;
                // report and resume from the breakpoint address itself.
                let address = self.get_ip()? - 1;
                self.set_register("IP", address as i64)?;
                DebugEvent::BreakpointHit { kind: BpType::Software, address }
            }
            StopReason::HardwareBreak => {
                let dbg_regs = self.process.fetch_debug_registers()?;
                let idx = self.arch.triggered_debug_register(&dbg_regs)?;
                let address = self
                    .watchpoints
                    .iter()
                    .find(|(_, wp)| wp.debug_register as usize == idx)
                    .map(|(address, _)| *address)
                    .unwrap_or_else(|| {
                        panic!("hardware break on debug register {idx} with no watchpoint")
                    });
                DebugEvent::WatchpointTrigger { kind: WatchpointType::Write, address }
            }
            StopReason::Singlestep => DebugEvent::Singlestep,
            StopReason::ExecutionBegin => DebugEvent::ExecutionBegin,
            StopReason::ExecutionEnd => DebugEvent::ExecutionEnd,
        })
    }

    /// Sets a write watchpoint on a memory address, occupying one debug
    /// register.
    pub fn set_watchpoint_write(&mut self, address: u64) -> Result<(), DebuggerError> {
        if !self.arch.supports_hardware_watchpoints() {
            return Err(DebuggerError::new("This architecture does not support watchpoints"));
        }
        if self.watchpoints.contains_key(&address) {
            return Err(DebuggerError::new("A watchpoint is already set on that address."));
        }
        let idx = self
            .free_debug_register()
            .ok_or_else(|| DebuggerError::new("Maximum amount of watchpoints has been set"))?;

        let mut dbg_regs = self.process.fetch_debug_registers()?;
        self.arch.write_debug_register(idx, address, &mut dbg_regs)?;
        self.arch.activate_debug_register(idx, &mut dbg_regs)?;
        self.process.set_debug_registers(&dbg_regs)?;
        self.watchpoints.insert(
            address,
            Watchpoint { kind: WatchpointType::Write, debug_register: idx as u8 },
        );
        info!(address, debug_register = idx, "watchpoint set");
        Ok(())
    }

    /// Deactivates and removes the watchpoint at `address`.
    pub fn remove_watchpoint(&mut self, address: u64) -> Result<(), DebuggerError> {
        let wp = self
            .watchpoints
            .get(&address)
            .ok_or_else(|| DebuggerError::new(format!("No watchpoint at address {address}")))?;
        let mut dbg_regs = self.process.fetch_debug_registers()?;
        self.arch.deactivate_debug_register(wp.debug_register as usize, &mut dbg_regs)?;
        self.process.set_debug_registers(&dbg_regs)?;
        self.watchpoints.remove(&address);
        info!(address, "watchpoint removed");
        Ok(())
    }

    fn free_debug_register(&self) -> Option<usize> {
        (0..self.arch.debug_register_count()).find(|idx| {
            !self.watchpoints.values().any(|wp| wp.debug_register as usize == *idx)
        })
    }

    /// The whole integer register file.
    pub fn get_registers(&mut self) -> Result<BTreeMap<String, i64>, DebuggerError> {
        self.process.fetch_registers()
    }

    /// Value of a single register; when multiple registers are needed,
    /// [`Native::get_registers`] is the faster call.
    pub fn get_register(&mut self, name: &str) -> Result<i64, DebuggerError> {
        let regs = self.process.fetch_registers()?;
        regs.get(name)
            .copied()
            .ok_or_else(|| DebuggerError::new(format!("No register '{name}' in target")))
    }

    pub fn set_registers(&mut self, regs: &BTreeMap<String, i64>) -> Result<(), DebuggerError> {
        self.process.set_registers(regs)
    }

    /// Fetch-modify-store convenience over
    /// [`Native::set_registers`].
    pub fn set_register(&mut self, name: &str, value: i64) -> Result<(), DebuggerError> {
        let mut regs = self.get_registers()?;
        let slot = regs
            .get_mut(name)
            .ok_or_else(|| DebuggerError::new(format!("Unknown '{name}' register name!")))?;
        *slot = value;
        self.set_registers(&regs)
    }

    pub fn get_float_registers(&mut self) -> Result<BTreeMap<String, f64>, DebuggerError> {
        self.process.fetch_float_registers()
    }

    pub fn get_float_register(&mut self, name: &str) -> Result<f64, DebuggerError> {
        let fregs = self.get_float_registers()?;
        fregs
            .get(name)
            .copied()
            .ok_or_else(|| DebuggerError::new(format!("'{name}' is not float register")))
    }

    pub fn set_float_registers(&mut self, regs: &BTreeMap<String, f64>) -> Result<(), DebuggerError> {
        self.process.set_float_registers(regs)
    }

    pub fn set_float_register(&mut self, name: &str, value: f64) -> Result<(), DebuggerError> {
        let mut fregs = self.get_float_registers()?;
        let slot = fregs
            .get_mut(name)
            .ok_or_else(|| DebuggerError::new(format!("'{name}' is not float register")))?;
        *slot = value;
        self.set_float_registers(&fregs)
    }

    /// The current program counter.
    pub fn get_ip(&mut self) -> Result<u64, DebuggerError> {
        Ok(self.get_register("IP")? as u64)
    }

    pub fn read_memory(&mut self, address: u64, amount: usize) -> Result<Vec<i64>, DebuggerError> {
        self.process.read_memory(address, amount)
    }

    pub fn write_memory(&mut self, address: u64, values: &[i64]) -> Result<(), DebuggerError> {
        self.process.write_memory(address, values)
    }

    pub fn breakpoints(&self) -> &BTreeMap<u64, SoftwareBreakpoint> {
        &self.software_breakpoints
    }

    pub fn watchpoints(&self) -> &BTreeMap<u64, Watchpoint> {
        &self.watchpoints
    }

    /// Ends the debug session and the debuggee.
    pub fn terminate(&mut self) -> Result<(), DebuggerError> {
        self.process.terminate()
    }
}
