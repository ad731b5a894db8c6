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

//! The contract to the running debuggee and its wire-protocol client.
//!
//! [`Process`] is everything the native controller needs from a target.
//! [`VmProcess`] implements it over a [`Messenger`], speaking the
//! line-oriented command protocol of the TinyVM debug stub.

use std::collections::BTreeMap;
use tdb_common::{DebuggerError, Messenger, StopReason};
use tracing::{debug, trace};

/// Abstract contract to the running target process. One outstanding
/// request at a time; [`Process::wait`] is the only blocking suspension
/// point.
pub trait Process {
    /// Returns `amount` instructions starting at `address`.
    fn read_text(&mut self, address: u64, amount: usize) -> Result<Vec<String>, DebuggerError>;

    /// Overwrites instructions starting at `address`. The caller is
    /// responsible for respecting the text size.
    fn write_text(&mut self, address: u64, text: &[String]) -> Result<(), DebuggerError>;

    /// Size of the text segment in instructions.
    fn text_size(&mut self) -> Result<usize, DebuggerError>;

    fn fetch_registers(&mut self) -> Result<BTreeMap<String, i64>, DebuggerError>;
    fn set_registers(&mut self, regs: &BTreeMap<String, i64>) -> Result<(), DebuggerError>;

    fn fetch_float_registers(&mut self) -> Result<BTreeMap<String, f64>, DebuggerError>;
    fn set_float_registers(&mut self, regs: &BTreeMap<String, f64>) -> Result<(), DebuggerError>;

    fn fetch_debug_registers(&mut self) -> Result<BTreeMap<String, u64>, DebuggerError>;
    fn set_debug_registers(&mut self, regs: &BTreeMap<String, u64>) -> Result<(), DebuggerError>;

    fn read_memory(&mut self, address: u64, amount: usize) -> Result<Vec<i64>, DebuggerError>;
    fn write_memory(&mut self, address: u64, data: &[i64]) -> Result<(), DebuggerError>;

    /// Blocks until the debuggee stops.
    fn wait(&mut self) -> Result<(), DebuggerError>;

    /// Why the debuggee last stopped.
    fn get_reason(&mut self) -> Result<StopReason, DebuggerError>;

    fn resume_execution(&mut self) -> Result<(), DebuggerError>;

    /// Executes one instruction. Errors if the architecture cannot
    /// single-step.
    fn singlestep(&mut self) -> Result<(), DebuggerError>;

    /// Ends the debuggee; the process must not be used afterwards.
    fn terminate(&mut self) -> Result<(), DebuggerError>;
}

/// [`Process`] implementation speaking the TinyVM debug-stub protocol
/// over any [`Messenger`].
pub struct VmProcess {
    messenger: Box<dyn Messenger>,
    last_reason: Option<StopReason>,
}

impl VmProcess {
    pub fn new(messenger: Box<dyn Messenger>) -> Self {
        Self { messenger, last_reason: None }
    }

    fn request(&mut self, message: &str) -> Result<String, DebuggerError> {
        trace!(request = message, "sending");
        self.messenger.send(message)?;
        let response = self
            .messenger
            .receive()?
            .ok_or_else(|| DebuggerError::transport("channel closed by the VM"))?;
        trace!(response = %response, "received");
        Ok(response)
    }

    fn check_ok(&mut self, message: &str, what: &str) -> Result<(), DebuggerError> {
        let response = self.request(message)?;
        if response != "OK" {
            return Err(DebuggerError::transport(format!(
                "{what} failed, the VM answered '{response}'"
            )));
        }
        Ok(())
    }

    fn parse_register_lines<T: std::str::FromStr>(
        response: &str,
        what: &str,
    ) -> Result<BTreeMap<String, T>, DebuggerError> {
        let mut regs = BTreeMap::new();
        for line in response.lines().filter(|l| !l.is_empty()) {
            let (name, value) = line.split_once(':').ok_or_else(|| {
                DebuggerError::transport(format!("malformed {what} line '{line}'"))
            })?;
            let value = value.trim().parse().map_err(|_| {
                DebuggerError::transport(format!("malformed {what} value in '{line}'"))
            })?;
            regs.insert(name.trim().to_string(), value);
        }
        Ok(regs)
    }
}

impl Process for VmProcess {
    fn read_text(&mut self, address: u64, amount: usize) -> Result<Vec<String>, DebuggerError> {
        let response = self.request(&format!("READ_TEXT {address} {amount}"))?;
        Ok(response.lines().map(str::to_string).collect())
    }

    fn write_text(&mut self, address: u64, text: &[String]) -> Result<(), DebuggerError> {
        for (i, ins) in text.iter().enumerate() {
            // Never ship garbage into the text segment; a bad write
            // would only surface when the VM executes it.
            tdb_asm::parse_instruction(ins).map_err(|e| {
                DebuggerError::new(format!("error in parsing instruction: {e}"))
            })?;
            self.check_ok(&format!("WRITE_TEXT {} {}", address + i as u64, ins), "WRITE_TEXT")?;
        }
        Ok(())
    }

    fn text_size(&mut self) -> Result<usize, DebuggerError> {
        let response = self.request("TEXT_SIZE")?;
        let size = response
            .strip_prefix("TEXT_SIZE:")
            .and_then(|s| s.trim().parse().ok())
            .ok_or_else(|| {
                DebuggerError::transport(format!("malformed TEXT_SIZE response '{response}'"))
            })?;
        Ok(size)
    }

    fn fetch_registers(&mut self) -> Result<BTreeMap<String, i64>, DebuggerError> {
        let response = self.request("REG_READ_ALL")?;
        Self::parse_register_lines(&response, "REG_READ_ALL")
    }

    fn set_registers(&mut self, regs: &BTreeMap<String, i64>) -> Result<(), DebuggerError> {
        for (name, value) in regs {
            debug!(register = %name, value, "setting register");
            self.check_ok(&format!("REG_WRITE {name} {value}"), "REG_WRITE")?;
        }
        Ok(())
    }

    fn fetch_float_registers(&mut self) -> Result<BTreeMap<String, f64>, DebuggerError> {
        let response = self.request("FREG_READ_ALL")?;
        Self::parse_register_lines(&response, "FREG_READ_ALL")
    }

    fn set_float_registers(&mut self, regs: &BTreeMap<String, f64>) -> Result<(), DebuggerError> {
        for (name, value) in regs {
            debug!(register = %name, value, "setting float register");
            self.check_ok(&format!("FREG_WRITE {name} {value}"), "FREG_WRITE")?;
        }
        Ok(())
    }

    fn fetch_debug_registers(&mut self) -> Result<BTreeMap<String, u64>, DebuggerError> {
        let response = self.request("DBG_REG_READ")?;
        Self::parse_register_lines(&response, "DBG_REG_READ")
    }

    fn set_debug_registers(&mut self, regs: &BTreeMap<String, u64>) -> Result<(), DebuggerError> {
        for (name, value) in regs {
            debug!(register = %name, value, "setting debug register");
            self.check_ok(&format!("DBG_REG_WRITE {name} {value}"), "DBG_REG_WRITE")?;
        }
        Ok(())
    }

    fn read_memory(&mut self, address: u64, amount: usize) -> Result<Vec<i64>, DebuggerError> {
        let response = self.request(&format!("MEM_READ {address} {amount}"))?;
        response
            .lines()
            .filter(|l| !l.is_empty())
            .map(|line| {
                line.trim().parse().map_err(|_| {
                    DebuggerError::transport(format!("malformed MEM_READ value '{line}'"))
                })
            })
            .collect()
    }

    fn write_memory(&mut self, address: u64, data: &[i64]) -> Result<(), DebuggerError> {
        for (i, value) in data.iter().enumerate() {
            self.check_ok(&format!("MEM_WRITE {} {}", address + i as u64, value), "MEM_WRITE")?;
        }
        Ok(())
    }

    fn wait(&mut self) -> Result<(), DebuggerError> {
        let response = self.request("WAIT")?;
        let reason = response.strip_prefix("STOPPED").map(str::trim).ok_or_else(|| {
            DebuggerError::transport(format!("expected STOPPED message, got '{response}'"))
        })?;
        self.last_reason = Some(match reason {
            "BP" => StopReason::SoftwareBreakpointHit,
            "HW_BRK" => StopReason::HardwareBreak,
            "STEP" => StopReason::Singlestep,
            "EXEC_BEGIN" => StopReason::ExecutionBegin,
            "EXEC_END" => StopReason::ExecutionEnd,
            other => {
                return Err(DebuggerError::transport(format!("unknown stop reason '{other}'")))
            }
        });
        Ok(())
    }

    fn get_reason(&mut self) -> Result<StopReason, DebuggerError> {
        self.last_reason
            .ok_or_else(|| DebuggerError::new("the debuggee has not stopped yet"))
    }

    fn resume_execution(&mut self) -> Result<(), DebuggerError> {
        self.check_ok("RESUME", "RESUME")
    }

    fn singlestep(&mut self) -> Result<(), DebuggerError> {
        self.check_ok("STEP", "STEP")
    }

    fn terminate(&mut self) -> Result<(), DebuggerError> {
        self.check_ok("TERMINATE", "TERMINATE")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use tdb_common::logging::ensure_test_logging;

    /// Messenger double that checks each outgoing request against a
    /// script and plays back the canned response.
    struct ScriptedMessenger {
        script: VecDeque<(String, String)>,
    }

    impl ScriptedMessenger {
        fn new(script: &[(&str, &str)]) -> Self {
            Self {
                script: script
                    .iter()
                    .map(|(req, resp)| (req.to_string(), resp.to_string()))
                    .collect(),
            }
        }
    }

    impl Messenger for ScriptedMessenger {
        fn send(&mut self, message: &str) -> Result<(), DebuggerError> {
            let (expected, _) = self.script.front().expect("unexpected request");
            assert_eq!(message, expected, "request does not match the script");
            Ok(())
        }

        fn receive(&mut self) -> Result<Option<String>, DebuggerError> {
            let (_, response) = self.script.pop_front().expect("nothing scripted");
            Ok(Some(response))
        }
    }

    fn process(script: &[(&str, &str)]) -> VmProcess {
        ensure_test_logging(None);
        VmProcess::new(Box::new(ScriptedMessenger::new(script)))
    }

    #[test]
    fn test_read_text() {
        let mut p = process(&[("READ_TEXT 2 2", "MOV R0, 1\nHALT")]);
        assert_eq!(p.read_text(2, 2).unwrap(), vec!["MOV R0, 1", "HALT"]);
    }

    #[test]
    fn test_write_text_validates_instructions() {
        let mut p = process(&[]);
        let err = p.write_text(0, &["FROBNICATE R0".to_string()]).unwrap_err();
        assert!(err.to_string().contains("error in parsing instruction"));
    }

    #[test]
    fn test_write_text_sends_one_command_per_instruction() {
        let mut p = process(&[("WRITE_TEXT 3 NOP", "OK"), ("WRITE_TEXT 4 HALT", "OK")]);
        p.write_text(3, &["NOP".to_string(), "HALT".to_string()]).unwrap();
    }

    #[test]
    fn test_fetch_registers() {
        let mut p = process(&[("REG_READ_ALL", "IP:3\nR0:-7\nBP:1024")]);
        let regs = p.fetch_registers().unwrap();
        assert_eq!(regs["IP"], 3);
        assert_eq!(regs["R0"], -7);
        assert_eq!(regs["BP"], 1024);
    }

    #[test]
    fn test_wait_parses_reason() {
        let mut p = process(&[("WAIT", "STOPPED BP")]);
        p.wait().unwrap();
        assert_eq!(p.get_reason().unwrap(), StopReason::SoftwareBreakpointHit);
    }

    #[test]
    fn test_reason_before_wait_is_an_error() {
        let mut p = process(&[]);
        assert!(p.get_reason().is_err());
    }

    #[test]
    fn test_text_size() {
        let mut p = process(&[("TEXT_SIZE", "TEXT_SIZE:12")]);
        assert_eq!(p.text_size().unwrap(), 12);
    }

    #[test]
    fn test_malformed_response_is_a_transport_error() {
        let mut p = process(&[("RESUME", "NOPE")]);
        let err = p.resume_execution().unwrap_err();
        assert!(err.to_string().contains("error communicating with the VM"));
    }

    #[test]
    fn test_memory_round_trip() {
        let mut p = process(&[
            ("MEM_WRITE 5 42", "OK"),
            ("MEM_WRITE 6 -1", "OK"),
            ("MEM_READ 5 2", "42\n-1"),
        ]);
        p.write_memory(5, &[42, -1]).unwrap();
        assert_eq!(p.read_memory(5, 2).unwrap(), vec![42, -1]);
    }
}
