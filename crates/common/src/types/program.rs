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

//! Assembled programs: instructions and the data segment.

use crate::types::Operand;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Instruction mnemonics of the target machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Opcode {
    Mov,
    Lea,
    Add,
    Sub,
    Mul,
    Div,
    Imul,
    Idiv,
    And,
    Or,
    Xor,
    Lsh,
    Rsh,
    Cmp,
    Loop,
    Inc,
    Dec,
    Neg,
    Not,
    Jmp,
    Jz,
    Jnz,
    Je,
    Jne,
    Jg,
    Jge,
    Jl,
    Jle,
    Ja,
    Jae,
    Jb,
    Jbe,
    Jo,
    Jno,
    Js,
    Jns,
    Call,
    Push,
    Pop,
    Putchar,
    Putnum,
    Getchar,
    Halt,
    Nop,
    Bkpt,
    Break,
    Ret,
}

impl Opcode {
    /// The mnemonic as written in assembly text.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Mov => "MOV",
            Self::Lea => "LEA",
            Self::Add => "ADD",
            Self::Sub => "SUB",
            Self::Mul => "MUL",
            Self::Div => "DIV",
            Self::Imul => "IMUL",
            Self::Idiv => "IDIV",
            Self::And => "AND",
            Self::Or => "OR",
            Self::Xor => "XOR",
            Self::Lsh => "LSH",
            Self::Rsh => "RSH",
            Self::Cmp => "CMP",
            Self::Loop => "LOOP",
            Self::Inc => "INC",
            Self::Dec => "DEC",
            Self::Neg => "NEG",
            Self::Not => "NOT",
            Self::Jmp => "JMP",
            Self::Jz => "JZ",
            Self::Jnz => "JNZ",
            Self::Je => "JE",
            Self::Jne => "JNE",
            Self::Jg => "JG",
            Self::Jge => "JGE",
            Self::Jl => "JL",
            Self::Jle => "JLE",
            Self::Ja => "JA",
            Self::Jae => "JAE",
            Self::Jb => "JB",
            Self::Jbe => "JBE",
            Self::Jo => "JO",
            Self::Jno => "JNO",
            Self::Js => "JS",
            Self::Jns => "JNS",
            Self::Call => "CALL",
            Self::Push => "PUSH",
            Self::Pop => "POP",
            Self::Putchar => "PUTCHAR",
            Self::Putnum => "PUTNUM",
            Self::Getchar => "GETCHAR",
            Self::Halt => "HALT",
            Self::Nop => "NOP",
            Self::Bkpt => "BKPT",
            Self::Break => "BREAK",
            Self::Ret => "RET",
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One decoded instruction: a mnemonic and up to two operands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    pub opcode: Opcode,
    pub operands: Vec<Operand>,
}

impl Instruction {
    pub fn new(opcode: Opcode, operands: Vec<Operand>) -> Self {
        Self { opcode, operands }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.opcode)?;
        for (i, op) in self.operands.iter().enumerate() {
            if i == 0 {
                write!(f, " {op}")?;
            } else {
                write!(f, ", {op}")?;
            }
        }
        Ok(())
    }
}

/// An assembled program. Instruction addresses are indices into the
/// text segment; the data segment is a vector of 64-bit words.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    pub instructions: Vec<Instruction>,
    pub data: Vec<i64>,
}

impl Program {
    pub fn new(instructions: Vec<Instruction>, data: Vec<i64>) -> Self {
        Self { instructions, data }
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, ".text")?;
        for ins in &self.instructions {
            writeln!(f, "    {ins}")?;
        }
        if !self.data.is_empty() {
            writeln!(f, ".data")?;
            for word in &self.data {
                writeln!(f, "    {word}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Register;

    #[test]
    fn test_instruction_display() {
        let ins = Instruction::new(
            Opcode::Add,
            vec![Operand::Reg(Register::General(0)), Operand::Imm(5)],
        );
        assert_eq!(ins.to_string(), "ADD R0, 5");
        let ins = Instruction::new(Opcode::Halt, vec![]);
        assert_eq!(ins.to_string(), "HALT");
    }

    #[test]
    fn test_program_display_has_sections() {
        let program = Program::new(
            vec![Instruction::new(Opcode::Nop, vec![])],
            vec![104, 105],
        );
        let text = program.to_string();
        assert!(text.starts_with(".text"));
        assert!(text.contains("NOP"));
        assert!(text.contains(".data"));
    }
}
