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

//! Parser for TinyVM assembly text.
//!
//! A file is a sequence of sections introduced by `.` and a section
//! name. `.text` holds instructions (optionally prefixed by a numeric
//! address, which is ignored; addresses are implicit by position),
//! `.data` holds string and number literals, and unknown sections are
//! skipped. Instruction signatures live in a single table mapping the
//! mnemonic to the operand classes it accepts, driving one generic
//! dispatch loop.

use once_cell::sync::Lazy;
use std::collections::BTreeMap;
use tdb_common::{
    lexer::{Lexer, Token, TokenKind},
    types::{Instruction, MemAddr, Opcode, Operand, Program, Register},
    ParseError,
};
use tracing::debug;

/// Which operand shapes an instruction slot accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OperandClass {
    /// `R`
    Reg,
    /// `i | R`
    ImmOrReg,
    /// `i | R | [i] | [R] | [R + i]`
    ImmOrRegOrSimpleMem,
    /// The full operand grammar, as accepted by `MOV`.
    Any,
}

struct InsSpec {
    opcode: Opcode,
    operands: &'static [OperandClass],
}

static INSTRUCTIONS: Lazy<BTreeMap<&'static str, InsSpec>> = Lazy::new(|| {
    use OperandClass::*;
    let table: &[(Opcode, &'static [OperandClass])] = &[
        (Opcode::Mov, &[Any, Any]),
        (Opcode::Lea, &[Reg, Any]),
        (Opcode::Add, &[Reg, ImmOrRegOrSimpleMem]),
        (Opcode::Sub, &[Reg, ImmOrRegOrSimpleMem]),
        (Opcode::Mul, &[Reg, ImmOrRegOrSimpleMem]),
        (Opcode::Div, &[Reg, ImmOrRegOrSimpleMem]),
        (Opcode::Imul, &[Reg, ImmOrRegOrSimpleMem]),
        (Opcode::Idiv, &[Reg, ImmOrRegOrSimpleMem]),
        (Opcode::And, &[Reg, ImmOrRegOrSimpleMem]),
        (Opcode::Or, &[Reg, ImmOrRegOrSimpleMem]),
        (Opcode::Xor, &[Reg, ImmOrRegOrSimpleMem]),
        (Opcode::Lsh, &[Reg, ImmOrRegOrSimpleMem]),
        (Opcode::Rsh, &[Reg, ImmOrRegOrSimpleMem]),
        (Opcode::Cmp, &[Reg, ImmOrRegOrSimpleMem]),
        (Opcode::Loop, &[Reg, ImmOrReg]),
        (Opcode::Inc, &[Reg]),
        (Opcode::Dec, &[Reg]),
        (Opcode::Neg, &[Reg]),
        (Opcode::Not, &[Reg]),
        (Opcode::Jmp, &[ImmOrReg]),
        (Opcode::Jz, &[ImmOrRegOrSimpleMem]),
        (Opcode::Jnz, &[ImmOrRegOrSimpleMem]),
        (Opcode::Je, &[ImmOrRegOrSimpleMem]),
        (Opcode::Jne, &[ImmOrRegOrSimpleMem]),
        (Opcode::Jg, &[ImmOrRegOrSimpleMem]),
        (Opcode::Jge, &[ImmOrRegOrSimpleMem]),
        (Opcode::Jl, &[ImmOrRegOrSimpleMem]),
        (Opcode::Jle, &[ImmOrRegOrSimpleMem]),
        (Opcode::Ja, &[ImmOrRegOrSimpleMem]),
        (Opcode::Jae, &[ImmOrRegOrSimpleMem]),
        (Opcode::Jb, &[ImmOrRegOrSimpleMem]),
        (Opcode::Jbe, &[ImmOrRegOrSimpleMem]),
        (Opcode::Jo, &[ImmOrRegOrSimpleMem]),
        (Opcode::Jno, &[ImmOrRegOrSimpleMem]),
        (Opcode::Js, &[ImmOrRegOrSimpleMem]),
        (Opcode::Jns, &[ImmOrRegOrSimpleMem]),
        (Opcode::Call, &[ImmOrReg]),
        (Opcode::Push, &[ImmOrReg]),
        (Opcode::Pop, &[Reg]),
        (Opcode::Putchar, &[Reg]),
        (Opcode::Putnum, &[Reg]),
        (Opcode::Getchar, &[Reg]),
        (Opcode::Halt, &[]),
        (Opcode::Nop, &[]),
        (Opcode::Bkpt, &[]),
        (Opcode::Break, &[]),
        (Opcode::Ret, &[]),
    ];
    table
        .iter()
        .copied()
        .map(|(opcode, operands)| (opcode.name(), InsSpec { opcode, operands }))
        .collect()
});

/// Parses a whole assembly file into a [`Program`].
pub fn parse_program(input: &str) -> Result<Program, ParseError> {
    Parser::new(input)?.parse()
}

/// Parses exactly one instruction; trailing input is an error. Used to
/// validate instruction text before it is written into a running
/// debuggee.
pub fn parse_instruction(input: &str) -> Result<Instruction, ParseError> {
    let mut parser = Parser::new(input)?;
    let ins = parser.instruction()?;
    parser.expect_end()?;
    Ok(ins)
}

/// Recursive-descent parser over the shared lexer.
pub struct Parser<'a> {
    lex: Lexer<'a>,
    curtok: Token,
    instructions: Vec<Instruction>,
    data: Vec<i64>,
}

impl<'a> Parser<'a> {
    pub fn new(input: &'a str) -> Result<Self, ParseError> {
        let mut lex = Lexer::new(input);
        let curtok = lex.next_token()?;
        Ok(Self { lex, curtok, instructions: Vec::new(), data: Vec::new() })
    }

    /// Parses the sections of the file.
    pub fn parse(mut self) -> Result<Program, ParseError> {
        if self.curtok.kind != TokenKind::Dot {
            return Err(self.error("File does not contain any sections"));
        }
        while self.curtok.kind == TokenKind::Dot {
            self.bump()?;
            self.section()?;
        }
        if self.curtok.kind != TokenKind::End {
            return Err(self.error("Expected section beginning with '.'"));
        }
        Ok(Program::new(self.instructions, self.data))
    }

    fn section(&mut self) -> Result<(), ParseError> {
        if self.curtok.kind != TokenKind::Id {
            return Err(self.error("Expected section name after '.'"));
        }
        let section_name = self.lex.id().to_string();
        self.bump()?;
        match section_name.as_str() {
            "text" => self.text(),
            "data" => self.data_section(),
            _ => {
                debug!(section = %section_name, "Skipping unknown section");
                while self.curtok.kind != TokenKind::Dot && self.curtok.kind != TokenKind::End {
                    self.bump()?;
                }
                Ok(())
            }
        }
    }

    fn text(&mut self) -> Result<(), ParseError> {
        while matches!(self.curtok.kind, TokenKind::Num | TokenKind::Id) {
            let ins = self.instruction()?;
            self.instructions.push(ins);
        }
        Ok(())
    }

    fn data_section(&mut self) -> Result<(), ParseError> {
        while matches!(self.curtok.kind, TokenKind::Str | TokenKind::Num) {
            match self.curtok.kind {
                TokenKind::Str => {
                    self.data.extend(self.lex.string().bytes().map(i64::from));
                }
                TokenKind::Num => self.data.push(self.lex.number()),
                _ => unreachable!(),
            }
            self.bump()?;
        }
        Ok(())
    }

    /// Parses one instruction, with an optional (ignored) leading
    /// address.
    pub fn instruction(&mut self) -> Result<Instruction, ParseError> {
        if self.curtok.kind == TokenKind::Num {
            self.bump()?;
        }
        if self.curtok.kind != TokenKind::Id {
            return Err(self.error("Expected instruction mnemonic"));
        }
        let name = self.lex.id().to_string();
        self.bump()?;

        if name == "DBG" {
            return Err(self.error("DBG instruction is not supported"));
        }
        let spec = INSTRUCTIONS
            .get(name.as_str())
            .ok_or_else(|| self.error(format!("Unknown instruction {name}")))?;

        let mut operands = Vec::with_capacity(spec.operands.len());
        for (i, class) in spec.operands.iter().enumerate() {
            if i > 0 {
                if self.curtok.kind != TokenKind::Comma {
                    return Err(self.error("Expected ','"));
                }
                self.bump()?;
            }
            operands.push(self.operand(*class)?);
        }
        Ok(Instruction::new(spec.opcode, operands))
    }

    /// Errors unless the whole input has been consumed.
    pub fn expect_end(&self) -> Result<(), ParseError> {
        if self.curtok.kind != TokenKind::End {
            return Err(self.error("Trailing input after instruction"));
        }
        Ok(())
    }

    fn operand(&mut self, class: OperandClass) -> Result<Operand, ParseError> {
        match class {
            OperandClass::Reg => Ok(Operand::Reg(self.register()?)),
            OperandClass::ImmOrReg => self.imm_or_register(),
            OperandClass::ImmOrRegOrSimpleMem => self.imm_or_register_or_simple_memory(),
            OperandClass::Any => self.any_operand(),
        }
    }

    fn register_name(&self, name: &str) -> Result<Register, ParseError> {
        Register::parse_name(name).ok_or_else(|| {
            self.error(format!("Registers must begin with an R, unless IP, BP or SP, got {name}"))
        })
    }

    /// Allows only a register as operand.
    fn register(&mut self) -> Result<Register, ParseError> {
        if self.curtok.kind != TokenKind::Id {
            return Err(self.error("Expected R"));
        }
        let reg = self.register_name(&self.lex.id().to_string())?;
        self.bump()?;
        Ok(reg)
    }

    /// Allows only an immediate as operand.
    fn imm(&mut self) -> Result<i64, ParseError> {
        if self.curtok.kind != TokenKind::Num {
            return Err(self.error("Expected i"));
        }
        let value = self.lex.number();
        self.bump()?;
        Ok(value)
    }

    /// Allows `i` or `R`.
    fn imm_or_register(&mut self) -> Result<Operand, ParseError> {
        match self.curtok.kind {
            TokenKind::Id => Ok(Operand::Reg(self.register()?)),
            TokenKind::Num => Ok(Operand::Imm(self.imm()?)),
            _ => Err(self.error("Expected either i or R")),
        }
    }

    /// Allows `[i]`, `[R]` or `[R + i]`.
    fn simple_memory(&mut self) -> Result<Operand, ParseError> {
        if self.curtok.kind != TokenKind::LBracket {
            return Err(self.error("Expected either [i], [R] or [R + i]"));
        }
        self.bump()?;
        let mem = match self.curtok.kind {
            TokenKind::Id => {
                let inner = self.register()?;
                if self.curtok.kind == TokenKind::Plus {
                    self.bump()?;
                    let imm = self.imm()?;
                    MemAddr::RegImm(inner, imm)
                } else {
                    MemAddr::Reg(inner)
                }
            }
            _ => MemAddr::Imm(self.imm()?),
        };
        if self.curtok.kind != TokenKind::RBracket {
            return Err(self.error("Expected end of ']'"));
        }
        self.bump()?;
        Ok(Operand::Mem(mem))
    }

    /// Allows `i`, `R`, `[i]`, `[R]` or `[R + i]`.
    fn imm_or_register_or_simple_memory(&mut self) -> Result<Operand, ParseError> {
        match self.curtok.kind {
            TokenKind::Id | TokenKind::Num => self.imm_or_register(),
            TokenKind::LBracket => self.simple_memory(),
            _ => Err(self.error("Expected either i, R, [i], [R] or [R + i]")),
        }
    }

    /// Parses every kind of operand; `MOV` allows a very wide range of
    /// operands with restrictive relationships, which the VM itself
    /// checks at execution.
    fn any_operand(&mut self) -> Result<Operand, ParseError> {
        match self.curtok.kind {
            TokenKind::Id => {
                let reg = self.register_name(&self.lex.id().to_string())?;
                self.bump()?;
                if self.curtok.kind == TokenKind::Plus {
                    self.bump()?;
                    if self.curtok.kind != TokenKind::Num {
                        return Err(self.error("After Reg + _ there can be only number"));
                    }
                    let imm = self.lex.number();
                    self.bump()?;
                    return Ok(Operand::RegImm(reg, imm));
                }
                Ok(Operand::Reg(reg))
            }
            TokenKind::Num => {
                let imm = self.lex.number();
                self.bump()?;
                Ok(Operand::Imm(imm))
            }
            TokenKind::LBracket => {
                self.bump()?;
                self.memory_operand()
            }
            _ => Err(self.error("Expected operand")),
        }
    }

    /// The inside of a `[...]` dereference, after the opening bracket.
    fn memory_operand(&mut self) -> Result<Operand, ParseError> {
        match self.curtok.kind {
            // [i]
            TokenKind::Num => {
                let imm = self.lex.number();
                self.bump()?;
                self.close_bracket()?;
                Ok(Operand::Mem(MemAddr::Imm(imm)))
            }
            TokenKind::Id => {
                let r1 = self.register_name(&self.lex.id().to_string())?;
                self.bump()?;
                match self.curtok.kind {
                    // [R]
                    TokenKind::RBracket => {
                        self.bump()?;
                        Ok(Operand::Mem(MemAddr::Reg(r1)))
                    }
                    TokenKind::Plus => {
                        self.bump()?;
                        self.memory_operand_sum(r1)
                    }
                    // [R * i]
                    TokenKind::Times => {
                        self.bump()?;
                        if self.curtok.kind != TokenKind::Num {
                            return Err(
                                self.error("After [R1 * ...] there must always be an imm")
                            );
                        }
                        let scale = self.lex.number();
                        self.bump()?;
                        self.close_bracket()?;
                        Ok(Operand::Mem(MemAddr::RegScaled(r1, scale)))
                    }
                    _ => Err(self.error("Expected ']' to close dereference")),
                }
            }
            _ => Err(self.error("Expected either i or R after '['")),
        }
    }

    /// Continues a `[R1 + ...` dereference after the plus.
    fn memory_operand_sum(&mut self, r1: Register) -> Result<Operand, ParseError> {
        match self.curtok.kind {
            TokenKind::Id => {
                let r2 = self.register_name(&self.lex.id().to_string())?;
                self.bump()?;
                match self.curtok.kind {
                    // [R + R]
                    TokenKind::RBracket => {
                        self.bump()?;
                        Ok(Operand::Mem(MemAddr::RegReg(r1, r2)))
                    }
                    // [R + R * i]
                    TokenKind::Times => {
                        self.bump()?;
                        if self.curtok.kind != TokenKind::Num {
                            return Err(
                                self.error("After `[R1 + R2 *` there must always be an imm")
                            );
                        }
                        let scale = self.lex.number();
                        self.bump()?;
                        self.close_bracket()?;
                        Ok(Operand::Mem(MemAddr::RegRegScaled(r1, r2, scale)))
                    }
                    _ => Err(self.error("After `[R1 + R2` there must always be a `*` or `]`")),
                }
            }
            TokenKind::Num => {
                let imm = self.lex.number();
                self.bump()?;
                match self.curtok.kind {
                    // [R + i]
                    TokenKind::RBracket => {
                        self.bump()?;
                        Ok(Operand::Mem(MemAddr::RegImm(r1, imm)))
                    }
                    TokenKind::Plus => {
                        self.bump()?;
                        if self.curtok.kind != TokenKind::Id {
                            return Err(self.error(
                                "Dereference of form [R1 + i ...] must always contain `+ R` after i",
                            ));
                        }
                        let r2 = self.register_name(&self.lex.id().to_string())?;
                        self.bump()?;
                        match self.curtok.kind {
                            // [R + i + R]
                            TokenKind::RBracket => {
                                self.bump()?;
                                Ok(Operand::Mem(MemAddr::RegImmReg(r1, imm, r2)))
                            }
                            // [R + i + R * i]
                            TokenKind::Times => {
                                self.bump()?;
                                if self.curtok.kind != TokenKind::Num {
                                    return Err(self.error(
                                        "After `[R1 + i + R2 *` there must always be an imm",
                                    ));
                                }
                                let scale = self.lex.number();
                                self.bump()?;
                                self.close_bracket()?;
                                Ok(Operand::Mem(MemAddr::RegImmRegScaled(r1, imm, r2, scale)))
                            }
                            _ => Err(self.error(
                                "After `[R1 + i + R2` there must always be a `*` or `]`",
                            )),
                        }
                    }
                    _ => Err(self.error("Expected ']' to close dereference")),
                }
            }
            _ => Err(self.error("Expected either i or R after '+'")),
        }
    }

    fn close_bracket(&mut self) -> Result<(), ParseError> {
        if self.curtok.kind != TokenKind::RBracket {
            return Err(self.error("Expected ']' to close dereference"));
        }
        self.bump()?;
        Ok(())
    }

    fn bump(&mut self) -> Result<(), ParseError> {
        self.curtok = self.lex.next_token()?;
        Ok(())
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError::new(self.curtok.row, self.curtok.col, message)
    }
}
