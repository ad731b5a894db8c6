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

//! Debugger expressions: `a + b->c`, `*p`, `arr[i]`, `$0 == 5`.
//!
//! Expressions are parsed into a small AST and evaluated against live
//! native state: identifiers resolve through the active scopes at the
//! current IP, load their value from the location the debug info
//! computes, and carry their reconstructed type through the operators.

use crate::native::Native;
use crate::source::{
    loc::{Location, LocationInterpreter},
    types::{PointerType, PrimitiveKind, Type},
    Source,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tdb_common::{
    lexer::{Lexer, Token, TokenKind},
    DebuggerError, ParseError,
};

/// A parsed debugger expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Integer(i64),
    Float(f64),
    Identifier(String),
    /// `$N` - the N-th previously evaluated expression.
    History(usize),
    Unary { op: UnaryOp, operand: Box<Expr> },
    Binary { op: BinaryOp, lhs: Box<Expr>, rhs: Box<Expr> },
    /// `base[index]`
    Index { base: Box<Expr>, index: Box<Expr> },
    /// `base.member`
    Member { base: Box<Expr>, member: String },
    /// `base->member`
    MemberDeref { base: Box<Expr>, member: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Negate,
    Not,
    Deref,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Neq,
    Less,
    LessEq,
    Greater,
    GreaterEq,
}

/// Parses one expression; trailing input is an error.
pub fn parse_expression(input: &str) -> Result<Expr, ParseError> {
    let mut parser = ExpressionParser::new(input)?;
    let expr = parser.expr()?;
    if parser.curtok.kind != TokenKind::End {
        return Err(ParseError::new(
            parser.curtok.row,
            parser.curtok.col,
            "Trailing input after expression",
        ));
    }
    Ok(expr)
}

struct ExpressionParser<'a> {
    lex: Lexer<'a>,
    curtok: Token,
}

impl<'a> ExpressionParser<'a> {
    fn new(input: &'a str) -> Result<Self, ParseError> {
        let mut lex = Lexer::new(input);
        let curtok = lex.next_token()?;
        Ok(Self { lex, curtok })
    }

    fn bump(&mut self) -> Result<(), ParseError> {
        self.curtok = self.lex.next_token()?;
        Ok(())
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError::new(self.curtok.row, self.curtok.col, message)
    }

    fn expr(&mut self) -> Result<Expr, ParseError> {
        self.equality()
    }

    fn equality(&mut self) -> Result<Expr, ParseError> {
        let mut result = self.comparison()?;
        loop {
            let op = match self.curtok.kind {
                TokenKind::Eq => BinaryOp::Eq,
                TokenKind::Neq => BinaryOp::Neq,
                _ => break,
            };
            self.bump()?;
            let rhs = self.comparison()?;
            result = Expr::Binary { op, lhs: Box::new(result), rhs: Box::new(rhs) };
        }
        Ok(result)
    }

    fn comparison(&mut self) -> Result<Expr, ParseError> {
        let mut result = self.term()?;
        loop {
            let op = match self.curtok.kind {
                TokenKind::Less => BinaryOp::Less,
                TokenKind::LessEq => BinaryOp::LessEq,
                TokenKind::Greater => BinaryOp::Greater,
                TokenKind::GreaterEq => BinaryOp::GreaterEq,
                _ => break,
            };
            self.bump()?;
            let rhs = self.term()?;
            result = Expr::Binary { op, lhs: Box::new(result), rhs: Box::new(rhs) };
        }
        Ok(result)
    }

    fn term(&mut self) -> Result<Expr, ParseError> {
        let mut result = self.factor()?;
        loop {
            let op = match self.curtok.kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.bump()?;
            let rhs = self.factor()?;
            result = Expr::Binary { op, lhs: Box::new(result), rhs: Box::new(rhs) };
        }
        Ok(result)
    }

    fn factor(&mut self) -> Result<Expr, ParseError> {
        let mut result = self.unary()?;
        loop {
            let op = match self.curtok.kind {
                TokenKind::Times => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Percent => BinaryOp::Mod,
                _ => break,
            };
            self.bump()?;
            let rhs = self.unary()?;
            result = Expr::Binary { op, lhs: Box::new(result), rhs: Box::new(rhs) };
        }
        Ok(result)
    }

    fn unary(&mut self) -> Result<Expr, ParseError> {
        let op = match self.curtok.kind {
            TokenKind::Minus => Some(UnaryOp::Negate),
            TokenKind::Bang => Some(UnaryOp::Not),
            TokenKind::Times => Some(UnaryOp::Deref),
            _ => None,
        };
        if let Some(op) = op {
            self.bump()?;
            let operand = self.unary()?;
            return Ok(Expr::Unary { op, operand: Box::new(operand) });
        }
        self.postfix()
    }

    fn postfix(&mut self) -> Result<Expr, ParseError> {
        let mut result = self.primary()?;
        loop {
            match self.curtok.kind {
                TokenKind::LBracket => {
                    self.bump()?;
                    let index = self.expr()?;
                    if self.curtok.kind != TokenKind::RBracket {
                        return Err(self.error("Expected ']' to close the index"));
                    }
                    self.bump()?;
                    result = Expr::Index { base: Box::new(result), index: Box::new(index) };
                }
                TokenKind::Dot => {
                    self.bump()?;
                    result = Expr::Member {
                        base: Box::new(result),
                        member: self.member_name()?,
                    };
                }
                TokenKind::Arrow => {
                    self.bump()?;
                    result = Expr::MemberDeref {
                        base: Box::new(result),
                        member: self.member_name()?,
                    };
                }
                _ => break,
            }
        }
        Ok(result)
    }

    fn member_name(&mut self) -> Result<String, ParseError> {
        if self.curtok.kind != TokenKind::Id {
            return Err(self.error("Expected member name"));
        }
        let name = self.lex.id().to_string();
        self.bump()?;
        Ok(name)
    }

    fn primary(&mut self) -> Result<Expr, ParseError> {
        match self.curtok.kind {
            TokenKind::Num => {
                let value = self.lex.number();
                self.bump()?;
                Ok(Expr::Integer(value))
            }
            TokenKind::Float => {
                let value = self.lex.float();
                self.bump()?;
                Ok(Expr::Float(value))
            }
            TokenKind::Id => {
                let name = self.lex.id().to_string();
                self.bump()?;
                Ok(Expr::Identifier(name))
            }
            TokenKind::Dollar => {
                self.bump()?;
                if self.curtok.kind != TokenKind::Num {
                    return Err(self.error("Expected expression index after '$'"));
                }
                let index = self.lex.number();
                self.bump()?;
                usize::try_from(index)
                    .map(Expr::History)
                    .map_err(|_| self.error("Expected non-negative expression index after '$'"))
            }
            TokenKind::LParen => {
                self.bump()?;
                let inner = self.expr()?;
                if self.curtok.kind != TokenKind::RParen {
                    return Err(self.error("Expected ')'"));
                }
                self.bump()?;
                Ok(inner)
            }
            _ => Err(self.error("Expected expression")),
        }
    }
}

/// An evaluated value together with its reconstructed type and, when it
/// came from the debuggee, the location it was loaded from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TypedValue {
    Integer(IntegerValue),
    Float(FloatValue),
    Pointer(PointerValue),
    Structured(StructuredValue),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegerValue {
    pub value: i64,
    pub location: Option<Location>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FloatValue {
    pub value: f64,
    pub location: Option<Location>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointerValue {
    pub ty: PointerType,
    pub value: u64,
    pub location: Option<Location>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredValue {
    pub name: String,
    pub size: u64,
    pub members: BTreeMap<String, TypedValue>,
    pub location: Option<Location>,
}

impl TypedValue {
    pub fn location(&self) -> Option<&Location> {
        match self {
            Self::Integer(v) => v.location.as_ref(),
            Self::Float(v) => v.location.as_ref(),
            Self::Pointer(v) => v.location.as_ref(),
            Self::Structured(v) => v.location.as_ref(),
        }
    }

    fn integer(value: i64) -> Self {
        Self::Integer(IntegerValue { value, location: None })
    }
}

impl fmt::Display for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(v) => write!(f, "{}", v.value),
            Self::Float(v) => write!(f, "{}", v.value),
            Self::Pointer(v) => write!(f, "{} ({})", v.value, Type::Pointer(v.ty.clone())),
            Self::Structured(v) => {
                write!(f, "{{ ")?;
                for (i, (name, member)) in v.members.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{name} = {member}")?;
                }
                write!(f, " }}")
            }
        }
    }
}

/// Evaluates expression ASTs against the live debuggee.
pub struct ExpressionEvaluator<'a> {
    native: &'a mut Native,
    source: &'a mut Source,
}

impl<'a> ExpressionEvaluator<'a> {
    pub fn new(native: &'a mut Native, source: &'a mut Source) -> Self {
        Self { native, source }
    }

    pub fn evaluate(&mut self, expr: &Expr) -> Result<TypedValue, DebuggerError> {
        match expr {
            Expr::Integer(value) => Ok(TypedValue::integer(*value)),
            Expr::Float(value) => {
                Ok(TypedValue::Float(FloatValue { value: *value, location: None }))
            }
            Expr::History(index) => self
                .source
                .evaluated_expressions()
                .get(*index)
                .cloned()
                .ok_or_else(|| {
                    DebuggerError::new(format!("No evaluated expression with index {index}"))
                }),
            Expr::Identifier(name) => self.identifier(name),
            Expr::Unary { op, operand } => self.unary(*op, operand),
            Expr::Binary { op, lhs, rhs } => self.binary(*op, lhs, rhs),
            Expr::Index { base, index } => self.index(base, index),
            Expr::Member { base, member } => self.member(base, member),
            Expr::MemberDeref { base, member } => self.member_deref(base, member),
        }
    }

    fn identifier(&mut self, name: &str) -> Result<TypedValue, DebuggerError> {
        let ip = self.native.get_ip()?;
        let (location_program, type_id) = {
            let die = self
                .source
                .variable_die(ip, name)
                .ok_or_else(|| DebuggerError::new(format!("Variable '{name}' is not in scope")))?;
            let location_program = die.location_expr().ok_or_else(|| {
                DebuggerError::new(format!("Variable '{name}' has no location information"))
            })?;
            let type_id = die.type_ref().ok_or_else(|| {
                DebuggerError::new(format!("Variable '{name}' has no type information"))
            })?;
            (location_program.to_vec(), type_id)
        };
        let location = LocationInterpreter::interpret(&location_program, self.native)?;
        let ty = self.source.type_info(type_id).ok_or_else(|| {
            DebuggerError::new(format!("No information about type with id {type_id}"))
        })?;
        self.load(&ty, location)
    }

    /// Loads a value of the given type from a location.
    fn load(&mut self, ty: &Type, location: Location) -> Result<TypedValue, DebuggerError> {
        match ty {
            Type::Primitive(primitive) => match primitive.kind {
                PrimitiveKind::Signed | PrimitiveKind::Unsigned | PrimitiveKind::Bool => {
                    let value = self.read_word(&location)?;
                    Ok(TypedValue::Integer(IntegerValue { value, location: Some(location) }))
                }
                PrimitiveKind::Float => {
                    let value = self.read_float(&location)?;
                    Ok(TypedValue::Float(FloatValue { value, location: Some(location) }))
                }
            },
            Type::Pointer(pointer) => {
                let value = self.read_word(&location)? as u64;
                Ok(TypedValue::Pointer(PointerValue {
                    ty: pointer.clone(),
                    value,
                    location: Some(location),
                }))
            }
            Type::Structured(structured) => {
                let base = self.location_address(&location)?;
                let mut members = BTreeMap::new();
                for member in &structured.members {
                    let Some(member_ty) = member.ty.as_deref() else { continue };
                    let member_location =
                        Location::Address((base as i64 + member.offset) as u64);
                    let value = self.load(member_ty, member_location)?;
                    members.insert(member.name.clone(), value);
                }
                Ok(TypedValue::Structured(StructuredValue {
                    name: structured.name.clone(),
                    size: structured.size,
                    members,
                    location: Some(location),
                }))
            }
        }
    }

    fn unary(&mut self, op: UnaryOp, operand: &Expr) -> Result<TypedValue, DebuggerError> {
        let value = self.evaluate(operand)?;
        match (op, value) {
            (UnaryOp::Negate, TypedValue::Integer(v)) => Ok(TypedValue::integer(-v.value)),
            (UnaryOp::Negate, TypedValue::Float(v)) => {
                Ok(TypedValue::Float(FloatValue { value: -v.value, location: None }))
            }
            (UnaryOp::Not, TypedValue::Integer(v)) => {
                Ok(TypedValue::integer((v.value == 0) as i64))
            }
            (UnaryOp::Deref, TypedValue::Pointer(pointer)) => {
                let pointee = self.pointee_type(&pointer.ty)?;
                self.load(&pointee, Location::Address(pointer.value))
            }
            (op, value) => Err(DebuggerError::new(format!(
                "Cannot apply {op:?} to the value '{value}'"
            ))),
        }
    }

    fn binary(&mut self, op: BinaryOp, lhs: &Expr, rhs: &Expr) -> Result<TypedValue, DebuggerError> {
        let lhs = self.evaluate(lhs)?;
        let rhs = self.evaluate(rhs)?;
        match (lhs, rhs) {
            (TypedValue::Integer(l), TypedValue::Integer(r)) => {
                Self::integer_binary(op, l.value, r.value).map(TypedValue::integer)
            }
            (TypedValue::Float(l), TypedValue::Float(r)) => Self::float_binary(op, l.value, r.value),
            (TypedValue::Integer(l), TypedValue::Float(r)) => {
                Self::float_binary(op, l.value as f64, r.value)
            }
            (TypedValue::Float(l), TypedValue::Integer(r)) => {
                Self::float_binary(op, l.value, r.value as f64)
            }
            (TypedValue::Pointer(p), TypedValue::Integer(i)) => self.pointer_offset(op, p, i.value),
            (TypedValue::Integer(i), TypedValue::Pointer(p)) if op == BinaryOp::Add => {
                self.pointer_offset(op, p, i.value)
            }
            (TypedValue::Pointer(l), TypedValue::Pointer(r)) => {
                let result = match op {
                    BinaryOp::Eq => (l.value == r.value) as i64,
                    BinaryOp::Neq => (l.value != r.value) as i64,
                    BinaryOp::Sub => l.value as i64 - r.value as i64,
                    _ => {
                        return Err(DebuggerError::new(format!(
                            "Cannot apply {op:?} to two pointers"
                        )))
                    }
                };
                Ok(TypedValue::integer(result))
            }
            (lhs, rhs) => Err(DebuggerError::new(format!(
                "Cannot apply {op:?} to '{lhs}' and '{rhs}'"
            ))),
        }
    }

    fn integer_binary(op: BinaryOp, l: i64, r: i64) -> Result<i64, DebuggerError> {
        Ok(match op {
            BinaryOp::Add => l.wrapping_add(r),
            BinaryOp::Sub => l.wrapping_sub(r),
            BinaryOp::Mul => l.wrapping_mul(r),
            BinaryOp::Div => {
                if r == 0 {
                    return Err(DebuggerError::new("Division by zero"));
                }
                l / r
            }
            BinaryOp::Mod => {
                if r == 0 {
                    return Err(DebuggerError::new("Division by zero"));
                }
                l % r
            }
            BinaryOp::Eq => (l == r) as i64,
            BinaryOp::Neq => (l != r) as i64,
            BinaryOp::Less => (l < r) as i64,
            BinaryOp::LessEq => (l <= r) as i64,
            BinaryOp::Greater => (l > r) as i64,
            BinaryOp::GreaterEq => (l >= r) as i64,
        })
    }

    fn float_binary(op: BinaryOp, l: f64, r: f64) -> Result<TypedValue, DebuggerError> {
        let float = |value| Ok(TypedValue::Float(FloatValue { value, location: None }));
        match op {
            BinaryOp::Add => float(l + r),
            BinaryOp::Sub => float(l - r),
            BinaryOp::Mul => float(l * r),
            BinaryOp::Div => float(l / r),
            BinaryOp::Mod => Err(DebuggerError::new("Cannot apply Mod to floats")),
            BinaryOp::Eq => Ok(TypedValue::integer((l == r) as i64)),
            BinaryOp::Neq => Ok(TypedValue::integer((l != r) as i64)),
            BinaryOp::Less => Ok(TypedValue::integer((l < r) as i64)),
            BinaryOp::LessEq => Ok(TypedValue::integer((l <= r) as i64)),
            BinaryOp::Greater => Ok(TypedValue::integer((l > r) as i64)),
            BinaryOp::GreaterEq => Ok(TypedValue::integer((l >= r) as i64)),
        }
    }

    /// Pointer arithmetic scales by the pointee size in words.
    fn pointer_offset(
        &mut self,
        op: BinaryOp,
        pointer: PointerValue,
        offset: i64,
    ) -> Result<TypedValue, DebuggerError> {
        let element = self.pointee_size(&pointer.ty);
        let value = match op {
            BinaryOp::Add => pointer.value as i64 + offset * element as i64,
            BinaryOp::Sub => pointer.value as i64 - offset * element as i64,
            _ => {
                return Err(DebuggerError::new(format!(
                    "Cannot apply {op:?} to a pointer and an integer"
                )))
            }
        };
        Ok(TypedValue::Pointer(PointerValue {
            ty: pointer.ty,
            value: value as u64,
            location: None,
        }))
    }

    fn index(&mut self, base: &Expr, index: &Expr) -> Result<TypedValue, DebuggerError> {
        let base = self.evaluate(base)?;
        let index = self.evaluate(index)?;
        let (TypedValue::Pointer(pointer), TypedValue::Integer(index)) = (base, index) else {
            return Err(DebuggerError::new("Indexing needs a pointer and an integer index"));
        };
        let element = self.pointee_size(&pointer.ty);
        let address = pointer.value as i64 + index.value * element as i64;
        let pointee = self.pointee_type(&pointer.ty)?;
        self.load(&pointee, Location::Address(address as u64))
    }

    fn member(&mut self, base: &Expr, member: &str) -> Result<TypedValue, DebuggerError> {
        let base = self.evaluate(base)?;
        let TypedValue::Structured(structured) = base else {
            return Err(DebuggerError::new(format!(
                "Member access '.{member}' needs a structured value"
            )));
        };
        structured.members.get(member).cloned().ok_or_else(|| {
            DebuggerError::new(format!("No member '{member}' in struct '{}'", structured.name))
        })
    }

    fn member_deref(&mut self, base: &Expr, member: &str) -> Result<TypedValue, DebuggerError> {
        let base = self.evaluate(base)?;
        let TypedValue::Pointer(pointer) = base else {
            return Err(DebuggerError::new(format!(
                "Member access '->{member}' needs a pointer value"
            )));
        };
        let pointee = self.pointee_type(&pointer.ty)?;
        let value = self.load(&pointee, Location::Address(pointer.value))?;
        let TypedValue::Structured(structured) = value else {
            return Err(DebuggerError::new(format!(
                "Member access '->{member}' needs a pointer to a struct"
            )));
        };
        structured.members.get(member).cloned().ok_or_else(|| {
            DebuggerError::new(format!("No member '{member}' in struct '{}'", structured.name))
        })
    }

    fn pointee_type(&mut self, pointer: &PointerType) -> Result<Type, DebuggerError> {
        self.source.type_info(pointer.pointee_id).ok_or_else(|| {
            DebuggerError::new(format!(
                "No information about type with id {}",
                pointer.pointee_id
            ))
        })
    }

    fn pointee_size(&mut self, pointer: &PointerType) -> u64 {
        self.source.type_info(pointer.pointee_id).map(|t| t.size()).unwrap_or(1)
    }

    /// Reads one machine word from a location.
    fn read_word(&mut self, location: &Location) -> Result<i64, DebuggerError> {
        match location {
            Location::Register(name) => self.native.get_register(name),
            _ => {
                let address = self.location_address(location)?;
                Ok(self.native.read_memory(address, 1)?[0])
            }
        }
    }

    fn read_float(&mut self, location: &Location) -> Result<f64, DebuggerError> {
        match location {
            Location::Register(name) => self.native.get_float_register(name),
            _ => {
                let address = self.location_address(location)?;
                let bits = self.native.read_memory(address, 1)?[0];
                Ok(f64::from_bits(bits as u64))
            }
        }
    }

    /// The concrete memory address of a location; registers hold no
    /// address.
    fn location_address(&mut self, location: &Location) -> Result<u64, DebuggerError> {
        match location {
            Location::Register(name) => Err(DebuggerError::new(format!(
                "The value lives in register {name} and has no address"
            ))),
            Location::Offset { reg, offset } => {
                let base = self.native.get_register(reg)?;
                Ok((base + offset) as u64)
            }
            Location::Address(address) => Ok(*address),
            Location::RegisterSum(r1, r2) => {
                let v1 = self.native.get_register(r1)?;
                let v2 = self.native.get_register(r2)?;
                Ok((v1 + v2) as u64)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_precedence() {
        let expr = parse_expression("1 + 2 * 3").unwrap();
        assert_eq!(
            expr,
            Expr::Binary {
                op: BinaryOp::Add,
                lhs: Box::new(Expr::Integer(1)),
                rhs: Box::new(Expr::Binary {
                    op: BinaryOp::Mul,
                    lhs: Box::new(Expr::Integer(2)),
                    rhs: Box::new(Expr::Integer(3)),
                }),
            }
        );
    }

    #[test]
    fn test_parse_parentheses() {
        let expr = parse_expression("(1 + 2) * 3").unwrap();
        let Expr::Binary { op: BinaryOp::Mul, lhs, .. } = expr else {
            panic!("expected the multiplication on top");
        };
        assert!(matches!(*lhs, Expr::Binary { op: BinaryOp::Add, .. }));
    }

    #[test]
    fn test_parse_postfix_chain() {
        let expr = parse_expression("list->next.val").unwrap();
        let Expr::Member { base, member } = expr else { panic!("expected member access") };
        assert_eq!(member, "val");
        assert!(matches!(*base, Expr::MemberDeref { .. }));
    }

    #[test]
    fn test_parse_unary_chain() {
        let expr = parse_expression("-*p").unwrap();
        let Expr::Unary { op: UnaryOp::Negate, operand } = expr else {
            panic!("expected negation on top")
        };
        assert!(matches!(*operand, Expr::Unary { op: UnaryOp::Deref, .. }));
    }

    #[test]
    fn test_parse_history_reference() {
        assert_eq!(parse_expression("$3").unwrap(), Expr::History(3));
        assert!(parse_expression("$x").is_err());
    }

    #[test]
    fn test_parse_index() {
        let expr = parse_expression("arr[i + 1]").unwrap();
        assert!(matches!(expr, Expr::Index { .. }));
    }

    #[test]
    fn test_trailing_input_is_an_error() {
        assert!(parse_expression("1 1").is_err());
    }

    #[test]
    fn test_integer_arithmetic() {
        assert_eq!(ExpressionEvaluator::integer_binary(BinaryOp::Add, 2, 3).unwrap(), 5);
        assert_eq!(ExpressionEvaluator::integer_binary(BinaryOp::Less, 2, 3).unwrap(), 1);
        assert!(ExpressionEvaluator::integer_binary(BinaryOp::Div, 1, 0).is_err());
    }
}
