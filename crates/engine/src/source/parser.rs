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

//! Parser for the textual debug information.
//!
//! Shares the assembly lexer and its conventions. Recognized sections:
//!
//! - `.debug_line` — rows of `line address` number pairs.
//! - `.debug_info` — a nested DIE tree. A DIE is its tag keyword,
//!   an attribute list, and either a bracketed children block or a
//!   terminating `;`. Attribute values are parsed by attribute kind;
//!   `members` and `location_expr` take bracketed, comma-separated
//!   lists.
//! - `.debug_source` — the rest of the input, taken verbatim as the
//!   program's source text (it must be the last section).
//!
//! Unknown sections are skipped until the next `.` or end of input.

use crate::source::{
    die::{Die, DieAttr, Member, Tag},
    loc::LocExpr,
};
use std::collections::BTreeMap;
use tdb_common::{
    lexer::{Lexer, Token, TokenKind},
    ParseError,
};
use tracing::debug;

/// Everything a debug-info file can carry.
#[derive(Debug, Clone, Default)]
pub struct DebugInfo {
    pub line_mapping: Option<BTreeMap<usize, u64>>,
    pub top_die: Option<Die>,
    pub source_code: Option<String>,
}

/// Parses debug-info text into a [`DebugInfo`].
pub fn parse_debug_info(input: &str) -> Result<DebugInfo, ParseError> {
    DebugInfoParser::new(input)?.parse()
}

pub struct DebugInfoParser<'a> {
    lex: Lexer<'a>,
    curtok: Token,
}

impl<'a> DebugInfoParser<'a> {
    pub fn new(input: &'a str) -> Result<Self, ParseError> {
        let mut lex = Lexer::new(input);
        let curtok = lex.next_token()?;
        Ok(Self { lex, curtok })
    }

    pub fn parse(mut self) -> Result<DebugInfo, ParseError> {
        let mut info = DebugInfo::default();
        while self.curtok.kind != TokenKind::End {
            if self.curtok.kind != TokenKind::Dot {
                return Err(self.error("Expected section beginning with '.'"));
            }
            self.bump()?;
            if self.curtok.kind != TokenKind::Id {
                return Err(self.error("Expected section name after '.'"));
            }
            let section_name = self.lex.id().to_string();
            if section_name == "debug_source" {
                // The raw source is not tokenizable; it swallows
                // everything up to the end of the file, so it must come
                // last. Do not lex past the section header.
                let rest = self.lex.rest();
                info.source_code = Some(rest.trim_start_matches('\n').to_string());
                return Ok(info);
            }
            self.bump()?;
            match section_name.as_str() {
                "debug_line" => info.line_mapping = Some(self.debug_line()?),
                "debug_info" => info.top_die = Some(self.die()?),
                _ => {
                    debug!(section = %section_name, "Skipping unknown section");
                    while self.curtok.kind != TokenKind::Dot && self.curtok.kind != TokenKind::End
                    {
                        self.bump()?;
                    }
                }
            }
        }
        Ok(info)
    }

    /// A sequence of `line address` pairs.
    fn debug_line(&mut self) -> Result<BTreeMap<usize, u64>, ParseError> {
        let mut mapping = BTreeMap::new();
        while self.curtok.kind != TokenKind::Dot && self.curtok.kind != TokenKind::End {
            let line = self.number_attr("line number")?;
            let address = self.number_attr("address")?;
            mapping.insert(line as usize, address);
        }
        Ok(mapping)
    }

    /// A DIE: tag keyword, attributes, then children in brackets or a
    /// terminating semicolon.
    fn die(&mut self) -> Result<Die, ParseError> {
        if self.curtok.kind != TokenKind::Id {
            return Err(self.error("Expected DIE tag"));
        }
        let keyword = self.lex.id().to_string();
        let tag = Tag::from_keyword(&keyword)
            .ok_or_else(|| self.error(format!("Unknown DIE tag '{keyword}'")))?;
        self.bump()?;

        let mut attributes = Vec::new();
        while self.curtok.kind == TokenKind::Id {
            attributes.push(self.attribute()?);
        }

        let mut children = Vec::new();
        match self.curtok.kind {
            TokenKind::LBracket => {
                self.bump()?;
                while self.curtok.kind != TokenKind::RBracket {
                    children.push(self.die()?);
                }
                self.bump()?;
            }
            TokenKind::Semicolon => self.bump()?,
            _ => return Err(self.error("Expected '[' with children or ';' to end the DIE")),
        }
        Ok(Die::new(tag, attributes, children))
    }

    /// One attribute, its value parsed according to the attribute name.
    fn attribute(&mut self) -> Result<DieAttr, ParseError> {
        let name = self.lex.id().to_string();
        self.bump()?;
        match name.as_str() {
            "id" => Ok(DieAttr::Id(self.number_attr("id")? as usize)),
            "name" => Ok(DieAttr::Name(self.string_attr()?)),
            "begin_addr" => Ok(DieAttr::BeginAddr(self.number_attr("begin_addr")?)),
            "end_addr" => Ok(DieAttr::EndAddr(self.number_attr("end_addr")?)),
            "type" => Ok(DieAttr::TypeRef(self.number_attr("type")? as usize)),
            "size" => Ok(DieAttr::Size(self.number_attr("size")?)),
            "members" => Ok(DieAttr::Members(self.members()?)),
            "location_expr" => Ok(DieAttr::LocationExpr(self.location_expr()?)),
            _ => Err(self.error(format!("Unknown DIE attribute '{name}'"))),
        }
    }

    /// `[ "name" type_id offset , ... ]`
    fn members(&mut self) -> Result<Vec<Member>, ParseError> {
        self.open_bracket("members")?;
        let mut members = Vec::new();
        if self.curtok.kind != TokenKind::RBracket {
            loop {
                let name = self.string_attr()?;
                let type_id = self.number_attr("member type id")? as usize;
                let offset = self.signed_number_attr("member offset")?;
                members.push(Member { name, type_id, offset });
                if self.curtok.kind != TokenKind::Comma {
                    break;
                }
                self.bump()?;
            }
        }
        self.close_bracket("members")?;
        Ok(members)
    }

    /// `[ frame_base_offset -8 , push_register "R0" , deref , ... ]`
    fn location_expr(&mut self) -> Result<Vec<LocExpr>, ParseError> {
        self.open_bracket("location_expr")?;
        let mut ops = Vec::new();
        if self.curtok.kind != TokenKind::RBracket {
            loop {
                ops.push(self.location_op()?);
                if self.curtok.kind != TokenKind::Comma {
                    break;
                }
                self.bump()?;
            }
        }
        self.close_bracket("location_expr")?;
        Ok(ops)
    }

    fn location_op(&mut self) -> Result<LocExpr, ParseError> {
        if self.curtok.kind != TokenKind::Id {
            return Err(self.error("Expected location operation"));
        }
        let op = self.lex.id().to_string();
        self.bump()?;
        match op.as_str() {
            "push_register" => Ok(LocExpr::PushRegister(self.string_attr()?)),
            "frame_base_offset" => {
                Ok(LocExpr::FrameBaseOffset(self.signed_number_attr("frame base offset")?))
            }
            "push_address" => Ok(LocExpr::PushAddress(self.number_attr("address")?)),
            "deref" => Ok(LocExpr::Deref),
            "add" => Ok(LocExpr::Add),
            _ => Err(self.error(format!("Unknown location operation '{op}'"))),
        }
    }

    fn number_attr(&mut self, what: &str) -> Result<u64, ParseError> {
        let value = self.signed_number_attr(what)?;
        u64::try_from(value).map_err(|_| self.error(format!("Expected non-negative {what}")))
    }

    fn signed_number_attr(&mut self, what: &str) -> Result<i64, ParseError> {
        if self.curtok.kind != TokenKind::Num {
            return Err(self.error(format!("Expected {what}")));
        }
        let value = self.lex.number();
        self.bump()?;
        Ok(value)
    }

    fn string_attr(&mut self) -> Result<String, ParseError> {
        if self.curtok.kind != TokenKind::Str {
            return Err(self.error("Expected string"));
        }
        let value = self.lex.string().to_string();
        self.bump()?;
        Ok(value)
    }

    fn open_bracket(&mut self, what: &str) -> Result<(), ParseError> {
        if self.curtok.kind != TokenKind::LBracket {
            return Err(self.error(format!("Expected '[' to open {what}")));
        }
        self.bump()
    }

    fn close_bracket(&mut self, what: &str) -> Result<(), ParseError> {
        if self.curtok.kind != TokenKind::RBracket {
            return Err(self.error(format!("Expected ']' to close {what}")));
        }
        self.bump()
    }

    fn bump(&mut self) -> Result<(), ParseError> {
        self.curtok = self.lex.next_token()?;
        Ok(())
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError::new(self.curtok.row, self.curtok.col, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_table() {
        let info = parse_debug_info(".debug_line\n0 3\n1 3\n2 4\n3 5\n").unwrap();
        let mapping = info.line_mapping.unwrap();
        assert_eq!(mapping.len(), 4);
        assert_eq!(mapping[&0], 3);
        assert_eq!(mapping[&1], 3);
        assert_eq!(mapping[&2], 4);
        assert_eq!(mapping[&3], 5);
    }

    #[test]
    fn test_empty_line_table() {
        let info = parse_debug_info(".debug_line\n.text\nNOP\n").unwrap();
        assert_eq!(info.line_mapping.unwrap().len(), 0);
    }

    #[test]
    fn test_unknown_sections_are_skipped() {
        let info = parse_debug_info(".text\nMOV R0, 1\nHALT\n.debug_line\n0 1\n").unwrap();
        assert_eq!(info.line_mapping.unwrap().len(), 1);
    }

    #[test]
    fn test_die_tree() {
        let info = parse_debug_info(
            r#"
.debug_info
compile_unit [
    primitive_type id 0 name "signed_int" size 1 ;
    function id 1 name "main" begin_addr 0 end_addr 10 [
        variable id 2 name "x" type 0
            location_expr [ frame_base_offset -8 ] ;
    ]
]
"#,
        )
        .unwrap();
        let top = info.top_die.unwrap();
        assert_eq!(top.tag(), Tag::CompileUnit);
        assert_eq!(top.children().len(), 2);
        let function = &top.children()[1];
        assert_eq!(function.tag(), Tag::Function);
        assert_eq!(function.name(), Some("main"));
        assert_eq!(function.begin_addr(), Some(0));
        assert_eq!(function.end_addr(), Some(10));
        let variable = &function.children()[0];
        assert_eq!(variable.tag(), Tag::Variable);
        assert_eq!(variable.location_expr(), Some(&[LocExpr::FrameBaseOffset(-8)][..]));
    }

    #[test]
    fn test_members_attribute() {
        let info = parse_debug_info(
            r#"
.debug_info
compile_unit [
    structured_type id 1 name "pair" size 2
        members [ "first" 0 0 , "second" 0 1 ] ;
    primitive_type id 0 name "signed_int" size 1 ;
]
"#,
        )
        .unwrap();
        let top = info.top_die.unwrap();
        let members = top.children()[0].members().unwrap();
        assert_eq!(members.len(), 2);
        assert_eq!(members[0], Member { name: "first".into(), type_id: 0, offset: 0 });
        assert_eq!(members[1], Member { name: "second".into(), type_id: 0, offset: 1 });
    }

    #[test]
    fn test_debug_source_takes_the_rest() {
        let info = parse_debug_info(".debug_line\n0 0\n.debug_source\nint main() {}\n").unwrap();
        assert_eq!(info.source_code.unwrap(), "int main() {}\n");
        assert!(info.line_mapping.is_some());
    }

    #[test]
    fn test_unknown_tag_is_an_error() {
        let err = parse_debug_info(".debug_info\nnamespace [ ]").unwrap_err();
        assert!(err.message.contains("Unknown DIE tag"));
    }

    #[test]
    fn test_unknown_attribute_is_an_error() {
        let err = parse_debug_info(".debug_info\nvariable linkage 4 ;").unwrap_err();
        assert!(err.message.contains("Unknown DIE attribute"));
    }

    #[test]
    fn test_errors_carry_positions() {
        let err = parse_debug_info(".debug_line\n0 oops\n").unwrap_err();
        assert_eq!(err.row, 1);
    }
}
