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

//! Debugging Information Entries.
//!
//! A DIE is a tagged tree node with typed attributes and children.
//! IDs are globally unique across the tree; `type` attributes always
//! reference existing DIEs carrying a type tag.

use crate::source::loc::LocExpr;
use serde::{Deserialize, Serialize};

/// The kind of a debugging information entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tag {
    CompileUnit,
    Function,
    Scope,
    Variable,
    PrimitiveType,
    StructuredType,
    PointerType,
}

impl Tag {
    /// Maps a tag keyword of the debug-info text format.
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "compile_unit" => Some(Self::CompileUnit),
            "function" => Some(Self::Function),
            "scope" => Some(Self::Scope),
            "variable" => Some(Self::Variable),
            "primitive_type" => Some(Self::PrimitiveType),
            "structured_type" => Some(Self::StructuredType),
            "pointer_type" => Some(Self::PointerType),
            _ => None,
        }
    }
}

/// One member of a structured type: name, referenced type id, and
/// offset from the beginning of the structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub name: String,
    pub type_id: usize,
    pub offset: i64,
}

/// A typed DIE attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DieAttr {
    Id(usize),
    Name(String),
    BeginAddr(u64),
    EndAddr(u64),
    TypeRef(usize),
    Size(u64),
    Members(Vec<Member>),
    LocationExpr(Vec<LocExpr>),
}

/// A debugging information entry: a tag, an arbitrary number of
/// attributes and children DIEs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Die {
    tag: Tag,
    attributes: Vec<DieAttr>,
    children: Vec<Die>,
}

impl Die {
    pub fn new(tag: Tag, attributes: Vec<DieAttr>, children: Vec<Die>) -> Self {
        Self { tag, attributes, children }
    }

    pub fn tag(&self) -> Tag {
        self.tag
    }

    pub fn children(&self) -> &[Die] {
        &self.children
    }

    pub fn attributes(&self) -> &[DieAttr] {
        &self.attributes
    }

    pub fn id(&self) -> Option<usize> {
        self.attributes.iter().find_map(|a| match a {
            DieAttr::Id(id) => Some(*id),
            _ => None,
        })
    }

    pub fn name(&self) -> Option<&str> {
        self.attributes.iter().find_map(|a| match a {
            DieAttr::Name(name) => Some(name.as_str()),
            _ => None,
        })
    }

    pub fn begin_addr(&self) -> Option<u64> {
        self.attributes.iter().find_map(|a| match a {
            DieAttr::BeginAddr(addr) => Some(*addr),
            _ => None,
        })
    }

    pub fn end_addr(&self) -> Option<u64> {
        self.attributes.iter().find_map(|a| match a {
            DieAttr::EndAddr(addr) => Some(*addr),
            _ => None,
        })
    }

    pub fn type_ref(&self) -> Option<usize> {
        self.attributes.iter().find_map(|a| match a {
            DieAttr::TypeRef(id) => Some(*id),
            _ => None,
        })
    }

    pub fn size(&self) -> Option<u64> {
        self.attributes.iter().find_map(|a| match a {
            DieAttr::Size(size) => Some(*size),
            _ => None,
        })
    }

    pub fn members(&self) -> Option<&[Member]> {
        self.attributes.iter().find_map(|a| match a {
            DieAttr::Members(members) => Some(members.as_slice()),
            _ => None,
        })
    }

    pub fn location_expr(&self) -> Option<&[LocExpr]> {
        self.attributes.iter().find_map(|a| match a {
            DieAttr::LocationExpr(exprs) => Some(exprs.as_slice()),
            _ => None,
        })
    }

    /// Finds the DIE with the given id anywhere in this subtree. IDs
    /// are unique, so the first match is the only one.
    pub fn find_by_id(&self, id: usize) -> Option<&Die> {
        if self.id() == Some(id) {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find_by_id(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_accessors() {
        let die = Die::new(
            Tag::Variable,
            vec![
                DieAttr::Id(7),
                DieAttr::Name("x".into()),
                DieAttr::TypeRef(1),
                DieAttr::LocationExpr(vec![LocExpr::FrameBaseOffset(-2)]),
            ],
            vec![],
        );
        assert_eq!(die.id(), Some(7));
        assert_eq!(die.name(), Some("x"));
        assert_eq!(die.type_ref(), Some(1));
        assert_eq!(die.location_expr(), Some(&[LocExpr::FrameBaseOffset(-2)][..]));
        assert_eq!(die.begin_addr(), None);
    }

    #[test]
    fn test_find_by_id() {
        let leaf = Die::new(Tag::PrimitiveType, vec![DieAttr::Id(3)], vec![]);
        let root = Die::new(
            Tag::CompileUnit,
            vec![DieAttr::Id(0)],
            vec![Die::new(Tag::Function, vec![DieAttr::Id(1)], vec![leaf.clone()])],
        );
        assert_eq!(root.find_by_id(3), Some(&leaf));
        assert!(root.find_by_id(9).is_none());
    }
}
