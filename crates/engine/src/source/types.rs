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

//! Reconstructed source-level types.
//!
//! Pointer types store the pointee's DIE id rather than the
//! reconstructed pointee, so mutually and self-referential types form
//! no ownership cycles.

use derive_more::From;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A reconstructed type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, From)]
pub enum Type {
    Primitive(PrimitiveType),
    Structured(StructuredType),
    Pointer(PointerType),
}

impl Type {
    /// Size of the type in machine words.
    pub fn size(&self) -> u64 {
        match self {
            Self::Primitive(t) => t.size,
            Self::Structured(t) => t.size,
            Self::Pointer(t) => t.size,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primitive(t) => write!(f, "{}", t.kind),
            Self::Structured(t) => write!(f, "{}", t.name),
            Self::Pointer(t) => write!(f, "{}*", t.pointee_name),
        }
    }
}

/// The closed set of primitive kinds the debug info can name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrimitiveKind {
    Signed,
    Unsigned,
    Float,
    Bool,
}

impl PrimitiveKind {
    /// Maps a primitive keyword from the debug info.
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "signed_int" => Some(Self::Signed),
            "unsigned_int" => Some(Self::Unsigned),
            "float" => Some(Self::Float),
            "bool" => Some(Self::Bool),
            _ => None,
        }
    }
}

impl fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Signed => "int",
            Self::Unsigned => "unsigned",
            Self::Float => "float",
            Self::Bool => "bool",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PrimitiveType {
    pub kind: PrimitiveKind,
    pub size: u64,
}

/// One reconstructed member of a structured type. The type is absent
/// when the debug info for it is missing or unusable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredMember {
    pub name: String,
    pub ty: Option<Box<Type>>,
    pub offset: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredType {
    pub name: String,
    pub size: u64,
    pub members: Vec<StructuredMember>,
}

/// A pointer. The pointee is kept as a DIE id; its name is captured for
/// printing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointerType {
    pub pointee_id: usize,
    pub pointee_name: String,
    pub size: u64,
}
