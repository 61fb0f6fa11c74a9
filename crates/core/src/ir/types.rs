use serde::{Deserialize, Serialize};

use crate::ir::TypeId;

/// Static type of an IR value.
///
/// Types live in the program's type table and are referenced by [`TypeId`].
/// Aggregates may be named (`struct.nsAString`) or anonymous; anonymous ones
/// only get a printable name from [`crate::query::TypeNames`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Type {
    Void,
    Label,
    Float,
    Double,
    Integer {
        bits: u32,
    },
    Pointer {
        pointee: TypeId,
    },
    Array {
        element: TypeId,
        len: u64,
    },
    Struct {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        fields: Vec<TypeId>,
        #[serde(default)]
        packed: bool,
    },
    Opaque {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    Function {
        ret: TypeId,
        params: Vec<TypeId>,
        #[serde(default)]
        var_arg: bool,
    },
}

impl Type {
    pub fn is_integer(&self) -> bool {
        matches!(self, Type::Integer { .. })
    }

    pub fn is_integer_bits(&self, width: u32) -> bool {
        matches!(self, Type::Integer { bits } if *bits == width)
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self, Type::Pointer { .. })
    }

    /// Pointee of a pointer type.
    pub fn pointee(&self) -> Option<TypeId> {
        match self {
            Type::Pointer { pointee } => Some(*pointee),
            _ => None,
        }
    }

    /// Symbolic name for named aggregates and opaque types.
    pub fn name(&self) -> Option<&str> {
        match self {
            Type::Struct { name, .. } | Type::Opaque { name } => name.as_deref(),
            _ => None,
        }
    }

    /// Types directly contained in this one, in declaration order.
    pub fn subtypes(&self) -> Vec<TypeId> {
        match self {
            Type::Pointer { pointee } => vec![*pointee],
            Type::Array { element, .. } => vec![*element],
            Type::Struct { fields, .. } => fields.clone(),
            Type::Function { ret, params, .. } => {
                let mut out = Vec::with_capacity(params.len() + 1);
                out.push(*ret);
                out.extend(params.iter().copied());
                out
            }
            _ => Vec::new(),
        }
    }
}
