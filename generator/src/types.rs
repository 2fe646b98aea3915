// types.rs — LLVM IR static types
//
// The type model the parser builds for parameters, printed back in LLVM
// syntax. Covers integers, floating-point kinds, opaque and legacy typed
// pointers, arrays, (scalable) vectors, literal and packed structs, named
// types and function types. The grammar itself lives in `parser.rs`.
//
// Preconditions: none (types only).
// Postconditions: none (types only).
// Failure modes: none.
// Side effects: none.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FloatKind {
    Half,
    BFloat,
    Float,
    Double,
    Fp128,
    X86Fp80,
    PpcFp128,
}

impl FloatKind {
    fn from_word(word: &str) -> Option<Self> {
        Some(match word {
            "half" => FloatKind::Half,
            "bfloat" => FloatKind::BFloat,
            "float" => FloatKind::Float,
            "double" => FloatKind::Double,
            "fp128" => FloatKind::Fp128,
            "x86_fp80" => FloatKind::X86Fp80,
            "ppc_fp128" => FloatKind::PpcFp128,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            FloatKind::Half => "half",
            FloatKind::BFloat => "bfloat",
            FloatKind::Float => "float",
            FloatKind::Double => "double",
            FloatKind::Fp128 => "fp128",
            FloatKind::X86Fp80 => "x86_fp80",
            FloatKind::PpcFp128 => "ppc_fp128",
        }
    }
}

/// A static IR type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IrType {
    Void,
    Int(u32),
    Float(FloatKind),
    /// Opaque `ptr` or a legacy `T*`; the pointee is not tracked.
    Ptr {
        addr_space: u32,
    },
    Array {
        len: u64,
        elem: Box<IrType>,
    },
    Vector {
        len: u64,
        scalable: bool,
        elem: Box<IrType>,
    },
    Struct {
        fields: Vec<IrType>,
        packed: bool,
    },
    /// `%struct.S`: a reference to a named (identified) type.
    Named(String),
    Function,
    /// `label`, `metadata`, `token`, `x86_amx`, `x86_mmx`.
    Special(&'static str),
}

impl IrType {
    /// Types spelled as a single keyword, other than `ptr` and `iN`.
    pub fn from_keyword(word: &str) -> Option<Self> {
        if let Some(kind) = FloatKind::from_word(word) {
            return Some(IrType::Float(kind));
        }
        Some(match word {
            "void" => IrType::Void,
            "label" => IrType::Special("label"),
            "metadata" => IrType::Special("metadata"),
            "token" => IrType::Special("token"),
            "x86_amx" => IrType::Special("x86_amx"),
            "x86_mmx" => IrType::Special("x86_mmx"),
            _ => return None,
        })
    }
}

impl fmt::Display for IrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IrType::Void => write!(f, "void"),
            IrType::Int(bits) => write!(f, "i{bits}"),
            IrType::Float(kind) => write!(f, "{}", kind.name()),
            IrType::Ptr { addr_space: 0 } => write!(f, "ptr"),
            IrType::Ptr { addr_space } => write!(f, "ptr addrspace({addr_space})"),
            IrType::Array { len, elem } => write!(f, "[{len} x {elem}]"),
            IrType::Vector {
                len,
                scalable,
                elem,
            } => {
                if *scalable {
                    write!(f, "<vscale x {len} x {elem}>")
                } else {
                    write!(f, "<{len} x {elem}>")
                }
            }
            IrType::Struct { fields, packed } => {
                let (open, close) = if *packed { ("<{", "}>") } else { ("{", "}") };
                if fields.is_empty() {
                    return write!(f, "{open}{close}");
                }
                write!(f, "{open} ")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{field}")?;
                }
                write!(f, " {close}")
            }
            IrType::Named(name) => write!(f, "%{name}"),
            IrType::Function => write!(f, "<function>"),
            IrType::Special(name) => write!(f, "{name}"),
        }
    }
}
