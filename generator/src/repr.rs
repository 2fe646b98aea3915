// repr.rs — Representation selection
//
// Maps a parameter's static type to the symbolic-input shape the harness
// declares for it: a fixed-size byte buffer for pointers, a scalar of the
// same width for integers.
//
// Preconditions: none.
// Postconditions: the result depends only on the type, its attributes and
//                 the buffer size.
// Failure modes: non-integer, non-pointer types (E0301); integer widths
//                outside 8/16/32/64/128 (E0302); pointers whose pointee is
//                passed by value (E0303).
// Side effects: none.

use serde::Serialize;

use crate::diag::{codes, Diagnostic};
use crate::ir::Param;
use crate::types::IrType;

/// Integer widths with a matching C alias in the harness preamble.
pub const SUPPORTED_INT_WIDTHS: [u32; 5] = [8, 16, 32, 64, 128];

/// Pointer attributes that make the argument something other than a plain
/// C pointer at the call site.
const BY_VALUE_POINTER_ATTRS: [&str; 4] = ["byval", "sret", "inalloca", "preallocated"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Representation {
    /// `char NAME[size]`, passed to the function by array decay.
    ByteBuffer { size: u32 },
    /// `iBITS NAME`, passed by value.
    ScalarInt { bits: u32 },
}

impl Representation {
    /// The C type used in the declaration.
    pub fn c_type(&self) -> String {
        match self {
            Representation::ByteBuffer { .. } => "char".to_string(),
            Representation::ScalarInt { bits } => format!("i{bits}"),
        }
    }

    /// The declaration line body for a variable called `name`.
    pub fn declarator(&self, name: &str) -> String {
        let c_type = self.c_type();
        match self {
            Representation::ByteBuffer { size } => format!("{c_type} {name}[{size}]"),
            Representation::ScalarInt { .. } => format!("{c_type} {name}"),
        }
    }

    /// The address handed to `klee_make_symbolic`.
    pub fn address_of(&self, name: &str) -> String {
        match self {
            Representation::ByteBuffer { .. } => name.to_string(),
            Representation::ScalarInt { .. } => format!("&{name}"),
        }
    }

    /// Size in bytes of the symbolic object.
    pub fn extent(&self) -> u32 {
        match self {
            Representation::ByteBuffer { size } => *size,
            Representation::ScalarInt { bits } => bits / 8,
        }
    }
}

/// Choose the representation for parameter `name` of type `param.ty`.
pub fn select_representation(
    name: &str,
    param: &Param,
    buffer_size: u32,
) -> Result<Representation, Diagnostic> {
    match &param.ty {
        IrType::Ptr { .. } => {
            if let Some(attr) = BY_VALUE_POINTER_ATTRS
                .iter()
                .find(|attr| param.has_attr(attr))
            {
                return Err(Diagnostic::error(
                    codes::E_POINTER_CONVENTION,
                    format!(
                        "parameter `{name}` is a `{attr}` pointer; the callee expects the pointee by value, which a byte buffer cannot model"
                    ),
                )
                .with_span(param.span));
            }
            Ok(Representation::ByteBuffer { size: buffer_size })
        }
        IrType::Int(bits) if SUPPORTED_INT_WIDTHS.contains(bits) => {
            Ok(Representation::ScalarInt { bits: *bits })
        }
        IrType::Int(bits) => Err(Diagnostic::error(
            codes::E_INT_WIDTH,
            format!("parameter `{name}` has type i{bits}; supported integer widths are 8, 16, 32, 64 and 128"),
        )
        .with_span(param.span)),
        other => Err(Diagnostic::error(
            codes::E_UNSUPPORTED_TYPE,
            format!("parameter `{name}` has type `{other}`, which has no symbolic representation"),
        )
        .with_span(param.span)
        .with_hint("only integer and pointer parameters are supported")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FloatKind;

    fn param(ty: IrType, attrs: &[&str]) -> Param {
        Param {
            ty,
            attrs: attrs.iter().map(|a| a.to_string()).collect(),
            name: None,
            span: (0..0).into(),
        }
    }

    #[test]
    fn pointers_become_buffers() {
        for ty in [IrType::Ptr { addr_space: 0 }, IrType::Ptr { addr_space: 3 }] {
            assert_eq!(
                select_representation("buf", &param(ty, &["noundef"]), 1024).unwrap(),
                Representation::ByteBuffer { size: 1024 }
            );
        }
        assert_eq!(
            select_representation("buf", &param(IrType::Ptr { addr_space: 0 }, &[]), 64).unwrap(),
            Representation::ByteBuffer { size: 64 }
        );
    }

    #[test]
    fn supported_integers() {
        for bits in SUPPORTED_INT_WIDTHS {
            let r = select_representation("x", &param(IrType::Int(bits), &[]), 1024).unwrap();
            assert_eq!(r, Representation::ScalarInt { bits });
            assert_eq!(r.c_type(), format!("i{bits}"));
            assert_eq!(r.extent(), bits / 8);
        }
    }

    #[test]
    fn odd_integer_width_rejected() {
        for bits in [1, 7, 24, 256] {
            let err = select_representation("x", &param(IrType::Int(bits), &[]), 1024).unwrap_err();
            assert_eq!(err.code, Some(codes::E_INT_WIDTH));
        }
    }

    #[test]
    fn other_types_rejected() {
        let cases = [
            IrType::Float(FloatKind::Double),
            IrType::Named("struct.point".into()),
            IrType::Array {
                len: 4,
                elem: Box::new(IrType::Int(8)),
            },
            IrType::Vector {
                len: 4,
                scalable: false,
                elem: Box::new(IrType::Int(32)),
            },
        ];
        for ty in cases {
            let err = select_representation("v", &param(ty.clone(), &[]), 1024).unwrap_err();
            assert_eq!(err.code, Some(codes::E_UNSUPPORTED_TYPE), "{ty}");
            assert!(err.message.contains(&ty.to_string()));
        }
    }

    #[test]
    fn by_value_pointers_rejected() {
        let err = select_representation(
            "s",
            &param(IrType::Ptr { addr_space: 0 }, &["noundef", "byval"]),
            1024,
        )
        .unwrap_err();
        assert_eq!(err.code, Some(codes::E_POINTER_CONVENTION));
        assert!(err.message.contains("`byval`"));
    }

    #[test]
    fn declarators() {
        let buf = Representation::ByteBuffer { size: 16 };
        assert_eq!(buf.declarator("buf"), "char buf[16]");
        assert_eq!(buf.address_of("buf"), "buf");
        let int = Representation::ScalarInt { bits: 64 };
        assert_eq!(int.declarator("n"), "i64 n");
        assert_eq!(int.address_of("n"), "&n");
    }

    #[test]
    fn serializes_with_kind_tag() {
        let json = serde_json::to_string(&Representation::ScalarInt { bits: 32 }).unwrap();
        assert_eq!(json, r#"{"kind":"scalar_int","bits":32}"#);
    }
}
