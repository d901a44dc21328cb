//! The cross-language marshaller contract (`spec.md` §4.8).
//!
//! No teacher file owns this concern — Rhai never crosses a language
//! boundary, so there is nothing in `rhai/src` to adapt. This crate is new
//! code, grounded directly in the design note the spec licenses: a total,
//! type-directed translation between [`Value`] and each executor's foreign
//! representation, guarded by depth/size limits and NUL-scanning that are
//! identical across every executor. The guard logic lives here, once;
//! `naab-exec-cpp`/`naab-exec-js`/`naab-exec-py` each implement only the
//! [`ForeignCodec`] half that is genuinely language-specific.
//!
//! Keeping the guard and the codec as separate concerns mirrors how
//! `naab-core`'s own `gc.rs` was written: a self-contained pass over the
//! [`Value`] universe with no dependency on any one executor.

use naab_core::{Error, ErrorKind, SourceLocation, Value};
use std::rc::Rc;

/// Depth and payload-size caps applied at every boundary crossing
/// (`spec.md` §4.8: default nesting depth 1000, default aggregate payload
/// 100 MB).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarshalLimits {
    pub max_depth: usize,
    pub max_payload_bytes: usize,
}

impl Default for MarshalLimits {
    fn default() -> Self {
        Self {
            max_depth: 1000,
            max_payload_bytes: 100 * 1024 * 1024,
        }
    }
}

fn marshal_error(message: impl Into<String>) -> Error {
    Error::new(ErrorKind::Marshal, message, SourceLocation::synthetic(Rc::from("<marshal>")))
}

/// Walk `value` enforcing [`MarshalLimits`] and the NUL-scan rule, without
/// producing a foreign representation — this is the guard every
/// [`ForeignCodec`] runs before (on the way in) or after (on the way out)
/// its own type-directed conversion.
///
/// Also doubles as cycle protection: a value that contains itself would
/// otherwise recurse forever, but `depth` crossing `max_depth` raises
/// `MarshalError` before that can happen, since every encountered cycle by
/// definition has unbounded apparent depth.
pub fn check_value(value: &Value, limits: &MarshalLimits) -> Result<(), Error> {
    let mut running_size: usize = 0;
    check_inner(value, limits, 0, &mut running_size)
}

fn check_inner(value: &Value, limits: &MarshalLimits, depth: usize, running_size: &mut usize) -> Result<(), Error> {
    if depth > limits.max_depth {
        return Err(marshal_error(format!(
            "value nesting depth exceeds the configured limit of {}",
            limits.max_depth
        )));
    }
    match value {
        Value::Null | Value::Int(_) | Value::Float(_) | Value::Bool(_) => Ok(()),
        Value::String(s) => {
            let bytes = s.as_str().as_bytes();
            if bytes.contains(&0) {
                return Err(marshal_error("string contains an embedded NUL byte"));
            }
            add_size(running_size, bytes.len(), limits)
        }
        Value::List(h) => {
            let naab_core::GcPayload::List(items) = &*h.payload.borrow() else {
                unreachable!("List handle must carry GcPayload::List")
            };
            for item in items {
                check_inner(item, limits, depth + 1, running_size)?;
            }
            Ok(())
        }
        Value::Dict(h) => {
            let naab_core::GcPayload::Dict(entries) = &*h.payload.borrow() else {
                unreachable!("Dict handle must carry GcPayload::Dict")
            };
            for (k, v) in entries {
                add_size(running_size, k.as_str().len(), limits)?;
                check_inner(v, limits, depth + 1, running_size)?;
            }
            Ok(())
        }
        Value::Struct(h) => {
            let naab_core::GcPayload::Struct(inst) = &*h.payload.borrow() else {
                unreachable!("Struct handle must carry GcPayload::Struct")
            };
            for v in inst.fields.values() {
                check_inner(v, limits, depth + 1, running_size)?;
            }
            Ok(())
        }
        Value::EnumVariant(v) => match &v.payload {
            Some(p) => check_inner(p, limits, depth + 1, running_size),
            None => Ok(()),
        },
        Value::Foreign(_) => {
            // `spec.md` §4.8: "foreign object: error (cannot re-enter)" for
            // C++; JS/Python only pass through same-runtime handles, which
            // never reach a generic guard like this one — a codec recognizes
            // its own runtime's foreign objects before calling `check_value`.
            Err(marshal_error("a foreign object handle cannot cross into another language's runtime"))
        }
        Value::Function(_) | Value::Block(_) | Value::BlockFunction(_) | Value::Error(_) => {
            Err(marshal_error(format!("{} values cannot be marshalled across a language boundary", value.type_name())))
        }
    }
}

fn add_size(running_size: &mut usize, additional: usize, limits: &MarshalLimits) -> Result<(), Error> {
    *running_size = running_size.saturating_add(additional);
    if *running_size > limits.max_payload_bytes {
        return Err(marshal_error(format!(
            "marshalled payload exceeds the configured limit of {} bytes",
            limits.max_payload_bytes
        )));
    }
    Ok(())
}

/// The executor-specific half of marshalling: a total, type-directed
/// translation between [`Value`] and one foreign representation
/// (`spec.md` §4.8's table — one column per executor). `naab-exec-cpp`/
/// `naab-exec-js`/`naab-exec-py` each implement this once for their own
/// `Foreign` type; this crate never needs to know what that type is.
pub trait ForeignCodec {
    type Foreign;

    fn encode(&mut self, value: &Value) -> Result<Self::Foreign, Error>;
    fn decode(&mut self, foreign: Self::Foreign) -> Result<Value, Error>;
}

/// Wraps a [`ForeignCodec`] with the shared depth/size/NUL guard, so every
/// executor gets identical boundary behavior by construction rather than by
/// convention.
pub struct Marshaller<C: ForeignCodec> {
    codec: C,
    limits: MarshalLimits,
}

impl<C: ForeignCodec> Marshaller<C> {
    pub fn new(codec: C, limits: MarshalLimits) -> Self {
        Self { codec, limits }
    }

    /// NAAb → foreign. Guards run on the NAAb side first (`spec.md` §7:
    /// "the marshaller's input-size guards raise before invoking the
    /// foreign runtime, not after").
    pub fn marshal_in(&mut self, value: &Value) -> Result<C::Foreign, Error> {
        let span = tracing::debug_span!("marshal_in", ty = value.type_name());
        let _enter = span.enter();
        check_value(value, &self.limits)?;
        self.codec.encode(value)
    }

    /// Foreign → NAAb. Guards run on the reconstructed `Value`, since the
    /// foreign side has no notion of NAAb's depth/size budget.
    pub fn marshal_out(&mut self, foreign: C::Foreign) -> Result<Value, Error> {
        let span = tracing::debug_span!("marshal_out");
        let _enter = span.enter();
        let value = self.codec.decode(foreign)?;
        check_value(&value, &self.limits)?;
        Ok(value)
    }

    pub fn limits(&self) -> MarshalLimits {
        self.limits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use naab_core::FieldMap;

    struct IdentityCodec;

    impl ForeignCodec for IdentityCodec {
        type Foreign = Value;

        fn encode(&mut self, value: &Value) -> Result<Value, Error> {
            Ok(value.clone())
        }

        fn decode(&mut self, foreign: Value) -> Result<Value, Error> {
            Ok(foreign)
        }
    }

    #[test]
    fn primitive_values_pass_the_guard_untouched() {
        let limits = MarshalLimits::default();
        assert!(check_value(&Value::Int(42), &limits).is_ok());
        assert!(check_value(&Value::from("hello"), &limits).is_ok());
    }

    #[test]
    fn embedded_nul_byte_is_rejected() {
        let err = check_value(&Value::from("a\0b"), &MarshalLimits::default()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Marshal);
    }

    #[test]
    fn depth_beyond_the_limit_is_rejected() {
        let mut v = Value::new_list(vec![Value::Int(0)]);
        for _ in 0..5 {
            v = Value::new_list(vec![v]);
        }
        let tight = MarshalLimits { max_depth: 2, max_payload_bytes: MarshalLimits::default().max_payload_bytes };
        let err = check_value(&v, &tight).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Marshal);
    }

    #[test]
    fn self_referential_list_is_rejected_rather_than_looping_forever() {
        let list = Value::new_list(vec![Value::Null]);
        if let Value::List(handle) = &list {
            if let naab_core::GcPayload::List(items) = &mut *handle.payload.borrow_mut() {
                items[0] = list.clone();
            }
        }
        let err = check_value(&list, &MarshalLimits { max_depth: 50, ..MarshalLimits::default() }).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Marshal);
    }

    #[test]
    fn round_trip_through_an_identity_codec_preserves_the_value() {
        let mut fields = FieldMap::default();
        fields.insert("x".into(), Value::Int(1));
        let original = Value::new_struct(naab_core::StructInstance { type_name: "P".into(), fields });

        let mut m = Marshaller::new(IdentityCodec, MarshalLimits::default());
        let foreign = m.marshal_in(&original).unwrap();
        let back = m.marshal_out(foreign).unwrap();
        assert!(original.values_equal(&back));
    }

    #[test]
    fn foreign_object_handles_never_cross_a_boundary() {
        let obj = Value::Foreign(std::rc::Rc::new(naab_core::ForeignObject {
            type_name: "PyObject".into(),
            language: naab_core::Language::Python,
            handle: 7,
        }));
        let err = check_value(&obj, &MarshalLimits::default()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Marshal);
    }
}
