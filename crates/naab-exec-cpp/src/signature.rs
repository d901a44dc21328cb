//! A deliberately small scan of a block's C++ source for one function's
//! declared signature, used only to pick the right `extern "C"` function
//! pointer cast for [`crate::CppExecutor::call_function`] — this is not a
//! C++ parser.
//!
//! `spec.md` §4.7 only commits to "resolve `extern "C"` symbols by name";
//! it never specifies a general value-marshalling ABI across arbitrary
//! C++ signatures (that would require either a full C++ front end or a
//! `libffi`-style dynamic call, both out of scope for this core). What it
//! does explicitly license is scanning block source text for structural
//! hints — §4.7 already has the executor scan for `#include` directives
//! before compiling. This module extends the same "read the text, don't
//! compile it" technique to recover a function's arity and primitive
//! parameter/return kinds, which is enough to cover `spec.md` §8 scenario
//! 4 (`int add(int a, int b)`) and any function built only from the
//! primitive kinds in [`PrimitiveKind`].

use once_cell::sync::Lazy;
use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveKind {
    Int,
    Double,
    Bool,
}

impl PrimitiveKind {
    fn from_c_type(token: &str) -> Option<Self> {
        match token.trim() {
            // Only the native, 32-bit `int` is recognized: `call_function`'s
            // dispatcher below only knows how to build an `extern "C"`
            // call using `i32` registers (see its module doc). `double`
            // and `bool` are still recognized here so an unsupported
            // signature produces "recognized but unsupported", not
            // "couldn't find this function at all" — a more useful error.
            "int" => Some(Self::Int),
            "double" => Some(Self::Double),
            "bool" => Some(Self::Bool),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub params: Vec<PrimitiveKind>,
    pub ret: PrimitiveKind,
}

static FUNCTION_PATTERN_CACHE: Lazy<Regex> = Lazy::new(|| {
    // `<ret-type> <name> ( <params> )`, tolerating the `extern "C"`
    // qualifier and arbitrary whitespace/newlines the way real C++ source
    // does; deliberately does not try to match braces/bodies.
    Regex::new(r#"(?s)(?:extern\s*"C"\s*)?\b(int64_t|long long|long|int|double|float|bool)\s+([A-Za-z_][A-Za-z0-9_]*)\s*\(([^)]*)\)"#)
        .expect("static function-signature pattern is valid")
});

/// Find `function_name`'s declared signature in `source`. Returns `None`
/// if the function isn't found or uses a parameter/return type outside
/// [`PrimitiveKind`] — the caller surfaces that as an "unsupported
/// signature" runtime error rather than guessing.
#[must_use]
pub fn find_signature(source: &str, function_name: &str) -> Option<Signature> {
    for caps in FUNCTION_PATTERN_CACHE.captures_iter(source) {
        if &caps[2] != function_name {
            continue;
        }
        let ret = PrimitiveKind::from_c_type(&caps[1])?;
        let params_text = caps[3].trim();
        let params = if params_text.is_empty() || params_text == "void" {
            Vec::new()
        } else {
            let mut out = Vec::new();
            for param in params_text.split(',') {
                let type_token = param.trim().rsplit_once(' ').map(|(ty, _name)| ty).unwrap_or(param.trim());
                out.push(PrimitiveKind::from_c_type(type_token)?);
            }
            out
        };
        return Some(Signature { params, ret });
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_a_plain_extern_c_function() {
        let src = r#"extern "C" int add(int a, int b) { return a + b; }"#;
        let sig = find_signature(src, "add").unwrap();
        assert_eq!(sig.params, vec![PrimitiveKind::Int, PrimitiveKind::Int]);
        assert_eq!(sig.ret, PrimitiveKind::Int);
    }

    #[test]
    fn finds_a_function_without_the_extern_qualifier() {
        let src = "int add(int a,int b){return a+b;}";
        let sig = find_signature(src, "add").unwrap();
        assert_eq!(sig.params.len(), 2);
    }

    #[test]
    fn returns_none_for_an_unknown_function_name() {
        let src = "int add(int a, int b) { return a + b; }";
        assert!(find_signature(src, "subtract").is_none());
    }

    #[test]
    fn returns_none_for_a_non_primitive_signature() {
        let src = "std::string greet(std::string name) { return name; }";
        assert!(find_signature(src, "greet").is_none());
    }

    #[test]
    fn handles_a_zero_argument_function() {
        let src = "double pi() { return 3.14159; }";
        let sig = find_signature(src, "pi").unwrap();
        assert!(sig.params.is_empty());
        assert_eq!(sig.ret, PrimitiveKind::Double);
    }
}
