//! A deliberately minimal JavaScript subset, used when the `embedded`
//! feature is off.
//!
//! This is not a JS engine — it is the same "scan the text, don't compile
//! it" technique `naab-exec-cpp::signature` uses for C++, applied to a
//! narrower slice of JS: top-level `function name(params) { return EXPR; }`
//! declarations, where `EXPR` is built from number/string literals,
//! identifiers, calls to sibling functions in the same block, and the four
//! arithmetic operators. It covers the shape `spec.md` §4.7's own
//! description implies ("block source is evaluated once... function
//! invocation reads the named global, calls it") without linking a real
//! interpreter. A driver that needs real JS semantics enables the
//! `embedded` feature instead.

use crate::{js_error, Backend, JsValue};
use ahash::AHashMap;
use naab_core::Error;

#[derive(Debug, Clone)]
enum Expr {
    Num(f64),
    Str(String),
    Ident(String),
    Call(String, Vec<Expr>),
    Bin(Box<Expr>, BinOp, Box<Expr>),
}

#[derive(Debug, Clone, Copy)]
enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Num(f64),
    Str(String),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
    Comma,
}

fn tokenize(src: &str) -> Result<Vec<Tok>, Error> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = src.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '+' => {
                tokens.push(Tok::Plus);
                i += 1;
            }
            '-' => {
                tokens.push(Tok::Minus);
                i += 1;
            }
            '*' => {
                tokens.push(Tok::Star);
                i += 1;
            }
            '/' => {
                tokens.push(Tok::Slash);
                i += 1;
            }
            '(' => {
                tokens.push(Tok::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Tok::RParen);
                i += 1;
            }
            ',' => {
                tokens.push(Tok::Comma);
                i += 1;
            }
            '"' | '\'' => {
                let quote = c;
                i += 1;
                let start = i;
                while i < chars.len() && chars[i] != quote {
                    i += 1;
                }
                let s: String = chars[start..i].iter().collect();
                i += 1;
                tokens.push(Tok::Str(s));
            }
            c if c.is_ascii_digit() => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let s: String = chars[start..i].iter().collect();
                let n: f64 = s.parse().map_err(|_| js_error(format!("invalid number literal `{s}`")))?;
                tokens.push(Tok::Num(n));
            }
            c if c.is_alphabetic() || c == '_' || c == '$' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '$') {
                    i += 1;
                }
                let s: String = chars[start..i].iter().collect();
                tokens.push(Tok::Ident(s));
            }
            other => return Err(js_error(format!("unsupported character `{other}` in stub JS expression"))),
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Tok>,
    pos: usize,
}

impl Parser {
    fn new(tokens: Vec<Tok>) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> Option<&Tok> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Tok> {
        let tok = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        tok
    }

    fn parse_expr(&mut self) -> Result<Expr, Error> {
        let mut lhs = self.parse_term()?;
        loop {
            match self.peek() {
                Some(Tok::Plus) => {
                    self.next();
                    lhs = Expr::Bin(Box::new(lhs), BinOp::Add, Box::new(self.parse_term()?));
                }
                Some(Tok::Minus) => {
                    self.next();
                    lhs = Expr::Bin(Box::new(lhs), BinOp::Sub, Box::new(self.parse_term()?));
                }
                _ => break,
            }
        }
        Ok(lhs)
    }

    fn parse_term(&mut self) -> Result<Expr, Error> {
        let mut lhs = self.parse_factor()?;
        loop {
            match self.peek() {
                Some(Tok::Star) => {
                    self.next();
                    lhs = Expr::Bin(Box::new(lhs), BinOp::Mul, Box::new(self.parse_factor()?));
                }
                Some(Tok::Slash) => {
                    self.next();
                    lhs = Expr::Bin(Box::new(lhs), BinOp::Div, Box::new(self.parse_factor()?));
                }
                _ => break,
            }
        }
        Ok(lhs)
    }

    fn parse_factor(&mut self) -> Result<Expr, Error> {
        match self.next() {
            Some(Tok::Num(n)) => Ok(Expr::Num(n)),
            Some(Tok::Str(s)) => Ok(Expr::Str(s)),
            Some(Tok::LParen) => {
                let inner = self.parse_expr()?;
                match self.next() {
                    Some(Tok::RParen) => Ok(inner),
                    _ => Err(js_error("expected `)`")),
                }
            }
            Some(Tok::Ident(name)) => {
                if self.peek() == Some(&Tok::LParen) {
                    self.next();
                    let mut args = Vec::new();
                    if self.peek() != Some(&Tok::RParen) {
                        args.push(self.parse_expr()?);
                        while self.peek() == Some(&Tok::Comma) {
                            self.next();
                            args.push(self.parse_expr()?);
                        }
                    }
                    match self.next() {
                        Some(Tok::RParen) => Ok(Expr::Call(name, args)),
                        _ => Err(js_error("expected `)` after call arguments")),
                    }
                } else {
                    Ok(Expr::Ident(name))
                }
            }
            other => Err(js_error(format!("unexpected token in stub JS expression: {other:?}"))),
        }
    }
}

fn parse_expr_text(text: &str) -> Result<Expr, Error> {
    let tokens = tokenize(text)?;
    let mut parser = Parser::new(tokens);
    let expr = parser.parse_expr()?;
    if parser.pos != parser.tokens.len() {
        return Err(js_error("trailing tokens after expression"));
    }
    Ok(expr)
}

const MAX_CALL_DEPTH: usize = 256;

fn eval(expr: &Expr, bindings: &AHashMap<String, JsValue>, functions: &AHashMap<String, (Vec<String>, Expr)>, depth: usize) -> Result<JsValue, Error> {
    if depth > MAX_CALL_DEPTH {
        return Err(js_error("stub JS call depth exceeded"));
    }
    match expr {
        Expr::Num(n) => Ok(JsValue::Num(*n)),
        Expr::Str(s) => Ok(JsValue::Str(s.clone())),
        Expr::Ident(name) => bindings.get(name).cloned().ok_or_else(|| js_error(format!("undefined variable `{name}`"))),
        Expr::Call(name, arg_exprs) => {
            let (params, body) = functions.get(name).ok_or_else(|| js_error(format!("undefined function `{name}`")))?;
            if params.len() != arg_exprs.len() {
                return Err(js_error(format!("`{name}` takes {} argument(s), got {}", params.len(), arg_exprs.len())));
            }
            let mut call_bindings = AHashMap::default();
            for (param, arg_expr) in params.iter().zip(arg_exprs) {
                call_bindings.insert(param.clone(), eval(arg_expr, bindings, functions, depth + 1)?);
            }
            eval(body, &call_bindings, functions, depth + 1)
        }
        Expr::Bin(lhs, op, rhs) => {
            let lv = eval(lhs, bindings, functions, depth + 1)?;
            let rv = eval(rhs, bindings, functions, depth + 1)?;
            match (op, lv, rv) {
                (BinOp::Add, JsValue::Num(a), JsValue::Num(b)) => Ok(JsValue::Num(a + b)),
                (BinOp::Add, JsValue::Str(a), JsValue::Str(b)) => Ok(JsValue::Str(a + b.as_str())),
                (BinOp::Sub, JsValue::Num(a), JsValue::Num(b)) => Ok(JsValue::Num(a - b)),
                (BinOp::Mul, JsValue::Num(a), JsValue::Num(b)) => Ok(JsValue::Num(a * b)),
                (BinOp::Div, JsValue::Num(a), JsValue::Num(b)) => Ok(JsValue::Num(a / b)),
                _ => Err(js_error("unsupported operand types in stub JS expression")),
            }
        }
    }
}

/// `function NAME(params) { return EXPR; }`, tolerating arbitrary
/// whitespace/newlines the way `naab-exec-cpp::signature`'s pattern does.
static FUNCTION_PATTERN: once_cell::sync::Lazy<regex::Regex> = once_cell::sync::Lazy::new(|| {
    regex::Regex::new(r"(?s)function\s+([A-Za-z_$][A-Za-z0-9_$]*)\s*\(([^)]*)\)\s*\{\s*return\s+(.+?)\s*;?\s*\}")
        .expect("static stub-JS function pattern is valid")
});

fn parse_functions(source: &str) -> Result<AHashMap<String, (Vec<String>, Expr)>, Error> {
    let mut functions = AHashMap::default();
    for caps in FUNCTION_PATTERN.captures_iter(source) {
        let name = caps[1].to_string();
        let params: Vec<String> = caps[2].split(',').map(str::trim).filter(|p| !p.is_empty()).map(str::to_string).collect();
        let body = parse_expr_text(&caps[3])?;
        functions.insert(name, (params, body));
    }
    Ok(functions)
}

#[derive(Default)]
pub struct StubRuntime {
    functions: AHashMap<String, AHashMap<String, (Vec<String>, Expr)>>,
}

impl StubRuntime {
    pub fn new() -> Result<Self, Error> {
        Ok(Self::default())
    }
}

impl Backend for StubRuntime {
    fn load_block(&mut self, block_id: &str, source: &str) -> Result<(), Error> {
        let functions = parse_functions(source)?;
        self.functions.insert(block_id.to_string(), functions);
        Ok(())
    }

    fn call_function(&mut self, block_id: &str, function_name: &str, args: Vec<JsValue>) -> Result<JsValue, Error> {
        let functions = self.functions.get(block_id).ok_or_else(|| js_error(format!("block `{block_id}` has not been loaded")))?;
        let (params, body) = functions
            .get(function_name)
            .ok_or_else(|| js_error(format!("function `{function_name}` is not defined in block `{block_id}`")))?;
        if params.len() != args.len() {
            return Err(js_error(format!("`{function_name}` takes {} argument(s), got {}", params.len(), args.len())));
        }
        let bindings: AHashMap<String, JsValue> = params.iter().cloned().zip(args).collect();
        eval(body, &bindings, functions, 0)
    }

    fn eval_expr(&mut self, body: &str, bindings: &[(String, JsValue)]) -> Result<JsValue, Error> {
        let expr = parse_expr_text(body)?;
        let map: AHashMap<String, JsValue> = bindings.iter().cloned().collect();
        eval(&expr, &map, &AHashMap::default(), 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evaluates_a_simple_arithmetic_function() {
        let mut rt = StubRuntime::new().unwrap();
        rt.load_block("BLOCK-JS-MATH", "function add(a, b) { return a + b; }").unwrap();
        let result = rt.call_function("BLOCK-JS-MATH", "add", vec![JsValue::Num(2.0), JsValue::Num(3.0)]).unwrap();
        assert_eq!(result, JsValue::Num(5.0));
    }

    #[test]
    fn calls_between_sibling_functions_in_the_same_block() {
        let mut rt = StubRuntime::new().unwrap();
        rt.load_block(
            "BLOCK-JS-MATH",
            "function square(x) { return x * x; } function sumOfSquares(a, b) { return square(a) + square(b); }",
        )
        .unwrap();
        let result = rt.call_function("BLOCK-JS-MATH", "sumOfSquares", vec![JsValue::Num(3.0), JsValue::Num(4.0)]).unwrap();
        assert_eq!(result, JsValue::Num(25.0));
    }

    #[test]
    fn string_concatenation_uses_the_plus_operator() {
        let mut rt = StubRuntime::new().unwrap();
        rt.load_block("BLOCK-JS-GREET", r#"function greet(name) { return "hi " + name; }"#).unwrap();
        let result = rt.call_function("BLOCK-JS-GREET", "greet", vec![JsValue::Str("sam".to_string())]).unwrap();
        assert_eq!(result, JsValue::Str("hi sam".to_string()));
    }

    #[test]
    fn eval_expr_resolves_bindings_without_a_loaded_block() {
        let mut rt = StubRuntime::new().unwrap();
        let result = rt.eval_expr("x * 2", &[("x".to_string(), JsValue::Num(21.0))]).unwrap();
        assert_eq!(result, JsValue::Num(42.0));
    }
}
