//! A deliberately minimal Python subset, used when the `embedded` feature
//! is off — the same "scan the text, don't compile it" idiom as
//! `naab-exec-js::stub` and `naab-exec-cpp::signature`, applied to Python's
//! syntax instead: single-statement `def name(params):\n    return EXPR`
//! declarations, where `EXPR` is numbers, strings, identifiers, calls to
//! sibling functions in the same block, and `+ - * /`.

use crate::{py_error, Backend, PyValue};
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
                let n: f64 = s.parse().map_err(|_| py_error(format!("invalid number literal `{s}`")))?;
                tokens.push(Tok::Num(n));
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let s: String = chars[start..i].iter().collect();
                tokens.push(Tok::Ident(s));
            }
            other => return Err(py_error(format!("unsupported character `{other}` in stub Python expression"))),
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
                    _ => Err(py_error("expected `)`")),
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
                        _ => Err(py_error("expected `)` after call arguments")),
                    }
                } else {
                    Ok(Expr::Ident(name))
                }
            }
            other => Err(py_error(format!("unexpected token in stub Python expression: {other:?}"))),
        }
    }
}

fn parse_expr_text(text: &str) -> Result<Expr, Error> {
    let tokens = tokenize(text)?;
    let mut parser = Parser::new(tokens);
    let expr = parser.parse_expr()?;
    if parser.pos != parser.tokens.len() {
        return Err(py_error("trailing tokens after expression"));
    }
    Ok(expr)
}

const MAX_CALL_DEPTH: usize = 256;

fn eval(expr: &Expr, bindings: &AHashMap<String, PyValue>, functions: &AHashMap<String, (Vec<String>, Expr)>, depth: usize) -> Result<PyValue, Error> {
    if depth > MAX_CALL_DEPTH {
        return Err(py_error("stub Python call depth exceeded"));
    }
    match expr {
        Expr::Num(n) if n.fract() == 0.0 => Ok(PyValue::Int(*n as i64)),
        Expr::Num(n) => Ok(PyValue::Float(*n)),
        Expr::Str(s) => Ok(PyValue::Str(s.clone())),
        Expr::Ident(name) => bindings.get(name).cloned().ok_or_else(|| py_error(format!("undefined variable `{name}`"))),
        Expr::Call(name, arg_exprs) => {
            let (params, body) = functions.get(name).ok_or_else(|| py_error(format!("undefined function `{name}`")))?;
            if params.len() != arg_exprs.len() {
                return Err(py_error(format!("`{name}` takes {} argument(s), got {}", params.len(), arg_exprs.len())));
            }
            let mut call_bindings = AHashMap::default();
            for (param, arg_expr) in params.iter().zip(arg_exprs) {
                call_bindings.insert(param.clone(), eval(arg_expr, bindings, functions, depth + 1)?);
            }
            eval(body, &call_bindings, functions, depth + 1)
        }
        Expr::Bin(lhs, op, rhs) => {
            let lv = numeric(eval(lhs, bindings, functions, depth + 1)?)?;
            let rv = eval(rhs, bindings, functions, depth + 1)?;
            match (op, &lv, &rv) {
                (BinOp::Add, PyValue::Str(_), PyValue::Str(_)) => {
                    let (PyValue::Str(a), PyValue::Str(b)) = (lv, rv) else { unreachable!() };
                    Ok(PyValue::Str(a + b.as_str()))
                }
                _ => {
                    let rv = numeric(rv)?;
                    let both_int = matches!((&lv, &rv), (PyValue::Int(_), PyValue::Int(_)));
                    let (a, b) = (as_f64(&lv)?, as_f64(&rv)?);
                    let result = match op {
                        BinOp::Add => a + b,
                        BinOp::Sub => a - b,
                        BinOp::Mul => a * b,
                        BinOp::Div => a / b,
                    };
                    // `/` is true division in Python 3 and always yields a
                    // float, even for two ints with an exact quotient.
                    if both_int && !matches!(op, BinOp::Div) {
                        Ok(PyValue::Int(result as i64))
                    } else {
                        Ok(PyValue::Float(result))
                    }
                }
            }
        }
    }
}

fn numeric(v: PyValue) -> Result<PyValue, Error> {
    match v {
        PyValue::Int(_) | PyValue::Float(_) | PyValue::Str(_) => Ok(v),
        other => Err(py_error(format!("expected a number or string, found {other:?}"))),
    }
}

fn as_f64(v: &PyValue) -> Result<f64, Error> {
    match v {
        PyValue::Int(i) => Ok(*i as f64),
        PyValue::Float(f) => Ok(*f),
        other => Err(py_error(format!("expected a number, found {other:?}"))),
    }
}

/// `def NAME(params):` on its own line, immediately followed by a single
/// `return EXPR` line. No other statement forms are recognized.
static FUNCTION_PATTERN: once_cell::sync::Lazy<regex::Regex> = once_cell::sync::Lazy::new(|| {
    regex::Regex::new(r"(?m)^def\s+([A-Za-z_][A-Za-z0-9_]*)\s*\(([^)]*)\)\s*:\s*\n[ \t]+return\s+(.+?)\s*$")
        .expect("static stub-Python function pattern is valid")
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

    fn call_function(&mut self, block_id: &str, function_name: &str, args: Vec<PyValue>) -> Result<PyValue, Error> {
        let functions = self.functions.get(block_id).ok_or_else(|| py_error(format!("block `{block_id}` has not been loaded")))?;
        let (params, body) = functions
            .get(function_name)
            .ok_or_else(|| py_error(format!("function `{function_name}` is not defined in block `{block_id}`")))?;
        if params.len() != args.len() {
            return Err(py_error(format!("`{function_name}` takes {} argument(s), got {}", params.len(), args.len())));
        }
        let bindings: AHashMap<String, PyValue> = params.iter().cloned().zip(args).collect();
        eval(body, &bindings, functions, 0)
    }

    fn eval_expr(&mut self, body: &str, bindings: &[(String, PyValue)]) -> Result<PyValue, Error> {
        let expr = parse_expr_text(body)?;
        let map: AHashMap<String, PyValue> = bindings.iter().cloned().collect();
        eval(&expr, &map, &AHashMap::default(), 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evaluates_a_simple_arithmetic_function() {
        let mut rt = StubRuntime::new().unwrap();
        rt.load_block("BLOCK-PY-MATH", "def add(a, b):\n    return a + b\n").unwrap();
        let result = rt.call_function("BLOCK-PY-MATH", "add", vec![PyValue::Int(2), PyValue::Int(3)]).unwrap();
        assert_eq!(result, PyValue::Int(5));
    }

    #[test]
    fn calls_between_sibling_functions_in_the_same_block() {
        let mut rt = StubRuntime::new().unwrap();
        rt.load_block(
            "BLOCK-PY-MATH",
            "def square(x):\n    return x * x\ndef sum_of_squares(a, b):\n    return square(a) + square(b)\n",
        )
        .unwrap();
        let result = rt.call_function("BLOCK-PY-MATH", "sum_of_squares", vec![PyValue::Int(3), PyValue::Int(4)]).unwrap();
        assert_eq!(result, PyValue::Int(25));
    }

    #[test]
    fn division_produces_a_float() {
        let mut rt = StubRuntime::new().unwrap();
        rt.load_block("BLOCK-PY-MATH", "def half(x):\n    return x / 2\n").unwrap();
        let result = rt.call_function("BLOCK-PY-MATH", "half", vec![PyValue::Int(5)]).unwrap();
        assert_eq!(result, PyValue::Float(2.5));
    }

    #[test]
    fn division_with_an_exact_quotient_is_still_a_float() {
        let mut rt = StubRuntime::new().unwrap();
        rt.load_block("BLOCK-PY-MATH", "def half(x):\n    return x / 2\n").unwrap();
        let result = rt.call_function("BLOCK-PY-MATH", "half", vec![PyValue::Int(4)]).unwrap();
        assert_eq!(result, PyValue::Float(2.0));
    }

    #[test]
    fn eval_expr_resolves_bindings_without_a_loaded_block() {
        let mut rt = StubRuntime::new().unwrap();
        let result = rt.eval_expr("x * 2", &[("x".to_string(), PyValue::Int(21))]).unwrap();
        assert_eq!(result, PyValue::Int(42));
    }
}
