//! `when` conditions
//!
//! A small expression language over the compile scope:
//!
//! ```text
//! expr    := or
//! or      := and ("||" and)*
//! and     := unary ("&&" unary)*
//! unary   := "!" unary | compare
//! compare := primary (("==" | "!=") primary)?
//! primary := "(" expr ")" | string | number | true | false | null | path
//! path    := ident ("." ident)*
//! ```
//!
//! Conditions are truthy when their value is not null, false, zero, an
//! empty string, an empty list or an empty map.

use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Str(String),
    Num(f64),
    Not,
    And,
    Or,
    Eq,
    Ne,
    Dot,
    Open,
    Close,
}

/// A parsed condition
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Path(Vec<String>),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Eq(Box<Expr>, Box<Expr>),
    Ne(Box<Expr>, Box<Expr>),
}

fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();
        match c {
            c if c.is_whitespace() => i += 1,
            '(' => {
                tokens.push(Token::Open);
                i += 1;
            }
            ')' => {
                tokens.push(Token::Close);
                i += 1;
            }
            '.' => {
                tokens.push(Token::Dot);
                i += 1;
            }
            '!' if next == Some('=') => {
                tokens.push(Token::Ne);
                i += 2;
            }
            '!' => {
                tokens.push(Token::Not);
                i += 1;
            }
            '=' if next == Some('=') => {
                tokens.push(Token::Eq);
                i += 2;
            }
            '&' if next == Some('&') => {
                tokens.push(Token::And);
                i += 2;
            }
            '|' if next == Some('|') => {
                tokens.push(Token::Or);
                i += 2;
            }
            '"' | '\'' => {
                let quote = c;
                let start = i + 1;
                let end = chars[start..]
                    .iter()
                    .position(|&ch| ch == quote)
                    .map(|p| start + p)
                    .ok_or("unterminated string")?;
                tokens.push(Token::Str(chars[start..end].iter().collect()));
                i = end + 1;
            }
            c if c.is_ascii_digit() || (c == '-' && next.is_some_and(|n| n.is_ascii_digit())) => {
                let start = i;
                i += 1;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let number = text
                    .parse()
                    .map_err(|_| format!("invalid number '{text}'"))?;
                tokens.push(Token::Num(number));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            other => return Err(format!("unexpected character '{other}'")),
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn or(&mut self) -> Result<Expr, String> {
        let mut left = self.and()?;
        while self.eat(&Token::Or) {
            left = Expr::Or(Box::new(left), Box::new(self.and()?));
        }
        Ok(left)
    }

    fn and(&mut self) -> Result<Expr, String> {
        let mut left = self.unary()?;
        while self.eat(&Token::And) {
            left = Expr::And(Box::new(left), Box::new(self.unary()?));
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<Expr, String> {
        if self.eat(&Token::Not) {
            return Ok(Expr::Not(Box::new(self.unary()?)));
        }
        self.compare()
    }

    fn compare(&mut self) -> Result<Expr, String> {
        let left = self.primary()?;
        if self.eat(&Token::Eq) {
            return Ok(Expr::Eq(Box::new(left), Box::new(self.primary()?)));
        }
        if self.eat(&Token::Ne) {
            return Ok(Expr::Ne(Box::new(left), Box::new(self.primary()?)));
        }
        Ok(left)
    }

    fn primary(&mut self) -> Result<Expr, String> {
        match self.next() {
            Some(Token::Open) => {
                let inner = self.or()?;
                if self.eat(&Token::Close) {
                    Ok(inner)
                } else {
                    Err("expected ')'".to_string())
                }
            }
            Some(Token::Str(s)) => Ok(Expr::Literal(Value::String(s))),
            Some(Token::Num(n)) => Ok(Expr::Literal(number(n))),
            Some(Token::Ident(word)) => match word.as_str() {
                "true" => Ok(Expr::Literal(Value::Bool(true))),
                "false" => Ok(Expr::Literal(Value::Bool(false))),
                "null" => Ok(Expr::Literal(Value::Null)),
                _ => {
                    let mut path = vec![word];
                    while self.eat(&Token::Dot) {
                        match self.next() {
                            Some(Token::Ident(segment)) => path.push(segment),
                            _ => return Err("expected a name after '.'".to_string()),
                        }
                    }
                    Ok(Expr::Path(path))
                }
            },
            Some(token) => Err(format!("unexpected {token:?}")),
            None => Err("unexpected end of expression".to_string()),
        }
    }
}

fn number(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        Value::from(n as i64)
    } else {
        Value::from(n)
    }
}

/// Parse a condition
pub fn parse(input: &str) -> Result<Expr, String> {
    let mut parser = Parser {
        tokens: tokenize(input)?,
        pos: 0,
    };
    if parser.peek().is_none() {
        return Err("empty expression".to_string());
    }
    let expr = parser.or()?;
    match parser.peek() {
        None => Ok(expr),
        Some(token) => Err(format!("unexpected {token:?} after expression")),
    }
}

/// Look up a dotted path (`facts.os_family`, `item.key`) in a scope object
pub fn lookup<'a>(scope: &'a Value, path: &[String]) -> Result<&'a Value, String> {
    let mut current = scope;
    for (depth, segment) in path.iter().enumerate() {
        current = current.get(segment).ok_or_else(|| {
            if depth == 0 {
                format!("unknown name '{segment}'")
            } else {
                format!("'{}' has no field '{segment}'", path[..depth].join("."))
            }
        })?;
    }
    Ok(current)
}

/// Truthiness of a value
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

fn equal(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => (x - y).abs() < f64::EPSILON,
        _ => a == b,
    }
}

impl Expr {
    /// Evaluate to a value against `scope`
    pub fn eval(&self, scope: &Value) -> Result<Value, String> {
        Ok(match self {
            Self::Literal(value) => value.clone(),
            Self::Path(path) => lookup(scope, path)?.clone(),
            Self::Not(inner) => Value::Bool(!is_truthy(&inner.eval(scope)?)),
            Self::And(a, b) => {
                Value::Bool(is_truthy(&a.eval(scope)?) && is_truthy(&b.eval(scope)?))
            }
            Self::Or(a, b) => Value::Bool(is_truthy(&a.eval(scope)?) || is_truthy(&b.eval(scope)?)),
            Self::Eq(a, b) => Value::Bool(equal(&a.eval(scope)?, &b.eval(scope)?)),
            Self::Ne(a, b) => Value::Bool(!equal(&a.eval(scope)?, &b.eval(scope)?)),
        })
    }
}

/// Parse and evaluate a condition to a boolean
pub fn evaluate(input: &str, scope: &Value) -> Result<bool, String> {
    Ok(is_truthy(&parse(input)?.eval(scope)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn scope() -> Value {
        json!({
            "modular": true,
            "mime_types": {},
            "modules": ["a", "b"],
            "worker_rlimit_nofile": null,
            "worker_processes": 4,
            "facts": { "os_family": "RedHat", "selinux_enforcing": false },
            "item": { "key": "gzip", "value": "on" }
        })
    }

    #[test]
    fn test_identifiers_and_truthiness() {
        assert!(evaluate("modular", &scope()).unwrap());
        assert!(!evaluate("mime_types", &scope()).unwrap());
        assert!(evaluate("modules", &scope()).unwrap());
        assert!(!evaluate("worker_rlimit_nofile", &scope()).unwrap());
        assert!(!evaluate("facts.selinux_enforcing", &scope()).unwrap());
    }

    #[test]
    fn test_operators_and_precedence() {
        assert!(evaluate("facts.os_family == 'RedHat'", &scope()).unwrap());
        assert!(evaluate("facts.os_family != \"Debian\"", &scope()).unwrap());
        assert!(evaluate("worker_processes == 4", &scope()).unwrap());
        assert!(evaluate("!mime_types && modular", &scope()).unwrap());
        // && binds tighter than ||
        assert!(evaluate("modular || mime_types && false", &scope()).unwrap());
        assert!(!evaluate("(modular || mime_types) && false", &scope()).unwrap());
        assert!(evaluate("item.key == 'gzip'", &scope()).unwrap());
        assert!(evaluate("worker_rlimit_nofile == null", &scope()).unwrap());
    }

    #[test]
    fn test_unknown_names_are_errors() {
        let err = evaluate("selinux", &scope()).unwrap_err();
        assert!(err.contains("unknown name 'selinux'"));
        let err = evaluate("facts.kernel", &scope()).unwrap_err();
        assert!(err.contains("'facts' has no field 'kernel'"));
    }

    #[test]
    fn test_syntax_errors() {
        assert!(parse("").is_err());
        assert!(parse("(modular").is_err());
        assert!(parse("modular modular").is_err());
        assert!(parse("a = b").is_err());
        assert!(parse("'open").is_err());
        assert!(parse("facts.").is_err());
    }
}
