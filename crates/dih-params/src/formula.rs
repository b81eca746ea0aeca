//! Arithmetic formulas for derived parameters.
//!
//! Grammar (lowest to highest precedence):
//!
//! ```text
//! expr    := term (('+' | '-') term)*
//! term    := unary (('*' | '/') unary)*
//! unary   := '-' unary | power
//! power   := primary ('^' unary)?
//! primary := number | ident | ident '(' expr (',' expr)* ')' | '(' expr ')'
//! ```
//!
//! `^` is right-associative and binds tighter than unary minus, so
//! `-2^2 == -4`.

use std::fmt;

/// A parsed formula.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Ident(String),
    Neg(Box<Expr>),
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Call {
        func: Func,
        args: Vec<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Func {
    Min,
    Max,
    Sqrt,
    Abs,
}

impl Func {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "min" => Some(Self::Min),
            "max" => Some(Self::Max),
            "sqrt" => Some(Self::Sqrt),
            "abs" => Some(Self::Abs),
            _ => None,
        }
    }

    fn arity(self) -> usize {
        match self {
            Self::Min | Self::Max => 2,
            Self::Sqrt | Self::Abs => 1,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Min => "min",
            Self::Max => "max",
            Self::Sqrt => "sqrt",
            Self::Abs => "abs",
        }
    }
}

/// Syntax error with a byte offset into the formula.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntaxError {
    pub position: usize,
    pub message: String,
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}", self.message, self.position)
    }
}

/// Evaluation failure.
#[derive(Debug, Clone, PartialEq)]
pub enum EvalError {
    UnknownIdentifier(String),
    DivisionByZero,
    NonFinite(f64),
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownIdentifier(name) => write!(f, "unknown identifier `{name}`"),
            Self::DivisionByZero => write!(f, "division by zero"),
            Self::NonFinite(v) => write!(f, "result is {v}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Op(char),
    LParen,
    RParen,
    Comma,
}

fn tokenize(src: &str) -> Result<Vec<(usize, Token)>, SyntaxError> {
    let bytes = src.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i] as char;
        if c.is_ascii_whitespace() {
            i += 1;
            continue;
        }
        let start = i;
        if c.is_ascii_digit() || (c == '.' && bytes.get(i + 1).is_some_and(u8::is_ascii_digit)) {
            while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == b'_' || bytes[i] == b'.') {
                i += 1;
            }
            if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
                let mut j = i + 1;
                if j < bytes.len() && (bytes[j] == b'+' || bytes[j] == b'-') {
                    j += 1;
                }
                if j < bytes.len() && bytes[j].is_ascii_digit() {
                    i = j;
                    while i < bytes.len() && bytes[i].is_ascii_digit() {
                        i += 1;
                    }
                }
            }
            let text: String = src[start..i].chars().filter(|&ch| ch != '_').collect();
            let value = text.parse::<f64>().map_err(|_| SyntaxError {
                position: start,
                message: format!("invalid number `{}`", &src[start..i]),
            })?;
            tokens.push((start, Token::Number(value)));
            continue;
        }
        if c.is_ascii_alphabetic() || c == '_' {
            while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                i += 1;
            }
            tokens.push((start, Token::Ident(src[start..i].to_string())));
            continue;
        }
        let token = match c {
            '+' | '-' | '*' | '/' | '^' => Token::Op(c),
            '(' => Token::LParen,
            ')' => Token::RParen,
            ',' => Token::Comma,
            _ => {
                return Err(SyntaxError {
                    position: start,
                    message: format!("unexpected character `{c}`"),
                })
            }
        };
        tokens.push((start, token));
        i += 1;
    }
    Ok(tokens)
}

/// Deepest expression tree the parser will build.
const MAX_DEPTH: usize = 256;

struct Parser {
    tokens: Vec<(usize, Token)>,
    pos: usize,
    end: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(_, t)| t)
    }

    fn offset(&self) -> usize {
        self.tokens.get(self.pos).map(|(o, _)| *o).unwrap_or(self.end)
    }

    fn error(&self, message: impl Into<String>) -> SyntaxError {
        SyntaxError {
            position: self.offset(),
            message: message.into(),
        }
    }

    fn descend(&mut self) -> Result<(), SyntaxError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(self.error(format!("formula nests deeper than {MAX_DEPTH} levels")));
        }
        Ok(())
    }

    fn bump(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(_, t)| t.clone());
        self.pos += 1;
        token
    }

    fn expect(&mut self, expected: Token, what: &str) -> Result<(), SyntaxError> {
        if self.peek() == Some(&expected) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(format!("expected {what}")))
        }
    }

    fn expr(&mut self) -> Result<Expr, SyntaxError> {
        let saved = self.depth;
        let mut lhs = self.term()?;
        while let Some(Token::Op(op @ ('+' | '-'))) = self.peek().cloned() {
            self.pos += 1;
            self.descend()?;
            let rhs = self.term()?;
            let op = if op == '+' { BinOp::Add } else { BinOp::Sub };
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        self.depth = saved;
        Ok(lhs)
    }

    fn term(&mut self) -> Result<Expr, SyntaxError> {
        let saved = self.depth;
        let mut lhs = self.unary()?;
        while let Some(Token::Op(op @ ('*' | '/'))) = self.peek().cloned() {
            self.pos += 1;
            self.descend()?;
            let rhs = self.unary()?;
            let op = if op == '*' { BinOp::Mul } else { BinOp::Div };
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        self.depth = saved;
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Expr, SyntaxError> {
        if self.peek() == Some(&Token::Op('-')) {
            self.pos += 1;
            let saved = self.depth;
            self.descend()?;
            let operand = self.unary()?;
            self.depth = saved;
            return Ok(Expr::Neg(Box::new(operand)));
        }
        self.power()
    }

    fn power(&mut self) -> Result<Expr, SyntaxError> {
        let base = self.primary()?;
        if self.peek() == Some(&Token::Op('^')) {
            self.pos += 1;
            let saved = self.depth;
            self.descend()?;
            let exponent = self.unary()?;
            self.depth = saved;
            return Ok(Expr::Binary {
                op: BinOp::Pow,
                lhs: Box::new(base),
                rhs: Box::new(exponent),
            });
        }
        Ok(base)
    }

    fn primary(&mut self) -> Result<Expr, SyntaxError> {
        let start = self.offset();
        match self.bump() {
            Some(Token::Number(v)) => Ok(Expr::Number(v)),
            Some(Token::Ident(name)) => {
                if self.peek() != Some(&Token::LParen) {
                    return Ok(Expr::Ident(name));
                }
                let func = Func::from_name(&name).ok_or_else(|| SyntaxError {
                    position: start,
                    message: format!("unknown function `{name}`"),
                })?;
                self.pos += 1;
                let saved = self.depth;
                self.descend()?;
                let mut args = vec![self.expr()?];
                while self.peek() == Some(&Token::Comma) {
                    self.pos += 1;
                    args.push(self.expr()?);
                }
                self.depth = saved;
                self.expect(Token::RParen, "`)`")?;
                if args.len() != func.arity() {
                    return Err(SyntaxError {
                        position: start,
                        message: format!(
                            "`{}` takes {} argument(s), got {}",
                            func.name(),
                            func.arity(),
                            args.len()
                        ),
                    });
                }
                Ok(Expr::Call { func, args })
            }
            Some(Token::LParen) => {
                let saved = self.depth;
                self.descend()?;
                let inner = self.expr()?;
                self.depth = saved;
                self.expect(Token::RParen, "`)`")?;
                Ok(inner)
            }
            Some(_) => Err(SyntaxError {
                position: start,
                message: "expected a number, name or `(`".to_string(),
            }),
            None => Err(SyntaxError {
                position: start,
                message: "unexpected end of formula".to_string(),
            }),
        }
    }
}

/// Parse a formula into an expression tree.
pub fn parse(src: &str) -> Result<Expr, SyntaxError> {
    let tokens = tokenize(src)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        end: src.len(),
        depth: 0,
    };
    let expr = parser.expr()?;
    if parser.pos < parser.tokens.len() {
        return Err(parser.error("unexpected trailing input"));
    }
    Ok(expr)
}

impl Expr {
    /// Identifiers in first-use order, without duplicates.
    pub fn identifiers(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_identifiers(&mut out);
        out
    }

    fn collect_identifiers(&self, out: &mut Vec<String>) {
        match self {
            Self::Number(_) => {}
            Self::Ident(name) => {
                if !out.iter().any(|n| n == name) {
                    out.push(name.clone());
                }
            }
            Self::Neg(inner) => inner.collect_identifiers(out),
            Self::Binary { lhs, rhs, .. } => {
                lhs.collect_identifiers(out);
                rhs.collect_identifiers(out);
            }
            Self::Call { args, .. } => {
                for arg in args {
                    arg.collect_identifiers(out);
                }
            }
        }
    }

    /// Evaluate with `lookup` resolving identifiers.
    pub fn eval<F>(&self, lookup: &F) -> Result<f64, EvalError>
    where
        F: Fn(&str) -> Option<f64>,
    {
        let value = match self {
            Self::Number(v) => *v,
            Self::Ident(name) => {
                lookup(name).ok_or_else(|| EvalError::UnknownIdentifier(name.clone()))?
            }
            Self::Neg(inner) => -inner.eval(lookup)?,
            Self::Binary { op, lhs, rhs } => {
                let a = lhs.eval(lookup)?;
                let b = rhs.eval(lookup)?;
                match op {
                    BinOp::Add => a + b,
                    BinOp::Sub => a - b,
                    BinOp::Mul => a * b,
                    BinOp::Div => {
                        if b == 0.0 {
                            return Err(EvalError::DivisionByZero);
                        }
                        a / b
                    }
                    BinOp::Pow => a.powf(b),
                }
            }
            Self::Call { func, args } => {
                let vals = args
                    .iter()
                    .map(|a| a.eval(lookup))
                    .collect::<Result<Vec<_>, _>>()?;
                match func {
                    Func::Min => vals[0].min(vals[1]),
                    Func::Max => vals[0].max(vals[1]),
                    Func::Sqrt => vals[0].sqrt(),
                    Func::Abs => vals[0].abs(),
                }
            }
        };
        if value.is_finite() {
            Ok(value)
        } else {
            Err(EvalError::NonFinite(value))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval_str(src: &str) -> f64 {
        parse(src).unwrap().eval(&|_| None).unwrap()
    }

    #[test]
    fn test_precedence() {
        assert_eq!(eval_str("1 + 2 * 3"), 7.0);
        assert_eq!(eval_str("(1 + 2) * 3"), 9.0);
        assert_eq!(eval_str("10 / 4 - 1"), 1.5);
        assert_eq!(eval_str("-2^2"), -4.0);
        assert_eq!(eval_str("2^3^2"), 512.0);
        assert_eq!(eval_str("2^-1"), 0.5);
    }

    #[test]
    fn test_number_forms() {
        assert_eq!(eval_str("1_000_000"), 1_000_000.0);
        assert_eq!(eval_str("2.5e9"), 2.5e9);
        assert_eq!(eval_str(".5"), 0.5);
        assert_eq!(eval_str("1E-3"), 0.001);
    }

    #[test]
    fn test_functions() {
        assert_eq!(eval_str("min(3, 4)"), 3.0);
        assert_eq!(eval_str("max(3, 4 * 2)"), 8.0);
        assert_eq!(eval_str("sqrt(16)"), 4.0);
        assert_eq!(eval_str("abs(-7)"), 7.0);
    }

    #[test]
    fn test_identifiers_in_first_use_order() {
        let expr = parse("B * A + B / C").unwrap();
        assert_eq!(expr.identifiers(), vec!["B", "A", "C"]);
    }

    #[test]
    fn test_eval_with_lookup() {
        let expr = parse("SPENDING * SHARE").unwrap();
        let value = expr
            .eval(&|name| match name {
                "SPENDING" => Some(2.0e12),
                "SHARE" => Some(0.01),
                _ => None,
            })
            .unwrap();
        assert_eq!(value, 2.0e10);
    }

    #[test]
    fn test_eval_errors() {
        assert_eq!(
            parse("X + 1").unwrap().eval(&|_| None),
            Err(EvalError::UnknownIdentifier("X".to_string()))
        );
        assert_eq!(
            parse("1 / (2 - 2)").unwrap().eval(&|_| None),
            Err(EvalError::DivisionByZero)
        );
        assert!(matches!(
            parse("sqrt(-1)").unwrap().eval(&|_| None),
            Err(EvalError::NonFinite(_))
        ));
    }

    #[test]
    fn test_syntax_errors() {
        assert_eq!(parse("1 +").unwrap_err().position, 3);
        assert_eq!(parse("(1 + 2").unwrap_err().message, "expected `)`");
        assert!(parse("1 2").unwrap_err().message.contains("trailing"));
        assert!(parse("foo(1)").unwrap_err().message.contains("unknown function"));
        assert!(parse("min(1)").unwrap_err().message.contains("takes 2"));
        assert_eq!(parse("3 % 2").unwrap_err().position, 2);
    }

    #[test]
    fn test_nesting_limit() {
        let deep = format!("{}1{}", "(".repeat(10_000), ")".repeat(10_000));
        assert!(parse(&deep).unwrap_err().message.contains("nests deeper"));
        assert!(parse(&format!("{}1", "-".repeat(10_000))).is_err());
        assert!(parse(&vec!["1"; 10_000].join(" + ")).is_err());

        let shallow = format!("{}1{}", "(".repeat(50), ")".repeat(50));
        assert_eq!(eval_str(&shallow), 1.0);
        assert_eq!(eval_str(&vec!["1"; 100].join(" + ")), 100.0);
    }
}
