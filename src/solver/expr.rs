//! Definition-text expression language for derived scalar field functions.
//!
//! The solver's definition grammar is an arithmetic/comparison/ternary
//! expression over `${name}` references, numeric literals, and a fixed set
//! of built-in functions. Definitions are parsed **once** at graph-build
//! time into this AST; references and dimensions are extracted from the AST,
//! never re-scraped from text. The emitter renders the AST back to
//! definition text via `Display`.
//!
//! Reference names are opaque up to the closing brace, so identifiers like
//! `mSO4_2-` or `UserDebyeHuckelWallDeposition(Molality)` pass through
//! unharmed.

use std::fmt;

use indexmap::IndexSet;

use crate::solver::error::{ConfigError, Result};
use crate::solver::units::{si, Dim};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

impl BinOp {
    pub fn as_str(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
        }
    }

    fn is_comparison(self) -> bool {
        matches!(
            self,
            BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge | BinOp::Eq | BinOp::Ne
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Func {
    Pow,
    Max,
    Min,
    Sqrt,
    Abs,
    Exp,
    Log,
}

impl Func {
    pub fn as_str(self) -> &'static str {
        match self {
            Func::Pow => "pow",
            Func::Max => "max",
            Func::Min => "min",
            Func::Sqrt => "sqrt",
            Func::Abs => "abs",
            Func::Exp => "exp",
            Func::Log => "log",
        }
    }

    fn arity(self) -> usize {
        match self {
            Func::Pow | Func::Max | Func::Min => 2,
            Func::Sqrt | Func::Abs | Func::Exp | Func::Log => 1,
        }
    }

    fn from_ident(ident: &str) -> Option<Self> {
        match ident {
            "pow" => Some(Func::Pow),
            "max" => Some(Func::Max),
            "min" => Some(Func::Min),
            "sqrt" => Some(Func::Sqrt),
            "abs" => Some(Func::Abs),
            "exp" => Some(Func::Exp),
            "log" => Some(Func::Log),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(f64),
    Ref(String),
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
    Ternary {
        cond: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
}

impl Expr {
    pub fn literal(value: f64) -> Self {
        Expr::Literal(value)
    }

    pub fn reference(name: impl Into<String>) -> Self {
        Expr::Ref(name.into())
    }

    /// All `${name}` identifiers this expression reads, in first-seen order.
    pub fn references(&self) -> IndexSet<String> {
        let mut out = IndexSet::new();
        self.collect_references(&mut out);
        out
    }

    fn collect_references(&self, out: &mut IndexSet<String>) {
        match self {
            Expr::Literal(_) => {}
            Expr::Ref(name) => {
                out.insert(name.clone());
            }
            Expr::Neg(inner) => inner.collect_references(out),
            Expr::Binary { lhs, rhs, .. } => {
                lhs.collect_references(out);
                rhs.collect_references(out);
            }
            Expr::Call { args, .. } => {
                for arg in args {
                    arg.collect_references(out);
                }
            }
            Expr::Ternary {
                cond,
                then,
                otherwise,
            } => {
                cond.collect_references(out);
                then.collect_references(out);
                otherwise.collect_references(out);
            }
        }
    }

    /// Infer the physical dimension of this expression, resolving `${name}`
    /// references through `lookup`. Numeric literals are
    /// dimension-polymorphic: they unify with either side of an additive or
    /// comparison composition (the definition language writes
    /// `${WallDistance} > 0.0001` with a raw meter threshold).
    pub fn infer_dim(&self, context: &str, lookup: &dyn Fn(&str) -> Option<Dim>) -> Result<Dim> {
        Ok(self
            .infer_dim_opt(context, lookup)?
            .unwrap_or(si::DIMENSIONLESS))
    }

    /// Like [`infer_dim`](Self::infer_dim), but reports a fully
    /// literal-polymorphic expression as `None` so a caller can let it adopt
    /// a declared dimension (constants like `0.000103` do this).
    pub fn infer_dim_opt(
        &self,
        context: &str,
        lookup: &dyn Fn(&str) -> Option<Dim>,
    ) -> Result<Option<Dim>> {
        Ok(match self.infer_term(context, lookup)? {
            DimTerm::Known(dim) => Some(dim),
            DimTerm::Poly => None,
        })
    }

    fn infer_term(
        &self,
        context: &str,
        lookup: &dyn Fn(&str) -> Option<Dim>,
    ) -> Result<DimTerm> {
        match self {
            Expr::Literal(_) => Ok(DimTerm::Poly),
            Expr::Ref(name) => match lookup(name) {
                Some(dim) => Ok(DimTerm::Known(dim)),
                None => Err(ConfigError::UndefinedReference {
                    node: context.to_string(),
                    missing: name.clone(),
                }),
            },
            Expr::Neg(inner) => inner.infer_term(context, lookup),
            Expr::Binary { op, lhs, rhs } => {
                let left = lhs.infer_term(context, lookup)?;
                let right = rhs.infer_term(context, lookup)?;
                match op {
                    BinOp::Add | BinOp::Sub => unify(context, op.as_str(), left, right),
                    BinOp::Mul => Ok(match (left, right) {
                        (DimTerm::Known(a), DimTerm::Known(b)) => DimTerm::Known(a * b),
                        (DimTerm::Known(a), DimTerm::Poly)
                        | (DimTerm::Poly, DimTerm::Known(a)) => DimTerm::Known(a),
                        (DimTerm::Poly, DimTerm::Poly) => DimTerm::Poly,
                    }),
                    BinOp::Div => Ok(match (left, right) {
                        (DimTerm::Known(a), DimTerm::Known(b)) => DimTerm::Known(a / b),
                        (DimTerm::Known(a), DimTerm::Poly) => DimTerm::Known(a),
                        (DimTerm::Poly, DimTerm::Known(b)) => {
                            DimTerm::Known(si::DIMENSIONLESS / b)
                        }
                        (DimTerm::Poly, DimTerm::Poly) => DimTerm::Poly,
                    }),
                    _ => {
                        // Comparisons demand compatible operands and yield a
                        // dimensionless indicator.
                        unify(context, op.as_str(), left, right)?;
                        Ok(DimTerm::Known(si::DIMENSIONLESS))
                    }
                }
            }
            Expr::Call { func, args } => self.infer_call(context, lookup, *func, args),
            Expr::Ternary {
                cond,
                then,
                otherwise,
            } => {
                let cond_term = cond.infer_term(context, lookup)?;
                require_dimensionless(context, "ternary condition", cond_term)?;
                let a = then.infer_term(context, lookup)?;
                let b = otherwise.infer_term(context, lookup)?;
                unify(context, "?:", a, b)
            }
        }
    }

    fn infer_call(
        &self,
        context: &str,
        lookup: &dyn Fn(&str) -> Option<Dim>,
        func: Func,
        args: &[Expr],
    ) -> Result<DimTerm> {
        match func {
            Func::Max | Func::Min => {
                let a = args[0].infer_term(context, lookup)?;
                let b = args[1].infer_term(context, lookup)?;
                unify(context, func.as_str(), a, b)
            }
            Func::Abs => args[0].infer_term(context, lookup),
            Func::Sqrt => Ok(match args[0].infer_term(context, lookup)? {
                DimTerm::Known(dim) => DimTerm::Known(dim.sqrt()),
                DimTerm::Poly => DimTerm::Poly,
            }),
            Func::Exp | Func::Log => {
                let inner = args[0].infer_term(context, lookup)?;
                require_dimensionless(context, func.as_str(), inner)?;
                Ok(DimTerm::Known(si::DIMENSIONLESS))
            }
            Func::Pow => {
                let base = args[0].infer_term(context, lookup)?;
                let exponent = args[1].infer_term(context, lookup)?;
                // A literal integer exponent raises a dimensioned base;
                // everything else is plain dimensionless exponentiation.
                if let (DimTerm::Known(dim), Expr::Literal(value)) = (base, &args[1]) {
                    if !dim.is_dimensionless() {
                        if value.fract() == 0.0 && value.abs() <= i32::MAX as f64 {
                            return Ok(DimTerm::Known(dim.powi(*value as i32)));
                        }
                        return Err(ConfigError::DimensionMismatch {
                            context: format!("{context}: pow of dimensioned base"),
                            expected: si::DIMENSIONLESS,
                            found: dim,
                        });
                    }
                }
                require_dimensionless(context, "pow base", base)?;
                require_dimensionless(context, "pow exponent", exponent)?;
                Ok(DimTerm::Known(si::DIMENSIONLESS))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum DimTerm {
    /// A numeric literal (or composition of literals): adopts the dimension
    /// of whatever it is combined with.
    Poly,
    Known(Dim),
}

fn unify(context: &str, op: &str, a: DimTerm, b: DimTerm) -> Result<DimTerm> {
    match (a, b) {
        (DimTerm::Poly, other) | (other, DimTerm::Poly) => Ok(other),
        (DimTerm::Known(da), DimTerm::Known(db)) => {
            if da == db {
                Ok(DimTerm::Known(da))
            } else {
                Err(ConfigError::DimensionMismatch {
                    context: format!("{context}: operands of '{op}'"),
                    expected: da,
                    found: db,
                })
            }
        }
    }
}

fn require_dimensionless(context: &str, what: &str, term: DimTerm) -> Result<()> {
    match term {
        DimTerm::Poly => Ok(()),
        DimTerm::Known(dim) if dim.is_dimensionless() => Ok(()),
        DimTerm::Known(dim) => Err(ConfigError::DimensionMismatch {
            context: format!("{context}: {what}"),
            expected: si::DIMENSIONLESS,
            found: dim,
        }),
    }
}

// ============================================================================
// Rendering
// ============================================================================

// Precedence levels for minimal re-parenthesization.
const PREC_TERNARY: u8 = 0;
const PREC_COMPARE: u8 = 1;
const PREC_ADD: u8 = 2;
const PREC_MUL: u8 = 3;
const PREC_UNARY: u8 = 4;

impl Expr {
    fn precedence(&self) -> u8 {
        match self {
            Expr::Ternary { .. } => PREC_TERNARY,
            Expr::Binary { op, .. } if op.is_comparison() => PREC_COMPARE,
            Expr::Binary {
                op: BinOp::Add | BinOp::Sub,
                ..
            } => PREC_ADD,
            Expr::Binary { .. } => PREC_MUL,
            Expr::Neg(_) => PREC_UNARY,
            _ => u8::MAX,
        }
    }

    fn fmt_prec(&self, f: &mut fmt::Formatter<'_>, min_prec: u8) -> fmt::Result {
        let prec = self.precedence();
        let parens = prec < min_prec;
        if parens {
            write!(f, "(")?;
        }
        match self {
            Expr::Literal(value) => write!(f, "{value}")?,
            Expr::Ref(name) => write!(f, "${{{name}}}")?,
            Expr::Neg(inner) => {
                write!(f, "-")?;
                inner.fmt_prec(f, PREC_UNARY + 1)?;
            }
            Expr::Binary { op, lhs, rhs } => {
                lhs.fmt_prec(f, prec)?;
                write!(f, " {} ", op.as_str())?;
                // Right operand binds one step tighter to preserve
                // left-associativity of - and /.
                rhs.fmt_prec(f, prec + 1)?;
            }
            Expr::Call { func, args } => {
                write!(f, "{}(", func.as_str())?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    arg.fmt_prec(f, PREC_TERNARY)?;
                }
                write!(f, ")")?;
            }
            Expr::Ternary {
                cond,
                then,
                otherwise,
            } => {
                cond.fmt_prec(f, PREC_COMPARE)?;
                write!(f, " ? ")?;
                then.fmt_prec(f, PREC_COMPARE)?;
                write!(f, " : ")?;
                otherwise.fmt_prec(f, PREC_TERNARY)?;
            }
        }
        if parens {
            write!(f, ")")?;
        }
        Ok(())
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_prec(f, PREC_TERNARY)
    }
}

// ============================================================================
// Parsing
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ref(String),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
    Comma,
    Question,
    Colon,
    Lt,
    Le,
    Gt,
    Ge,
    EqEq,
    Ne,
}

fn parse_error(definition: &str, detail: impl Into<String>) -> ConfigError {
    ConfigError::invalid(
        format!("definition '{definition}'"),
        detail.into(),
    )
}

fn lex(definition: &str) -> Result<Vec<Token>> {
    let bytes = definition.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i] as char;
        match c {
            ' ' | '\t' | '\n' | '\r' => i += 1,
            '+' => {
                tokens.push(Token::Plus);
                i += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            '*' => {
                tokens.push(Token::Star);
                i += 1;
            }
            '/' => {
                tokens.push(Token::Slash);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            '?' => {
                tokens.push(Token::Question);
                i += 1;
            }
            ':' => {
                tokens.push(Token::Colon);
                i += 1;
            }
            '<' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    tokens.push(Token::Le);
                    i += 2;
                } else {
                    tokens.push(Token::Lt);
                    i += 1;
                }
            }
            '>' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    tokens.push(Token::Ge);
                    i += 2;
                } else {
                    tokens.push(Token::Gt);
                    i += 1;
                }
            }
            '=' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    tokens.push(Token::EqEq);
                    i += 2;
                } else {
                    return Err(parse_error(definition, "single '=' is not an operator"));
                }
            }
            '!' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    tokens.push(Token::Ne);
                    i += 2;
                } else {
                    return Err(parse_error(definition, "single '!' is not an operator"));
                }
            }
            '$' => {
                if bytes.get(i + 1) != Some(&b'{') {
                    return Err(parse_error(definition, "'$' must start a ${name} reference"));
                }
                let start = i + 2;
                let end = definition[start..]
                    .find('}')
                    .map(|offset| start + offset)
                    .ok_or_else(|| parse_error(definition, "unterminated ${name} reference"))?;
                if end == start {
                    return Err(parse_error(definition, "empty ${} reference"));
                }
                tokens.push(Token::Ref(definition[start..end].to_string()));
                i = end + 1;
            }
            '0'..='9' | '.' => {
                let start = i;
                while i < bytes.len() {
                    let d = bytes[i] as char;
                    if d.is_ascii_digit() || d == '.' {
                        i += 1;
                    } else if d == 'e' || d == 'E' {
                        // Exponent, optionally signed.
                        let mut j = i + 1;
                        if matches!(bytes.get(j), Some(b'+') | Some(b'-')) {
                            j += 1;
                        }
                        if bytes.get(j).is_some_and(|b| b.is_ascii_digit()) {
                            i = j + 1;
                            while bytes.get(i).is_some_and(|b| b.is_ascii_digit()) {
                                i += 1;
                            }
                        }
                        break;
                    } else {
                        break;
                    }
                }
                let text = &definition[start..i];
                let value: f64 = text
                    .parse()
                    .map_err(|_| parse_error(definition, format!("bad number '{text}'")))?;
                tokens.push(Token::Number(value));
            }
            _ if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < bytes.len() {
                    let d = bytes[i] as char;
                    if d.is_ascii_alphanumeric() || d == '_' {
                        i += 1;
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Ident(definition[start..i].to_string()));
            }
            _ => {
                return Err(parse_error(definition, format!("unexpected character '{c}'")));
            }
        }
    }

    Ok(tokens)
}

struct Parser<'a> {
    definition: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, token: Token, what: &str) -> Result<()> {
        match self.next() {
            Some(found) if found == token => Ok(()),
            other => Err(parse_error(
                self.definition,
                format!("expected {what}, found {other:?}"),
            )),
        }
    }

    fn ternary(&mut self) -> Result<Expr> {
        let cond = self.comparison()?;
        if matches!(self.peek(), Some(Token::Question)) {
            self.next();
            let then = self.ternary()?;
            self.expect(Token::Colon, "':'")?;
            let otherwise = self.ternary()?;
            return Ok(Expr::Ternary {
                cond: Box::new(cond),
                then: Box::new(then),
                otherwise: Box::new(otherwise),
            });
        }
        Ok(cond)
    }

    fn comparison(&mut self) -> Result<Expr> {
        let lhs = self.additive()?;
        let op = match self.peek() {
            Some(Token::Lt) => BinOp::Lt,
            Some(Token::Le) => BinOp::Le,
            Some(Token::Gt) => BinOp::Gt,
            Some(Token::Ge) => BinOp::Ge,
            Some(Token::EqEq) => BinOp::Eq,
            Some(Token::Ne) => BinOp::Ne,
            _ => return Ok(lhs),
        };
        self.next();
        let rhs = self.additive()?;
        Ok(Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        })
    }

    fn additive(&mut self) -> Result<Expr> {
        let mut lhs = self.multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinOp::Add,
                Some(Token::Minus) => BinOp::Sub,
                _ => return Ok(lhs),
            };
            self.next();
            let rhs = self.multiplicative()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
    }

    fn multiplicative(&mut self) -> Result<Expr> {
        let mut lhs = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinOp::Mul,
                Some(Token::Slash) => BinOp::Div,
                _ => return Ok(lhs),
            };
            self.next();
            let rhs = self.unary()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
    }

    fn unary(&mut self) -> Result<Expr> {
        if matches!(self.peek(), Some(Token::Minus)) {
            self.next();
            let inner = self.unary()?;
            return Ok(Expr::Neg(Box::new(inner)));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Expr> {
        match self.next() {
            Some(Token::Number(value)) => Ok(Expr::Literal(value)),
            Some(Token::Ref(name)) => Ok(Expr::Ref(name)),
            Some(Token::LParen) => {
                let inner = self.ternary()?;
                self.expect(Token::RParen, "')'")?;
                Ok(inner)
            }
            Some(Token::Ident(ident)) => {
                let func = Func::from_ident(&ident).ok_or_else(|| {
                    parse_error(self.definition, format!("unknown function '{ident}'"))
                })?;
                self.expect(Token::LParen, "'('")?;
                let mut args = vec![self.ternary()?];
                while matches!(self.peek(), Some(Token::Comma)) {
                    self.next();
                    args.push(self.ternary()?);
                }
                self.expect(Token::RParen, "')'")?;
                if args.len() != func.arity() {
                    return Err(parse_error(
                        self.definition,
                        format!(
                            "{} takes {} argument(s), found {}",
                            func.as_str(),
                            func.arity(),
                            args.len()
                        ),
                    ));
                }
                Ok(Expr::Call { func, args })
            }
            other => Err(parse_error(
                self.definition,
                format!("expected expression, found {other:?}"),
            )),
        }
    }
}

/// Parse a definition string into an expression AST.
pub fn parse(definition: &str) -> Result<Expr> {
    let tokens = lex(definition)?;
    if tokens.is_empty() {
        return Err(parse_error(definition, "empty definition"));
    }
    let mut parser = Parser {
        definition,
        tokens,
        pos: 0,
    };
    let expr = parser.ternary()?;
    if parser.pos != parser.tokens.len() {
        return Err(parse_error(
            definition,
            format!("trailing tokens after expression (at {})", parser.pos),
        ));
    }
    Ok(expr)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup_none(_: &str) -> Option<Dim> {
        None
    }

    #[test]
    fn parses_reference_product() {
        let expr = parse("${mBa_2+} * ${mSO4_2-}").unwrap();
        let refs = expr.references();
        assert_eq!(refs.len(), 2);
        assert!(refs.contains("mBa_2+"));
        assert!(refs.contains("mSO4_2-"));
    }

    #[test]
    fn parses_wall_distance_indicator() {
        let expr = parse("${WallDistance} > 0.0001 ? 1 : 0").unwrap();
        assert!(matches!(expr, Expr::Ternary { .. }));
        assert_eq!(expr.references().len(), 1);
    }

    #[test]
    fn parses_rate_constant_polynomial() {
        let expr = parse("${R_fit_pA}*pow(${SR},2) + ${R_fit_pB} * ${SR}").unwrap();
        let refs = expr.references();
        assert_eq!(
            refs.iter().collect::<Vec<_>>(),
            ["R_fit_pA", "SR", "R_fit_pB"]
        );
    }

    #[test]
    fn reference_names_may_embed_parentheses() {
        let expr = parse("${UserDebyeHuckelWallDeposition(Molality)} * ${Density}").unwrap();
        let refs = expr.references();
        assert!(refs.contains("UserDebyeHuckelWallDeposition(Molality)"));
        assert!(refs.contains("Density"));
    }

    #[test]
    fn display_round_trips_through_the_parser() {
        for definition in [
            "${K_bulk}*${mBa_2+}*${mSO4_2-}*max(0,${SR}-1)*${isBulk}",
            "-0.5*${mBa_2+}*${K_bulk}*pow(${UserPitzerActivityCoefficient},2)/pow(10,-9.87)",
            "1.0 / ${MolarMassWater} + ${mEtc_1-} + ${mEtc_2-}",
            "${WallDistance} > 0.0001 ? 1 : 0",
            "pow(10,${UserPitzerSaturationIndex})",
            "${k1}*${mBa_2+}*${mSO4_2-}*max(0,${SR}-1)*(1-${isBulk})",
        ] {
            let expr = parse(definition).unwrap();
            let rendered = expr.to_string();
            let reparsed = parse(&rendered)
                .unwrap_or_else(|err| panic!("'{rendered}' failed to reparse: {err}"));
            assert_eq!(expr, reparsed, "render of '{definition}' changed meaning");
        }
    }

    #[test]
    fn subtraction_stays_left_associative_through_display() {
        let expr = parse("1 - (2 - 3)").unwrap();
        let rendered = expr.to_string();
        assert_eq!(parse(&rendered).unwrap(), expr);
    }

    #[test]
    fn rejects_malformed_definitions() {
        assert!(parse("").is_err());
        assert!(parse("${unterminated").is_err());
        assert!(parse("${}").is_err());
        assert!(parse("foo(1)").is_err());
        assert!(parse("pow(1)").is_err());
        assert!(parse("1 +").is_err());
        assert!(parse("1 2").is_err());
    }

    #[test]
    fn infer_products_compose_exponents() {
        let lookup = |name: &str| match name {
            "molality" => Some(si::MOLALITY),
            "density" => Some(si::DENSITY),
            _ => None,
        };
        let expr = parse("${molality} * ${density}").unwrap();
        let dim = expr.infer_dim("test", &lookup).unwrap();
        assert_eq!(dim, si::MOLALITY * si::DENSITY);
    }

    #[test]
    fn infer_rejects_additive_mismatch() {
        let lookup = |name: &str| match name {
            "rate" => Some(si::REACTIVITY),
            "one" => Some(si::DIMENSIONLESS),
            _ => None,
        };
        let expr = parse("${rate} + ${one}").unwrap();
        let err = expr.infer_dim("test", &lookup).unwrap_err();
        assert!(matches!(err, ConfigError::DimensionMismatch { .. }));
    }

    #[test]
    fn infer_literal_adopts_dimension_of_other_operand() {
        let lookup = |name: &str| match name {
            "WallDistance" => Some(si::LENGTH),
            _ => None,
        };
        let expr = parse("${WallDistance} > 0.0001 ? 1 : 0").unwrap();
        let dim = expr.infer_dim("isBulk", &lookup).unwrap();
        assert!(dim.is_dimensionless());
    }

    #[test]
    fn infer_reports_missing_reference() {
        let expr = parse("${nobody}").unwrap();
        let err = expr.infer_dim("orphan", &lookup_none).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::UndefinedReference { ref node, ref missing }
                if node == "orphan" && missing == "nobody"
        ));
    }

    #[test]
    fn infer_pow_with_integer_literal_raises_dimension() {
        let lookup = |name: &str| match name {
            "len" => Some(si::LENGTH),
            _ => None,
        };
        let expr = parse("pow(${len}, 2)").unwrap();
        let dim = expr.infer_dim("test", &lookup).unwrap();
        assert_eq!(dim, si::AREA);

        let bad = parse("pow(${len}, 1.5)").unwrap();
        assert!(bad.infer_dim("test", &lookup).is_err());
    }

    #[test]
    fn infer_inverse_of_known_dimension() {
        let lookup = |name: &str| match name {
            "MolarMassWater" => Some(si::MOLAR_MASS),
            _ => None,
        };
        let expr = parse("1.0 / ${MolarMassWater}").unwrap();
        let dim = expr.infer_dim("test", &lookup).unwrap();
        assert_eq!(dim, si::MOLALITY);
    }
}
