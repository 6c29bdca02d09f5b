//! Packet predicates.
//!
//! A predicate is written as the source of a one-argument lambda:
//!
//!   |pkt| pkt.dl_src == 00:00:00:00:00:00 && pkt.ipv4.ttl == 0
//!   pkt => has(udp) && pkt.tp_dst != 53
//!
//! The source is parsed (nom 8) and checked against the packet model when
//! the predicate is built, so evaluation can only fail on packets that lack
//! a referenced layer or hold a value of another type.

use std::cmp::Ordering;
use std::fmt;
use std::net::Ipv4Addr;
use std::sync::Arc;

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while, take_while_m_n},
    character::complete::{char, digit1, hex_digit1, multispace0, satisfy},
    combinator::{map, map_res, not, recognize, value},
    multi::{count, many0, separated_list0, separated_list1},
    sequence::{delimited, preceded, terminated},
    IResult, Parser,
};
use thiserror::Error;

use wirecheck_protocols::{is_named_field, FieldValue, HeaderKind, MacAddr, Packet, PacketError};

use crate::error::ConfigurationError;

/// Evaluation failure, distinct from a predicate returning `false`.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum PredicateError {
    #[error(transparent)]
    Lookup(#[from] PacketError),

    #[error("cannot compare {field} ({value}) with {literal}")]
    Incomparable {
        field: String,
        value: FieldValue,
        literal: String,
    },
}

type NativeFn = dyn Fn(&Packet) -> bool + Send + Sync;

/// A named boolean function over packets.
#[derive(Clone)]
pub struct Predicate {
    name: String,
    body: Body,
}

#[derive(Clone)]
enum Body {
    Expr(Expr),
    Native(Arc<NativeFn>),
}

impl Predicate {
    /// Builds a predicate from lambda source text.
    pub fn parse(source: &str) -> Result<Self, ConfigurationError> {
        let invalid = |reason: String| ConfigurationError::Predicate {
            source_text: source.trim().to_string(),
            reason,
        };

        let (rest, params) = ws(parameters)
            .parse(source)
            .map_err(|_| invalid("expected a lambda such as '|pkt| ...'".to_string()))?;
        if params.len() != 1 {
            return Err(invalid(format!(
                "a predicate takes exactly one argument, this one takes {}",
                params.len()
            )));
        }
        let (rest, body) = or_expr(rest).map_err(|e| invalid(syntax_reason(e)))?;
        if !rest.trim().is_empty() {
            return Err(invalid(format!("unexpected input '{}'", rest.trim())));
        }

        let expr = lower(body, params[0]).map_err(|e| match e {
            Lowering::Config(err) => err,
            Lowering::Reason(reason) => invalid(reason),
        })?;
        Ok(Self {
            name: source.trim().to_string(),
            body: Body::Expr(expr),
        })
    }

    /// Wraps a native closure.
    pub fn from_fn<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Packet) -> bool + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            body: Body::Native(Arc::new(f)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn eval(&self, pkt: &Packet) -> Result<bool, PredicateError> {
        match &self.body {
            Body::Expr(expr) => expr.eval(pkt),
            Body::Native(f) => Ok(f(pkt)),
        }
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Predicate").field(&self.name).finish()
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl TryFrom<&serde_yaml::Value> for Predicate {
    type Error = ConfigurationError;

    fn try_from(value: &serde_yaml::Value) -> Result<Self, Self::Error> {
        let invalid = |reason: &str| ConfigurationError::Predicate {
            source_text: serde_yaml::to_string(value)
                .map(|s| s.trim().to_string())
                .unwrap_or_default(),
            reason: reason.to_string(),
        };
        match value {
            serde_yaml::Value::String(source) => Predicate::parse(source),
            serde_yaml::Value::Sequence(_) => Err(invalid("expected a single predicate, got a list")),
            _ => Err(invalid("a predicate must be lambda source text")),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    fn holds(self, ord: Ordering) -> bool {
        match self {
            CmpOp::Eq => ord == Ordering::Equal,
            CmpOp::Ne => ord != Ordering::Equal,
            CmpOp::Lt => ord == Ordering::Less,
            CmpOp::Le => ord != Ordering::Greater,
            CmpOp::Gt => ord == Ordering::Greater,
            CmpOp::Ge => ord != Ordering::Less,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
enum Literal {
    Mac(MacAddr),
    Ip(Ipv4Addr),
    Int(u64),
    Text(String),
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Mac(mac) => mac.fmt(f),
            Literal::Ip(ip) => ip.fmt(f),
            Literal::Int(n) => n.fmt(f),
            Literal::Text(text) => write!(f, "{:?}", text),
        }
    }
}

#[derive(Clone, Debug)]
enum FieldPath {
    Named(String),
    Attribute(HeaderKind, String),
}

impl FieldPath {
    fn lookup(&self, pkt: &Packet) -> Result<FieldValue, PacketError> {
        match self {
            FieldPath::Named(name) => pkt.field(name),
            FieldPath::Attribute(kind, attribute) => pkt.get(*kind, attribute),
        }
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldPath::Named(name) => f.write_str(name),
            FieldPath::Attribute(kind, attribute) => write!(f, "{}.{}", kind, attribute),
        }
    }
}

/// Checked expression tree.
#[derive(Clone, Debug)]
enum Expr {
    Const(bool),
    Has(HeaderKind),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Compare {
        path: FieldPath,
        op: CmpOp,
        literal: Literal,
    },
}

impl Expr {
    fn eval(&self, pkt: &Packet) -> Result<bool, PredicateError> {
        match self {
            Expr::Const(b) => Ok(*b),
            Expr::Has(kind) => Ok(pkt.has(*kind)),
            Expr::Not(inner) => Ok(!inner.eval(pkt)?),
            Expr::And(lhs, rhs) => Ok(lhs.eval(pkt)? && rhs.eval(pkt)?),
            Expr::Or(lhs, rhs) => Ok(lhs.eval(pkt)? || rhs.eval(pkt)?),
            Expr::Compare { path, op, literal } => {
                let value = path.lookup(pkt)?;
                compare(&value, literal)
                    .map(|ord| op.holds(ord))
                    .ok_or_else(|| PredicateError::Incomparable {
                        field: path.to_string(),
                        value,
                        literal: literal.to_string(),
                    })
            }
        }
    }
}

fn compare(value: &FieldValue, literal: &Literal) -> Option<Ordering> {
    match (value, literal) {
        (FieldValue::Mac(mac), Literal::Mac(other)) => Some(mac.cmp(other)),
        (FieldValue::Ip(ip), Literal::Ip(other)) => Some(ip.cmp(other)),
        (FieldValue::Bytes(bytes), Literal::Text(text)) => Some(bytes.as_slice().cmp(text.as_bytes())),
        (_, Literal::Int(n)) => value.as_u64().map(|v| v.cmp(n)),
        (_, Literal::Text(text)) => value.parse_like(text).ok().map(|other| value.cmp(&other)),
        _ => None,
    }
}

/// Parse tree straight out of the grammar, names still unchecked.
#[derive(Clone, Debug)]
enum Node<'a> {
    Const(bool),
    Has(&'a str),
    Not(Box<Node<'a>>),
    And(Box<Node<'a>>, Box<Node<'a>>),
    Or(Box<Node<'a>>, Box<Node<'a>>),
    Compare {
        path: Vec<&'a str>,
        op: CmpOp,
        literal: Literal,
    },
}

enum Lowering {
    Config(ConfigurationError),
    Reason(String),
}

impl From<ConfigurationError> for Lowering {
    fn from(err: ConfigurationError) -> Self {
        Lowering::Config(err)
    }
}

impl From<PacketError> for Lowering {
    fn from(err: PacketError) -> Self {
        Lowering::Config(err.into())
    }
}

fn lower(node: Node<'_>, param: &str) -> Result<Expr, Lowering> {
    Ok(match node {
        Node::Const(b) => Expr::Const(b),
        Node::Has(name) => Expr::Has(name.parse()?),
        Node::Not(inner) => Expr::Not(Box::new(lower(*inner, param)?)),
        Node::And(lhs, rhs) => Expr::And(Box::new(lower(*lhs, param)?), Box::new(lower(*rhs, param)?)),
        Node::Or(lhs, rhs) => Expr::Or(Box::new(lower(*lhs, param)?), Box::new(lower(*rhs, param)?)),
        Node::Compare { path, op, literal } => {
            if path[0] != param {
                return Err(Lowering::Reason(format!("unknown name '{}'", path[0])));
            }
            let path = match path[1..] {
                [name] if is_named_field(name) => FieldPath::Named(name.to_string()),
                [name] => return Err(ConfigurationError::UnknownField(name.to_string()).into()),
                [header, attribute] => {
                    let kind: HeaderKind = header.parse()?;
                    if !kind.attributes().iter().any(|a| *a == attribute) {
                        return Err(ConfigurationError::UnknownHeaderField {
                            header: kind,
                            field: attribute.to_string(),
                        }
                        .into());
                    }
                    FieldPath::Attribute(kind, attribute.to_string())
                }
                _ => return Err(Lowering::Reason(format!("cannot read '{}'", path.join(".")))),
            };
            Expr::Compare { path, op, literal }
        }
    })
}

fn syntax_reason(err: nom::Err<nom::error::Error<&str>>) -> String {
    match err {
        nom::Err::Error(e) | nom::Err::Failure(e) => {
            let near: String = e.input.chars().take(24).collect();
            if near.is_empty() {
                "unexpected end of predicate".to_string()
            } else {
                format!("syntax error near '{}'", near)
            }
        }
        nom::Err::Incomplete(_) => "unexpected end of predicate".to_string(),
    }
}

// Grammar

fn ws<'a, O, P>(inner: P) -> impl Parser<&'a str, Output = O, Error = nom::error::Error<&'a str>>
where
    P: Parser<&'a str, Output = O, Error = nom::error::Error<&'a str>>,
{
    delimited(multispace0, inner, multispace0)
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn identifier(input: &str) -> IResult<&str, &str> {
    recognize((
        satisfy(|c| c.is_ascii_alphabetic() || c == '_'),
        take_while(is_ident_char),
    ))
    .parse(input)
}

fn keyword<'a>(word: &'static str) -> impl Parser<&'a str, Output = &'a str, Error = nom::error::Error<&'a str>> {
    terminated(tag(word), not(satisfy(is_ident_char)))
}

/// `|x|`, `x =>` or `(x, y) =>`; the caller checks the arity.
fn parameters(input: &str) -> IResult<&str, Vec<&str>> {
    let list = || separated_list0(ws(char(',')), ws(identifier));
    alt((
        delimited(char('|'), list(), char('|')),
        map(terminated(identifier, ws(tag("=>"))), |p| vec![p]),
        terminated(delimited(char('('), list(), char(')')), ws(tag("=>"))),
    ))
    .parse(input)
}

fn or_expr(input: &str) -> IResult<&str, Node<'_>> {
    let (input, first) = and_expr(input)?;
    let (input, rest) = many0(preceded(ws(tag("||")), and_expr)).parse(input)?;
    let node = rest
        .into_iter()
        .fold(first, |acc, next| Node::Or(Box::new(acc), Box::new(next)));
    Ok((input, node))
}

fn and_expr(input: &str) -> IResult<&str, Node<'_>> {
    let (input, first) = unary(input)?;
    let (input, rest) = many0(preceded(ws(tag("&&")), unary)).parse(input)?;
    let node = rest
        .into_iter()
        .fold(first, |acc, next| Node::And(Box::new(acc), Box::new(next)));
    Ok((input, node))
}

fn unary(input: &str) -> IResult<&str, Node<'_>> {
    alt((
        map(preceded(ws(char('!')), unary), |inner| Node::Not(Box::new(inner))),
        primary,
    ))
    .parse(input)
}

fn primary(input: &str) -> IResult<&str, Node<'_>> {
    ws(alt((
        delimited(ws(char('(')), or_expr, ws(char(')'))),
        value(Node::Const(true), keyword("true")),
        value(Node::Const(false), keyword("false")),
        map(
            preceded(keyword("has"), delimited(ws(char('(')), identifier, ws(char(')')))),
            Node::Has,
        ),
        comparison,
    )))
    .parse(input)
}

fn comparison(input: &str) -> IResult<&str, Node<'_>> {
    map(
        (separated_list1(char('.'), identifier), ws(cmp_op), literal),
        |(path, op, literal)| Node::Compare { path, op, literal },
    )
    .parse(input)
}

fn cmp_op(input: &str) -> IResult<&str, CmpOp> {
    alt((
        value(CmpOp::Eq, tag("==")),
        value(CmpOp::Ne, tag("!=")),
        value(CmpOp::Le, tag("<=")),
        value(CmpOp::Ge, tag(">=")),
        value(CmpOp::Lt, tag("<")),
        value(CmpOp::Gt, tag(">")),
    ))
    .parse(input)
}

fn literal(input: &str) -> IResult<&str, Literal> {
    let hex_pair = || take_while_m_n(2, 2, |c: char| c.is_ascii_hexdigit());
    alt((
        map(delimited(char('"'), take_while(|c: char| c != '"'), char('"')), |s: &str| {
            Literal::Text(s.to_string())
        }),
        map(delimited(char('\''), take_while(|c: char| c != '\''), char('\'')), |s: &str| {
            Literal::Text(s.to_string())
        }),
        map_res(
            recognize((hex_pair(), count(preceded(char(':'), hex_pair()), 5))),
            |s: &str| s.parse::<MacAddr>().map(Literal::Mac),
        ),
        map_res(
            recognize((digit1, count(preceded(char('.'), digit1), 3))),
            |s: &str| s.parse::<Ipv4Addr>().map(Literal::Ip),
        ),
        map_res(preceded(tag("0x"), hex_digit1), |s: &str| {
            u64::from_str_radix(s, 16).map(Literal::Int)
        }),
        map_res(digit1, |s: &str| s.parse::<u64>().map(Literal::Int)),
    ))
    .parse(input)
}
