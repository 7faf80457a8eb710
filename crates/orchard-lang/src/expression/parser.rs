//! Recursive-descent parser producing the expression tree

use regex::Regex;

use super::Value;
use super::lexer::{Op, Token};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BinOp {
    And,
    Or,
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

#[derive(Debug)]
pub(crate) enum Pattern {
    Compiled(Regex),
    Dynamic(Box<Node>),
}

#[derive(Debug)]
pub(crate) enum Node {
    Literal(Value),
    Param(Vec<String>),
    Not(Box<Node>),
    Neg(Box<Node>),
    Binary(BinOp, Box<Node>, Box<Node>),
    Match {
        subject: Box<Node>,
        pattern: Pattern,
        negated: bool,
    },
    In(Vec<Node>),
}

pub(crate) fn parse(tokens: Vec<Token>) -> Result<Node, String> {
    if tokens.is_empty() {
        return Err("empty expression".to_string());
    }
    let mut parser = Parser { tokens, pos: 0 };
    let node = parser.or()?;
    match parser.peek() {
        None => Ok(node),
        Some(t) => Err(format!("unexpected token {:?}", t)),
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn eat_op(&mut self, op: Op) -> bool {
        if self.peek() == Some(&Token::Op(op)) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn or(&mut self) -> Result<Node, String> {
        let mut left = self.and()?;
        while self.eat_op(Op::Or) {
            let right = self.and()?;
            left = Node::Binary(BinOp::Or, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and(&mut self) -> Result<Node, String> {
        let mut left = self.comparison()?;
        while self.eat_op(Op::And) {
            let right = self.comparison()?;
            left = Node::Binary(BinOp::And, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn comparison(&mut self) -> Result<Node, String> {
        let left = self.additive()?;
        let op = match self.peek() {
            Some(Token::Op(op)) => *op,
            _ => return Ok(left),
        };
        let bin = match op {
            Op::Eq => BinOp::Eq,
            Op::Ne => BinOp::Ne,
            Op::Gt => BinOp::Gt,
            Op::Ge => BinOp::Ge,
            Op::Lt => BinOp::Lt,
            Op::Le => BinOp::Le,
            Op::Match | Op::NotMatch => {
                self.pos += 1;
                let right = self.additive()?;
                let pattern = match right {
                    Node::Literal(Value::Str(ref s)) => Pattern::Compiled(
                        Regex::new(s).map_err(|e| format!("invalid regex '{}': {}", s, e))?,
                    ),
                    other => Pattern::Dynamic(Box::new(other)),
                };
                return Ok(Node::Match {
                    subject: Box::new(left),
                    pattern,
                    negated: op == Op::NotMatch,
                });
            }
            _ => return Ok(left),
        };
        self.pos += 1;
        let right = self.additive()?;
        Ok(Node::Binary(bin, Box::new(left), Box::new(right)))
    }

    fn additive(&mut self) -> Result<Node, String> {
        let mut left = self.multiplicative()?;
        loop {
            let op = if self.eat_op(Op::Plus) {
                BinOp::Add
            } else if self.eat_op(Op::Minus) {
                BinOp::Sub
            } else {
                return Ok(left);
            };
            let right = self.multiplicative()?;
            left = Node::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn multiplicative(&mut self) -> Result<Node, String> {
        let mut left = self.unary()?;
        loop {
            let op = if self.eat_op(Op::Star) {
                BinOp::Mul
            } else if self.eat_op(Op::Slash) {
                BinOp::Div
            } else if self.eat_op(Op::Percent) {
                BinOp::Rem
            } else {
                return Ok(left);
            };
            let right = self.unary()?;
            left = Node::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn unary(&mut self) -> Result<Node, String> {
        if self.eat_op(Op::Not) {
            return Ok(Node::Not(Box::new(self.unary()?)));
        }
        if self.eat_op(Op::Minus) {
            return Ok(Node::Neg(Box::new(self.unary()?)));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Node, String> {
        match self.next() {
            Some(Token::Number(n)) => Ok(Node::Literal(Value::Number(n))),
            Some(Token::Str(s)) => Ok(Node::Literal(Value::Str(s))),
            Some(Token::True) => Ok(Node::Literal(Value::Bool(true))),
            Some(Token::False) => Ok(Node::Literal(Value::Bool(false))),
            Some(Token::LParen) => {
                let inner = self.or()?;
                match self.next() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err("unbalanced parenthesis".to_string()),
                }
            }
            Some(Token::Ident(path)) => {
                if self.peek() != Some(&Token::LParen) {
                    return Ok(Node::Param(path));
                }
                self.pos += 1;
                let name = path.join(".");
                let args = self.arguments()?;
                match name.as_str() {
                    "in" => Ok(Node::In(args)),
                    other => Err(format!("unknown function '{}'", other)),
                }
            }
            Some(t) => Err(format!("unexpected token {:?}", t)),
            None => Err("unexpected end of expression".to_string()),
        }
    }

    fn arguments(&mut self) -> Result<Vec<Node>, String> {
        let mut args = Vec::new();
        if self.peek() == Some(&Token::RParen) {
            self.pos += 1;
            return Ok(args);
        }
        loop {
            args.push(self.or()?);
            match self.next() {
                Some(Token::Comma) => continue,
                Some(Token::RParen) => return Ok(args),
                _ => return Err("expected ',' or ')' in function arguments".to_string()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::lexer::tokenize;

    fn parse_str(source: &str) -> Result<Node, String> {
        parse(tokenize(source)?)
    }

    #[test]
    fn test_precedence_binds_and_tighter_than_or() {
        let node = parse_str("a || b && c").unwrap();
        match node {
            Node::Binary(BinOp::Or, _, right) => {
                assert!(matches!(*right, Node::Binary(BinOp::And, _, _)));
            }
            other => panic!("unexpected tree: {:?}", other),
        }
    }

    #[test]
    fn test_trailing_comma_in_call_is_rejected() {
        assert!(parse_str("in(a, )").is_err());
    }

    #[test]
    fn test_unbalanced_parenthesis_is_rejected() {
        assert!(parse_str("(5 + 10 > 9").is_err());
    }

    #[test]
    fn test_invalid_literal_regex_is_rejected_at_compile_time() {
        assert!(parse_str("a =~ '('").is_err());
    }
}
