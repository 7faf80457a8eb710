//! Tokenizer for label expressions

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Number(f64),
    Str(String),
    /// Identifier, possibly dotted (`claim.Labels.team`)
    Ident(Vec<String>),
    True,
    False,
    LParen,
    RParen,
    Comma,
    Op(Op),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Op {
    And,
    Or,
    Not,
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    Match,
    NotMatch,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
}

pub(crate) fn tokenize(source: &str) -> Result<Vec<Token>, String> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
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
            '\'' | '"' => {
                let (s, next) = read_string(&chars, i)?;
                tokens.push(Token::Str(s));
                i = next;
            }
            c if c.is_ascii_digit() => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let n = text
                    .parse::<f64>()
                    .map_err(|_| format!("invalid number '{}'", text))?;
                tokens.push(Token::Number(n));
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len()
                    && (chars[i].is_alphanumeric() || matches!(chars[i], '_' | '-' | '.'))
                {
                    // a '-' only belongs to the identifier when followed by another identifier char
                    if chars[i] == '-'
                        && !chars
                            .get(i + 1)
                            .is_some_and(|n| n.is_alphanumeric() || *n == '_')
                    {
                        break;
                    }
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                tokens.push(match text.as_str() {
                    "true" => Token::True,
                    "false" => Token::False,
                    _ => {
                        let parts: Vec<String> = text.split('.').map(str::to_string).collect();
                        if parts.iter().any(|p| p.is_empty()) {
                            return Err(format!("invalid accessor '{}'", text));
                        }
                        Token::Ident(parts)
                    }
                });
            }
            _ => {
                let (op, width) = read_operator(&chars, i)?;
                tokens.push(Token::Op(op));
                i += width;
            }
        }
    }

    Ok(tokens)
}

fn read_string(chars: &[char], start: usize) -> Result<(String, usize), String> {
    let quote = chars[start];
    let mut out = String::new();
    let mut i = start + 1;
    while i < chars.len() {
        match chars[i] {
            '\\' if i + 1 < chars.len() => {
                out.push(match chars[i + 1] {
                    'n' => '\n',
                    't' => '\t',
                    other => other,
                });
                i += 2;
            }
            c if c == quote => return Ok((out, i + 1)),
            c => {
                out.push(c);
                i += 1;
            }
        }
    }
    Err("unclosed string literal".to_string())
}

fn read_operator(chars: &[char], i: usize) -> Result<(Op, usize), String> {
    let next = chars.get(i + 1).copied();
    let op = match (chars[i], next) {
        ('&', Some('&')) => (Op::And, 2),
        ('|', Some('|')) => (Op::Or, 2),
        ('=', Some('=')) => (Op::Eq, 2),
        ('=', Some('~')) => (Op::Match, 2),
        ('!', Some('=')) => (Op::Ne, 2),
        ('!', Some('~')) => (Op::NotMatch, 2),
        ('!', _) => (Op::Not, 1),
        ('>', Some('=')) => (Op::Ge, 2),
        ('>', _) => (Op::Gt, 1),
        ('<', Some('=')) => (Op::Le, 2),
        ('<', _) => (Op::Lt, 1),
        ('+', _) => (Op::Plus, 1),
        ('-', _) => (Op::Minus, 1),
        ('*', _) => (Op::Star, 1),
        ('/', _) => (Op::Slash, 1),
        ('%', _) => (Op::Percent, 1),
        (c, _) => return Err(format!("unexpected character '{}'", c)),
    };
    Ok(op)
}
