//! Parser for `{{ ... }}` template actions

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Arg {
    /// `.` or `.A.B`
    Field(Vec<String>),
    Str(String),
    Number(serde_json::Number),
    Bool(bool),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Command {
    Value(Arg),
    Call { function: Function, args: Vec<Arg> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Function {
    Default,
}

impl Function {
    fn lookup(name: &str) -> Option<Self> {
        match name {
            "default" => Some(Function::Default),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Segment {
    Text(String),
    /// Commands joined by `|`; each result feeds the next call as its last argument
    Pipeline(Vec<Command>),
}

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

pub(crate) fn parse(source: &str) -> Result<Vec<Segment>, String> {
    let mut segments = Vec::new();
    let mut rest = source;

    while let Some(start) = rest.find(OPEN) {
        let mut text = rest[..start].to_string();
        let mut inner = &rest[start + OPEN.len()..];
        if let Some(stripped) = inner.strip_prefix('-') {
            text = text.trim_end().to_string();
            inner = stripped;
        }
        if !text.is_empty() {
            segments.push(Segment::Text(text));
        }
        let end = inner
            .find(CLOSE)
            .ok_or_else(|| "unclosed action".to_string())?;
        let mut action = &inner[..end];
        let mut after = &inner[end + CLOSE.len()..];
        if let Some(stripped) = action.strip_suffix('-') {
            action = stripped;
            after = after.trim_start();
        }
        segments.push(Segment::Pipeline(parse_pipeline(action)?));
        rest = after;
    }

    if !rest.is_empty() {
        segments.push(Segment::Text(rest.to_string()));
    }
    Ok(segments)
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Arg(Arg),
    Ident(String),
    Pipe,
}

fn tokenize(action: &str) -> Result<Vec<Token>, String> {
    let chars: Vec<char> = action.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '|' => {
                tokens.push(Token::Pipe);
                i += 1;
            }
            '"' | '`' => {
                let quote = c;
                let mut out = String::new();
                i += 1;
                loop {
                    match chars.get(i) {
                        None => return Err("unterminated quoted string".to_string()),
                        Some('\\') if quote == '"' => {
                            match chars.get(i + 1) {
                                Some('n') => out.push('\n'),
                                Some('t') => out.push('\t'),
                                Some(other) => out.push(*other),
                                None => return Err("unterminated quoted string".to_string()),
                            }
                            i += 2;
                        }
                        Some(ch) if *ch == quote => {
                            i += 1;
                            break;
                        }
                        Some(ch) => {
                            out.push(*ch);
                            i += 1;
                        }
                    }
                }
                tokens.push(Token::Arg(Arg::Str(out)));
            }
            '.' => {
                let start = i;
                i += 1;
                while i < chars.len() && !chars[i].is_whitespace() && chars[i] != '|' {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                tokens.push(Token::Arg(Arg::Field(parse_field(&text)?)));
            }
            c if c.is_ascii_digit() || c == '-' => {
                let start = i;
                i += 1;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let number: serde_json::Number = serde_json::from_str(&text)
                    .map_err(|_| format!("bad number syntax: {}", text))?;
                tokens.push(Token::Arg(Arg::Number(number)));
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                tokens.push(match word.as_str() {
                    "true" => Token::Arg(Arg::Bool(true)),
                    "false" => Token::Arg(Arg::Bool(false)),
                    _ => Token::Ident(word),
                });
            }
            other => return Err(format!("unexpected {:?} in action", other)),
        }
    }
    Ok(tokens)
}

fn parse_field(text: &str) -> Result<Vec<String>, String> {
    if text == "." {
        return Ok(Vec::new());
    }
    let parts: Vec<String> = text[1..].split('.').map(str::to_string).collect();
    let valid = parts.iter().all(|p| {
        let mut chars = p.chars();
        chars
            .next()
            .is_some_and(|c| c.is_alphabetic() || c == '_')
            && chars.all(|c| c.is_alphanumeric() || c == '_')
    });
    if !valid {
        return Err(format!("bad field reference '{}'", text));
    }
    Ok(parts)
}

fn parse_pipeline(action: &str) -> Result<Vec<Command>, String> {
    let tokens = tokenize(action)?;
    if tokens.is_empty() {
        return Err("missing value for command".to_string());
    }
    let mut commands = Vec::new();
    for (idx, group) in tokens.split(|t| *t == Token::Pipe).enumerate() {
        let command = parse_command(group)?;
        if idx > 0 && matches!(command, Command::Value(_)) {
            return Err("non executable command in pipeline stage".to_string());
        }
        commands.push(command);
    }
    Ok(commands)
}

fn parse_command(tokens: &[Token]) -> Result<Command, String> {
    let Some((head, tail)) = tokens.split_first() else {
        return Err("missing command in pipeline".to_string());
    };
    let args = tail
        .iter()
        .map(|t| match t {
            Token::Arg(arg) => Ok(arg.clone()),
            Token::Ident(name) => Err(format!("function \"{}\" not defined", name)),
            Token::Pipe => Err("unexpected pipe".to_string()),
        })
        .collect::<Result<Vec<_>, _>>()?;

    match head {
        Token::Ident(name) => {
            let function =
                Function::lookup(name).ok_or_else(|| format!("function \"{}\" not defined", name))?;
            Ok(Command::Call { function, args })
        }
        Token::Arg(arg) if args.is_empty() => Ok(Command::Value(arg.clone())),
        Token::Arg(_) => Err("can't give argument to non-function".to_string()),
        Token::Pipe => Err("missing command in pipeline".to_string()),
    }
}
