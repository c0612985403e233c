//! Parser for the ex-command subset understood by [`MemoryHost`].
//!
//! Only the commands bufsync itself issues (plus the handful tests use to set
//! up window layouts) are recognized. Errors carry host-style `E` codes.
//!
//! [`MemoryHost`]: super::MemoryHost

use super::BufNr;

/// One command of a `|`-separated command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Invocation {
    /// `noautocmd` modifier was given.
    pub noautocmd: bool,
    pub command: Command,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Command {
    /// `:edit[!] [name]`
    Edit { bang: bool, name: Option<String> },
    /// `:split [name]` / `:vsplit [name]`
    Split { name: Option<String> },
    /// `:new`
    New,
    /// `:tabedit [name]`
    TabEdit { name: Option<String> },
    /// `:close`
    Close,
    /// `:buffer N`
    Buffer(BufNr),
    /// `:call f(...)`
    Call(Expr),
    /// `:augroup NAME`, `END` closes the block.
    Augroup(String),
    /// `:autocmd! [group] [event] [pattern]`
    AutocmdRemove {
        group: Option<String>,
        event: Option<String>,
        pattern: Option<String>,
    },
    /// `:autocmd [group] event pattern command`
    Autocmd {
        group: Option<String>,
        event: String,
        pattern: String,
        command: String,
    },
    /// `:setlocal {setting}...`
    SetLocal(Vec<Setting>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Setting {
    Enable(String),
    Disable(String),
    Assign(String, String),
}

/// Expression accepted as a `:call` argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Expr {
    Number(i64),
    String(String),
    Call(String, Vec<Expr>),
}

const MODIFIERS: &[&str] = &[
    "silent!", "silent", "sil", "noautocmd", "noa", "keepalt", "keepjumps", "keepj", "keepmarks",
];

const BOOLEAN_OPTIONS: &[&str] = &["modifiable", "ma", "modified", "mod", "bomb", "endofline", "eol"];

/// Parse a full command line.
pub(crate) fn parse(line: &str) -> Result<Vec<Invocation>, String> {
    let mut invocations = Vec::new();
    let mut rest = line.trim_start();

    while !rest.is_empty() {
        let (invocation, remainder) = parse_one(rest)?;
        if let Some(invocation) = invocation {
            invocations.push(invocation);
        }
        rest = remainder.trim_start();
    }

    Ok(invocations)
}

/// Parse one command, returning what follows its `|` separator.
fn parse_one(input: &str) -> Result<(Option<Invocation>, &str), String> {
    let mut noautocmd = false;
    let mut text = input.trim_start();

    loop {
        let word = text.split_whitespace().next().unwrap_or("");
        if !MODIFIERS.contains(&word) {
            break;
        }
        if word == "noautocmd" || word == "noa" {
            noautocmd = true;
        }
        text = text[word.len()..].trim_start();
    }

    let name_len = text
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(text.len());
    let name = &text[..name_len];
    let mut after = &text[name_len..];
    let bang = after.starts_with('!');
    if bang {
        after = &after[1..];
    }

    // autocmd takes the rest of the line, separators included
    if matches!(name, "autocmd" | "au") {
        let command = parse_autocmd(bang, after.trim())?;
        return Ok((Some(Invocation { noautocmd, command }), ""));
    }

    let (args, remainder) = split_bar(after);
    let args = args.trim();

    if name.is_empty() {
        return if args.is_empty() {
            Ok((None, remainder))
        } else {
            Err(format!("E492: Not an editor command: {}", text.trim()))
        };
    }

    let arg = (!args.is_empty()).then(|| args.to_string());
    let command = match name {
        "e" | "edit" => Command::Edit { bang, name: arg },
        "sp" | "split" | "vs" | "vsplit" => Command::Split { name: arg },
        "new" => Command::New,
        "tabe" | "tabedit" => Command::TabEdit { name: arg },
        "clo" | "close" => Command::Close,
        "b" | "buffer" => {
            let bufnr = args
                .parse::<BufNr>()
                .map_err(|_| format!("E94: No matching buffer for {}", args))?;
            Command::Buffer(bufnr)
        }
        "call" => Command::Call(parse_expr(args)?),
        "aug" | "augroup" => {
            if args.is_empty() {
                return Err("E471: Argument required".to_string());
            }
            Command::Augroup(args.to_string())
        }
        "setl" | "setlocal" => Command::SetLocal(parse_settings(args)?),
        _ => return Err(format!("E492: Not an editor command: {}", text.trim())),
    };

    Ok((Some(Invocation { noautocmd, command }), remainder))
}

/// Split at the first `|` outside quotes.
fn split_bar(input: &str) -> (&str, &str) {
    let mut quote: Option<char> = None;
    for (i, c) in input.char_indices() {
        match (quote, c) {
            (None, '|') => return (&input[..i], &input[i + 1..]),
            (None, '\'' | '"') => quote = Some(c),
            (Some(q), c) if c == q => quote = None,
            _ => {}
        }
    }
    (input, "")
}

fn is_event(word: &str) -> bool {
    word == "*" || word.starts_with("Buf") || word.starts_with("File")
}

fn parse_autocmd(remove: bool, args: &str) -> Result<Command, String> {
    fn next_word(rest: &mut &str) -> Option<String> {
        let trimmed = rest.trim_start();
        if trimmed.is_empty() {
            return None;
        }
        let end = trimmed.find(char::is_whitespace).unwrap_or(trimmed.len());
        let word = trimmed[..end].to_string();
        *rest = &trimmed[end..];
        Some(word)
    }

    let mut rest = args;
    let mut first = next_word(&mut rest);
    let mut group = None;
    if first.as_deref().is_some_and(|word| !is_event(word)) {
        group = first.take();
        first = next_word(&mut rest);
    }

    if remove {
        let pattern = next_word(&mut rest);
        return Ok(Command::AutocmdRemove {
            group,
            event: first,
            pattern,
        });
    }

    let event = first.ok_or_else(|| "E471: Argument required".to_string())?;
    let pattern = next_word(&mut rest).ok_or_else(|| "E471: Argument required".to_string())?;
    let command = rest.trim().to_string();
    if command.is_empty() {
        return Err("E471: Argument required".to_string());
    }

    Ok(Command::Autocmd {
        group,
        event,
        pattern,
        command,
    })
}

fn parse_settings(args: &str) -> Result<Vec<Setting>, String> {
    if args.is_empty() {
        return Err("E471: Argument required".to_string());
    }
    Ok(args
        .split_whitespace()
        .map(|item| match item.split_once('=') {
            Some((name, value)) => Setting::Assign(name.to_string(), value.to_string()),
            None => match item.strip_prefix("no") {
                Some(name) if BOOLEAN_OPTIONS.contains(&name) => Setting::Disable(name.to_string()),
                _ => Setting::Enable(item.to_string()),
            },
        })
        .collect())
}

/// Parse a `:call` argument such as `setbufline(3, 1, getbufvar(3, 'x'))`.
pub(crate) fn parse_expr(input: &str) -> Result<Expr, String> {
    let mut parser = ExprParser { src: input, pos: 0 };
    let expr = parser.expr()?;
    parser.skip_ws();
    if parser.pos != input.len() {
        return Err(format!("E488: Trailing characters: {}", &input[parser.pos..]));
    }
    Ok(expr)
}

struct ExprParser<'a> {
    src: &'a str,
    pos: usize,
}

impl ExprParser<'_> {
    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn expect(&mut self, expected: char) -> Result<(), String> {
        self.skip_ws();
        match self.bump() {
            Some(c) if c == expected => Ok(()),
            _ => Err(format!("E116: Invalid arguments: {}", self.src)),
        }
    }

    fn expr(&mut self) -> Result<Expr, String> {
        self.skip_ws();
        match self.peek() {
            Some(c) if c.is_ascii_digit() || c == '-' => self.number(),
            Some('\'') => self.single_quoted(),
            Some('"') => self.double_quoted(),
            Some(c) if c.is_ascii_alphabetic() || c == '_' => self.call(),
            _ => Err(format!("E15: Invalid expression: {}", &self.src[self.pos..])),
        }
    }

    fn number(&mut self) -> Result<Expr, String> {
        let start = self.pos;
        if self.peek() == Some('-') {
            self.bump();
        }
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.bump();
        }
        self.src[start..self.pos]
            .parse()
            .map(Expr::Number)
            .map_err(|_| format!("E15: Invalid expression: {}", &self.src[start..]))
    }

    fn single_quoted(&mut self) -> Result<Expr, String> {
        self.bump();
        let mut value = String::new();
        loop {
            match self.bump() {
                Some('\'') if self.peek() == Some('\'') => {
                    self.bump();
                    value.push('\'');
                }
                Some('\'') => return Ok(Expr::String(value)),
                Some(c) => value.push(c),
                None => return Err(format!("E115: Missing quote: {}", self.src)),
            }
        }
    }

    fn double_quoted(&mut self) -> Result<Expr, String> {
        self.bump();
        let mut value = String::new();
        loop {
            match self.bump() {
                Some('\\') => match self.bump() {
                    Some('n') => value.push('\n'),
                    Some('r') => value.push('\r'),
                    Some('t') => value.push('\t'),
                    Some(c) => value.push(c),
                    None => return Err(format!("E114: Missing quote: {}", self.src)),
                },
                Some('"') => return Ok(Expr::String(value)),
                Some(c) => value.push(c),
                None => return Err(format!("E114: Missing quote: {}", self.src)),
            }
        }
    }

    fn call(&mut self) -> Result<Expr, String> {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_' || c == '#')
        {
            self.bump();
        }
        let name = self.src[start..self.pos].to_string();

        self.expect('(')?;
        let mut args = Vec::new();
        self.skip_ws();
        if self.peek() == Some(')') {
            self.bump();
            return Ok(Expr::Call(name, args));
        }
        loop {
            args.push(self.expr()?);
            self.skip_ws();
            match self.bump() {
                Some(',') => continue,
                Some(')') => return Ok(Expr::Call(name, args)),
                _ => return Err(format!("E116: Invalid arguments for function {}", name)),
            }
        }
    }
}
