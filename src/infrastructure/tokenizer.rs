/// Python source tokenizer.
///
/// Produces the flat token stream consumed by the concrete-syntax parser:
/// NAME / NUMBER / STR / operator tokens plus the layout tokens NEWLINE,
/// INDENT, DEDENT and ENDMARKER. Layout follows the usual Python rules:
/// indentation is tracked with a column stack (tabs advance to the next
/// multiple of 8), logical lines continue implicitly inside brackets and
/// explicitly after a trailing backslash, and blank or comment-only lines
/// produce no tokens at all.

use crate::domain::cst::TokenKind;
use crate::domain::error::ParseError;

/// One lexed token. Layout tokens carry an empty text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Tok {
    pub(crate) kind: TokenKind,
    pub(crate) text: String,
    pub(crate) line: usize,
}

impl Tok {
    fn new(kind: TokenKind, text: impl Into<String>, line: usize) -> Self {
        Tok { kind, text: text.into(), line }
    }
}

/// Tokenize newline-terminated Python source.
///
/// Callers are expected to normalize line endings first; a missing final
/// newline is tolerated by synthesizing the closing NEWLINE token.
pub(crate) fn tokenize(source: &str) -> Result<Vec<Tok>, ParseError> {
    Scanner::new(source).run()
}

const THREE_CHAR_OPS: [&str; 4] = ["**=", "//=", ">>=", "<<="];
const TWO_CHAR_OPS: [&str; 19] = [
    "**", "//", ">>", "<<", "<=", ">=", "==", "!=", "->", "+=", "-=", "*=", "/=", "%=", "&=",
    "|=", "^=", "@=", ":=",
];

struct Scanner {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    paren_depth: usize,
    indents: Vec<usize>,
    at_line_start: bool,
    tokens: Vec<Tok>,
}

impl Scanner {
    fn new(source: &str) -> Self {
        Scanner {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            paren_depth: 0,
            indents: vec![0],
            at_line_start: true,
            tokens: Vec::new(),
        }
    }

    fn run(mut self) -> Result<Vec<Tok>, ParseError> {
        while self.pos < self.chars.len() {
            if self.at_line_start && self.paren_depth == 0 {
                self.measure_indent()?;
                if self.pos >= self.chars.len() {
                    break;
                }
            }
            self.scan_one()?;
        }

        // A file that does not end in a newline still closes its last
        // logical line.
        if self.paren_depth == 0 {
            if let Some(last) = self.tokens.last() {
                if last.kind != TokenKind::Newline {
                    self.tokens.push(Tok::new(TokenKind::Newline, "", self.line));
                }
            }
        }
        while self.indents.len() > 1 {
            self.indents.pop();
            self.tokens.push(Tok::new(TokenKind::Dedent, "", self.line));
        }
        self.tokens.push(Tok::new(TokenKind::EndMarker, "", self.line));
        Ok(self.tokens)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Layout
    // ═══════════════════════════════════════════════════════════════════════

    /// Measure the indentation of the next logical line and emit INDENT or
    /// DEDENT tokens. Blank and comment-only lines are swallowed whole so
    /// they never disturb the indent stack.
    fn measure_indent(&mut self) -> Result<(), ParseError> {
        loop {
            let mut col = 0usize;
            while let Some(&c) = self.chars.get(self.pos) {
                match c {
                    ' ' => col += 1,
                    '\t' => col = col / 8 * 8 + 8,
                    '\x0c' => col = 0,
                    _ => break,
                }
                self.pos += 1;
            }
            match self.chars.get(self.pos) {
                None => return Ok(()),
                Some('\n') => {
                    self.pos += 1;
                    self.line += 1;
                }
                Some('#') => {
                    while self.chars.get(self.pos).is_some_and(|&c| c != '\n') {
                        self.pos += 1;
                    }
                    if self.chars.get(self.pos) == Some(&'\n') {
                        self.pos += 1;
                        self.line += 1;
                    }
                }
                Some(_) => {
                    let top = self.indents.last().copied().unwrap_or(0);
                    if col > top {
                        self.indents.push(col);
                        self.tokens.push(Tok::new(TokenKind::Indent, "", self.line));
                    } else if col < top {
                        while self.indents.len() > 1
                            && self.indents.last().copied().unwrap_or(0) > col
                        {
                            self.indents.pop();
                            self.tokens.push(Tok::new(TokenKind::Dedent, "", self.line));
                        }
                        if self.indents.last().copied().unwrap_or(0) != col {
                            return Err(ParseError::new(
                                "unindent does not match any outer indentation level",
                                self.line,
                            ));
                        }
                    }
                    self.at_line_start = false;
                    return Ok(());
                }
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Token scanning
    // ═══════════════════════════════════════════════════════════════════════

    fn scan_one(&mut self) -> Result<(), ParseError> {
        let c = self.chars[self.pos];
        match c {
            ' ' | '\t' | '\x0c' => {
                self.pos += 1;
                Ok(())
            }
            '#' => {
                while self.chars.get(self.pos).is_some_and(|&c| c != '\n') {
                    self.pos += 1;
                }
                Ok(())
            }
            '\\' if self.chars.get(self.pos + 1) == Some(&'\n') => {
                self.pos += 2;
                self.line += 1;
                Ok(())
            }
            '\n' => {
                if self.paren_depth == 0 {
                    self.tokens.push(Tok::new(TokenKind::Newline, "", self.line));
                    self.at_line_start = true;
                }
                self.pos += 1;
                self.line += 1;
                Ok(())
            }
            '\'' | '"' => self.scan_string(self.pos),
            c if c.is_ascii_digit() => {
                self.scan_number();
                Ok(())
            }
            '.' => {
                if self.chars.get(self.pos + 1).is_some_and(|c| c.is_ascii_digit()) {
                    self.scan_number();
                } else if self.chars.get(self.pos + 1) == Some(&'.')
                    && self.chars.get(self.pos + 2) == Some(&'.')
                {
                    self.tokens.push(Tok::new(TokenKind::Ellipsis, "...", self.line));
                    self.pos += 3;
                } else {
                    self.tokens.push(Tok::new(TokenKind::Dot, ".", self.line));
                    self.pos += 1;
                }
                Ok(())
            }
            c if c.is_alphabetic() || c == '_' => self.scan_name(),
            _ => self.scan_operator(),
        }
    }

    fn scan_name(&mut self) -> Result<(), ParseError> {
        let start = self.pos;
        while self
            .chars
            .get(self.pos)
            .is_some_and(|&c| c.is_alphanumeric() || c == '_')
        {
            self.pos += 1;
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        let quote_follows = matches!(self.chars.get(self.pos), Some('\'') | Some('"'));
        if quote_follows && is_string_prefix(&text) {
            return self.scan_string(start);
        }
        self.tokens.push(Tok::new(TokenKind::Name, text, self.line));
        Ok(())
    }

    /// Scan a string literal. `start` points at the prefix (if any) so the
    /// token text preserves exactly what was written; the token line is the
    /// line the literal starts on, even for multi-line triple quotes.
    fn scan_string(&mut self, start: usize) -> Result<(), ParseError> {
        let start_line = self.line;
        let quote = self.chars[self.pos];
        let triple = self.chars.get(self.pos + 1) == Some(&quote)
            && self.chars.get(self.pos + 2) == Some(&quote);
        self.pos += if triple { 3 } else { 1 };

        loop {
            match self.chars.get(self.pos) {
                None => {
                    return Err(ParseError::new("unterminated string literal", start_line));
                }
                Some('\\') => {
                    // Backslash escapes the next character, including the
                    // closing quote and physical newlines.
                    self.pos += 1;
                    if let Some(&c) = self.chars.get(self.pos) {
                        if c == '\n' {
                            self.line += 1;
                        }
                        self.pos += 1;
                    }
                }
                Some('\n') => {
                    if !triple {
                        return Err(ParseError::new("unterminated string literal", self.line));
                    }
                    self.line += 1;
                    self.pos += 1;
                }
                Some(&c) if c == quote => {
                    if !triple {
                        self.pos += 1;
                        break;
                    }
                    if self.chars.get(self.pos + 1) == Some(&quote)
                        && self.chars.get(self.pos + 2) == Some(&quote)
                    {
                        self.pos += 3;
                        break;
                    }
                    self.pos += 1;
                }
                Some(_) => self.pos += 1,
            }
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        self.tokens.push(Tok::new(TokenKind::Str, text, start_line));
        Ok(())
    }

    fn scan_number(&mut self) {
        let start = self.pos;
        let radix_prefix = self.chars.get(self.pos) == Some(&'0')
            && matches!(
                self.chars.get(self.pos + 1),
                Some('x') | Some('X') | Some('o') | Some('O') | Some('b') | Some('B')
            );
        if radix_prefix {
            self.pos += 2;
            while self
                .chars
                .get(self.pos)
                .is_some_and(|&c| c.is_ascii_hexdigit() || c == '_')
            {
                self.pos += 1;
            }
        } else {
            self.eat_digits();
            if self.chars.get(self.pos) == Some(&'.') {
                self.pos += 1;
                self.eat_digits();
            }
            if self.exponent_follows() {
                self.pos += 1;
                if matches!(self.chars.get(self.pos), Some('+') | Some('-')) {
                    self.pos += 1;
                }
                self.eat_digits();
            }
        }
        if matches!(self.chars.get(self.pos), Some('j') | Some('J')) {
            self.pos += 1;
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        self.tokens.push(Tok::new(TokenKind::Number, text, self.line));
    }

    fn eat_digits(&mut self) {
        while self
            .chars
            .get(self.pos)
            .is_some_and(|&c| c.is_ascii_digit() || c == '_')
        {
            self.pos += 1;
        }
    }

    fn exponent_follows(&self) -> bool {
        if !matches!(self.chars.get(self.pos), Some('e') | Some('E')) {
            return false;
        }
        let mut at = self.pos + 1;
        if matches!(self.chars.get(at), Some('+') | Some('-')) {
            at += 1;
        }
        self.chars.get(at).is_some_and(|c| c.is_ascii_digit())
    }

    fn scan_operator(&mut self) -> Result<(), ParseError> {
        let c0 = self.chars[self.pos];
        let c1 = self.chars.get(self.pos + 1).copied().unwrap_or('\0');
        let c2 = self.chars.get(self.pos + 2).copied().unwrap_or('\0');

        let three: String = [c0, c1, c2].into_iter().collect();
        if THREE_CHAR_OPS.contains(&three.as_str()) {
            self.tokens.push(Tok::new(TokenKind::Op, three, self.line));
            self.pos += 3;
            return Ok(());
        }
        let two: String = [c0, c1].into_iter().collect();
        if TWO_CHAR_OPS.contains(&two.as_str()) {
            self.tokens.push(Tok::new(TokenKind::Op, two, self.line));
            self.pos += 2;
            return Ok(());
        }

        let kind = match c0 {
            '(' => TokenKind::Lpar,
            ')' => TokenKind::Rpar,
            '[' => TokenKind::Lsqb,
            ']' => TokenKind::Rsqb,
            '{' => TokenKind::Lbrace,
            '}' => TokenKind::Rbrace,
            ',' => TokenKind::Comma,
            ':' => TokenKind::Colon,
            ';' => TokenKind::Semi,
            '@' => TokenKind::At,
            '=' => TokenKind::Equal,
            '+' | '-' | '*' | '/' | '%' | '&' | '|' | '^' | '~' | '<' | '>' => TokenKind::Op,
            other => {
                return Err(ParseError::new(
                    format!("unexpected character {other:?}"),
                    self.line,
                ));
            }
        };
        match kind {
            TokenKind::Lpar | TokenKind::Lsqb | TokenKind::Lbrace => self.paren_depth += 1,
            TokenKind::Rpar | TokenKind::Rsqb | TokenKind::Rbrace => {
                self.paren_depth = self.paren_depth.saturating_sub(1);
            }
            _ => {}
        }
        self.tokens.push(Tok::new(kind, c0.to_string(), self.line));
        self.pos += 1;
        Ok(())
    }
}

/// Recognized string literal prefixes (`r`, `b`, `u`, `f` and two-letter
/// combinations thereof, any case).
fn is_string_prefix(text: &str) -> bool {
    !text.is_empty()
        && text.len() <= 2
        && text
            .chars()
            .all(|c| matches!(c.to_ascii_lowercase(), 'r' | 'b' | 'u' | 'f'))
}
