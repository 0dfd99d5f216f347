// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Splits template source into text, comment, raw and directive spans.
//!
//! The lexer is a single pass over the source. Directive spans are tokenized
//! immediately with [`split_arguments`], so a [`ParseNode::Directive`] already
//! carries its name and raw argument strings. Failures are returned as
//! [`Diagnostic`]s rather than aborting, which lets [`scan`] hand them to a
//! [`ParseHandler`] that decides whether to keep going.

/// Characters that always form a token of their own inside a directive.
pub const RESERVED: &[char] = &['(', ')', '{', '}', ':', ','];

/// [`RESERVED`] plus `.`, used by the template parser by default.
pub const STRICT_RESERVED: &[char] = &['(', ')', '{', '}', ':', ',', '.'];

const COMMENT_OPEN: &str = "[!--";
const RAW_OPEN: &str = "[#--";
const BLOCK_CLOSE: &str = "--]";

/// Lexer output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseNode {
    /// Plain text between directives.
    Text {
        /// Span content without delimiters.
        text: String,
        /// Line the span starts on.
        line: usize,
    },
    /// `[!-- ... --]` block, dropped from output.
    Comment {
        /// Span content without delimiters.
        text: String,
        /// Line the span starts on.
        line: usize,
    },
    /// `[#-- ... --]` block, emitted verbatim.
    Raw {
        /// Span content without delimiters.
        text: String,
        /// Line the span starts on.
        line: usize,
    },
    /// `[name args...]`.
    Directive {
        /// First token, e.g. `list`.
        name: String,
        /// Remaining tokens, unparsed.
        args: Vec<String>,
        /// Text between the brackets.
        source: String,
        /// Line of the opening bracket.
        line: usize,
    },
}

impl ParseNode {
    /// Line the node starts on.
    pub fn line(&self) -> usize {
        match self {
            ParseNode::Text { line, .. }
            | ParseNode::Comment { line, .. }
            | ParseNode::Raw { line, .. }
            | ParseNode::Directive { line, .. } => *line,
        }
    }
}

/// A parse problem reported with the 1-based line it occurred on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// What went wrong.
    pub message: String,
    /// 1-based source line.
    pub line: usize,
}

impl Diagnostic {
    /// Diagnostic for `message` at `line`.
    pub fn new(message: impl Into<String>, line: usize) -> Self {
        Self {
            message: message.into(),
            line,
        }
    }
}

/// Answer of a [`ParseHandler`] callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Keep going.
    Continue,
    /// Abort the scan.
    Stop,
}

/// Receives lexer events in source order.
///
/// `end` is only called when the whole source was consumed; returning
/// [`Flow::Stop`] from any callback ends the scan immediately.
pub trait ParseHandler {
    /// Called once before the first node.
    fn start(&mut self) {}
    /// Plain text.
    fn text(&mut self, text: &str, line: usize) -> Flow;
    /// Comment content; ignored by default.
    fn comment(&mut self, _text: &str, _line: usize) -> Flow {
        Flow::Continue
    }
    /// Raw block content.
    fn raw(&mut self, text: &str, line: usize) -> Flow;
    /// A directive with its unparsed argument tokens.
    fn directive(&mut self, name: &str, args: &[String], line: usize) -> Flow;
    /// A lexing error.
    fn error(&mut self, message: &str, line: usize) -> Flow;
    /// Called after the last node.
    fn end(&mut self) {}
}

/// Drives a [`Lexer`] over `source`, forwarding every node to `handler`.
pub fn scan(source: &str, reserved: &[char], handler: &mut dyn ParseHandler) {
    handler.start();
    let mut lexer = Lexer::new(source, reserved);
    while let Some(next) = lexer.next_node() {
        let flow = match next {
            Ok(ParseNode::Text { text, line }) => handler.text(&text, line),
            Ok(ParseNode::Comment { text, line }) => handler.comment(&text, line),
            Ok(ParseNode::Raw { text, line }) => handler.raw(&text, line),
            Ok(ParseNode::Directive {
                name, args, line, ..
            }) => handler.directive(&name, &args, line),
            Err(diagnostic) => handler.error(&diagnostic.message, diagnostic.line),
        };
        if flow == Flow::Stop {
            return;
        }
    }
    handler.end();
}

/// Collects every node of `source`, or the first diagnostic.
pub fn tokenize(source: &str, reserved: &[char]) -> Result<Vec<ParseNode>, Diagnostic> {
    Lexer::new(source, reserved).collect()
}

/// Pull-based lexer with unbounded lookahead; see [`Lexer::next_node`].
pub struct Lexer<'r> {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    reserved: &'r [char],
}

impl<'r> Lexer<'r> {
    /// Lexer over `source`, splitting directive arguments on `reserved`.
    pub fn new(source: &str, reserved: &'r [char]) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            reserved,
        }
    }

    /// Returns the next node, a diagnostic for a malformed span (which is
    /// consumed), or `None` at end of input.
    pub fn next_node(&mut self) -> Option<Result<ParseNode, Diagnostic>> {
        if self.is_eof() {
            return None;
        }
        let line = self.line;
        let node = if self.starts_with(COMMENT_OPEN) {
            self.advance(COMMENT_OPEN.len());
            self.read_block(line, "Unterminated comment")
                .map(|text| ParseNode::Comment { text, line })
        } else if self.starts_with(RAW_OPEN) {
            self.advance(RAW_OPEN.len());
            self.read_block(line, "Unterminated raw block")
                .map(|text| ParseNode::Raw { text, line })
        } else if self.at_directive_start() {
            self.read_directive(line)
        } else {
            Ok(ParseNode::Text {
                text: self.read_text(),
                line,
            })
        };
        Some(node)
    }

    fn read_text(&mut self) -> String {
        let mut text = String::new();
        while let Some(ch) = self.peek_char() {
            if self.at_span_start() {
                break;
            }
            if ch == '\\' && matches!(self.peek_at(1), Some('[' | ']')) {
                self.bump_char();
            }
            if let Some(ch) = self.bump_char() {
                text.push(ch);
            }
        }
        text
    }

    fn read_block(&mut self, line: usize, unterminated: &str) -> Result<String, Diagnostic> {
        let mut text = String::new();
        loop {
            if self.starts_with(BLOCK_CLOSE) {
                self.advance(BLOCK_CLOSE.len());
                return Ok(text);
            }
            match self.bump_char() {
                Some(ch) => text.push(ch),
                None => return Err(Diagnostic::new(unterminated, line)),
            }
        }
    }

    fn read_directive(&mut self, line: usize) -> Result<ParseNode, Diagnostic> {
        self.bump_char(); // '['
        let mut source = String::new();
        let mut quote: Option<char> = None;
        let mut illegal: Option<Diagnostic> = None;

        loop {
            let Some(ch) = self.bump_char() else {
                return Err(Diagnostic::new("Unterminated directive", line));
            };
            match ch {
                '\\' => {
                    let escape_line = self.line;
                    let Some(next) = self.bump_char() else {
                        return Err(Diagnostic::new("Unterminated directive", line));
                    };
                    if !is_escapable(next) && illegal.is_none() {
                        illegal = Some(Diagnostic::new(
                            format!("Illegal escape sequence: \\{next}"),
                            escape_line,
                        ));
                    }
                    source.push(ch);
                    source.push(next);
                }
                '"' | '\'' => {
                    match quote {
                        None => quote = Some(ch),
                        Some(open) if open == ch => quote = None,
                        Some(_) => {}
                    }
                    source.push(ch);
                }
                ']' if quote.is_none() => break,
                _ => source.push(ch),
            }
        }

        if let Some(diagnostic) = illegal {
            return Err(diagnostic);
        }

        let mut tokens =
            split_arguments(&source, self.reserved).map_err(|msg| Diagnostic::new(msg, line))?;
        if tokens.is_empty() {
            return Err(Diagnostic::new("Empty directive", line));
        }
        let name = tokens.remove(0);
        Ok(ParseNode::Directive {
            name,
            args: tokens,
            source,
            line,
        })
    }

    fn at_span_start(&self) -> bool {
        self.starts_with(COMMENT_OPEN) || self.starts_with(RAW_OPEN) || self.at_directive_start()
    }

    fn at_directive_start(&self) -> bool {
        self.peek_char() == Some('[')
            && self
                .peek_at(1)
                .is_some_and(|ch| ch.is_alphabetic() || ch == '/' || ch == ']')
    }

    fn starts_with(&self, pattern: &str) -> bool {
        pattern
            .chars()
            .enumerate()
            .all(|(offset, expected)| self.peek_at(offset) == Some(expected))
    }

    fn advance(&mut self, count: usize) {
        for _ in 0..count {
            self.bump_char();
        }
    }

    fn bump_char(&mut self) -> Option<char> {
        let ch = *self.chars.get(self.pos)?;
        self.pos += 1;
        if ch == '\n' {
            self.line += 1;
        }
        Some(ch)
    }

    fn peek_char(&self) -> Option<char> {
        self.peek_at(0)
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn is_eof(&self) -> bool {
        self.pos >= self.chars.len()
    }
}

impl Iterator for Lexer<'_> {
    type Item = Result<ParseNode, Diagnostic>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_node()
    }
}

fn is_escapable(ch: char) -> bool {
    matches!(ch, '[' | ']' | '"' | '\'' | '\\')
}

/// Splits the inside of a directive into raw tokens.
///
/// Whitespace separates tokens and every `reserved` character is a token of
/// its own, except inside quotes. Quote characters stay part of the token so
/// that string literals can be recognised later; the other quote character is
/// literal inside a quoted run. `\[`, `\]`, `\"`, `\'` and `\\` yield the
/// escaped character.
pub fn split_arguments(input: &str, reserved: &[char]) -> Result<Vec<String>, String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut chars = input.chars();

    while let Some(ch) = chars.next() {
        match ch {
            '\\' => match chars.next() {
                Some(next) if is_escapable(next) => current.push(next),
                Some(next) => return Err(format!("Illegal escape sequence: \\{next}")),
                None => return Err("Illegal escape sequence at end of directive".to_string()),
            },
            '"' | '\'' => {
                match quote {
                    None => quote = Some(ch),
                    Some(open) if open == ch => quote = None,
                    Some(_) => {}
                }
                current.push(ch);
            }
            c if quote.is_none() && c.is_whitespace() => flush(&mut current, &mut tokens),
            c if quote.is_none() && reserved.contains(&c) => {
                flush(&mut current, &mut tokens);
                tokens.push(c.to_string());
            }
            c => current.push(c),
        }
    }
    flush(&mut current, &mut tokens);
    Ok(tokens)
}

fn flush(current: &mut String, tokens: &mut Vec<String>) {
    if !current.is_empty() {
        tokens.push(std::mem::take(current));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directive(name: &str, args: &[&str], source: &str, line: usize) -> ParseNode {
        ParseNode::Directive {
            name: name.into(),
            args: args.iter().map(|a| a.to_string()).collect(),
            source: source.into(),
            line,
        }
    }

    #[test]
    fn lexes_text_directives_comments_and_raw() {
        let nodes = tokenize("a [val x] b[!-- note --][#--[if]--]", STRICT_RESERVED).unwrap();
        assert_eq!(
            nodes,
            vec![
                ParseNode::Text {
                    text: "a ".into(),
                    line: 1
                },
                directive("val", &["x"], "val x", 1),
                ParseNode::Text {
                    text: " b".into(),
                    line: 1
                },
                ParseNode::Comment {
                    text: " note ".into(),
                    line: 1
                },
                ParseNode::Raw {
                    text: "[if]".into(),
                    line: 1
                },
            ]
        );
    }

    #[test]
    fn brackets_not_followed_by_a_name_are_text() {
        let nodes = tokenize("x[0] = [ 1 ]", STRICT_RESERVED).unwrap();
        assert_eq!(
            nodes,
            vec![ParseNode::Text {
                text: "x[0] = [ 1 ]".into(),
                line: 1
            }]
        );
    }

    #[test]
    fn escaped_brackets_in_text_are_literal() {
        let nodes = tokenize(r"\[if x\] and \n", STRICT_RESERVED).unwrap();
        assert_eq!(
            nodes,
            vec![ParseNode::Text {
                text: r"[if x] and \n".into(),
                line: 1
            }]
        );
    }

    #[test]
    fn reserved_characters_split_tokens_outside_quotes() {
        let tokens = split_arguments(r#"if (a,b) "x (y)" 'it''s'"#, RESERVED).unwrap();
        assert_eq!(
            tokens,
            vec!["if", "(", "a", ",", "b", ")", "\"x (y)\"", "'it''s'"]
        );
        let strict = split_arguments("val a.b", STRICT_RESERVED).unwrap();
        assert_eq!(strict, vec!["val", "a", ".", "b"]);
        let loose = split_arguments("val a.b", RESERVED).unwrap();
        assert_eq!(loose, vec!["val", "a.b"]);
    }

    #[test]
    fn alternate_quote_is_literal_inside_quotes() {
        let tokens = split_arguments(r#"val "it's ]" 'say "hi"'"#, RESERVED).unwrap();
        assert_eq!(tokens, vec!["val", "\"it's ]\"", "'say \"hi\"'"]);
    }

    #[test]
    fn directive_escapes_are_resolved() {
        let nodes = tokenize(r#"[val "a \"quoted\" \[x\] \\"]"#, STRICT_RESERVED).unwrap();
        assert_eq!(
            nodes,
            vec![directive(
                "val",
                &[r#""a "quoted" [x] \""#],
                r#"val "a \"quoted\" \[x\] \\""#,
                1
            )]
        );
    }

    #[test]
    fn directive_tokens_match_direct_splitting() {
        let inner = r#"list (items, "a b") 'c:d' { x } entry"#;
        let nodes = tokenize(&format!("[{inner}]"), RESERVED).unwrap();
        let ParseNode::Directive { name, args, .. } = &nodes[0] else {
            panic!("expected directive, got {:?}", nodes[0]);
        };
        let mut lexed = vec![name.clone()];
        lexed.extend(args.iter().cloned());

        let joined = split_arguments(inner, RESERVED).unwrap().join(" ");
        assert_eq!(lexed, split_arguments(&joined, RESERVED).unwrap());
    }

    #[test]
    fn quoted_bracket_does_not_close_directive() {
        let nodes = tokenize("[val ']'] tail", STRICT_RESERVED).unwrap();
        assert_eq!(nodes[0], directive("val", &["']'"], "val ']'", 1));
    }

    #[test]
    fn reports_illegal_escape_with_its_line() {
        let err = tokenize("[val\n\\q]", STRICT_RESERVED).unwrap_err();
        assert_eq!(err, Diagnostic::new("Illegal escape sequence: \\q", 2));
    }

    #[test]
    fn reports_unterminated_spans() {
        let err = tokenize("ok\n[if x", STRICT_RESERVED).unwrap_err();
        assert_eq!(err, Diagnostic::new("Unterminated directive", 2));

        let err = tokenize("[!-- open", STRICT_RESERVED).unwrap_err();
        assert_eq!(err.message, "Unterminated comment");

        let err = tokenize("[#-- open -]", STRICT_RESERVED).unwrap_err();
        assert_eq!(err.message, "Unterminated raw block");

        let err = tokenize("[val 'open]", STRICT_RESERVED).unwrap_err();
        assert_eq!(err.message, "Unterminated directive");
    }

    #[test]
    fn empty_directive_is_an_error() {
        let err = tokenize("a []", STRICT_RESERVED).unwrap_err();
        assert_eq!(err, Diagnostic::new("Empty directive", 1));
    }

    #[test]
    fn tracks_lines_across_spans() {
        let nodes = tokenize("one\ntwo [val x]\n[!--\n--]\n[endif]", STRICT_RESERVED).unwrap();
        let lines: Vec<_> = nodes.iter().map(ParseNode::line).collect();
        assert_eq!(lines, vec![1, 2, 2, 3, 4, 5]);
    }

    struct Recorder {
        events: Vec<String>,
        stop_on_error: bool,
    }

    impl ParseHandler for Recorder {
        fn start(&mut self) {
            self.events.push("start".into());
        }
        fn text(&mut self, text: &str, _line: usize) -> Flow {
            self.events.push(format!("text:{text}"));
            Flow::Continue
        }
        fn raw(&mut self, text: &str, _line: usize) -> Flow {
            self.events.push(format!("raw:{text}"));
            Flow::Continue
        }
        fn directive(&mut self, name: &str, args: &[String], _line: usize) -> Flow {
            self.events.push(format!("directive:{name}:{}", args.join("|")));
            Flow::Continue
        }
        fn error(&mut self, message: &str, line: usize) -> Flow {
            self.events.push(format!("error:{line}:{message}"));
            if self.stop_on_error {
                Flow::Stop
            } else {
                Flow::Continue
            }
        }
        fn end(&mut self) {
            self.events.push("end".into());
        }
    }

    #[test]
    fn scan_stops_on_error_when_asked() {
        let mut recorder = Recorder {
            events: Vec::new(),
            stop_on_error: true,
        };
        scan("a[]b[val x]", STRICT_RESERVED, &mut recorder);
        assert_eq!(
            recorder.events,
            vec!["start", "text:a", "error:1:Empty directive"]
        );
    }

    #[test]
    fn scan_can_continue_past_errors() {
        let mut recorder = Recorder {
            events: Vec::new(),
            stop_on_error: false,
        };
        scan("a[]b[val x y][!--c--]", STRICT_RESERVED, &mut recorder);
        assert_eq!(
            recorder.events,
            vec![
                "start",
                "text:a",
                "error:1:Empty directive",
                "text:b",
                "directive:val:x|y",
                "end"
            ]
        );
    }
}
