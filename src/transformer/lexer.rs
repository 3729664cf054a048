use std::iter::Peekable;
use std::ops::Range;
use std::str::CharIndices;

use crate::transformer::{SourceLocation, SyntaxError};

// Words after which a quote, `/` or `<` starts a new expression rather than
// continuing the previous one.
const EXPRESSION_KEYWORDS: [&str; 13] = [
    "return", "from", "import", "case", "typeof", "in", "of", "export", "default", "else",
    "yield", "await", "throw",
];

// Recorded as the previous character after a regex literal or a closed
// element. Like `)`, it ends a value: `/` then divides and quotes do not open
// strings.
const COMPLETE_VALUE: char = ')';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct MarkupTag {
    /// Elements open around this tag.
    depth: usize,
    closing: bool,
    self_closing: bool,
    /// Opened straight from code; it may still turn out to be a comparison or
    /// a type parameter list.
    root: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Code,
    LineComment,
    BlockComment(SourceLocation),
    Quoted(char),
    Template,
    Regex { in_class: bool },
    MarkupTag(MarkupTag),
    MarkupAttribute { quote: char, tag: MarkupTag },
    MarkupText { depth: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Frame {
    Delimiter(char),
    Template,
    Substitution,
    AttributeExpression(MarkupTag),
    ChildExpression { depth: usize },
}

impl Frame {
    fn opener(self) -> &'static str {
        match self {
            Frame::Delimiter('(') => "(",
            Frame::Delimiter('[') => "[",
            Frame::Template => "`",
            Frame::Substitution => "${",
            _ => "{",
        }
    }

    fn closer(self) -> char {
        match self {
            Frame::Delimiter('(') => ')',
            Frame::Delimiter('[') => ']',
            Frame::Template => '`',
            _ => '}',
        }
    }
}

/// What a lexing pass learned about one source file.
#[derive(Debug, Clone, Default)]
pub struct Lexed {
    /// Byte ranges outside comments, string, template and regex literals, and
    /// markup text, in source order.
    code: Vec<Range<usize>>,
    /// First delimiter problem found.
    error: Option<SyntaxError>,
}

impl Lexed {
    pub fn is_code(&self, offset: usize) -> bool {
        let index = self.code.partition_point(|range| range.end <= offset);
        self.code
            .get(index)
            .is_some_and(|range| range.contains(&offset))
    }

    pub fn into_result(self) -> Result<(), SyntaxError> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

/// Splits `source` into code and non-code and checks that `()`, `[]` and
/// `{}` balance.
///
/// Quotes, `/` and `<` only open a string, a regex literal or an element
/// where an expression may start, so apostrophes in markup text
/// (`<p>Don't</p>`) and divisions are left alone. Delimiters inside markup
/// text are not counted. With `markup` off, `<` is always an operator.
pub fn lex(source: &str, markup: bool) -> Lexed {
    Lexer {
        chars: source.char_indices().peekable(),
        markup,
        state: State::Code,
        stack: Vec::new(),
        previous: None,
        word: String::new(),
        in_word: false,
        line: 1,
        column: 0,
        lexed: Lexed::default(),
    }
    .run()
}

struct Lexer<'a> {
    chars: Peekable<CharIndices<'a>>,
    markup: bool,
    state: State,
    stack: Vec<(Frame, SourceLocation)>,
    previous: Option<char>,
    word: String,
    in_word: bool,
    line: usize,
    column: usize,
    lexed: Lexed,
}

impl Lexer<'_> {
    fn run(mut self) -> Lexed {
        while let Some((offset, current)) = self.chars.next() {
            self.advance(current);
            let here = SourceLocation {
                line: self.line,
                column: self.column,
            };
            let continues_word = self.in_word;
            self.in_word = false;
            self.step(offset, current, here, continues_word);
        }
        self.finish()
    }

    fn advance(&mut self, current: char) {
        if current == '\n' {
            self.line += 1;
            self.column = 0;
        } else {
            self.column += 1;
        }
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, c)| *c)
    }

    fn bump(&mut self) -> Option<char> {
        let (_, next) = self.chars.next()?;
        self.advance(next);
        Some(next)
    }

    fn fail(&mut self, message: impl Into<String>, position: Option<SourceLocation>) {
        if self.lexed.error.is_none() {
            self.lexed.error = Some(SyntaxError::new(message, position));
        }
    }

    fn step(&mut self, offset: usize, current: char, here: SourceLocation, continues_word: bool) {
        let state = self.state;
        match state {
            State::Code => self.code(offset, current, here, continues_word),
            State::LineComment => {
                if current == '\n' {
                    self.state = State::Code;
                }
            }
            State::BlockComment(_) => {
                if current == '*' && self.peek() == Some('/') {
                    self.bump();
                    self.state = State::Code;
                }
            }
            State::Quoted(quote) => match current {
                '\\' => {
                    self.bump();
                }
                '\n' => self.state = State::Code,
                c if c == quote => {
                    self.state = State::Code;
                    self.previous = Some(c);
                }
                _ => {}
            },
            State::Template => match current {
                '\\' => {
                    self.bump();
                }
                '`' => {
                    self.stack.pop();
                    self.state = State::Code;
                    self.previous = Some('`');
                }
                '$' if self.peek() == Some('{') => {
                    self.bump();
                    self.stack.push((Frame::Substitution, here));
                    self.state = State::Code;
                    self.previous = Some('{');
                }
                _ => {}
            },
            State::Regex { in_class } => match current {
                '\\' => {
                    self.bump();
                }
                // Regex literals never span lines.
                '\n' => self.state = State::Code,
                '[' => self.state = State::Regex { in_class: true },
                ']' => self.state = State::Regex { in_class: false },
                '/' if !in_class => {
                    self.state = State::Code;
                    self.previous = Some(COMPLETE_VALUE);
                }
                _ => {}
            },
            State::MarkupTag(tag) => self.markup_tag(offset, current, here, tag),
            State::MarkupAttribute { quote, tag } => {
                if current == quote {
                    self.state = State::MarkupTag(MarkupTag {
                        self_closing: false,
                        ..tag
                    });
                }
            }
            State::MarkupText { depth } => match current {
                '<' => {
                    let closing = self.peek() == Some('/');
                    if closing {
                        self.bump();
                    }
                    self.state = State::MarkupTag(MarkupTag {
                        depth,
                        closing,
                        self_closing: false,
                        root: false,
                    });
                }
                '{' => {
                    self.stack.push((Frame::ChildExpression { depth }, here));
                    self.state = State::Code;
                    self.previous = Some('{');
                }
                _ => {}
            },
        }
    }

    fn code(&mut self, offset: usize, current: char, here: SourceLocation, continues_word: bool) {
        let end = offset + current.len_utf8();
        if let Some(last) = self.lexed.code.last_mut().filter(|last| last.end == offset) {
            last.end = end;
        } else {
            self.lexed.code.push(offset..end);
        }

        match current {
            '/' if self.peek() == Some('/') => {
                self.bump();
                self.state = State::LineComment;
            }
            '/' if self.peek() == Some('*') => {
                self.bump();
                self.state = State::BlockComment(here);
            }
            '/' if self.previous != Some('<') && self.expression_may_start() => {
                self.state = State::Regex { in_class: false };
            }
            '\'' | '"' if self.expression_may_start() => {
                self.state = State::Quoted(current);
            }
            '`' => {
                self.stack.push((Frame::Template, here));
                self.state = State::Template;
            }
            '<' if self.markup
                && self.expression_may_start()
                && self
                    .peek()
                    .is_some_and(|next| next.is_alphabetic() || next == '>') =>
            {
                self.state = State::MarkupTag(MarkupTag {
                    depth: 0,
                    closing: false,
                    self_closing: false,
                    root: true,
                });
            }
            '(' | '[' | '{' => {
                self.stack.push((Frame::Delimiter(current), here));
                self.previous = Some(current);
            }
            ')' | ']' | '}' => {
                self.close(current, here);
                self.previous = Some(current);
            }
            c if c.is_whitespace() => {}
            c => {
                if is_identifier_char(c) {
                    if !continues_word {
                        self.word.clear();
                    }
                    self.word.push(c);
                    self.in_word = true;
                }
                self.previous = Some(c);
            }
        }
    }

    fn close(&mut self, current: char, here: SourceLocation) {
        let expected_opener = match current {
            ')' => '(',
            ']' => '[',
            _ => '{',
        };
        match self.stack.pop() {
            Some((Frame::Substitution, _)) if current == '}' => self.state = State::Template,
            Some((Frame::AttributeExpression(tag), _)) if current == '}' => {
                self.state = State::MarkupTag(tag);
            }
            Some((Frame::ChildExpression { depth }, _)) if current == '}' => {
                self.state = State::MarkupText { depth };
            }
            Some((Frame::Delimiter(opener), _)) if opener == expected_opener => {}
            Some((frame, opened_at)) => self.fail(
                format!(
                    "Expected '{}' to close '{}' opened at {} but found '{}'",
                    frame.closer(),
                    frame.opener(),
                    opened_at,
                    current
                ),
                Some(here),
            ),
            None => self.fail(format!("Unexpected '{current}'"), Some(here)),
        }
    }

    fn markup_tag(&mut self, offset: usize, current: char, here: SourceLocation, mut tag: MarkupTag) {
        match current {
            '>' => {
                let depth = if tag.closing {
                    tag.depth.saturating_sub(1)
                } else if tag.self_closing {
                    tag.depth
                } else {
                    tag.depth + 1
                };
                if depth == 0 {
                    self.state = State::Code;
                    self.previous = Some(COMPLETE_VALUE);
                } else {
                    self.state = State::MarkupText { depth };
                }
            }
            '/' => {
                tag.self_closing = true;
                self.state = State::MarkupTag(tag);
            }
            '{' => {
                tag.self_closing = false;
                self.stack.push((Frame::AttributeExpression(tag), here));
                self.state = State::Code;
                self.previous = Some('{');
            }
            '"' | '\'' => {
                self.state = State::MarkupAttribute {
                    quote: current,
                    tag,
                };
            }
            c if c.is_whitespace() => {}
            c if is_identifier_char(c) || matches!(c, '.' | ':' | '-' | '=') => {
                tag.self_closing = false;
                self.state = State::MarkupTag(tag);
            }
            c if tag.root && !tag.closing => {
                // `<T,>` and the like: not an element after all.
                self.state = State::Code;
                self.previous = Some('<');
                self.code(offset, c, here, false);
            }
            _ => {}
        }
    }

    fn expression_may_start(&self) -> bool {
        match self.previous {
            None => true,
            Some(c) if is_identifier_char(c) => EXPRESSION_KEYWORDS.contains(&self.word.as_str()),
            Some(')' | ']' | '}' | '\'' | '"' | '`') => false,
            Some(_) => true,
        }
    }

    fn finish(mut self) -> Lexed {
        match self.state {
            State::BlockComment(opened_at) => {
                self.fail("Unterminated block comment", Some(opened_at));
            }
            State::Template => {
                let opened_at = self.stack.last().map(|(_, at)| *at);
                self.fail("Unterminated template literal", opened_at);
            }
            _ => {}
        }
        if let Some((frame, opened_at)) = self.stack.pop() {
            self.fail(format!("Unclosed '{}'", frame.opener()), Some(opened_at));
        }
        self.lexed
    }
}

fn is_identifier_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}
