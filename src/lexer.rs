use std::{iter::Peekable, str::CharIndices};

use crate::token::{Keyword, Op, Punct, Token, TokenKind};

/// Tolerant scanner for the dialect. Lexing never fails: characters that
/// do not start any token are dropped, unterminated strings run to end of
/// input, and the stream always ends with a single `Eof` token.
pub struct Lexer<'a> {
    input: &'a str,
    chars: Peekable<CharIndices<'a>>,
    line: usize,
    col: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.char_indices().peekable(),
            line: 1,
            col: 1,
        }
    }

    pub fn next_token(&mut self) -> Token<'a> {
        loop {
            let (start_idx, ch) = match self.chars.peek() {
                Some(&(idx, c)) => (idx, c),
                None => return Token::new(TokenKind::Eof, self.line, self.col),
            };
            let start_line = self.line;
            let start_col = self.col;

            match ch {
                '\r' => {
                    self.advance_char();
                    if matches!(self.chars.peek(), Some(&(_, '\n'))) {
                        self.advance_char();
                    } else {
                        // Bare carriage return still separates statements.
                        self.line += 1;
                        self.col = 1;
                    }
                    return Token::new(TokenKind::Newline, start_line, start_col);
                }
                '\n' => {
                    self.advance_char();
                    return Token::new(TokenKind::Newline, start_line, start_col);
                }
                ' ' | '\t' => {
                    self.advance_char();
                }
                '\'' => return self.read_comment(start_idx, start_line, start_col),
                '"' => return self.read_string(start_idx, start_line, start_col),
                c if c.is_ascii_digit() => {
                    return self.read_number(start_idx, start_line, start_col);
                }
                '.' if self.second_char_is_digit() => {
                    return self.read_number(start_idx, start_line, start_col);
                }
                c if c.is_ascii_alphabetic() || c == '_' => {
                    return self.read_word(start_idx, start_line, start_col);
                }
                '<' => {
                    self.advance_char();
                    let op = match self.chars.peek() {
                        Some(&(_, '>')) => {
                            self.advance_char();
                            Op::Ne
                        }
                        Some(&(_, '=')) => {
                            self.advance_char();
                            Op::Le
                        }
                        _ => Op::Lt,
                    };
                    return Token::new(TokenKind::Operator(op), start_line, start_col);
                }
                '>' => {
                    self.advance_char();
                    let op = if matches!(self.chars.peek(), Some(&(_, '='))) {
                        self.advance_char();
                        Op::Ge
                    } else {
                        Op::Gt
                    };
                    return Token::new(TokenKind::Operator(op), start_line, start_col);
                }
                '=' | '+' | '-' | '*' | '/' | '\\' | '^' | '&' => {
                    self.advance_char();
                    let op = match ch {
                        '=' => Op::Eq,
                        '+' => Op::Plus,
                        '-' => Op::Minus,
                        '*' => Op::Star,
                        '/' => Op::Slash,
                        '\\' => Op::Backslash,
                        '^' => Op::Caret,
                        _ => Op::Amp,
                    };
                    return Token::new(TokenKind::Operator(op), start_line, start_col);
                }
                '(' | ')' | ',' | '.' => {
                    self.advance_char();
                    let punct = match ch {
                        '(' => Punct::LParen,
                        ')' => Punct::RParen,
                        ',' => Punct::Comma,
                        _ => Punct::Dot,
                    };
                    return Token::new(TokenKind::Punct(punct), start_line, start_col);
                }
                // Anything else is dropped silently so stray characters in
                // student scripts never abort tokenization.
                _ => {
                    self.advance_char();
                }
            }
        }
    }

    fn read_comment(&mut self, start: usize, line: usize, col: usize) -> Token<'a> {
        while let Some(&(_, c)) = self.chars.peek() {
            if c == '\n' || c == '\r' {
                break;
            }
            self.advance_char();
        }
        let end = self.current_index();
        Token::new(TokenKind::Comment(&self.input[start..end]), line, col)
    }

    fn read_string(&mut self, start: usize, line: usize, col: usize) -> Token<'a> {
        self.advance_char(); // opening quote
        let content_start = start + 1;
        while let Some(&(_, c)) = self.chars.peek() {
            if c == '"' {
                break;
            }
            self.advance_char();
        }
        let content_end = self.current_index();
        if matches!(self.chars.peek(), Some(&(_, '"'))) {
            self.advance_char();
        }
        Token::new(
            TokenKind::Str(&self.input[content_start..content_end]),
            line,
            col,
        )
    }

    fn read_number(&mut self, start: usize, line: usize, col: usize) -> Token<'a> {
        let mut seen_dot = matches!(self.chars.peek(), Some(&(_, '.')));
        self.advance_char();
        while let Some(&(_, c)) = self.chars.peek() {
            if c.is_ascii_digit() {
                self.advance_char();
            } else if c == '.' && !seen_dot {
                seen_dot = true;
                self.advance_char();
            } else {
                break;
            }
        }
        let end = self.current_index();
        Token::new(TokenKind::Number(&self.input[start..end]), line, col)
    }

    fn read_word(&mut self, start: usize, line: usize, col: usize) -> Token<'a> {
        self.advance_char();
        while let Some(&(_, c)) = self.chars.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                self.advance_char();
            } else {
                break;
            }
        }
        let end = self.current_index();
        let word = &self.input[start..end];
        let kind = match Keyword::from_lower(&word.to_ascii_lowercase()) {
            Some(keyword) => TokenKind::Keyword(keyword),
            None => TokenKind::Identifier(word),
        };
        Token::new(kind, line, col)
    }

    fn second_char_is_digit(&self) -> bool {
        self.chars
            .clone()
            .nth(1)
            .is_some_and(|(_, c)| c.is_ascii_digit())
    }

    fn advance_char(&mut self) -> Option<(usize, char)> {
        let next = self.chars.next();
        if let Some((_, c)) = next {
            if c == '\n' {
                self.line += 1;
                self.col = 1;
            } else {
                self.col += 1;
            }
        }
        next
    }

    fn current_index(&mut self) -> usize {
        self.chars
            .peek()
            .map(|&(idx, _)| idx)
            .unwrap_or(self.input.len())
    }
}

/// Tokenize a whole source text, including the trailing `Eof` token.
pub fn tokenize(input: &str) -> Vec<Token<'_>> {
    let mut lexer = Lexer::new(input);
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token();
        let is_eof = matches!(token.kind, TokenKind::Eof);
        tokens.push(token);
        if is_eof {
            break;
        }
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    fn kinds(input: &str) -> Vec<TokenKind<'_>> {
        tokenize(input).into_iter().map(|token| token.kind).collect()
    }

    #[test]
    fn tokenizes_simple_handler() {
        let input = indoc! {r#"
            Dim n As Integer
            n = n + 1
        "#};
        let expected = vec![
            TokenKind::Keyword(Keyword::Dim),
            TokenKind::Identifier("n"),
            TokenKind::Keyword(Keyword::As),
            TokenKind::Keyword(Keyword::Integer),
            TokenKind::Newline,
            TokenKind::Identifier("n"),
            TokenKind::Operator(Op::Eq),
            TokenKind::Identifier("n"),
            TokenKind::Operator(Op::Plus),
            TokenKind::Number("1"),
            TokenKind::Newline,
            TokenKind::Eof,
        ];
        assert_eq!(kinds(input), expected);
    }

    #[test]
    fn keywords_match_case_insensitively() {
        assert_eq!(
            kinds("IF x THEN"),
            vec![
                TokenKind::Keyword(Keyword::If),
                TokenKind::Identifier("x"),
                TokenKind::Keyword(Keyword::Then),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn comments_run_to_end_of_line() {
        assert_eq!(
            kinds("x = 1 ' counter\ny = 2"),
            vec![
                TokenKind::Identifier("x"),
                TokenKind::Operator(Op::Eq),
                TokenKind::Number("1"),
                TokenKind::Comment("' counter"),
                TokenKind::Newline,
                TokenKind::Identifier("y"),
                TokenKind::Operator(Op::Eq),
                TokenKind::Number("2"),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn recognizes_two_character_operators() {
        assert_eq!(
            kinds("a <> b <= c >= d"),
            vec![
                TokenKind::Identifier("a"),
                TokenKind::Operator(Op::Ne),
                TokenKind::Identifier("b"),
                TokenKind::Operator(Op::Le),
                TokenKind::Identifier("c"),
                TokenKind::Operator(Op::Ge),
                TokenKind::Identifier("d"),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn numbers_take_at_most_one_decimal_point() {
        // The second dot ends the first number and, with a digit behind
        // it, starts a fresh fractional literal.
        assert_eq!(
            kinds("1.5 1.2.3 .25 a.b"),
            vec![
                TokenKind::Number("1.5"),
                TokenKind::Number("1.2"),
                TokenKind::Number(".3"),
                TokenKind::Number(".25"),
                TokenKind::Identifier("a"),
                TokenKind::Punct(Punct::Dot),
                TokenKind::Identifier("b"),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn drops_unrecognized_characters_silently() {
        assert_eq!(
            kinds("x = 1 @ 2 #"),
            vec![
                TokenKind::Identifier("x"),
                TokenKind::Operator(Op::Eq),
                TokenKind::Number("1"),
                TokenKind::Number("2"),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn strings_have_no_escape_sequences() {
        assert_eq!(
            kinds(r#"s = "a 'quoted' word""#),
            vec![
                TokenKind::Identifier("s"),
                TokenKind::Operator(Op::Eq),
                TokenKind::Str("a 'quoted' word"),
                TokenKind::Eof,
            ]
        );
        // Unterminated string runs to end of input instead of erroring.
        assert_eq!(
            kinds(r#"s = "open"#),
            vec![
                TokenKind::Identifier("s"),
                TokenKind::Operator(Op::Eq),
                TokenKind::Str("open"),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn token_positions_point_back_into_the_source() {
        let input = "dim total as integer\ntotal = total + 12.5 ' tally\n";
        let lines: Vec<&str> = input.split('\n').collect();
        for token in tokenize(input) {
            let text = token.kind.text();
            if matches!(token.kind, TokenKind::Newline | TokenKind::Eof) || text.is_empty() {
                continue;
            }
            let line = lines[token.line - 1];
            assert!(
                line[token.col - 1..].starts_with(text),
                "token {text:?} not found at {}:{}",
                token.line,
                token.col
            );
        }
    }

    #[test]
    fn crlf_counts_as_one_newline() {
        let tokens = tokenize("a\r\nb");
        assert_eq!(
            tokens.iter().map(|t| t.kind).collect::<Vec<_>>(),
            vec![
                TokenKind::Identifier("a"),
                TokenKind::Newline,
                TokenKind::Identifier("b"),
                TokenKind::Eof,
            ]
        );
        assert_eq!(tokens[2].line, 2);
        assert_eq!(tokens[2].col, 1);
    }
}
