//! Converts raw source text into [tokens](Token)

use crate::compiler::common::{error::*, token::*};
use std::collections::HashMap;
use std::iter::Peekable;
use std::str::Chars;

pub struct Scanner<'a> {
    // Source used for iterating
    source: Peekable<Chars<'a>>,

    line: i32,
    col: i32,

    // Reserved keywords which cannot be an identifier
    keywords: HashMap<&'a str, TokenKind>,
}

impl<'a> Scanner<'a> {
    pub fn new(source: &'a str) -> Self {
        Scanner {
            source: source.chars().peekable(),
            line: 1,
            col: 1,
            keywords: HashMap::from([
                ("void", TokenKind::Void),
                ("int", TokenKind::Int),
                ("double", TokenKind::Double),
                ("bool", TokenKind::Bool),
                ("string", TokenKind::String),
                ("class", TokenKind::Class),
                ("interface", TokenKind::Interface),
                ("null", TokenKind::Null),
                ("this", TokenKind::This),
                ("extends", TokenKind::Extends),
                ("implements", TokenKind::Implements),
                ("for", TokenKind::For),
                ("while", TokenKind::While),
                ("if", TokenKind::If),
                ("else", TokenKind::Else),
                ("return", TokenKind::Return),
                ("break", TokenKind::Break),
                ("switch", TokenKind::Switch),
                ("case", TokenKind::Case),
                ("default", TokenKind::Default),
                ("new", TokenKind::New),
                ("NewArray", TokenKind::NewArray),
                ("Print", TokenKind::Print),
                ("ReadInteger", TokenKind::ReadInteger),
                ("ReadLine", TokenKind::ReadLine),
                ("true", TokenKind::BoolConstant(true)),
                ("false", TokenKind::BoolConstant(false)),
            ]),
        }
    }

    fn next_char(&mut self) -> Option<char> {
        let c = self.source.next()?;
        if c == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(c)
    }

    fn matches(&mut self, expected: char) -> bool {
        match self.source.peek() {
            Some(c) if *c == expected => {
                self.next_char();
                true
            }
            _ => false,
        }
    }
    fn match_next(&mut self, expected: char, if_match: TokenKind, if_not: TokenKind) -> TokenKind {
        match self.matches(expected) {
            true => if_match,
            false => if_not,
        }
    }

    fn span_from(&self, line: i32, first_col: i32) -> Span {
        Span::new(line, first_col, self.col - 1)
    }

    pub fn scan(mut self) -> Result<Vec<Token>, Vec<Error>> {
        let mut tokens: Vec<Token> = Vec::new();
        let mut errors: Vec<Error> = Vec::new();

        loop {
            let line = self.line;
            let col = self.col;
            let Some(c) = self.next_char() else { break };

            let kind = match c {
                ' ' | '\t' | '\r' | '\n' => continue,
                '/' if self.matches('/') => {
                    while let Some(c) = self.source.peek() {
                        if *c == '\n' {
                            break;
                        }
                        self.next_char();
                    }
                    continue;
                }
                '/' if self.matches('*') => {
                    match self.skip_block_comment() {
                        Ok(()) => continue,
                        Err(kind) => {
                            errors.push(Error::new(self.span_from(line, col), kind));
                            continue;
                        }
                    }
                }
                '+' => self.match_next('+', TokenKind::PlusPlus, TokenKind::Plus),
                '-' => self.match_next('-', TokenKind::MinusMinus, TokenKind::Minus),
                '*' => TokenKind::Star,
                '/' => TokenKind::Slash,
                '%' => TokenKind::Percent,
                '<' => self.match_next('=', TokenKind::LessEqual, TokenKind::Less),
                '>' => self.match_next('=', TokenKind::GreaterEqual, TokenKind::Greater),
                '=' => self.match_next('=', TokenKind::Equal, TokenKind::Assign),
                '!' => self.match_next('=', TokenKind::NotEqual, TokenKind::Bang),
                '&' if self.matches('&') => TokenKind::AmpAmp,
                '|' if self.matches('|') => TokenKind::PipePipe,
                ';' => TokenKind::Semicolon,
                ',' => TokenKind::Comma,
                '.' => TokenKind::Dot,
                ':' => TokenKind::Colon,
                '[' => TokenKind::LeftBracket,
                ']' => TokenKind::RightBracket,
                '(' => TokenKind::LeftParen,
                ')' => TokenKind::RightParen,
                '{' => TokenKind::LeftBrace,
                '}' => TokenKind::RightBrace,
                '"' => match self.string_constant() {
                    Ok(kind) => kind,
                    Err(kind) => {
                        errors.push(Error::new(self.span_from(line, col), kind));
                        continue;
                    }
                },
                '0'..='9' => match self.number_constant(c) {
                    Ok(kind) => kind,
                    Err(kind) => {
                        errors.push(Error::new(self.span_from(line, col), kind));
                        continue;
                    }
                },
                c if c.is_ascii_alphabetic() => {
                    let mut name = String::from(c);
                    while let Some(c) = self.source.peek() {
                        if c.is_ascii_alphanumeric() || *c == '_' {
                            name.push(*c);
                            self.next_char();
                        } else {
                            break;
                        }
                    }
                    match self.keywords.get(name.as_str()) {
                        Some(kind) => kind.clone(),
                        None => TokenKind::Ident(name),
                    }
                }
                c => {
                    errors.push(Error::new(
                        self.span_from(line, col),
                        ErrorKind::UnrecognizedChar(c),
                    ));
                    continue;
                }
            };
            tokens.push(Token::new(kind, self.span_from(line, col)));
        }

        if errors.is_empty() {
            Ok(tokens)
        } else {
            Err(errors)
        }
    }

    fn skip_block_comment(&mut self) -> Result<(), ErrorKind> {
        loop {
            match self.next_char() {
                Some('*') if self.matches('/') => return Ok(()),
                Some(_) => continue,
                None => return Err(ErrorKind::UnterminatedComment),
            }
        }
    }

    // Lexeme keeps its quotes so it reaches the .asciiz directive verbatim
    fn string_constant(&mut self) -> Result<TokenKind, ErrorKind> {
        let mut lexeme = String::from('"');
        loop {
            match self.source.peek() {
                Some('"') => {
                    self.next_char();
                    lexeme.push('"');
                    return Ok(TokenKind::StringConstant(lexeme));
                }
                Some('\n') => return Err(ErrorKind::NewlineInString(lexeme)),
                Some(c) => {
                    lexeme.push(*c);
                    self.next_char();
                }
                None => return Err(ErrorKind::UnterminatedString(lexeme)),
            }
        }
    }

    fn number_constant(&mut self, first: char) -> Result<TokenKind, ErrorKind> {
        let mut lexeme = String::from(first);

        if first == '0' && matches!(self.source.peek(), Some('x') | Some('X')) {
            lexeme.push(self.next_char().expect("peeked"));
            while let Some(c) = self.source.peek() {
                if c.is_ascii_hexdigit() {
                    lexeme.push(*c);
                    self.next_char();
                } else {
                    break;
                }
            }
            return i32::from_str_radix(&lexeme[2..], 16)
                .map(TokenKind::IntConstant)
                .map_err(|_| ErrorKind::InvalidNumber(lexeme));
        }

        while let Some(c) = self.source.peek() {
            if c.is_ascii_digit() {
                lexeme.push(*c);
                self.next_char();
            } else {
                break;
            }
        }

        let mut is_double = false;
        if let Some('.') = self.source.peek() {
            is_double = true;
            lexeme.push('.');
            self.next_char();
            while let Some(c) = self.source.peek() {
                if c.is_ascii_digit() {
                    lexeme.push(*c);
                    self.next_char();
                } else {
                    break;
                }
            }
            // exponent only when well-formed; needs a two-char peek
            if let Some('E') | Some('e') = self.source.peek() {
                let mut ahead = self.source.clone();
                ahead.next();
                let exponent_follows = match ahead.next() {
                    Some('+') | Some('-') => matches!(ahead.next(), Some(d) if d.is_ascii_digit()),
                    Some(d) => d.is_ascii_digit(),
                    None => false,
                };
                if exponent_follows {
                    lexeme.push(self.next_char().expect("peeked"));
                    if matches!(self.source.peek(), Some('+') | Some('-')) {
                        lexeme.push(self.next_char().expect("peeked"));
                    }
                    while let Some(c) = self.source.peek() {
                        if c.is_ascii_digit() {
                            lexeme.push(*c);
                            self.next_char();
                        } else {
                            break;
                        }
                    }
                }
            }
        }

        if is_double {
            lexeme
                .parse::<f64>()
                .map(TokenKind::DoubleConstant)
                .map_err(|_| ErrorKind::InvalidNumber(lexeme))
        } else {
            lexeme
                .parse::<i32>()
                .map(TokenKind::IntConstant)
                .map_err(|_| ErrorKind::InvalidNumber(lexeme))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup(input: &str) -> Vec<TokenKind> {
        Scanner::new(input)
            .scan()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn scans_keywords_and_identifiers() {
        let actual = setup("class Shape extends other");
        assert_eq!(
            actual,
            vec![
                TokenKind::Class,
                TokenKind::Ident("Shape".to_string()),
                TokenKind::Extends,
                TokenKind::Ident("other".to_string()),
            ]
        );
    }

    #[test]
    fn scans_operators() {
        let actual = setup("a <= b == c && !d++");
        assert_eq!(
            actual,
            vec![
                TokenKind::Ident("a".to_string()),
                TokenKind::LessEqual,
                TokenKind::Ident("b".to_string()),
                TokenKind::Equal,
                TokenKind::Ident("c".to_string()),
                TokenKind::AmpAmp,
                TokenKind::Bang,
                TokenKind::Ident("d".to_string()),
                TokenKind::PlusPlus,
            ]
        );
    }

    #[test]
    fn scans_number_constants() {
        assert_eq!(
            setup("12 0x1F 3.14 5.0E+2 6."),
            vec![
                TokenKind::IntConstant(12),
                TokenKind::IntConstant(31),
                TokenKind::DoubleConstant(3.14),
                TokenKind::DoubleConstant(500.0),
                TokenKind::DoubleConstant(6.0),
            ]
        );
    }

    #[test]
    fn exponent_without_digits_is_not_consumed() {
        assert_eq!(
            setup("3.0E x"),
            vec![
                TokenKind::DoubleConstant(3.0),
                TokenKind::Ident("E".to_string()),
                TokenKind::Ident("x".to_string()),
            ]
        );
    }

    #[test]
    fn string_constant_keeps_quotes() {
        assert_eq!(
            setup("\"Hello, world\""),
            vec![TokenKind::StringConstant("\"Hello, world\"".to_string())]
        );
    }

    #[test]
    fn skips_comments() {
        assert_eq!(
            setup("a // line comment\n/* block\ncomment */ b"),
            vec![
                TokenKind::Ident("a".to_string()),
                TokenKind::Ident("b".to_string()),
            ]
        );
    }

    #[test]
    fn tracks_line_numbers() {
        let tokens = Scanner::new("a\n  b").scan().unwrap();
        assert_eq!(tokens[0].span.line, 1);
        assert_eq!(tokens[1].span.line, 2);
        assert_eq!(tokens[1].span.first_col, 3);
    }

    #[test]
    fn reports_all_lexical_errors() {
        let errors = Scanner::new("a # b $ c").scan().unwrap_err();
        assert_eq!(
            errors.iter().map(|e| e.kind.clone()).collect::<Vec<_>>(),
            vec![
                ErrorKind::UnrecognizedChar('#'),
                ErrorKind::UnrecognizedChar('$'),
            ]
        );
    }

    #[test]
    fn reports_unterminated_string() {
        let errors = Scanner::new("\"abc").scan().unwrap_err();
        assert_eq!(
            errors[0].kind,
            ErrorKind::UnterminatedString("\"abc".to_string())
        );
    }
}
