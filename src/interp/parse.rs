//! Splits scripts into commands and words.
//!
//! Supported syntax: whitespace-separated words, `"double quoted"` words
//! with backslash escapes, `{braced}` words taken literally (braces nest),
//! newlines or `;` between commands, and `#` comments at command start.

use crate::core::CommandError;

/// Parses a script into a list of commands, each a list of words.
pub fn parse_script(script: &str) -> Result<Vec<Vec<String>>, CommandError> {
    let mut parser = Parser {
        chars: script.chars().collect(),
        pos: 0,
    };
    parser.script()
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn script(&mut self) -> Result<Vec<Vec<String>>, CommandError> {
        let mut commands = Vec::new();
        let mut words: Vec<String> = Vec::new();

        loop {
            while matches!(self.peek(), Some(c) if c == ' ' || c == '\t' || c == '\r') {
                self.pos += 1;
            }
            match self.peek() {
                None => break,
                Some('\n') | Some(';') => {
                    self.pos += 1;
                    if !words.is_empty() {
                        commands.push(std::mem::take(&mut words));
                    }
                }
                Some('#') if words.is_empty() => {
                    while !matches!(self.peek(), None | Some('\n')) {
                        self.pos += 1;
                    }
                }
                Some('"') => words.push(self.quoted()?),
                Some('{') => words.push(self.braced()?),
                Some(_) => words.push(self.bare()),
            }
        }

        if !words.is_empty() {
            commands.push(words);
        }
        Ok(commands)
    }

    fn at_word_end(&self) -> bool {
        matches!(self.peek(), None | Some(' ' | '\t' | '\r' | '\n' | ';'))
    }

    fn quoted(&mut self) -> Result<String, CommandError> {
        self.pos += 1;
        let mut word = String::new();
        loop {
            match self.bump() {
                None => return Err(CommandError::Syntax("missing \"".into())),
                Some('"') => break,
                Some('\\') => word.push(self.escape()),
                Some(c) => word.push(c),
            }
        }
        if !self.at_word_end() {
            return Err(CommandError::Syntax(
                "extra characters after close-quote".into(),
            ));
        }
        Ok(word)
    }

    fn braced(&mut self) -> Result<String, CommandError> {
        self.pos += 1;
        let mut depth = 1usize;
        let mut word = String::new();
        loop {
            match self.bump() {
                None => return Err(CommandError::Syntax("missing close-brace".into())),
                Some('{') => {
                    depth += 1;
                    word.push('{');
                }
                Some('}') => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                    word.push('}');
                }
                Some('\\') => {
                    // kept verbatim, but an escaped brace does not count
                    word.push('\\');
                    if let Some(c) = self.bump() {
                        word.push(c);
                    }
                }
                Some(c) => word.push(c),
            }
        }
        if !self.at_word_end() {
            return Err(CommandError::Syntax(
                "extra characters after close-brace".into(),
            ));
        }
        Ok(word)
    }

    fn bare(&mut self) -> String {
        let mut word = String::new();
        while !self.at_word_end() {
            match self.bump() {
                Some('\\') => word.push(self.escape()),
                Some(c) => word.push(c),
                None => break,
            }
        }
        word
    }

    fn escape(&mut self) -> char {
        match self.bump() {
            Some('n') => '\n',
            Some('t') => '\t',
            Some('r') => '\r',
            Some('0') => '\0',
            Some(c) => c,
            None => '\\',
        }
    }
}
