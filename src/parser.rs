use log::trace;
use thiserror::Error;

use crate::types::*;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
	#[error("at most 1 input redirection can appear in a command")]
	DuplicateInput,
	#[error("at most 1 output redirection can appear in a command")]
	DuplicateOutput,
	#[error("no file name after a redirection operator")]
	MissingRedirectTarget,
	#[error("no command after a pipe operator")]
	MissingPipeTarget,
	#[error("no command name specified")]
	MissingCommand,
}

type ParseResult<T> = Result<T, ParseError>;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
enum Token<'a> {
	Pipe,
	Input,
	Output,
	Word(&'a [u8]),
}

impl<'a> Token<'a> {
	fn classify(word: &'a [u8]) -> Token<'a> {
		match word {
			b"|" => Token::Pipe,
			b"<" => Token::Input,
			b">" => Token::Output,
			_ => Token::Word(word),
		}
	}

	fn is_operator(&self) -> bool {
		match *self {
			Token::Word(_) => false,
			_ => true,
		}
	}
}

struct Parser<'a> {
	line: &'a [u8],
	i: usize,
}

impl<'a> Parser<'a> {
	fn proceed_while<F>(&mut self, f: F) where F: Fn(u8) -> bool {
		while let Some(c) = self.line.get(self.i) {
			if !f(*c) { break; }
			self.i += 1;
		}
	}

	/// The C locale `isspace` set: space, `\t`, `\n`, `\v`, `\f` and `\r`.
	fn is_whitespace(c: u8) -> bool {
		match c {
			b' ' | b'\t' | b'\n' | b'\x0b' | b'\x0c' | b'\r' => true,
			_ => false,
		}
	}

	fn skip_whitespaces(&mut self) {
		self.proceed_while(Parser::is_whitespace);
	}

	fn read_word(&mut self) -> &'a [u8] {
		let orig = self.i;
		self.proceed_while(|c| !Parser::is_whitespace(c));
		&self.line[orig .. self.i]
	}

	fn tokens(&mut self) -> Vec<Token<'a>> {
		let mut tokens = vec![];
		loop {
			self.skip_whitespaces();
			let word = self.read_word();
			if word.is_empty() {
				break;
			}
			tokens.push(Token::classify(word));
		}
		tokens
	}
}

/// Returns the file name following a redirection operator at `tokens[i]`.
fn redirect_target<'a>(tokens: &[Token<'a>], i: usize) -> ParseResult<&'a [u8]> {
	match tokens.get(i + 1) {
		Some(&Token::Word(target)) => Ok(target),
		_ => Err(ParseError::MissingRedirectTarget),
	}
}

fn parse_tokens<'a>(tokens: &[Token<'a>]) -> ParseResult<Line<'a>> {
	if tokens.is_empty() {
		return Ok(Line::Empty);
	}

	let mut commands: Vec<Command<'a>> = vec![];
	let mut current = Command::new();
	let mut i = 0;
	while i < tokens.len() {
		match tokens[i] {
			Token::Input => {
				if current.input.is_some() {
					return Err(ParseError::DuplicateInput);
				}
				current.input = Some(redirect_target(tokens, i)?);
				i += 1;
			},
			Token::Output => {
				if current.output.is_some() {
					return Err(ParseError::DuplicateOutput);
				}
				current.output = Some(redirect_target(tokens, i)?);
				i += 1;
			},
			Token::Pipe => {
				match tokens.get(i + 1) {
					Some(next) if !next.is_operator() => {},
					_ => { return Err(ParseError::MissingPipeTarget); },
				}
				if current.arguments.is_empty() {
					return Err(ParseError::MissingCommand);
				}
				commands.push(std::mem::replace(&mut current, Command::new()));
			},
			Token::Word(b"exit") => { return Ok(Line::Exit); },
			Token::Word(word) => current.arguments.push(word),
		}
		i += 1;
	}

	if current.arguments.is_empty() {
		return Err(ParseError::MissingCommand);
	}
	commands.push(current);
	Ok(Line::Pipeline(Pipeline { commands: commands }))
}

pub fn parse<'a>(line: &'a [u8]) -> ParseResult<Line<'a>> {
	let mut parser: Parser<'a> = Parser { line: line, i: 0 };
	let tokens = parser.tokens();
	trace!("tokens: {:?}", tokens);
	parse_tokens(&tokens)
}
