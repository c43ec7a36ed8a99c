use std::fmt::Display;

use rustc_hash::FxHashMap;

use crate::tokenizer::Token;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    Push,
    Pop,
    Print,
    Store,
    Ask,
    Dup,
    Add,
    Sub,
    Mul,
    Div,
    Equ,
    Leq,
    Jumpt,
    Jumpf,
    Jump,
    Stop,
    Noop,
}

impl Opcode {
    /// Keyword matching is exact and case-sensitive.
    fn from_keyword(keyword: &str) -> Option<Opcode> {
        Some(match keyword {
            "push" => Opcode::Push,
            "pop" => Opcode::Pop,
            "print" => Opcode::Print,
            "store" => Opcode::Store,
            "ask" => Opcode::Ask,
            "dup" => Opcode::Dup,
            "add" => Opcode::Add,
            "sub" => Opcode::Sub,
            "mul" => Opcode::Mul,
            "div" => Opcode::Div,
            "equ" => Opcode::Equ,
            "leq" => Opcode::Leq,
            "jumpt" => Opcode::Jumpt,
            "jumpf" => Opcode::Jumpf,
            "jump" => Opcode::Jump,
            "stop" => Opcode::Stop,
            "noop" => Opcode::Noop,
            _ => return None,
        })
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            Opcode::Push => "push",
            Opcode::Pop => "pop",
            Opcode::Print => "print",
            Opcode::Store => "store",
            Opcode::Ask => "ask",
            Opcode::Dup => "dup",
            Opcode::Add => "add",
            Opcode::Sub => "sub",
            Opcode::Mul => "mul",
            Opcode::Div => "div",
            Opcode::Equ => "equ",
            Opcode::Leq => "leq",
            Opcode::Jumpt => "jumpt",
            Opcode::Jumpf => "jumpf",
            Opcode::Jump => "jump",
            Opcode::Stop => "stop",
            Opcode::Noop => "noop",
        }
    }
}

impl Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.keyword())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    None,
    Immediate(i64),
    /// A variable name, or a label name for the jump opcodes. Which one is
    /// determined by the opcode, not validated at parse time.
    Name(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub opcode: Opcode,
    pub operand: Operand,
}

impl Display for Instruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.operand {
            Operand::None => write!(f, "{}", self.opcode),
            Operand::Immediate(value) => write!(f, "{}(#{})", self.opcode, value),
            Operand::Name(name) => write!(f, "{}({})", self.opcode, name),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct Program {
    pub instructions: Vec<Instruction>,
    pub labels: FxHashMap<String, usize>,
}

impl Program {
    pub fn disassemble(&self, name: &str) {
        println!("== {} ==", name);
        for index in 0..self.instructions.len() {
            self.disassemble_instruction(index);
        }

        let mut labels: Vec<_> = self.labels.iter().collect();
        labels.sort_by_key(|(_, index)| **index);
        for (label, index) in labels {
            println!("{:>12} -> {:04}", label, index);
        }
    }

    pub fn disassemble_instruction(&self, index: usize) {
        println!("{:04} {}", index, self.instructions[index]);
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Unknown instruction \"{0}\"")]
    UnknownInstruction(String),
    #[error("Expected an instruction keyword but found \"{0}\"")]
    ExpectedInstruction(Token),
    #[error("Expected \"{expected}\" but found \"{found}\"")]
    Expected { expected: Token, found: Token },
    #[error("Expected a number or name after \"push\" but found \"{0}\"")]
    ExpectedOperand(Token),
    #[error("Expected a name after \"{keyword}\" but found \"{found}\"")]
    ExpectedName {
        keyword: &'static str,
        found: Token,
    },
}

pub fn program(tokens: &[Token]) -> Result<Program, ParseError> {
    let mut instructions = Vec::new();
    let mut labels = FxHashMap::default();
    let mut tokens = tokens;

    while !tokens.is_empty() {
        tokens = labeled_instruction(tokens, &mut instructions, &mut labels)?;
    }

    Ok(Program {
        instructions,
        labels,
    })
}

fn labeled_instruction<'a>(
    tokens: &'a [Token],
    instructions: &mut Vec<Instruction>,
    labels: &mut FxHashMap<String, usize>,
) -> Result<&'a [Token], ParseError> {
    let (mut token, mut tokens) = next(tokens);

    if let (Token::Symbol(name), Token::Colon) = (token, peek(tokens)) {
        // The label binds to the index the next instruction will occupy.
        // A redefinition silently replaces the earlier binding.
        labels.insert(name.clone(), instructions.len());
        (token, tokens) = next(&tokens[1..]);
    }

    let (instruction, tokens) = instruction(token, tokens)?;
    instructions.push(instruction);
    Ok(tokens)
}

fn instruction<'a>(
    token: &Token,
    tokens: &'a [Token],
) -> Result<(Instruction, &'a [Token]), ParseError> {
    let Token::Symbol(keyword) = token else {
        return Err(ParseError::ExpectedInstruction(token.clone()));
    };
    let opcode = Opcode::from_keyword(keyword)
        .ok_or_else(|| ParseError::UnknownInstruction(keyword.clone()))?;

    let (operand, tokens) = match opcode {
        Opcode::Push => match next(tokens) {
            (Token::Number(value), rest) => (Operand::Immediate(*value), rest),
            // A symbol here is always a variable reference, even when it
            // spells an opcode keyword.
            (Token::Symbol(name), rest) => (Operand::Name(name.clone()), rest),
            (token, _) => return Err(ParseError::ExpectedOperand(token.clone())),
        },
        Opcode::Store | Opcode::Jump | Opcode::Jumpt | Opcode::Jumpf => match next(tokens) {
            // Label operands are not checked against the label table here,
            // which is what makes forward references work.
            (Token::Symbol(name), rest) => (Operand::Name(name.clone()), rest),
            (token, _) => {
                return Err(ParseError::ExpectedName {
                    keyword: opcode.keyword(),
                    found: token.clone(),
                })
            }
        },
        _ => (Operand::None, tokens),
    };

    let tokens = expect(tokens, &Token::Semicolon)?;
    Ok((Instruction { opcode, operand }, tokens))
}

static EOF: Token = Token::Eof;

fn next(tokens: &[Token]) -> (&Token, &[Token]) {
    match tokens.split_first() {
        Some((token, rest)) => (token, rest),
        None => (&EOF, tokens),
    }
}

fn peek(tokens: &[Token]) -> &Token {
    tokens.first().unwrap_or(&EOF)
}

fn expect<'a>(tokens: &'a [Token], expected: &Token) -> Result<&'a [Token], ParseError> {
    let (token, rest) = next(tokens);
    if token == expected {
        Ok(rest)
    } else {
        Err(ParseError::Expected {
            expected: expected.clone(),
            found: token.clone(),
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::tokenizer::tokens;

    fn parse(source: &str) -> Result<Program, ParseError> {
        program(&tokens(source).expect("test source should tokenize"))
    }

    fn instr(opcode: Opcode, operand: Operand) -> Instruction {
        Instruction { opcode, operand }
    }

    #[test]
    fn test_push_immediate_and_variable() {
        let program = parse("push 5; push x;").unwrap();
        assert_eq!(
            program.instructions,
            vec![
                instr(Opcode::Push, Operand::Immediate(5)),
                instr(Opcode::Push, Operand::Name("x".to_string())),
            ]
        );
    }

    #[test]
    fn test_plain_opcodes_take_no_operand() {
        let program = parse("add; noop; stop;").unwrap();
        assert_eq!(
            program.instructions,
            vec![
                instr(Opcode::Add, Operand::None),
                instr(Opcode::Noop, Operand::None),
                instr(Opcode::Stop, Operand::None),
            ]
        );
    }

    #[test]
    fn test_label_binds_next_instruction_index() {
        let program = parse("noop; target: stop;").unwrap();
        assert_eq!(program.labels.get("target"), Some(&1));
        assert_eq!(program.instructions.len(), 2);
    }

    #[test]
    fn test_duplicate_label_last_definition_wins() {
        let program = parse("here: noop; here: stop;").unwrap();
        assert_eq!(program.labels.get("here"), Some(&1));
        assert_eq!(program.labels.len(), 1);
    }

    #[test]
    fn test_unknown_instruction() {
        let err = parse("foo;").unwrap_err();
        assert!(matches!(err, ParseError::UnknownInstruction(s) if s == "foo"));
    }

    #[test]
    fn test_missing_semicolon() {
        let err = parse("push 1").unwrap_err();
        assert!(matches!(
            err,
            ParseError::Expected {
                expected: Token::Semicolon,
                found: Token::Eof,
            }
        ));
    }

    #[test]
    fn test_store_requires_a_name() {
        let err = parse("store 5;").unwrap_err();
        assert!(matches!(
            err,
            ParseError::ExpectedName {
                keyword: "store",
                found: Token::Number(5),
            }
        ));
    }

    #[test]
    fn test_push_requires_an_operand() {
        let err = parse("push ;").unwrap_err();
        assert!(matches!(err, ParseError::ExpectedOperand(Token::Semicolon)));
    }

    #[test]
    fn test_label_without_instruction() {
        let err = parse("noop; end:").unwrap_err();
        assert!(matches!(err, ParseError::ExpectedInstruction(Token::Eof)));
    }

    #[test]
    fn test_push_of_opcode_keyword_is_a_variable_reference() {
        let program = parse("push add;").unwrap();
        assert_eq!(
            program.instructions,
            vec![instr(Opcode::Push, Operand::Name("add".to_string()))]
        );
    }

    #[test]
    fn test_empty_input_is_an_empty_program() {
        let program = parse("").unwrap();
        assert!(program.instructions.is_empty());
        assert!(program.labels.is_empty());
    }

    #[test]
    fn test_parse_is_idempotent() {
        let source = "start: push 0; store i; loop: push i; print; jump loop;";
        let tokens = tokens(source).unwrap();
        assert_eq!(program(&tokens).unwrap(), program(&tokens).unwrap());
    }
}
