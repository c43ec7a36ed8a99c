mod stack;

use std::{
    cell::RefCell,
    io::{BufRead, Write},
    rc::Rc,
};

use rustc_hash::FxHashMap;

use crate::parser::{Instruction, Opcode, Operand, Program};

use self::stack::Stack;

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("Tried popping from empty stack")]
    StackUnderflow,
    #[error("Undefined variable: {0}")]
    UndefinedVariable(String),
    #[error("Unknown label: {0}")]
    UnknownLabel(String),
    #[error("Division by zero")]
    DivisionByZero,
    #[error("Expected an integer on input but got \"{0}\"")]
    InvalidInput(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub struct Vm {
    stack: Stack,
    variables: FxHashMap<String, i64>,
    ip: usize,
    running: bool,
    stdin: Rc<RefCell<dyn BufRead>>,
    stdout: Rc<RefCell<dyn Write>>,
}

impl Default for Vm {
    fn default() -> Self {
        Self::new(
            Rc::new(RefCell::new(std::io::stdin().lock())),
            Rc::new(RefCell::new(std::io::stdout())),
        )
    }
}

impl Vm {
    pub fn new(stdin: Rc<RefCell<dyn BufRead>>, stdout: Rc<RefCell<dyn Write>>) -> Self {
        Self {
            stack: Stack::new(),
            variables: FxHashMap::default(),
            ip: 0,
            running: true,
            stdin,
            stdout,
        }
    }

    pub fn run(&mut self, program: &Program) -> Result<(), RuntimeError> {
        while self.running {
            let Some(instruction) = program.instructions.get(self.ip) else {
                // Running off the end without a stop is a normal halt.
                break;
            };

            #[cfg(feature = "trace")]
            {
                println!("{}", self.stack);
                program.disassemble_instruction(self.ip);
            }

            if self.execute(program, instruction)? {
                self.ip += 1;
            }
        }

        Ok(())
    }

    /// Returns whether the instruction pointer should advance. Control-flow
    /// handlers that set the pointer themselves return false.
    fn execute(
        &mut self,
        program: &Program,
        instruction: &Instruction,
    ) -> Result<bool, RuntimeError> {
        match instruction.opcode {
            Opcode::Push => {
                let value = match &instruction.operand {
                    Operand::Immediate(value) => *value,
                    Operand::Name(name) => self.get_var(name)?,
                    Operand::None => unreachable!("push always carries an operand"),
                };
                self.stack.push(value);
            }
            Opcode::Pop => {
                self.pop()?;
            }
            Opcode::Print => {
                let value = self.pop()?;
                writeln!(self.stdout.borrow_mut(), "{}", value)?;
            }
            Opcode::Store => {
                let value = self.pop()?;
                self.variables
                    .insert(operand_name(instruction).to_string(), value);
            }
            Opcode::Ask => {
                let value = self.ask()?;
                self.stack.push(value);
            }
            Opcode::Dup => {
                let value = self.pop()?;
                self.stack.push(value);
                self.stack.push(value);
            }
            Opcode::Add => binary_op(&mut self.stack, |b, a| Ok(b + a))?,
            Opcode::Sub => binary_op(&mut self.stack, |b, a| Ok(b - a))?,
            Opcode::Mul => binary_op(&mut self.stack, |b, a| Ok(b * a))?,
            Opcode::Div => binary_op(&mut self.stack, |b, a| {
                if a == 0 {
                    Err(RuntimeError::DivisionByZero)
                } else {
                    Ok(floor_div(b, a))
                }
            })?,
            Opcode::Equ => binary_op(&mut self.stack, |b, a| Ok((b == a) as i64))?,
            Opcode::Leq => binary_op(&mut self.stack, |b, a| Ok((b <= a) as i64))?,
            Opcode::Jumpt => {
                if self.pop()? != 0 {
                    self.jump(program, operand_name(instruction))?;
                    return Ok(false);
                }
            }
            Opcode::Jumpf => {
                if self.pop()? == 0 {
                    self.jump(program, operand_name(instruction))?;
                    return Ok(false);
                }
            }
            Opcode::Jump => {
                self.jump(program, operand_name(instruction))?;
                return Ok(false);
            }
            Opcode::Stop => {
                self.running = false;
                return Ok(false);
            }
            Opcode::Noop => {}
        }

        Ok(true)
    }

    fn pop(&mut self) -> Result<i64, RuntimeError> {
        self.stack.pop().ok_or(RuntimeError::StackUnderflow)
    }

    fn get_var(&self, name: &str) -> Result<i64, RuntimeError> {
        self.variables
            .get(name)
            .copied()
            .ok_or_else(|| RuntimeError::UndefinedVariable(name.to_string()))
    }

    fn jump(&mut self, program: &Program, label: &str) -> Result<(), RuntimeError> {
        let index = program
            .labels
            .get(label)
            .ok_or_else(|| RuntimeError::UnknownLabel(label.to_string()))?;
        self.ip = *index;
        Ok(())
    }

    /// Reads one line and parses it as the integer to push.
    fn ask(&mut self) -> Result<i64, RuntimeError> {
        let mut line = String::new();
        self.stdin.borrow_mut().read_line(&mut line)?;
        let input = line.trim();
        input
            .parse()
            .map_err(|_| RuntimeError::InvalidInput(input.to_string()))
    }
}

fn operand_name(instruction: &Instruction) -> &str {
    match &instruction.operand {
        Operand::Name(name) => name,
        _ => unreachable!("the parser only emits {} with a name operand", instruction.opcode),
    }
}

fn binary_op(
    stack: &mut Stack,
    op: impl Fn(i64, i64) -> Result<i64, RuntimeError>,
) -> Result<(), RuntimeError> {
    let a = stack.pop().ok_or(RuntimeError::StackUnderflow)?;
    let b = stack.pop().ok_or(RuntimeError::StackUnderflow)?;
    stack.push(op(b, a)?);
    Ok(())
}

/// Quotient rounded toward negative infinity, unlike the truncating `/`.
fn floor_div(b: i64, a: i64) -> i64 {
    let quotient = b / a;
    let remainder = b % a;
    if remainder != 0 && (remainder < 0) != (a < 0) {
        quotient - 1
    } else {
        quotient
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_floor_div() {
        assert_eq!(floor_div(7, 2), 3);
        assert_eq!(floor_div(-7, 2), -4);
        assert_eq!(floor_div(7, -2), -4);
        assert_eq!(floor_div(-7, -2), 3);
        assert_eq!(floor_div(6, 3), 2);
        assert_eq!(floor_div(-6, 3), -2);
    }
}
