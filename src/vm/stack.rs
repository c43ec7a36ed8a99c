use std::fmt::Display;

/// The operand stack. Grows and shrinks at the tail; underflow is reported
/// to the caller rather than handled here.
#[derive(Debug, Default)]
pub struct Stack {
    storage: Vec<i64>,
}

impl Stack {
    pub fn new() -> Self {
        Stack {
            storage: Vec::new(),
        }
    }

    pub fn push(&mut self, value: i64) {
        self.storage.push(value);
    }

    pub fn pop(&mut self) -> Option<i64> {
        self.storage.pop()
    }
}

impl Display for Stack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "          ")?;
        for value in self.storage.iter() {
            write!(f, "[ {:>8} ]", value)?;
        }
        Ok(())
    }
}
