use std::fmt;

use thiserror::Error;

use crate::ged::FieldError;

/// Aborts the current instruction only. The kernel decoder turns it into an
/// illegal instruction and carries on with the next one.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("{0}")]
    Fatal(String),
    #[error(transparent)]
    Field(#[from] FieldError),
}

pub(crate) fn fatal<T>(message: impl Into<String>) -> Result<T, DecodeError> {
    Err(DecodeError::Fatal(message.into()))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub pc: Option<u32>,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.pc {
            Some(pc) => write!(f, "PC{}: {}", pc, self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Errors and warnings accumulated over one decode session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics {
    pub errors: Vec<Diagnostic>,
    pub warnings: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error(&mut self, pc: Option<u32>, message: impl Into<String>) {
        let message = message.into();
        tracing::error!(pc = ?pc, "{}", message);
        self.errors.push(Diagnostic { pc, message });
    }

    pub fn warning(&mut self, pc: Option<u32>, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(pc = ?pc, "{}", message);
        self.warnings.push(Diagnostic { pc, message });
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty() && self.warnings.is_empty()
    }
}
