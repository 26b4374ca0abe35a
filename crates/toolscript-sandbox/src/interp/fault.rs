//! Runtime faults raised by executing programs.

use std::fmt;

/// Exception classes visible to programs, plus the two budget classes that
/// programs can neither name nor catch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExcKind {
    Exception,
    ArithmeticError,
    LookupError,
    ValueError,
    TypeError,
    KeyError,
    IndexError,
    AttributeError,
    ZeroDivisionError,
    OverflowError,
    NameError,
    ImportError,
    RuntimeError,
    RecursionError,
    AssertionError,
    NotImplementedError,
    /// Wall-clock deadline, step budget or cancellation
    TimeoutError,
    /// Output or collection size cap
    MemoryError,
}

/// Exception classes bound as program globals.
pub const PROGRAM_EXCEPTIONS: &[ExcKind] = &[
    ExcKind::Exception,
    ExcKind::ArithmeticError,
    ExcKind::LookupError,
    ExcKind::ValueError,
    ExcKind::TypeError,
    ExcKind::KeyError,
    ExcKind::IndexError,
    ExcKind::AttributeError,
    ExcKind::ZeroDivisionError,
    ExcKind::OverflowError,
    ExcKind::NameError,
    ExcKind::ImportError,
    ExcKind::RuntimeError,
    ExcKind::RecursionError,
    ExcKind::AssertionError,
    ExcKind::NotImplementedError,
];

impl ExcKind {
    pub fn name(self) -> &'static str {
        match self {
            ExcKind::Exception => "Exception",
            ExcKind::ArithmeticError => "ArithmeticError",
            ExcKind::LookupError => "LookupError",
            ExcKind::ValueError => "ValueError",
            ExcKind::TypeError => "TypeError",
            ExcKind::KeyError => "KeyError",
            ExcKind::IndexError => "IndexError",
            ExcKind::AttributeError => "AttributeError",
            ExcKind::ZeroDivisionError => "ZeroDivisionError",
            ExcKind::OverflowError => "OverflowError",
            ExcKind::NameError => "NameError",
            ExcKind::ImportError => "ImportError",
            ExcKind::RuntimeError => "RuntimeError",
            ExcKind::RecursionError => "RecursionError",
            ExcKind::AssertionError => "AssertionError",
            ExcKind::NotImplementedError => "NotImplementedError",
            ExcKind::TimeoutError => "TimeoutError",
            ExcKind::MemoryError => "MemoryError",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        PROGRAM_EXCEPTIONS.iter().copied().find(|k| k.name() == name)
    }

    fn parent(self) -> Option<ExcKind> {
        match self {
            ExcKind::Exception | ExcKind::TimeoutError | ExcKind::MemoryError => None,
            ExcKind::KeyError | ExcKind::IndexError => Some(ExcKind::LookupError),
            ExcKind::ZeroDivisionError | ExcKind::OverflowError => Some(ExcKind::ArithmeticError),
            ExcKind::RecursionError | ExcKind::NotImplementedError => Some(ExcKind::RuntimeError),
            _ => Some(ExcKind::Exception),
        }
    }

    /// `except base:` catches `self`.
    pub fn is_subclass_of(self, base: ExcKind) -> bool {
        let mut current = Some(self);
        while let Some(k) = current {
            if k == base {
                return true;
            }
            current = k.parent();
        }
        false
    }

    /// Budget faults bypass `except` clauses and `finally` bodies.
    pub fn is_budget(self) -> bool {
        matches!(self, ExcKind::TimeoutError | ExcKind::MemoryError)
    }
}

impl fmt::Display for ExcKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A raised exception travelling up the interpreter stack.
#[derive(Debug, Clone, PartialEq)]
pub struct Fault {
    pub kind: ExcKind,
    pub message: String,
    /// Line of the innermost statement executing when the fault was raised
    pub line: Option<usize>,
}

impl Fault {
    pub fn new(kind: ExcKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            line: None,
        }
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new(ExcKind::TypeError, message)
    }

    pub fn value_error(message: impl Into<String>) -> Self {
        Self::new(ExcKind::ValueError, message)
    }

    pub fn index_error(message: impl Into<String>) -> Self {
        Self::new(ExcKind::IndexError, message)
    }

    pub fn attribute_error(message: impl Into<String>) -> Self {
        Self::new(ExcKind::AttributeError, message)
    }

    pub fn name_error(name: &str) -> Self {
        Self::new(ExcKind::NameError, format!("name '{}' is not defined", name))
    }

    pub fn zero_division(message: impl Into<String>) -> Self {
        Self::new(ExcKind::ZeroDivisionError, message)
    }

    pub fn overflow() -> Self {
        Self::new(ExcKind::OverflowError, "integer result out of 64-bit range")
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ExcKind::TimeoutError, message)
    }

    pub fn memory(message: impl Into<String>) -> Self {
        Self::new(ExcKind::MemoryError, message)
    }

    /// Attach a line if none is recorded yet.
    pub fn at(mut self, line: usize) -> Self {
        if self.line.is_none() {
            self.line = Some(line);
        }
        self
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.kind)?;
        } else {
            write!(f, "{}: {}", self.kind, self.message)?;
        }
        if let Some(line) = self.line {
            write!(f, " (line {})", line)?;
        }
        Ok(())
    }
}

impl std::error::Error for Fault {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hierarchy() {
        assert!(ExcKind::KeyError.is_subclass_of(ExcKind::LookupError));
        assert!(ExcKind::KeyError.is_subclass_of(ExcKind::Exception));
        assert!(ExcKind::ZeroDivisionError.is_subclass_of(ExcKind::ArithmeticError));
        assert!(!ExcKind::ValueError.is_subclass_of(ExcKind::TypeError));
        assert!(!ExcKind::TimeoutError.is_subclass_of(ExcKind::Exception));
    }

    #[test]
    fn test_display_with_line() {
        let f = Fault::value_error("bad").at(3).at(9);
        assert_eq!(f.to_string(), "ValueError: bad (line 3)");
        let f = Fault::new(ExcKind::RuntimeError, "");
        assert_eq!(f.to_string(), "RuntimeError");
    }

    #[test]
    fn test_budget_kinds_not_nameable() {
        assert_eq!(ExcKind::from_name("ValueError"), Some(ExcKind::ValueError));
        assert_eq!(ExcKind::from_name("TimeoutError"), None);
        assert_eq!(ExcKind::from_name("MemoryError"), None);
    }
}
