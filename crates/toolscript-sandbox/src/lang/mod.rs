//! Front end for the program language.
//!
//! Source is parsed as full Python by `rustpython-parser` ([`syntax`]) so the
//! validator sees every construct. [`lower`] then maps the supported subset
//! (assignments, control flow, functions, lambdas, comprehensions, exceptions,
//! imports, f-strings) onto the interpreter's own tree in [`ast`]; classes,
//! generators, `with`, sets and the rest are reported as unsupported.

pub mod ast;
pub mod lower;
pub mod syntax;
pub mod visit;

use thiserror::Error;

/// Source could not be parsed, or used a construct the interpreter does not run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} (line {line})")]
pub struct SyntaxError {
    pub message: String,
    pub line: usize,
}

impl SyntaxError {
    pub fn new(message: impl Into<String>, line: usize) -> Self {
        Self {
            message: message.into(),
            line,
        }
    }
}

/// Parse and lower program source into interpreter statements.
///
/// Unsupported constructs surface as the first lowering message.
pub fn parse(source: &str) -> Result<Vec<ast::Stmt>, SyntaxError> {
    let parsed = syntax::parse_module(source)?;
    lower::lower_module(&parsed.body, &parsed.lines).map_err(|errors| {
        let first = errors.into_iter().next().unwrap_or_default();
        match first
            .strip_prefix("Line ")
            .and_then(|rest| rest.split_once(": "))
            .and_then(|(n, msg)| Some((n.parse().ok()?, msg)))
        {
            Some((line, msg)) => SyntaxError::new(msg, line),
            None => SyntaxError::new(first, 0),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_reports_first_unsupported_construct() {
        let err = parse("x = 1
y = {1, 2}
").unwrap_err();
        assert_eq!(err, SyntaxError::new("set literals are not supported", 2));
    }

    #[test]
    fn test_parse_accepts_supported_subset() {
        let body = parse("a, *b = 1, 2, 3
c = 5 & 3
").unwrap();
        assert_eq!(body.len(), 2);
    }
}
