//! The errors emitted throughout all of decafc

use crate::compiler::common::token::Span;
use crate::compiler::common::types::Ty;

/// Reason attached to an unresolved-identifier diagnostic.
#[derive(Clone, Copy, PartialEq, Debug)]
pub enum Reason {
    Variable,
    Function,
    Class,
    Interface,
    Type,
}
impl Reason {
    fn as_str(&self) -> &'static str {
        match self {
            Reason::Variable => "variable",
            Reason::Function => "function",
            Reason::Class => "class",
            Reason::Interface => "interface",
            Reason::Type => "type",
        }
    }
}

/// All error-types in [decafc_compiler](crate)
#[derive(Clone, PartialEq, Debug)]
pub enum ErrorKind {
    // scan errors
    UnrecognizedChar(char),
    UnterminatedString(String),
    NewlineInString(String),
    UnterminatedComment,
    InvalidNumber(String),

    // parse errors
    Expected(&'static str, String),
    ExpectedExpression(String),
    ExpectedLValue,
    Eof(&'static str),

    // semantic errors (fixed user-visible catalogue)
    DeclConflict(String, i32),
    NotDeclared(String, Reason),
    OverrideMismatch(String),
    InterfaceNotImplemented(String, String),
    SubscriptNotInteger,
    NewArraySizeNotInteger,
    BracketsOnNonArray,
    IncompatibleOperand(String, Ty),
    IncompatibleOperands(String, Ty, Ty),
    FieldNotFound(String, Ty),
    InaccessibleField(String, Ty),
    ThisOutsideClass,
    NumArgsMismatch(String, usize, usize),
    ArgMismatch(usize, Ty, Ty),
    ReturnMismatch(Ty, Ty),
    TestNotBoolean,
    BreakOutsideLoop,
    PrintArgMismatch(usize, Ty),
    NoMainFound,

    // back-end limitations, fatal once emission reaches them
    DoubleUnsupported,
    InterfaceDispatchUnsupported(String),
}

impl ErrorKind {
    /// The fixed user-visible message for each diagnostic
    pub fn message(&self) -> String {
        match self {
            ErrorKind::UnrecognizedChar(c) => format!("Unrecognized char: '{}'", c),
            ErrorKind::UnterminatedString(s) => {
                format!("Unterminated string constant: {}", s)
            }
            ErrorKind::NewlineInString(s) => {
                format!("Illegal newline in string constant {}", s)
            }
            ErrorKind::UnterminatedComment => "Input ends with unterminated comment".to_string(),
            ErrorKind::InvalidNumber(s) => format!("Invalid number constant: {}", s),

            ErrorKind::Expected(expected, found) => {
                format!("Expected {}, found '{}'", expected, found)
            }
            ErrorKind::ExpectedExpression(found) => {
                format!("Expected expression, found '{}'", found)
            }
            ErrorKind::ExpectedLValue => "Postfix operator requires an lvalue".to_string(),
            ErrorKind::Eof(expected) => format!("Expected {}, found end of file", expected),

            ErrorKind::DeclConflict(name, prev_line) => format!(
                "Declaration of '{}' here conflicts with declaration on line {}",
                name, prev_line
            ),
            ErrorKind::NotDeclared(name, reason) => {
                format!("No declaration found for {} '{}'", reason.as_str(), name)
            }
            ErrorKind::OverrideMismatch(name) => {
                format!("Method '{}' must match inherited type signature", name)
            }
            ErrorKind::InterfaceNotImplemented(class, interface) => format!(
                "Class '{}' does not implement entire interface '{}'",
                class, interface
            ),
            ErrorKind::SubscriptNotInteger => "Array subscript must be an integer".to_string(),
            ErrorKind::NewArraySizeNotInteger => "Size for NewArray must be an integer".to_string(),
            ErrorKind::BracketsOnNonArray => "[] can only be applied to arrays".to_string(),
            ErrorKind::IncompatibleOperand(op, ty) => {
                format!("Incompatible operand: {} {}", op, ty)
            }
            ErrorKind::IncompatibleOperands(op, left, right) => {
                format!("Incompatible operands: {} {} {}", left, op, right)
            }
            ErrorKind::FieldNotFound(field, base) => {
                format!("{} has no such field '{}'", base, field)
            }
            ErrorKind::InaccessibleField(field, base) => {
                format!("{} field '{}' only accessible within class scope", base, field)
            }
            ErrorKind::ThisOutsideClass => "'this' is only valid within class scope".to_string(),
            ErrorKind::NumArgsMismatch(name, expected, given) => format!(
                "Function '{}' expects {} argument{} but {} given",
                name,
                expected,
                if *expected == 1 { "" } else { "s" },
                given
            ),
            ErrorKind::ArgMismatch(pos, given, expected) => format!(
                "Incompatible argument {}: {} given, {} expected",
                pos, given, expected
            ),
            ErrorKind::ReturnMismatch(given, expected) => {
                format!("Incompatible return: {} given, {} expected", given, expected)
            }
            ErrorKind::TestNotBoolean => "Test expression must have boolean type".to_string(),
            ErrorKind::BreakOutsideLoop => "break is only allowed inside a loop".to_string(),
            ErrorKind::PrintArgMismatch(pos, given) => format!(
                "Incompatible argument {}: {} given, int/bool/string expected (in Print statement)",
                pos, given
            ),
            ErrorKind::NoMainFound => "Linker: function 'main' not defined".to_string(),

            ErrorKind::DoubleUnsupported => {
                "Double is not supported by compiler back end yet".to_string()
            }
            ErrorKind::InterfaceDispatchUnsupported(name) => format!(
                "Interface method '{}' is not supported by compiler back end yet",
                name
            ),
        }
    }
}

/// Main error used throughout [decafc_compiler](crate)
#[derive(Clone, PartialEq, Debug)]
pub struct Error {
    pub span: Option<Span>,
    pub kind: ErrorKind,
}
impl Error {
    pub fn new(span: Span, kind: ErrorKind) -> Error {
        Error { span: Some(span), kind }
    }
    /// An error without a source position, e.g. the missing-main diagnostic.
    pub fn without_loc(kind: ErrorKind) -> Error {
        Error { span: None, kind }
    }
    /// Prints the diagnostic to stderr in the fixed two-line format.
    pub fn print_error(&self) {
        eprintln!();
        match self.span {
            Some(span) => eprintln!("*** Error line {}.", span.line),
            None => eprintln!("*** Error."),
        }
        eprintln!("*** {}", self.kind.message());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalogue_messages_are_fixed() {
        assert_eq!(
            ErrorKind::DeclConflict("a".to_string(), 2).message(),
            "Declaration of 'a' here conflicts with declaration on line 2"
        );
        assert_eq!(
            ErrorKind::NotDeclared("f".to_string(), Reason::Function).message(),
            "No declaration found for function 'f'"
        );
        assert_eq!(
            ErrorKind::NumArgsMismatch("f".to_string(), 1, 3).message(),
            "Function 'f' expects 1 argument but 3 given"
        );
        assert_eq!(
            ErrorKind::IncompatibleOperands("+".to_string(), Ty::Int, Ty::Bool).message(),
            "Incompatible operands: int + bool"
        );
        assert_eq!(
            ErrorKind::NoMainFound.message(),
            "Linker: function 'main' not defined"
        );
    }
}
