use thiserror::Error;

macro_rules! ir_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Ir {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Ir {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// Most of the optimizer's decision points are not error conditions at all: an
/// unresolvable field or method reference silently disables the affected
/// optimization for that site, a rejected inlining candidate is recorded as a
/// counted rejection, and an unreachable block or edge is a fact reported by
/// the analysis. Genuine invariant violations (a malformed plan, a switch
/// block without a default successor) are programmer errors and abort via
/// assertions instead of surfacing here.
///
/// # Error Categories
///
/// - [`Error::Ir`] - An IR-level operation was handed malformed input
/// - [`Error::MethodWithoutCode`] - A code-carrying operation hit a bodyless method
/// - [`Error::LockError`] - Thread synchronization failure
#[derive(Error, Debug)]
pub enum Error {
    /// An IR-level operation was handed input it cannot operate on.
    ///
    /// This covers situations such as splicing a callee into a caller at an
    /// instruction that no longer exists, or applying a rewrite plan against
    /// a method body the plan was not built for. The error includes the
    /// source location where the problem was detected for debugging purposes.
    ///
    /// # Fields
    ///
    /// * `message` - Detailed description of what was malformed
    /// * `file` - Source file where the error was detected
    /// * `line` - Source line where the error was detected
    #[error("Ir - {file}:{line}: {message}")]
    Ir {
        /// The message to be printed for the Ir error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// A method without a body was passed to an operation that requires one.
    ///
    /// Abstract and native methods carry no instruction list; they can appear
    /// in a scope but cannot be inlined, shrunk, or rewritten. The associated
    /// value is the method descriptor.
    #[error("Method has no code - {0}")]
    MethodWithoutCode(String),

    /// Failed to lock target.
    ///
    /// This error occurs when thread synchronization fails, typically
    /// when trying to acquire a mutex that is in an invalid state.
    #[error("Failed to lock target")]
    LockError,
}
