//! Error taxonomy for the storage engine and shell.
use std::fmt;

/// All errors that can cross a module boundary in this crate.
///
/// `Io`, `Corrupt`, `PagerFull` and `Bug` are fatal: the process reports
/// them and exits. `Syntax`, `StringTooLong`, `DuplicateKey` and
/// `TableFull` are recovered at the shell level; the loop prints them and
/// keeps reading input.
#[derive(Debug)]
pub enum Error {
    Io(std::io::Error),
    /// Database file length is not a multiple of `PAGE_SIZE`.
    Corrupt(String),
    /// Requested a page number beyond `TABLE_MAX_PAGES`.
    PagerFull(u32),
    /// Unparsable statement or meta-command.
    Syntax(String),
    /// A text field exceeded its fixed column width.
    StringTooLong { field: &'static str, max: usize },
    /// `insert` with an `id` already present in the tree.
    DuplicateKey(u32),
    /// Legacy: unreachable in the B+-tree engine, kept for parity with the source.
    TableFull,
    /// An internal invariant was violated; indicates a bug, not bad input.
    Bug(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "IO error: {}", e),
            Error::Corrupt(msg) => write!(f, "Corrupt database file: {}", msg),
            Error::PagerFull(n) => write!(f, "Page number {} exceeds TABLE_MAX_PAGES", n),
            Error::Syntax(msg) => write!(f, "Syntax error: {}", msg),
            Error::StringTooLong { field, max } => {
                write!(f, "String is too long for field '{}' (max {})", field, max)
            }
            Error::DuplicateKey(id) => write!(f, "Error: Duplicate key '{}'", id),
            Error::TableFull => write!(f, "Error: Table full."),
            Error::Bug(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        Error::Io(err)
    }
}

impl Error {
    /// Fatal errors terminate the REPL process with a diagnostic; the rest
    /// are reported inline and the shell keeps reading input.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Io(_) | Error::Corrupt(_) | Error::PagerFull(_) | Error::Bug(_)
        )
    }
}

/// Build a `Bug` error with a formatted message, for internal invariant checks.
#[macro_export]
macro_rules! err {
    ($($arg:tt)*) => {
        $crate::errors::Error::Bug(format!($($arg)*))
    };
}
