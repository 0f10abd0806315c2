use std::borrow::Cow;
use std::error;
use std::fmt::Debug;
use std::fmt::Display;
use std::fmt::Formatter;
use std::fmt::Result as FmtResult;
use std::io;
use std::result;


/// A result type using our [`Error`] by default.
pub type Result<T, E = Error> = result::Result<T, E>;


/// An enum providing a rough classification of errors.
///
/// The variants of this type partly resemble those of
/// [`std::io::ErrorKind`], because these are the most common sources of
/// error that the crate concerns itself with: symbol sources that do not
/// exist, cannot be read, or do not parse.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// An entity (e.g., a file or a process) was not found.
    NotFound,
    /// The operation lacked the necessary privileges to complete.
    PermissionDenied,
    /// Data (e.g., an object file or a symbol listing) was not valid for
    /// the operation.
    InvalidData,
    /// A parameter was incorrect.
    InvalidInput,
    /// The operation or data format is not supported.
    Unsupported,
    /// A custom or otherwise unclassified error.
    Other,
}

impl ErrorKind {
    fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "entity not found",
            Self::PermissionDenied => "permission denied",
            Self::InvalidData => "invalid data",
            Self::InvalidInput => "invalid input",
            Self::Unsupported => "unsupported",
            Self::Other => "other error",
        }
    }
}

impl From<io::ErrorKind> for ErrorKind {
    fn from(kind: io::ErrorKind) -> Self {
        match kind {
            io::ErrorKind::NotFound => Self::NotFound,
            io::ErrorKind::PermissionDenied => Self::PermissionDenied,
            io::ErrorKind::InvalidData => Self::InvalidData,
            io::ErrorKind::InvalidInput => Self::InvalidInput,
            io::ErrorKind::Unsupported => Self::Unsupported,
            _ => Self::Other,
        }
    }
}


struct Repr {
    kind: ErrorKind,
    msg: Option<Cow<'static, str>>,
    source: Option<Box<dyn error::Error + Send + Sync + 'static>>,
}


/// The error type used by the crate.
///
/// Errors carry an [`ErrorKind`] for programmatic inspection (via
/// [`Error::kind`]) and an optional chain of human readable context
/// layers, added via the [`ErrorExt`] extension trait.
pub struct Error(Box<Repr>);

impl Error {
    fn with_kind(kind: ErrorKind, msg: impl Into<Cow<'static, str>>) -> Self {
        Self(Box::new(Repr {
            kind,
            msg: Some(msg.into()),
            source: None,
        }))
    }

    /// Create a new [`Error`] of kind [`ErrorKind::NotFound`].
    pub fn with_not_found(msg: impl Into<Cow<'static, str>>) -> Self {
        Self::with_kind(ErrorKind::NotFound, msg)
    }

    /// Create a new [`Error`] of kind [`ErrorKind::InvalidData`].
    pub fn with_invalid_data(msg: impl Into<Cow<'static, str>>) -> Self {
        Self::with_kind(ErrorKind::InvalidData, msg)
    }

    /// Create a new [`Error`] of kind [`ErrorKind::InvalidInput`].
    pub fn with_invalid_input(msg: impl Into<Cow<'static, str>>) -> Self {
        Self::with_kind(ErrorKind::InvalidInput, msg)
    }

    /// Create a new [`Error`] of kind [`ErrorKind::Unsupported`].
    pub fn with_unsupported(msg: impl Into<Cow<'static, str>>) -> Self {
        Self::with_kind(ErrorKind::Unsupported, msg)
    }

    /// Retrieve a rough classification of the error.
    #[inline]
    pub fn kind(&self) -> ErrorKind {
        self.0.kind
    }
}

impl Debug for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("Error")
            .field("kind", &self.0.kind)
            .field("msg", &self.0.msg)
            .field("source", &self.0.source)
            .finish()
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match &self.0.msg {
            Some(msg) => write!(f, "{msg}")?,
            None => write!(f, "{}", self.0.kind.as_str())?,
        }

        // A nested `Error` prints its own source in turn, so a single
        // step is enough to render the whole chain exactly once.
        if let Some(source) = &self.0.source {
            write!(f, ": {source}")?;
        }
        Ok(())
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        self.0
            .source
            .as_deref()
            .map(|err| err as &(dyn error::Error + 'static))
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Self(Box::new(Repr {
            kind: ErrorKind::from(err.kind()),
            msg: None,
            source: Some(Box::new(err)),
        }))
    }
}

impl From<object::read::Error> for Error {
    fn from(err: object::read::Error) -> Self {
        Self(Box::new(Repr {
            kind: ErrorKind::InvalidData,
            msg: None,
            source: Some(Box::new(err)),
        }))
    }
}

#[cfg(feature = "dwarf")]
impl From<gimli::Error> for Error {
    fn from(err: gimli::Error) -> Self {
        Self(Box::new(Repr {
            kind: ErrorKind::InvalidData,
            msg: None,
            source: Some(Box::new(err)),
        }))
    }
}


/// A trait for adding context to an error.
pub trait ErrorExt: private::Sealed {
    /// The output type produced by [`context`][ErrorExt::context] and
    /// [`with_context`][ErrorExt::with_context].
    type Output;

    /// Add context to the error.
    fn context<C>(self, context: C) -> Self::Output
    where
        C: Into<Cow<'static, str>>;

    /// Add context to the error, lazily evaluated.
    fn with_context<C, F>(self, f: F) -> Self::Output
    where
        C: Into<Cow<'static, str>>,
        F: FnOnce() -> C;
}

impl ErrorExt for Error {
    type Output = Error;

    fn context<C>(self, context: C) -> Self::Output
    where
        C: Into<Cow<'static, str>>,
    {
        Self(Box::new(Repr {
            kind: self.0.kind,
            msg: Some(context.into()),
            source: Some(Box::new(self)),
        }))
    }

    fn with_context<C, F>(self, f: F) -> Self::Output
    where
        C: Into<Cow<'static, str>>,
        F: FnOnce() -> C,
    {
        self.context(f())
    }
}

impl<T, E> ErrorExt for result::Result<T, E>
where
    E: Into<Error>,
{
    type Output = Result<T>;

    fn context<C>(self, context: C) -> Self::Output
    where
        C: Into<Cow<'static, str>>,
    {
        self.map_err(|err| err.into().context(context))
    }

    fn with_context<C, F>(self, f: F) -> Self::Output
    where
        C: Into<Cow<'static, str>>,
        F: FnOnce() -> C,
    {
        self.map_err(|err| err.into().context(f()))
    }
}

mod private {
    use super::Error;

    pub trait Sealed {}

    impl Sealed for Error {}
    impl<T, E> Sealed for super::result::Result<T, E> where E: Into<Error> {}
}


#[cfg(test)]
mod tests {
    use super::*;


    /// Check that `io::Error` kinds map to the expected `ErrorKind`.
    #[test]
    fn io_error_kind_mapping() {
        let err = Error::from(io::Error::new(io::ErrorKind::NotFound, "oops"));
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = Error::from(io::Error::new(io::ErrorKind::PermissionDenied, "oops"));
        assert_eq!(err.kind(), ErrorKind::PermissionDenied);

        let err = Error::from(io::Error::new(io::ErrorKind::WouldBlock, "oops"));
        assert_eq!(err.kind(), ErrorKind::Other);
    }

    /// Check that context layers preserve the error kind and are
    /// reported in order.
    #[test]
    fn context_layering() {
        let root = Error::from(io::Error::new(io::ErrorKind::NotFound, "no such file"));
        let err = root
            .context("failed to load symbol table")
            .context("failed to symbolize");

        assert_eq!(err.kind(), ErrorKind::NotFound);
        let displayed = err.to_string();
        assert!(
            displayed.starts_with("failed to symbolize: failed to load symbol table"),
            "{displayed}"
        );
        assert!(displayed.ends_with("no such file"), "{displayed}");
    }

    /// Check that context can be added to a `Result` directly.
    #[test]
    fn result_context() {
        fn fail() -> result::Result<(), io::Error> {
            Err(io::Error::new(io::ErrorKind::InvalidData, "garbled"))
        }

        let err = fail().with_context(|| "parsing failed").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
        assert_eq!(err.to_string(), "parsing failed: garbled");
    }

    /// Errors without a message display their kind.
    #[test]
    fn kind_display() {
        let err = Error::with_not_found("no kallsyms");
        assert_eq!(err.to_string(), "no kallsyms");
        assert_eq!(ErrorKind::NotFound.as_str(), "entity not found");
    }
}
