use ::std::{string::String, error, fmt, io, result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The command ran, but the success policy rejected its result.
    Execution,
    /// Waiting for the command was interrupted.
    Interrupted,
    /// The process could not be started.
    Spawn,
    /// The configured deadline passed before the command finished.
    Timeout,
    /// Waiting for the process or draining its pipes failed.
    Io,
}

pub struct Error {
    kind: ErrorKind,
    comment: String,
    cause: Option<Box<dyn error::Error + Send + Sync>>,
}

impl Error {
    pub fn new<S, E>(kind: ErrorKind, comment: S, cause: E) -> Error
        where S: Into<String>, E: Into<Box<dyn error::Error + Send + Sync>> {
        Error { kind, comment: comment.into(), cause: Some(cause.into()) }
    }

    pub fn simple<S: Into<String>>(kind: ErrorKind, error_message: S) -> Error {
        Error { kind, comment: error_message.into(), cause: None }
    }

    /// Message is kept verbatim, so callers can match on the captured stderr.
    pub fn execution<S: Into<String>>(error_output: S) -> Error {
        Error::simple(ErrorKind::Execution, error_output)
    }

    pub fn interrupted<S: Into<String>>(comment: S) -> Error {
        Error::simple(ErrorKind::Interrupted, comment)
    }

    pub fn spawn<S: Into<String>>(comment: S, cause: io::Error) -> Error {
        Error::new(ErrorKind::Spawn, comment, cause)
    }

    pub fn timeout<S: Into<String>>(comment: S) -> Error {
        Error::simple(ErrorKind::Timeout, comment)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.comment
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.cause {
            &Some(ref cause) => {
                if self.comment == "" {
                    write!(f, "{}", cause)
                } else {
                    write!(f, "{}: {}", self.comment, cause)
                }
            }
            &None => {
                write!(f, "{}", self.comment)
            }
        }
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self)
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self.cause {
            Some(ref cause) => Some(cause.as_ref()),
            None => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(error: io::Error) -> Error {
        let kind = match error.kind() {
            io::ErrorKind::Interrupted => ErrorKind::Interrupted,
            io::ErrorKind::TimedOut => ErrorKind::Timeout,
            _ => ErrorKind::Io,
        };
        Error::new(kind, "", error)
    }
}

pub type Result<T> = result::Result<T, Error>;

pub trait CommentError<T> {
    fn comment_error<S: Into<String>>(self, comment: S) -> Result<T>;
}

impl<T> CommentError<T> for io::Result<T> {
    fn comment_error<S: Into<String>>(self, comment: S) -> Result<T> {
        self.map_err(|e| Error { comment: comment.into(), ..Error::from(e) })
    }
}
