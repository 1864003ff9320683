use ::std::fmt::Display;
use ::std::process;

pub trait Check<T> {
    // like expect, but logs with Display and exits instead of panicking
    fn check<S: AsRef<str>>(self, msg: S) -> T;
}

impl<E: Display, T> Check<T> for Result<T, E> {
    fn check<S: AsRef<str>>(self, msg: S) -> T {
        match self {
            Ok(t) => t,
            Err(e) => {
                error!("{}: {}", msg.as_ref(), e);
                process::exit(1)
            }
        }
    }
}
