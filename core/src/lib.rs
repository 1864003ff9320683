extern crate libc;
extern crate nix;
#[macro_use]
extern crate log;
#[macro_use]
extern crate scopeguard;
extern crate serde;
#[macro_use]
extern crate serde_derive;

pub mod result;
pub mod check;
#[macro_use]
pub mod logger;
pub mod interrupt;
pub mod command_line;
pub mod runner;
pub mod mount;

pub use self::result::{Error, ErrorKind, Result, CommentError};
pub use self::interrupt::Interrupter;
pub use self::command_line::CommandLine;
pub use self::runner::*;
pub use self::mount::{mount, umount, mount_command, umount_command};
