//! `mount`/`umount` wrappers.
//!
//! Arguments are passed through untouched. In the shell invocation mode any
//! of them can carry extra shell syntax, so they must come from a trusted
//! caller.

use ::command_line::CommandLine;
use ::result::Result;
use ::runner::Runner;

/// `mount -t <fstype> -o <data> <name> <target>`
pub fn mount_command(name: &str, target: &str, fstype: &str, data: &str) -> CommandLine {
    CommandLine::new("mount")
        .args(vec!["-t", fstype, "-o", data, name, target])
}

/// `umount <name>`
pub fn umount_command(name: &str) -> CommandLine {
    CommandLine::new("umount").arg(name)
}

impl Runner {
    /// Mounts `name` on `target`. Returns whatever `mount` printed to stdout.
    ///
    /// Nothing is rolled back if the command fails halfway.
    pub fn mount(&self, name: &str, target: &str, fstype: &str, data: &str) -> Result<String> {
        self.run(&mount_command(name, target, fstype, data))
    }

    pub fn umount(&self, name: &str) -> Result<String> {
        self.run(&umount_command(name))
    }
}

pub fn mount(name: &str, target: &str, fstype: &str, data: &str) -> Result<String> {
    Runner::default().mount(name, target, fstype, data)
}

pub fn umount(name: &str) -> Result<String> {
    Runner::default().umount(name)
}
