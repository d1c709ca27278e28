//! OS process helpers for supervised capture processes.
//!
//! [`capture_command`] builds a child detached from the recorder's console:
//! no window on Windows, and on Unix its own process group, so a terminal
//! Ctrl+C reaches only the recorder, which then stops captures in order.
//! The remaining functions query and signal the OS process table directly.

mod tree;

pub use tree::{descendants, is_process_alive, kill_tree, process_exists, send_interrupt};

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// Detach a command from the console of the parent process.
pub trait DetachExt {
    fn detach_console(&mut self) -> &mut Self;
}

#[cfg(feature = "tokio")]
impl DetachExt for tokio::process::Command {
    fn detach_console(&mut self) -> &mut Self {
        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            self.as_std_mut().creation_flags(CREATE_NO_WINDOW);
        }
        #[cfg(unix)]
        self.process_group(0);
        self
    }
}

/// A `tokio` command for a capture process, see [`DetachExt`].
#[cfg(feature = "tokio")]
pub fn capture_command(program: impl AsRef<std::ffi::OsStr>) -> tokio::process::Command {
    let mut cmd = tokio::process::Command::new(program);
    cmd.detach_console();
    cmd
}
