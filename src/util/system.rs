//! System-specific shims for core counts and terminal geometry

/// Gets the number of available cores on the system. On Linux, this excludes
/// those that have been disabled.
///
/// **Note**: Operates independently of the scheduling settings on the
/// current process
#[must_use]
pub fn num_cores() -> u64 { cpu::num_available_cores() }

/// Gets the character width of the terminal attached to the given stream, if
/// there is one
#[must_use]
pub fn terminal_width(stream: atty::Stream) -> Option<usize> { term::width(stream) }

#[cfg(unix)]
mod cpu {
    use libc::{c_long, sysconf, _SC_NPROCESSORS_ONLN};

    pub fn num_available_cores() -> u64 {
        let count: c_long = unsafe { sysconf(_SC_NPROCESSORS_ONLN) };
        if count < 1 {
            1
        } else {
            count as u64
        }
    }
}

#[cfg(not(unix))]
mod cpu {
    pub fn num_available_cores() -> u64 { 1 }
}

#[cfg(unix)]
mod term {
    use libc::{ioctl, winsize, STDERR_FILENO, STDOUT_FILENO, TIOCGWINSZ};
    use std::mem;

    /// Invokes the TIOCGWINSZ ioctl on the stream's file descriptor to read
    /// the attached terminal's dimensions
    pub fn width(stream: atty::Stream) -> Option<usize> {
        let fd = match stream {
            atty::Stream::Stdout => STDOUT_FILENO,
            atty::Stream::Stderr => STDERR_FILENO,
            atty::Stream::Stdin => return None,
        };

        let mut size: winsize = unsafe { mem::zeroed() };
        let result = unsafe { ioctl(fd, TIOCGWINSZ, &mut size) };
        if result == 0 && size.ws_col > 0 {
            Some(size.ws_col as usize)
        } else {
            None
        }
    }
}

#[cfg(not(unix))]
mod term {
    pub fn width(_stream: atty::Stream) -> Option<usize> { None }
}
