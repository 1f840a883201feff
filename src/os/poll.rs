// src/os/poll.rs

//! Blocking wait on a single descriptor, used for the device's event-ready fd.

use log::trace;
use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use std::os::unix::io::{BorrowedFd, RawFd};
use std::time::{Duration, Instant};

/// Waits until `fd` is readable.
///
/// `None` blocks indefinitely. Returns `Ok(false)` if the timeout expired
/// first. Interrupted waits are resumed with the remaining time.
pub fn wait_readable(fd: RawFd, timeout: Option<Duration>) -> Result<bool, Errno> {
    let deadline = timeout.map(|t| Instant::now() + t);

    loop {
        let poll_timeout = match deadline {
            None => PollTimeout::NONE,
            Some(deadline) => to_poll_timeout(deadline.saturating_duration_since(Instant::now())),
        };

        // SAFETY: the caller owns `fd` for the duration of the call.
        let borrowed = unsafe { BorrowedFd::borrow_raw(fd) };
        let mut fds = [PollFd::new(borrowed, PollFlags::POLLIN)];

        trace!("Polling fd {} with timeout {:?}", fd, poll_timeout);
        match poll(&mut fds, poll_timeout) {
            Ok(0) => return Ok(false),
            Ok(_) => {
                let revents = fds[0].revents().unwrap_or(PollFlags::empty());
                trace!("fd {} ready with {:?}", fd, revents);
                if revents.intersects(PollFlags::POLLNVAL) {
                    return Err(Errno::EBADF);
                }
                return Ok(true);
            }
            Err(Errno::EINTR) => {
                trace!("poll on fd {} interrupted (EINTR), retrying", fd);
                continue;
            }
            Err(err) => return Err(err),
        }
    }
}

fn to_poll_timeout(remaining: Duration) -> PollTimeout {
    // Round up so a sub-millisecond remainder does not turn into a busy spin.
    let mut millis = remaining.as_millis();
    if remaining.subsec_nanos() % 1_000_000 != 0 {
        millis += 1;
    }
    let millis = i32::try_from(millis).unwrap_or(i32::MAX);
    PollTimeout::try_from(millis).unwrap_or(PollTimeout::MAX)
}
