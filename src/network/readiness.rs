//! Readiness polling socket control (mio, edge-triggered)
//!
//! Setelah `wait` melapor readable, pemanggil wajib drain sampai WouldBlock.

use std::io;
use std::os::fd::RawFd;
use std::time::Duration;

use mio::unix::SourceFd;
use mio::{Events, Interest, Poll, Token};

use crate::error::Result;

const CONTROL: Token = Token(0);
const EVENTS_CAPACITY: usize = 8;

pub struct Readiness {
    poll: Poll,
    events: Events,
}

impl Readiness {
    pub fn new(fd: RawFd) -> Result<Self> {
        let poll = Poll::new()?;
        poll.registry()
            .register(&mut SourceFd(&fd), CONTROL, Interest::READABLE)?;
        Ok(Self {
            poll,
            events: Events::with_capacity(EVENTS_CAPACITY),
        })
    }

    /// Tunggu socket readable (atau hangup). `None` = tanpa timeout.
    ///
    /// Returns `false` kalau timeout atau terinterupsi sinyal.
    pub fn wait(&mut self, timeout: Option<Duration>) -> Result<bool> {
        match self.poll.poll(&mut self.events, timeout) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::Interrupted => return Ok(false),
            Err(e) => return Err(e.into()),
        }
        Ok(self
            .events
            .iter()
            .any(|e| e.token() == CONTROL && (e.is_readable() || e.is_read_closed())))
    }
}
