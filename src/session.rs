//! Session: satu koneksi ke renderer
//!
//! Memiliki control channel, shared buffer dan registry callback. Tidak ada
//! reconnect; error fatal berarti session selesai.
//!
//! Kebijakan sinyal ready: guarded write tidak pernah post sendiri. `inflate`
//! dan `TextCell::update` masing-masing post tepat sekali setelah selesai.

use std::os::fd::AsRawFd;
use std::time::Duration;

use tracing::{debug, info, trace, warn};

use crate::allocator::Allocator;
use crate::config::SessionConfig;
use crate::core::{SharedBuffer, ShmRegion};
use crate::error::{Error, Result};
use crate::events::{CallbackRegistry, EventId};
use crate::network::{Channel, Inbound, Readiness};
use crate::protocol::{decoder, Flushed, Node, TaggedWord, Writer, TAGGED_WORD_LEN};
use crate::text::TextCell;

pub struct Session {
    channel: Channel,
    buffer: Box<dyn SharedBuffer>,
    registry: CallbackRegistry,
    readiness: Option<Readiness>,
}

impl Session {
    /// Buka shared memory, semaphore dan socket sesuai `config`.
    pub fn connect(config: &SessionConfig) -> Result<Self> {
        let region = ShmRegion::open(config)?;
        let channel = Channel::connect(&config.socket_path)?;
        info!(
            shm = %config.shm_name,
            socket = %config.socket_path.display(),
            version = config.protocol_version,
            "session established"
        );
        Ok(Self::new(channel, region))
    }

    pub fn from_env() -> Result<Self> {
        Self::connect(&SessionConfig::from_env()?)
    }

    pub fn new(channel: Channel, buffer: impl SharedBuffer + 'static) -> Self {
        Self {
            channel,
            buffer: Box::new(buffer),
            registry: CallbackRegistry::default(),
            readiness: None,
        }
    }

    pub fn buffer(&self) -> &dyn SharedBuffer {
        &*self.buffer
    }

    pub fn channel_mut(&mut self) -> &mut Channel {
        &mut self.channel
    }

    pub fn registry(&self) -> &CallbackRegistry {
        &self.registry
    }

    pub fn allocate(&mut self, size: usize) -> Result<usize> {
        self.channel.allocate(size)
    }

    pub fn free(&mut self, offset: usize) -> Result<()> {
        self.channel.free(offset)
    }

    pub fn set_root(&mut self, offset: usize) -> Result<()> {
        self.channel.set_root(offset)
    }

    pub fn signal_ready(&self) -> Result<()> {
        self.buffer.signal_ready()
    }

    /// Stage `node` lalu tulis ke `offset` dengan satu guarded write.
    ///
    /// Returns offset tepat setelah tree.
    pub fn write_tree(&mut self, offset: usize, node: &dyn Node) -> Result<usize> {
        Ok(self.stage_tree(offset, node)?.commit())
    }

    fn stage_tree(&mut self, offset: usize, node: &dyn Node) -> Result<Flushed> {
        let mut w = Writer::with_capacity(offset, node.word_count(), &mut self.registry);
        let end = node.write(&mut w, offset)?;
        if end != offset + node.encoded_len() {
            return Err(Error::Malformed(format!(
                "tree measured {} bytes but wrote {}",
                node.encoded_len(),
                end - offset
            )));
        }
        w.flush(&*self.buffer)
    }

    /// Tulis tree di `root`, jadikan root render, lalu post ready.
    ///
    /// Text cell baru terikat setelah `set_root` sukses, jadi `inflate` yang
    /// gagal bisa diulang dengan tree yang sama.
    pub fn inflate(&mut self, root: usize, node: &dyn Node) -> Result<()> {
        let flushed = self.stage_tree(root, node)?;
        self.set_root(root)?;
        let end = flushed.commit();
        self.signal_ready()?;
        debug!(root, bytes = end - root, "tree inflated");
        Ok(())
    }

    /// Alokasi tepat seukuran tree lalu `inflate`. Returns offset root.
    ///
    /// Kalau `inflate` gagal, alokasinya dikembalikan ke renderer.
    pub fn mount(&mut self, node: &dyn Node) -> Result<usize> {
        let root = self.allocate(node.encoded_len())?;
        if let Err(err) = self.inflate(root, node) {
            self.discard(root, &err);
            return Err(err);
        }
        Ok(root)
    }

    /// Free `offset` setelah operasi yang memakainya gagal dengan `cause`.
    ///
    /// Error fatal berarti channel sudah mati, jadi tidak ada yang bisa di-free.
    pub(crate) fn discard(&mut self, offset: usize, cause: &Error) {
        if cause.is_fatal() {
            return;
        }
        if let Err(err) = self.free(offset) {
            warn!(offset, "failed to free allocation after error ({cause}): {err}");
        }
    }

    pub fn text_cell(&mut self, content: &str) -> Result<TextCell> {
        TextCell::create(self, content)
    }

    /// Baca maksimal `words` tagged word dari `root` dan potong satu tree.
    pub fn read_tree(&self, root: usize, words: usize) -> Result<Vec<TaggedWord>> {
        let raw = self.buffer.guarded_read(root, words * TAGGED_WORD_LEN)?;
        let decoded = decoder::decode_words(&raw)?;
        Ok(decoder::read_tree(&decoded)?.to_vec())
    }

    /// Proses satu pesan dari renderer.
    ///
    /// Returns `true` kalau sebuah callback dipanggil. Id yang tidak dikenal
    /// diabaikan.
    pub fn dispatch(&mut self, message: Inbound) -> Result<bool> {
        let id = match message {
            Inbound::Event { evt_id: Some(id) } => EventId(id),
            Inbound::Event { evt_id: None } => {
                warn!("event without evt_id");
                return Ok(false);
            }
            Inbound::Unknown => {
                trace!("ignoring message of unknown kind");
                return Ok(false);
            }
            reply => {
                warn!(?reply, "reply received with no ask outstanding");
                return Ok(false);
            }
        };

        let Some(callback) = self.registry.get(id) else {
            debug!(%id, "no callback bound, ignoring event");
            return Ok(false);
        };

        let Ok(mut f) = callback.try_borrow_mut() else {
            warn!(%id, "callback is already running, skipping nested event");
            return Ok(false);
        };
        trace!(%id, "dispatching event");
        (&mut *f)(self)?;
        Ok(true)
    }

    fn dispatch_buffered(&mut self) -> Result<usize> {
        let mut handled = 0;
        while let Some(message) = self.channel.next_buffered()? {
            handled += 1;
            if let Err(err) = self.dispatch(message) {
                if err.is_fatal() {
                    return Err(err);
                }
                warn!("event callback failed: {err}");
            }
        }
        Ok(handled)
    }

    fn wait_readable(&mut self, timeout: Option<Duration>) -> Result<bool> {
        let mut readiness = match self.readiness.take() {
            Some(readiness) => readiness,
            None => Readiness::new(self.channel.as_raw_fd())?,
        };
        let ready = readiness.wait(timeout);
        self.readiness = Some(readiness);
        ready
    }

    /// Satu iterasi receive loop. Returns jumlah pesan yang diproses.
    ///
    /// `None` berarti tunggu tanpa batas. Renderer yang hangup menjadi
    /// `ConnectionClosed` setelah semua pesan lengkap diproses.
    pub fn run_once(&mut self, timeout: Option<Duration>) -> Result<usize> {
        self.channel.drain()?;
        let handled = self.dispatch_buffered()?;
        if handled > 0 {
            return Ok(handled);
        }
        if self.channel.is_closed() {
            return Err(Error::ConnectionClosed);
        }

        if !self.wait_readable(timeout)? {
            return Ok(0);
        }
        self.channel.drain()?;
        let handled = self.dispatch_buffered()?;
        if handled == 0 && self.channel.is_closed() {
            return Err(Error::ConnectionClosed);
        }
        Ok(handled)
    }

    /// Receive loop sampai terjadi error fatal (termasuk renderer hangup).
    pub fn run(&mut self) -> Result<()> {
        info!("entering event loop");
        loop {
            self.run_once(None)?;
        }
    }
}
