//! Cursor-threading writer
//!
//! Setiap `Node` menulis dirinya mulai dari `cursor` dan mengembalikan offset
//! tepat setelah byte terakhir. Tree ditulis ke staging buffer dulu, lalu di-flush
//! dengan SATU guarded write, supaya renderer tidak pernah melihat tree setengah jadi.

use super::word::{Tag, TaggedWord, Word, TAGGED_WORD_LEN};
use crate::core::SharedBuffer;
use crate::error::{Error, Result};
use crate::events::{Callback, CallbackRegistry, EventId};
use crate::text::TextCell;

/// Construct yang bisa di-encode ke buffer.
///
/// `word_count` adalah pass "measure" (tanpa I/O), `write` adalah pass "emit".
/// Keduanya wajib konsisten: branch header dihitung dari `word_count` sebelum
/// body ditulis.
pub trait Node {
    /// Jumlah tagged word yang akan ditulis `write`
    fn word_count(&self) -> usize;

    fn write(&self, w: &mut Writer<'_>, cursor: usize) -> Result<usize>;

    /// Ukuran encoding dalam bytes
    fn encoded_len(&self) -> usize {
        self.word_count() * TAGGED_WORD_LEN
    }
}

impl<N: Node + ?Sized> Node for Box<N> {
    fn word_count(&self) -> usize {
        (**self).word_count()
    }

    fn write(&self, w: &mut Writer<'_>, cursor: usize) -> Result<usize> {
        (**self).write(w, cursor)
    }
}

impl<N: Node + ?Sized> Node for &N {
    fn word_count(&self) -> usize {
        (**self).word_count()
    }

    fn write(&self, w: &mut Writer<'_>, cursor: usize) -> Result<usize> {
        (**self).write(w, cursor)
    }
}

/// Back-reference text cell yang menunggu di-commit setelah flush sukses.
pub(crate) struct PendingBinding {
    pub cell: TextCell,
    pub slot: usize,
}

/// Staging buffer untuk satu tree
pub struct Writer<'a> {
    base: usize,
    staged: Vec<u8>,
    registry: &'a mut CallbackRegistry,
    bindings: Vec<PendingBinding>,
}

impl<'a> Writer<'a> {
    /// Membuat writer yang tree-nya akan diletakkan di offset `base`
    pub fn new(base: usize, registry: &'a mut CallbackRegistry) -> Self {
        Self {
            base,
            staged: Vec::new(),
            registry,
            bindings: Vec::new(),
        }
    }

    pub fn with_capacity(base: usize, words: usize, registry: &'a mut CallbackRegistry) -> Self {
        let mut w = Self::new(base, registry);
        w.staged.reserve(words * TAGGED_WORD_LEN);
        w
    }

    #[inline(always)]
    pub fn base(&self) -> usize {
        self.base
    }

    /// Offset berikutnya yang valid untuk ditulis
    #[inline(always)]
    pub fn cursor(&self) -> usize {
        self.base + self.staged.len()
    }

    /// Tulis satu tagged word di `cursor`, kembalikan cursor berikutnya.
    #[inline]
    pub fn write_word(&mut self, cursor: usize, tag: Tag, word: Word) -> Result<usize> {
        let expected = self.cursor();
        if cursor != expected {
            return Err(Error::NonContiguousWrite {
                offset: cursor,
                expected,
            });
        }

        let tw = TaggedWord::new(tag, word)?;
        self.staged.extend_from_slice(&tw.to_bytes());
        Ok(cursor + TAGGED_WORD_LEN)
    }

    /// Simpan callback, dapatkan id berikutnya.
    pub fn register(&mut self, callback: Callback) -> EventId {
        self.registry.register(callback)
    }

    /// Catat bahwa payload di `slot` mereferensikan blob milik `cell`.
    pub fn bind(&mut self, cell: &TextCell, slot: usize) -> Result<()> {
        if let Some(existing) = cell.slot() {
            return Err(Error::UnboundCell { slot: existing });
        }
        if let Some(pending) = self.bindings.iter().find(|b| b.cell.same_cell(cell)) {
            return Err(Error::UnboundCell { slot: pending.slot });
        }
        self.bindings.push(PendingBinding {
            cell: cell.clone(),
            slot,
        });
        Ok(())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.staged
    }

    /// Flush staging ke buffer dengan satu guarded write.
    ///
    /// Back-reference belum diikat; panggil `Flushed::commit` setelah tree
    /// benar-benar dipakai. Kalau `Flushed` di-drop, cell tetap unbound.
    pub fn flush(self, buffer: &dyn SharedBuffer) -> Result<Flushed> {
        let end = self.cursor();
        buffer.guarded_write(self.base, &self.staged)?;
        Ok(Flushed {
            end,
            bindings: self.bindings,
        })
    }
}

/// Tree yang sudah ada di buffer, dengan back-reference yang belum di-commit.
#[must_use = "text cells stay unbound until commit() is called"]
pub struct Flushed {
    end: usize,
    bindings: Vec<PendingBinding>,
}

impl Flushed {
    /// Offset tepat setelah tree
    #[inline(always)]
    pub fn end(&self) -> usize {
        self.end
    }

    /// Ikat setiap text cell ke slot-nya. Returns offset tepat setelah tree.
    pub fn commit(self) -> usize {
        for binding in self.bindings {
            binding.cell.bind(binding.slot);
        }
        self.end
    }
}

/// Tulis satu tagged word langsung ke shared buffer (satu guarded write).
///
/// Returns `offset + 2 * WORD`.
pub fn write_tagged_word(
    buffer: &dyn SharedBuffer,
    offset: usize,
    tag: Tag,
    word: Word,
) -> Result<usize> {
    let tw = TaggedWord::new(tag, word)?;
    buffer.guarded_write(offset, &tw.to_bytes())?;
    Ok(offset + TAGGED_WORD_LEN)
}
