//! Mutable reference cell untuk konten text
//!
//! Blob di data region:
//!
//! ```text
//! [Array | len] [bytes UTF-8 ... sampai capacity]
//! ```
//!
//! Tree hanya menyimpan offset blob (word `TextPtr`). Update yang muat di
//! capacity ditulis di tempat. Update yang lebih besar merelokasi blob lalu
//! mem-patch payload `TextPtr` di slot yang dicatat saat cell ditulis ke tree.
//!
//! Urutan relokasi: alokasi baru, tulis blob baru, patch slot, post ready, baru
//! free blob lama. Tree tidak pernah menunjuk ke memory yang sudah di-free, dan
//! blob baru dikembalikan ke allocator kalau write atau patch gagal.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use tracing::debug;

use crate::core::SharedBuffer;
use crate::error::{Error, Result};
use crate::protocol::{Node, Tag, TaggedWord, Word, Writer, TAGGED_WORD_LEN, WORD};
use crate::session::Session;

#[derive(Debug)]
struct CellState {
    offset: usize,
    capacity: usize,
    len: usize,
    slot: Option<usize>,
    released: bool,
}

/// Handle ke blob text; clone berbagi state yang sama.
#[derive(Clone)]
pub struct TextCell {
    state: Rc<RefCell<CellState>>,
}

/// Ukuran alokasi untuk `capacity` bytes konten
#[inline(always)]
pub fn blob_len(capacity: usize) -> usize {
    TAGGED_WORD_LEN + capacity
}

/// Length word + bytes, siap untuk satu guarded write.
pub fn encode_blob(content: &[u8]) -> Result<Vec<u8>> {
    let header = TaggedWord::new(Tag::Array, Word::Unsigned(content.len() as u64))?;
    let mut out = Vec::with_capacity(blob_len(content.len()));
    out.extend_from_slice(&header.to_bytes());
    out.extend_from_slice(content);
    Ok(out)
}

impl TextCell {
    /// Alokasi blob dengan capacity = panjang `content` lalu tulis isinya.
    pub fn create(session: &mut Session, content: &str) -> Result<Self> {
        let bytes = content.as_bytes();
        let offset = session.allocate(blob_len(bytes.len()))?;
        if let Err(err) = write_blob(session, offset, bytes) {
            session.discard(offset, &err);
            return Err(err);
        }
        debug!(offset, capacity = bytes.len(), "text cell created");

        Ok(Self {
            state: Rc::new(RefCell::new(CellState {
                offset,
                capacity: bytes.len(),
                len: bytes.len(),
                slot: None,
                released: false,
            })),
        })
    }

    pub fn offset(&self) -> usize {
        self.state.borrow().offset
    }

    pub fn capacity(&self) -> usize {
        self.state.borrow().capacity
    }

    /// Panjang konten saat ini dalam bytes
    pub fn len(&self) -> usize {
        self.state.borrow().len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Offset payload `TextPtr` yang mereferensikan blob ini
    pub fn slot(&self) -> Option<usize> {
        self.state.borrow().slot
    }

    pub fn is_released(&self) -> bool {
        self.state.borrow().released
    }

    pub fn same_cell(&self, other: &TextCell) -> bool {
        Rc::ptr_eq(&self.state, &other.state)
    }

    /// Node `TextPtr` ke blob ini; menulisnya mengikat cell ke slot tersebut.
    pub fn reference(&self) -> TextRef {
        TextRef { cell: self.clone() }
    }

    pub(crate) fn bind(&self, slot: usize) {
        self.state.borrow_mut().slot = Some(slot);
    }

    /// Lepas back-reference supaya cell bisa ditulis ke tree baru.
    pub fn unbind(&self) -> Option<usize> {
        self.state.borrow_mut().slot.take()
    }

    /// Ganti isi blob. Relokasi hanya kalau `content` melebihi capacity.
    ///
    /// Post sinyal ready sekali di akhir.
    pub fn update(&self, session: &mut Session, content: &str) -> Result<()> {
        let bytes = content.as_bytes();
        let (offset, capacity, slot) = {
            let state = self.state.borrow();
            if state.released {
                return Err(Error::ReleasedCell);
            }
            (state.offset, state.capacity, state.slot)
        };

        if bytes.len() <= capacity {
            write_blob(session, offset, bytes)?;
            self.state.borrow_mut().len = bytes.len();
            return session.signal_ready();
        }

        let slot = slot.ok_or(Error::UnboundUpdate)?;
        let moved = session.allocate(blob_len(bytes.len()))?;
        let patched = write_blob(session, moved, bytes).and_then(|()| {
            session
                .buffer()
                .guarded_write(slot, &Word::offset(moved).encode()?)
        });
        if let Err(err) = patched {
            session.discard(moved, &err);
            return Err(err);
        }

        {
            let mut state = self.state.borrow_mut();
            state.offset = moved;
            state.capacity = bytes.len();
            state.len = bytes.len();
        }
        debug!(from = offset, to = moved, slot, capacity = bytes.len(), "text cell relocated");

        // Slot sudah menunjuk ke blob baru; renderer harus redraw walau free gagal.
        let ready = session.signal_ready();
        let freed = session.free(offset);
        ready.and(freed)
    }

    /// Baca isi blob dari buffer.
    pub fn read(&self, buffer: &dyn SharedBuffer) -> Result<String> {
        let offset = self.offset();
        let header = TaggedWord::from_bytes(&buffer.guarded_read(offset, TAGGED_WORD_LEN)?)?;
        if header.tag != Tag::Array {
            return Err(Error::Malformed(format!(
                "text blob at {offset} starts with {:?}",
                header.tag
            )));
        }
        let len = header.as_unsigned() as usize;
        let bytes = buffer.guarded_read(offset + TAGGED_WORD_LEN, len)?;
        String::from_utf8(bytes)
            .map_err(|e| Error::Malformed(format!("text blob at {offset} is not UTF-8: {e}")))
    }

    /// Kembalikan blob ke allocator. Cell (dan semua clone-nya) tidak bisa dipakai lagi.
    pub fn release(&self, session: &mut Session) -> Result<()> {
        let offset = {
            let mut state = self.state.borrow_mut();
            if state.released {
                return Ok(());
            }
            state.released = true;
            state.slot = None;
            state.offset
        };
        session.free(offset)
    }
}

fn write_blob(session: &Session, offset: usize, content: &[u8]) -> Result<()> {
    session.buffer().guarded_write(offset, &encode_blob(content)?)
}

impl fmt::Debug for TextCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.state.borrow(), f)
    }
}

/// Satu word `TextPtr`
pub struct TextRef {
    cell: TextCell,
}

impl Node for TextRef {
    fn word_count(&self) -> usize {
        1
    }

    fn write(&self, w: &mut Writer<'_>, cursor: usize) -> Result<usize> {
        if self.cell.is_released() {
            return Err(Error::ReleasedCell);
        }
        w.bind(&self.cell, cursor + WORD)?;
        w.write_word(cursor, Tag::TextPtr, Word::offset(self.cell.offset()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blob_layout() {
        let blob = encode_blob(b"hi").unwrap();
        assert_eq!(blob.len(), blob_len(2));

        let header = TaggedWord::from_bytes(&blob).unwrap();
        assert_eq!(header.tag, Tag::Array);
        assert_eq!(header.as_unsigned(), 2);
        assert_eq!(&blob[TAGGED_WORD_LEN..], b"hi");
    }

    #[test]
    fn test_empty_blob_is_header_only() {
        assert_eq!(encode_blob(b"").unwrap().len(), TAGGED_WORD_LEN);
    }
}
