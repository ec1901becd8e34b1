//! Conditional dan event branch
//!
//! Payload header branch adalah jarak skip dalam bytes, bukan pointer.
//! Dengan default:
//!
//! ```text
//! [state | 2W·(k1+k2+1)] [body on: k1 word] [ClosedLatch | 2W·k2] [body default: k2 word]
//! ```
//!
//! Tanpa default: `[state | 2W·k1] [body: k1 word]`.

use super::word::{Tag, Word, TAGGED_WORD_LEN};
use super::writer::{Node, Writer};
use crate::error::{Error, Result};
use crate::events::Callback;

/// State interaksi yang bisa di-branch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateKind {
    Hover,
    Pressed,
    Clicked,
}

impl StateKind {
    pub fn tag(self) -> Tag {
        match self {
            StateKind::Hover => Tag::Hover,
            StateKind::Pressed => Tag::MousePressed,
            StateKind::Clicked => Tag::Clicked,
        }
    }
}

#[inline(always)]
fn skip(words: usize) -> Word {
    Word::Unsigned((words * TAGGED_WORD_LEN) as u64)
}

/// Tulis `body` dan pastikan jumlah bytes sesuai hasil measure.
fn write_measured(body: &dyn Node, w: &mut Writer<'_>, cursor: usize) -> Result<usize> {
    let end = body.write(w, cursor)?;
    let expected = cursor + body.encoded_len();
    if end != expected {
        return Err(Error::Malformed(format!(
            "branch body measured {} bytes but wrote {}",
            body.encoded_len(),
            end - cursor
        )));
    }
    Ok(end)
}

/// Nilai yang bergantung pada state interaksi
pub struct Conditional {
    state: StateKind,
    on: Box<dyn Node>,
    default: Option<Box<dyn Node>>,
}

impl Conditional {
    pub fn new(state: StateKind, on: impl Node + 'static) -> Self {
        Self {
            state,
            on: Box::new(on),
            default: None,
        }
    }

    pub fn with_default(state: StateKind, on: impl Node + 'static, default: impl Node + 'static) -> Self {
        Self {
            state,
            on: Box::new(on),
            default: Some(Box::new(default)),
        }
    }

    /// Payload header dalam word: k1, atau k1 + k2 + 1 kalau ada default.
    pub fn header_words(&self) -> usize {
        match &self.default {
            Some(default) => self.on.word_count() + default.word_count() + 1,
            None => self.on.word_count(),
        }
    }
}

impl Node for Conditional {
    fn word_count(&self) -> usize {
        1 + self.header_words()
    }

    fn write(&self, w: &mut Writer<'_>, cursor: usize) -> Result<usize> {
        let cursor = w.write_word(cursor, self.state.tag(), skip(self.header_words()))?;
        let cursor = write_measured(&*self.on, w, cursor)?;

        match &self.default {
            Some(default) => {
                let cursor = w.write_word(cursor, Tag::ClosedLatch, skip(default.word_count()))?;
                write_measured(&**default, w, cursor)
            }
            None => Ok(cursor),
        }
    }
}

/// Event binding: state tag yang melompati satu word `Event(id)`.
///
/// Id baru dialokasikan setiap kali node ini ditulis.
pub struct OnEvent {
    state: StateKind,
    callback: Callback,
}

impl OnEvent {
    pub fn new(state: StateKind, callback: Callback) -> Self {
        Self { state, callback }
    }

    pub fn clicked(callback: Callback) -> Self {
        Self::new(StateKind::Clicked, callback)
    }
}

impl Node for OnEvent {
    fn word_count(&self) -> usize {
        2
    }

    fn write(&self, w: &mut Writer<'_>, cursor: usize) -> Result<usize> {
        let cursor = w.write_word(cursor, self.state.tag(), skip(1))?;
        let id = w.register(self.callback.clone());
        w.write_word(cursor, Tag::Event, Word::Unsigned(id.0))
    }
}
