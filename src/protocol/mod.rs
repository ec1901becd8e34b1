//! Protocol Layer: tagged-word tree encoding
//!
//! Prinsip desain:
//! - Fixed-width: setiap record adalah `(tag, payload)` selebar 2 × WORD
//! - Measure lalu emit: ukuran setiap node diketahui tanpa menulis
//! - Satu guarded write per tree: renderer tidak pernah melihat tree setengah jadi

mod branch;
pub mod decoder;
mod nodes;
mod word;
mod writer;

pub use branch::{Conditional, OnEvent, StateKind};
pub use nodes::{
    auto, frac, px, rem, Alignment, Color, DisplayOption, Div, Element, FontFamily, Length, Prop,
    Sides, Text,
};
pub use word::{PayloadKind, Tag, TaggedWord, Value, Word, ABSENT, TAGGED_WORD_LEN, WORD};
pub use writer::{write_tagged_word, Flushed, Node, Writer};
