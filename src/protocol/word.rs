//! Tagged Word: unit atomik encoding tree
//!
//! Layout (fixed-size record, bukan length-prefixed):
//! ┌──────────────────────┬──────────────────────┐
//! │ tag (WORD bytes, LE) │ payload (WORD bytes) │
//! └──────────────────────┴──────────────────────┘
//!
//! WORD = lebar pointer native host (8 bytes di 64-bit).

use crate::error::{Error, Result};

/// Lebar payload dan tag dalam bytes
pub const WORD: usize = std::mem::size_of::<usize>();
pub const TAGGED_WORD_LEN: usize = 2 * WORD;

/// Sentinel "tidak ada nilai", bukan nol supaya bisa dibedakan dari nilai 0.
pub const ABSENT: u64 = 0xdead_beef_b00b_ee30;

#[inline(always)]
fn absent_bytes() -> [u8; WORD] {
    (ABSENT as usize).to_le_bytes()
}

/// Semua tag yang dimengerti renderer, nomornya bagian dari wire format.
#[repr(usize)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    // Fundamental
    Array = 0,
    Pxs,  // 1
    Rems, // 2
    Frac, // 3
    Auto, // 4

    // Color
    Rgb,  // 5
    Hsv,  // 6
    Rgba, // 7
    Hsva, // 8

    // Element boundaries
    Enter, // 9
    Leave, // 10

    // Shape
    Rect,        // 11 x, y, width, height
    RoundedRect, // 12 x, y, width, height, r
    BeginPath,   // 13
    EndPath,     // 14
    MoveTo,      // 15 x, y
    LineTo,      // 16 x, y
    QuadTo,      // 17 cx, cy, x, y
    CubicTo,     // 18 cx1, cy1, cx2, cy2, x, y
    ArcTo,       // 19 tx, ty, x, y, r
    ClosePath,   // 20

    // Pencil
    Color, // 21 color

    // Layout
    Width,   // 22 length
    Height,  // 23 length
    Padding, // 24 left, top, right, bottom
    Margin,  // 25 left, top, right, bottom
    Display, // 26 display option
    Gap,     // 27 length

    // States (payload = skip distance dalam bytes)
    Hover,        // 28
    MousePressed, // 29
    Clicked,      // 30
    OpenLatch,    // 31
    ClosedLatch,  // 32 separator sebelum default branch
    PushArg,      // 33
    PullArg,      // 34
    PullArgOr,    // 35 default
    LoadReg,      // 36
    FromReg,      // 37
    FromRegOr,    // 38 default

    // Event
    Event, // 39 id

    // Text
    Text,          // 40 x, y, TextPtr
    TextPtr,       // 41 offset blob
    FontSize,      // 42 real
    FontAlignment, // 43 alignment
    FontFamily,    // 44 TextPtr

    // Cursors
    CursorDefault, // 45
    CursorPointer, // 46
}

/// Interpretasi payload per tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    /// Tag saja yang bermakna, payload = `ABSENT`
    Absent,
    /// Unsigned word: panjang, id, offset, skip distance, enum option
    Unsigned,
    /// f32 di 4 byte pertama
    Real,
    /// Raw bytes (warna)
    Bytes,
}

const ALL_TAGS: [Tag; 47] = [
    Tag::Array,
    Tag::Pxs,
    Tag::Rems,
    Tag::Frac,
    Tag::Auto,
    Tag::Rgb,
    Tag::Hsv,
    Tag::Rgba,
    Tag::Hsva,
    Tag::Enter,
    Tag::Leave,
    Tag::Rect,
    Tag::RoundedRect,
    Tag::BeginPath,
    Tag::EndPath,
    Tag::MoveTo,
    Tag::LineTo,
    Tag::QuadTo,
    Tag::CubicTo,
    Tag::ArcTo,
    Tag::ClosePath,
    Tag::Color,
    Tag::Width,
    Tag::Height,
    Tag::Padding,
    Tag::Margin,
    Tag::Display,
    Tag::Gap,
    Tag::Hover,
    Tag::MousePressed,
    Tag::Clicked,
    Tag::OpenLatch,
    Tag::ClosedLatch,
    Tag::PushArg,
    Tag::PullArg,
    Tag::PullArgOr,
    Tag::LoadReg,
    Tag::FromReg,
    Tag::FromRegOr,
    Tag::Event,
    Tag::Text,
    Tag::TextPtr,
    Tag::FontSize,
    Tag::FontAlignment,
    Tag::FontFamily,
    Tag::CursorDefault,
    Tag::CursorPointer,
];

impl Tag {
    #[inline(always)]
    pub fn from_usize(v: usize) -> Option<Self> {
        ALL_TAGS.get(v).copied()
    }

    pub fn payload_kind(self) -> PayloadKind {
        use Tag::*;
        match self {
            Pxs | Rems | Frac | FontSize => PayloadKind::Real,
            Rgb | Hsv | Rgba | Hsva => PayloadKind::Bytes,
            Array | Display | Hover | MousePressed | Clicked | OpenLatch | ClosedLatch
            | PushArg | LoadReg | FromReg | FromRegOr | Event | TextPtr | FontAlignment => {
                PayloadKind::Unsigned
            }
            Auto | Enter | Leave | Rect | RoundedRect | BeginPath | EndPath | MoveTo | LineTo
            | QuadTo | CubicTo | ArcTo | ClosePath | Color | Width | Height | Padding | Margin
            | Gap | PullArg | PullArgOr | Text | FontFamily | CursorDefault | CursorPointer => {
                PayloadKind::Absent
            }
        }
    }

    /// Jumlah tagged word yang mengikuti tag ini sebagai bagian dari construct yang sama.
    ///
    /// Tabel ini yang dipakai decoder untuk mengelompokkan word, dan dipakai
    /// node leaf untuk menghitung ukuran tanpa menulis apa pun.
    pub fn operand_count(self) -> usize {
        use Tag::*;
        match self {
            Color | Width | Height | Gap | FontFamily | PullArgOr | FromRegOr => 1,
            MoveTo | LineTo => 2,
            Text => 3,
            Rect | QuadTo | Padding | Margin => 4,
            RoundedRect | ArcTo => 5,
            CubicTo => 6,
            _ => 0,
        }
    }

    /// Tag kondisi yang payload-nya skip distance ke depan.
    pub fn is_branch(self) -> bool {
        matches!(
            self,
            Tag::Hover | Tag::MousePressed | Tag::Clicked | Tag::OpenLatch | Tag::ClosedLatch
        )
    }
}

/// Payload sebelum di-encode ke WORD bytes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Word {
    Absent,
    Unsigned(u64),
    Real(f32),
    /// Bytes sudah di-pad nol sampai WORD
    Bytes([u8; WORD]),
}

impl Word {
    /// Raw bytes yang lebih pendek dari WORD di-pad nol; lebih panjang ditolak.
    pub fn bytes(raw: &[u8]) -> Result<Self> {
        if raw.len() > WORD {
            return Err(Error::EncodingContractViolation { len: raw.len() });
        }
        let mut padded = [0u8; WORD];
        padded[..raw.len()].copy_from_slice(raw);
        Ok(Word::Bytes(padded))
    }

    #[inline(always)]
    pub fn offset(offset: usize) -> Self {
        Word::Unsigned(offset as u64)
    }

    /// Encode ke tepat WORD bytes little-endian.
    pub fn encode(self) -> Result<[u8; WORD]> {
        match self {
            Word::Absent => Ok(absent_bytes()),
            Word::Unsigned(v) => {
                let v = usize::try_from(v)
                    .map_err(|_| Error::EncodingContractViolation {
                        len: std::mem::size_of::<u64>(),
                    })?;
                Ok(v.to_le_bytes())
            }
            Word::Real(v) => {
                let mut out = [0u8; WORD];
                out[..4].copy_from_slice(&v.to_le_bytes());
                Ok(out)
            }
            Word::Bytes(b) => Ok(b),
        }
    }
}

/// Satu record `(tag, payload)` seperti yang ada di buffer.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct TaggedWord {
    pub tag: Tag,
    pub payload: [u8; WORD],
}

impl std::fmt::Debug for TaggedWord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}({:?})", self.tag, self.value())
    }
}

/// Nilai semantik hasil decode payload
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Absent,
    Unsigned(u64),
    Real(f32),
    Bytes([u8; WORD]),
}

impl TaggedWord {
    pub fn new(tag: Tag, word: Word) -> Result<Self> {
        Ok(Self {
            tag,
            payload: word.encode()?,
        })
    }

    #[inline(always)]
    pub fn to_bytes(&self) -> [u8; TAGGED_WORD_LEN] {
        let mut out = [0u8; TAGGED_WORD_LEN];
        out[..WORD].copy_from_slice(&(self.tag as usize).to_le_bytes());
        out[WORD..].copy_from_slice(&self.payload);
        out
    }

    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        if buf.len() < TAGGED_WORD_LEN {
            return Err(Error::Malformed(format!(
                "tagged word needs {TAGGED_WORD_LEN} bytes, got {}",
                buf.len()
            )));
        }

        let mut raw_tag = [0u8; WORD];
        raw_tag.copy_from_slice(&buf[..WORD]);
        let raw_tag = usize::from_le_bytes(raw_tag);
        let tag = Tag::from_usize(raw_tag)
            .ok_or_else(|| Error::Malformed(format!("unknown tag {raw_tag}")))?;

        let mut payload = [0u8; WORD];
        payload.copy_from_slice(&buf[WORD..TAGGED_WORD_LEN]);
        Ok(Self { tag, payload })
    }

    #[inline(always)]
    pub fn is_absent(&self) -> bool {
        self.payload == absent_bytes()
    }

    #[inline(always)]
    pub fn as_unsigned(&self) -> u64 {
        usize::from_le_bytes(self.payload) as u64
    }

    #[inline(always)]
    pub fn as_real(&self) -> f32 {
        let mut raw = [0u8; 4];
        raw.copy_from_slice(&self.payload[..4]);
        f32::from_le_bytes(raw)
    }

    /// Decode payload sesuai `PayloadKind` tag-nya.
    pub fn value(&self) -> Value {
        if self.is_absent() {
            return Value::Absent;
        }
        match self.tag.payload_kind() {
            PayloadKind::Real => Value::Real(self.as_real()),
            PayloadKind::Bytes => Value::Bytes(self.payload),
            PayloadKind::Unsigned | PayloadKind::Absent => Value::Unsigned(self.as_unsigned()),
        }
    }
}
