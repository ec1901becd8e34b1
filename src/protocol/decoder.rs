//! Decoder tree: kebalikan dari `Writer`
//!
//! Dipakai untuk diagnostik (`dump`) dan test: baca tagged word berurutan,
//! kelompokkan per instruksi memakai tabel operand, cek Enter/Leave.

use std::fmt::Write as _;

use super::word::{Tag, TaggedWord, Value, TAGGED_WORD_LEN};
use crate::error::{Error, Result};

/// Reader tagged word di atas byte slice
pub struct WordReader<'a> {
    buffer: &'a [u8],
    read_pos: usize,
}

impl<'a> WordReader<'a> {
    #[inline(always)]
    pub fn new(buffer: &'a [u8]) -> Self {
        Self {
            buffer,
            read_pos: 0,
        }
    }

    /// Sisa bytes yang belum dibaca
    #[inline(always)]
    pub fn remaining(&self) -> usize {
        self.buffer.len().saturating_sub(self.read_pos)
    }
}

impl Iterator for WordReader<'_> {
    type Item = Result<TaggedWord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining() == 0 {
            return None;
        }
        let end = self.read_pos + TAGGED_WORD_LEN;
        let chunk = &self.buffer[self.read_pos..end.min(self.buffer.len())];
        self.read_pos = end;
        Some(TaggedWord::from_bytes(chunk))
    }
}

/// Decode seluruh slice; panjang harus kelipatan tagged word.
pub fn decode_words(bytes: &[u8]) -> Result<Vec<TaggedWord>> {
    if bytes.len() % TAGGED_WORD_LEN != 0 {
        return Err(Error::Malformed(format!(
            "{} bytes is not a whole number of tagged words",
            bytes.len()
        )));
    }
    WordReader::new(bytes).collect()
}

/// Potong `words` menjadi tepat satu tree yang diawali Enter.
pub fn read_tree(words: &[TaggedWord]) -> Result<&[TaggedWord]> {
    match words.first() {
        Some(first) if first.tag == Tag::Enter => {}
        Some(first) => {
            return Err(Error::Malformed(format!(
                "tree starts with {:?}, expected Enter",
                first.tag
            )))
        }
        None => return Err(Error::Malformed("empty tree".into())),
    }

    let mut depth = 0usize;
    for (i, word) in words.iter().enumerate() {
        match word.tag {
            Tag::Enter => depth += 1,
            Tag::Leave => {
                depth -= 1;
                if depth == 0 {
                    return Ok(&words[..=i]);
                }
            }
            _ => {}
        }
    }
    Err(Error::Malformed(format!("tree left {depth} element(s) open")))
}

/// Stack scanner: Leave tidak boleh melebihi Enter, dan harus seimbang di akhir.
pub fn check_balance(words: &[TaggedWord]) -> Result<()> {
    let mut depth = 0usize;
    for (i, word) in words.iter().enumerate() {
        match word.tag {
            Tag::Enter => depth += 1,
            Tag::Leave => {
                depth = depth.checked_sub(1).ok_or_else(|| {
                    Error::Malformed(format!("unmatched Leave at word {i}"))
                })?;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(Error::Malformed(format!("{depth} unmatched Enter")));
    }
    Ok(())
}

/// Satu construct: word header + operand-nya.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub head: TaggedWord,
    pub operands: Vec<TaggedWord>,
}

impl Instruction {
    pub fn tag(&self) -> Tag {
        self.head.tag
    }
}

/// Kelompokkan word per instruksi sesuai `Tag::operand_count`.
///
/// Body branch bukan operand; body tetap muncul sebagai instruksi terpisah.
pub fn instructions(words: &[TaggedWord]) -> Result<Vec<Instruction>> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < words.len() {
        let head = words[i];
        let n = head.tag.operand_count();
        let end = i + 1 + n;
        if end > words.len() {
            return Err(Error::Malformed(format!(
                "{:?} at word {i} needs {n} operands, {} left",
                head.tag,
                words.len() - i - 1
            )));
        }
        out.push(Instruction {
            head,
            operands: words[i + 1..end].to_vec(),
        });
        i = end;
    }
    Ok(out)
}

fn fmt_value(word: &TaggedWord) -> String {
    match word.value() {
        Value::Absent => String::new(),
        Value::Unsigned(v) => format!(" {v}"),
        Value::Real(v) => format!(" {v}"),
        Value::Bytes(b) => {
            let hex: String = b.iter().map(|x| format!("{x:02x}")).collect();
            format!(" #{hex}")
        }
    }
}

/// Listing tree ter-indent per kedalaman Enter, satu baris per instruksi.
pub fn dump(words: &[TaggedWord]) -> String {
    let mut out = String::new();
    let mut depth = 0usize;

    let grouped = match instructions(words) {
        Ok(grouped) => grouped,
        Err(err) => return format!("<malformed: {err}>\n"),
    };

    for ins in grouped {
        if ins.tag() == Tag::Leave {
            depth = depth.saturating_sub(1);
        }
        let _ = write!(out, "{:indent$}{:?}{}", "", ins.tag(), fmt_value(&ins.head), indent = depth * 2);
        for op in &ins.operands {
            let _ = write!(out, " {:?}{}", op.tag, fmt_value(op));
        }
        out.push('\n');
        if ins.tag() == Tag::Enter {
            depth += 1;
        }
    }
    out
}
