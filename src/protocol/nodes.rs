//! Node konkret: nilai primitif, property leaf, elemen struktural
//!
//! Setiap leaf = satu header tag + `operand_count` word operand, jadi ukurannya
//! selalu bisa dihitung dari tabel tag tanpa menulis apa pun.

use super::word::{Tag, Word};
use super::writer::{Node, Writer};
use super::branch::{Conditional, OnEvent, StateKind};
use crate::error::{Error, Result};
use crate::events::Callback;
use crate::text::TextCell;

/// Panjang layout
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Length {
    Px(f32),
    Rem(f32),
    Frac(f32),
    Auto,
}

pub fn px(v: f32) -> Length {
    Length::Px(v)
}

pub fn rem(v: f32) -> Length {
    Length::Rem(v)
}

pub fn frac(v: f32) -> Length {
    Length::Frac(v)
}

pub fn auto() -> Length {
    Length::Auto
}

impl Length {
    #[inline(always)]
    fn tagged(self) -> (Tag, Word) {
        match self {
            Length::Px(v) => (Tag::Pxs, Word::Real(v)),
            Length::Rem(v) => (Tag::Rems, Word::Real(v)),
            Length::Frac(v) => (Tag::Frac, Word::Real(v)),
            Length::Auto => (Tag::Auto, Word::Absent),
        }
    }
}

/// Warna; byte disimpan apa adanya, interpretasi di renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    Rgb([u8; 3]),
    Rgba([u8; 4]),
    Hsv([u8; 3]),
    Hsva([u8; 4]),
}

impl Color {
    /// `"ff0000"` → `Rgb([0xff, 0, 0])`
    pub fn rgb(hex: &str) -> Result<Self> {
        Ok(Color::Rgb(parse_hex(hex)?))
    }

    pub fn rgba(hex: &str) -> Result<Self> {
        Ok(Color::Rgba(parse_hex(hex)?))
    }

    pub fn hsv(hex: &str) -> Result<Self> {
        Ok(Color::Hsv(parse_hex(hex)?))
    }

    pub fn hsva(hex: &str) -> Result<Self> {
        Ok(Color::Hsva(parse_hex(hex)?))
    }

    fn tagged(&self) -> Result<(Tag, Word)> {
        Ok(match self {
            Color::Rgb(b) => (Tag::Rgb, Word::bytes(b)?),
            Color::Rgba(b) => (Tag::Rgba, Word::bytes(b)?),
            Color::Hsv(b) => (Tag::Hsv, Word::bytes(b)?),
            Color::Hsva(b) => (Tag::Hsva, Word::bytes(b)?),
        })
    }
}

fn parse_hex<const N: usize>(hex: &str) -> Result<[u8; N]> {
    let invalid = || Error::InvalidColor(hex.to_owned());
    if hex.len() != N * 2 || !hex.bytes().all(|c| c.is_ascii_hexdigit()) {
        return Err(invalid());
    }

    let mut out = [0u8; N];
    for (i, byte) in out.iter_mut().enumerate() {
        *byte = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16).map_err(|_| invalid())?;
    }
    Ok(out)
}

#[repr(u64)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayOption {
    Block = 0,
    FlexRow = 1,
    FlexColumn = 2,
    Grid = 3,
    None = 4,
}

#[repr(u64)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alignment {
    Start = 0,
    End = 1,
    Left = 2,
    Middle = 3,
    Right = 4,
    Justified = 5,
}

/// Sisi kotak: left, top, right, bottom
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sides {
    pub left: Length,
    pub top: Length,
    pub right: Length,
    pub bottom: Length,
}

impl Sides {
    pub fn all(v: Length) -> Self {
        Self {
            left: v,
            top: v,
            right: v,
            bottom: v,
        }
    }

    fn lengths(&self) -> [Length; 4] {
        [self.left, self.top, self.right, self.bottom]
    }
}

/// Property leaf tanpa referensi ke text cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Prop {
    Width(Length),
    Height(Length),
    Padding(Sides),
    Margin(Sides),
    Display(DisplayOption),
    Gap(Length),
    Color(Color),
    Rect {
        x: Length,
        y: Length,
        width: Length,
        height: Length,
    },
    RoundedRect {
        x: Length,
        y: Length,
        width: Length,
        height: Length,
        radius: Length,
    },
    BeginPath,
    EndPath,
    MoveTo {
        x: Length,
        y: Length,
    },
    LineTo {
        x: Length,
        y: Length,
    },
    QuadTo {
        cx: Length,
        cy: Length,
        x: Length,
        y: Length,
    },
    CubicTo {
        cx1: Length,
        cy1: Length,
        cx2: Length,
        cy2: Length,
        x: Length,
        y: Length,
    },
    ArcTo {
        tx: Length,
        ty: Length,
        x: Length,
        y: Length,
        radius: Length,
    },
    ClosePath,
    FontSize(f32),
    FontAlignment(Alignment),
    CursorDefault,
    CursorPointer,
}

impl Prop {
    pub fn tag(&self) -> Tag {
        match self {
            Prop::Width(_) => Tag::Width,
            Prop::Height(_) => Tag::Height,
            Prop::Padding(_) => Tag::Padding,
            Prop::Margin(_) => Tag::Margin,
            Prop::Display(_) => Tag::Display,
            Prop::Gap(_) => Tag::Gap,
            Prop::Color(_) => Tag::Color,
            Prop::Rect { .. } => Tag::Rect,
            Prop::RoundedRect { .. } => Tag::RoundedRect,
            Prop::BeginPath => Tag::BeginPath,
            Prop::EndPath => Tag::EndPath,
            Prop::MoveTo { .. } => Tag::MoveTo,
            Prop::LineTo { .. } => Tag::LineTo,
            Prop::QuadTo { .. } => Tag::QuadTo,
            Prop::CubicTo { .. } => Tag::CubicTo,
            Prop::ArcTo { .. } => Tag::ArcTo,
            Prop::ClosePath => Tag::ClosePath,
            Prop::FontSize(_) => Tag::FontSize,
            Prop::FontAlignment(_) => Tag::FontAlignment,
            Prop::CursorDefault => Tag::CursorDefault,
            Prop::CursorPointer => Tag::CursorPointer,
        }
    }

    /// Payload header + operand, urut seperti di buffer.
    fn words(&self) -> Result<Vec<(Tag, Word)>> {
        let head = |word| vec![(self.tag(), word)];
        let with_lengths = |lengths: &[Length]| {
            let mut out = head(Word::Absent);
            out.extend(lengths.iter().map(|l| l.tagged()));
            out
        };

        Ok(match self {
            Prop::Width(l) | Prop::Height(l) | Prop::Gap(l) => with_lengths(&[*l]),
            Prop::Padding(s) | Prop::Margin(s) => with_lengths(&s.lengths()),
            Prop::Display(d) => head(Word::Unsigned(*d as u64)),
            Prop::Color(c) => {
                let mut out = head(Word::Absent);
                out.push(c.tagged()?);
                out
            }
            Prop::Rect {
                x,
                y,
                width,
                height,
            } => with_lengths(&[*x, *y, *width, *height]),
            Prop::RoundedRect {
                x,
                y,
                width,
                height,
                radius,
            } => with_lengths(&[*x, *y, *width, *height, *radius]),
            Prop::MoveTo { x, y } | Prop::LineTo { x, y } => with_lengths(&[*x, *y]),
            Prop::QuadTo { cx, cy, x, y } => with_lengths(&[*cx, *cy, *x, *y]),
            Prop::CubicTo {
                cx1,
                cy1,
                cx2,
                cy2,
                x,
                y,
            } => with_lengths(&[*cx1, *cy1, *cx2, *cy2, *x, *y]),
            Prop::ArcTo {
                tx,
                ty,
                x,
                y,
                radius,
            } => with_lengths(&[*tx, *ty, *x, *y, *radius]),
            Prop::FontSize(size) => head(Word::Real(*size)),
            Prop::FontAlignment(a) => head(Word::Unsigned(*a as u64)),
            Prop::BeginPath
            | Prop::EndPath
            | Prop::ClosePath
            | Prop::CursorDefault
            | Prop::CursorPointer => head(Word::Absent),
        })
    }
}

impl Node for Prop {
    fn word_count(&self) -> usize {
        1 + self.tag().operand_count()
    }

    fn write(&self, w: &mut Writer<'_>, mut cursor: usize) -> Result<usize> {
        for (tag, word) in self.words()? {
            cursor = w.write_word(cursor, tag, word)?;
        }
        Ok(cursor)
    }
}

/// Text di posisi (x, y) dengan isi dari text cell
#[derive(Clone)]
pub struct Text {
    pub x: Length,
    pub y: Length,
    pub cell: TextCell,
}

impl Text {
    pub fn new(x: Length, y: Length, cell: &TextCell) -> Self {
        Self {
            x,
            y,
            cell: cell.clone(),
        }
    }
}

impl Node for Text {
    fn word_count(&self) -> usize {
        1 + Tag::Text.operand_count()
    }

    fn write(&self, w: &mut Writer<'_>, cursor: usize) -> Result<usize> {
        let cursor = w.write_word(cursor, Tag::Text, Word::Absent)?;
        let (tag, word) = self.x.tagged();
        let cursor = w.write_word(cursor, tag, word)?;
        let (tag, word) = self.y.tagged();
        let cursor = w.write_word(cursor, tag, word)?;
        self.cell.reference().write(w, cursor)
    }
}

/// Font family dari nama yang disimpan di text cell
#[derive(Clone)]
pub struct FontFamily(pub TextCell);

impl Node for FontFamily {
    fn word_count(&self) -> usize {
        1 + Tag::FontFamily.operand_count()
    }

    fn write(&self, w: &mut Writer<'_>, cursor: usize) -> Result<usize> {
        let cursor = w.write_word(cursor, Tag::FontFamily, Word::Absent)?;
        self.0.reference().write(w, cursor)
    }
}

/// Elemen struktural: Enter, properties, children, Leave.
#[derive(Default)]
pub struct Element {
    props: Vec<Box<dyn Node>>,
    children: Vec<Box<dyn Node>>,
}

impl Element {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tambah property (ditulis sebelum semua children)
    pub fn with(mut self, prop: impl Node + 'static) -> Self {
        self.props.push(Box::new(prop));
        self
    }

    pub fn child(mut self, child: impl Node + 'static) -> Self {
        self.children.push(Box::new(child));
        self
    }

    pub fn children<I, N>(mut self, children: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Node + 'static,
    {
        self.children
            .extend(children.into_iter().map(|c| Box::new(c) as Box<dyn Node>));
        self
    }
}

impl Node for Element {
    fn word_count(&self) -> usize {
        2 + self
            .props
            .iter()
            .chain(self.children.iter())
            .map(|n| n.word_count())
            .sum::<usize>()
    }

    fn write(&self, w: &mut Writer<'_>, cursor: usize) -> Result<usize> {
        let mut cursor = w.write_word(cursor, Tag::Enter, Word::Absent)?;
        for node in self.props.iter().chain(self.children.iter()) {
            cursor = node.write(w, cursor)?;
        }
        w.write_word(cursor, Tag::Leave, Word::Absent)
    }
}

/// Widget kotak dengan background, sudut bulat, dan event opsional.
///
/// Urutan encoding: Enter, Width, Height, background, RoundedRect,
/// clicked/hover/pressed binding, children, Leave.
pub struct Div {
    width: Length,
    height: Length,
    radius: Length,
    background: Box<dyn Node>,
    on_click: Option<Callback>,
    on_hover: Option<Callback>,
    on_press: Option<Callback>,
    children: Vec<Box<dyn Node>>,
}

impl Default for Div {
    fn default() -> Self {
        Self {
            width: Length::Auto,
            height: Length::Auto,
            radius: Length::Px(0.0),
            background: Box::new(Prop::Color(Color::Rgb([0xcc, 0xcc, 0xcc]))),
            on_click: None,
            on_hover: None,
            on_press: None,
            children: Vec::new(),
        }
    }
}

impl Div {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn width(mut self, width: Length) -> Self {
        self.width = width;
        self
    }

    pub fn height(mut self, height: Length) -> Self {
        self.height = height;
        self
    }

    pub fn radius(mut self, radius: Length) -> Self {
        self.radius = radius;
        self
    }

    pub fn background(mut self, color: Color) -> Self {
        self.background = Box::new(Prop::Color(color));
        self
    }

    /// Background yang berubah sesuai state interaksi, dengan default opsional.
    pub fn background_when(mut self, state: StateKind, color: Color, default: Option<Color>) -> Self {
        let on = Prop::Color(color);
        self.background = Box::new(match default {
            Some(d) => Conditional::with_default(state, on, Prop::Color(d)),
            None => Conditional::new(state, on),
        });
        self
    }

    pub fn on_click(mut self, callback: Callback) -> Self {
        self.on_click = Some(callback);
        self
    }

    pub fn on_hover(mut self, callback: Callback) -> Self {
        self.on_hover = Some(callback);
        self
    }

    pub fn on_press(mut self, callback: Callback) -> Self {
        self.on_press = Some(callback);
        self
    }

    pub fn child(mut self, child: impl Node + 'static) -> Self {
        self.children.push(Box::new(child));
        self
    }

    fn shape(&self) -> Prop {
        Prop::RoundedRect {
            x: Length::Px(0.0),
            y: Length::Px(0.0),
            width: self.width,
            height: self.height,
            radius: self.radius,
        }
    }

    fn events(&self) -> impl Iterator<Item = OnEvent> + '_ {
        [
            (StateKind::Clicked, &self.on_click),
            (StateKind::Hover, &self.on_hover),
            (StateKind::Pressed, &self.on_press),
        ]
        .into_iter()
        .filter_map(|(state, cb)| cb.as_ref().map(|cb| OnEvent::new(state, cb.clone())))
    }
}

impl Node for Div {
    fn word_count(&self) -> usize {
        2 + Prop::Width(self.width).word_count()
            + Prop::Height(self.height).word_count()
            + self.background.word_count()
            + self.shape().word_count()
            + self.events().map(|e| e.word_count()).sum::<usize>()
            + self.children.iter().map(|c| c.word_count()).sum::<usize>()
    }

    fn write(&self, w: &mut Writer<'_>, cursor: usize) -> Result<usize> {
        let cursor = w.write_word(cursor, Tag::Enter, Word::Absent)?;
        let cursor = Prop::Width(self.width).write(w, cursor)?;
        let cursor = Prop::Height(self.height).write(w, cursor)?;
        let cursor = self.background.write(w, cursor)?;
        let mut cursor = self.shape().write(w, cursor)?;

        for event in self.events() {
            cursor = event.write(w, cursor)?;
        }
        for child in &self.children {
            cursor = child.write(w, cursor)?;
        }

        w.write_word(cursor, Tag::Leave, Word::Absent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{callback, CallbackRegistry};
    use crate::protocol::TAGGED_WORD_LEN;

    fn stage(node: &dyn Node) -> (Vec<u8>, usize) {
        let mut registry = CallbackRegistry::default();
        let mut w = Writer::new(0, &mut registry);
        let end = node.write(&mut w, 0).unwrap();
        (w.as_bytes().to_vec(), end)
    }

    #[test]
    fn test_color_hex_parsing() {
        assert_eq!(Color::rgb("ff0000").unwrap(), Color::Rgb([0xff, 0, 0]));
        assert_eq!(
            Color::rgba("0a0b0c80").unwrap(),
            Color::Rgba([0x0a, 0x0b, 0x0c, 0x80])
        );
        assert!(matches!(Color::rgb("ff00"), Err(Error::InvalidColor(_))));
        assert!(matches!(Color::rgb("gg0000"), Err(Error::InvalidColor(_))));
        assert!(matches!(Color::hsv("ff0000ff"), Err(Error::InvalidColor(_))));
    }

    #[test]
    fn test_prop_measure_matches_emit() {
        let props = [
            Prop::Width(px(200.0)),
            Prop::Padding(Sides::all(rem(1.0))),
            Prop::Display(DisplayOption::FlexColumn),
            Prop::Color(Color::Hsva([1, 2, 3, 4])),
            Prop::RoundedRect {
                x: px(0.0),
                y: px(0.0),
                width: frac(1.0),
                height: auto(),
                radius: px(4.0),
            },
            Prop::CubicTo {
                cx1: px(1.0),
                cy1: px(2.0),
                cx2: px(3.0),
                cy2: px(4.0),
                x: px(5.0),
                y: px(6.0),
            },
            Prop::ClosePath,
            Prop::FontSize(14.0),
            Prop::CursorPointer,
        ];

        for prop in &props {
            let (bytes, end) = stage(prop);
            assert_eq!(bytes.len(), prop.encoded_len(), "{prop:?}");
            assert_eq!(end, prop.word_count() * TAGGED_WORD_LEN);
        }
    }

    #[test]
    fn test_element_brackets_props_then_children() {
        let tree = Element::new()
            .with(Prop::Width(px(10.0)))
            .child(Element::new().with(Prop::Gap(px(2.0))))
            .child(Element::new());

        // Enter, Width+Pxs, [Enter, Gap+Pxs, Leave], [Enter, Leave], Leave
        assert_eq!(tree.word_count(), 1 + 2 + 4 + 2 + 1);
        let (bytes, _) = stage(&tree);
        assert_eq!(bytes.len(), tree.encoded_len());
    }

    #[test]
    fn test_div_word_count_with_events() {
        let div = Div::new()
            .width(px(200.0))
            .height(px(200.0))
            .background_when(
                StateKind::Clicked,
                Color::rgb("ff0000").unwrap(),
                Some(Color::rgb("cccccc").unwrap()),
            )
            .on_click(callback(|_| Ok(())));

        // Enter + Width(2) + Height(2) + branch(1+2+1+2) + RoundedRect(6) + event(2) + Leave
        assert_eq!(div.word_count(), 1 + 2 + 2 + 6 + 6 + 2 + 1);
        let (bytes, _) = stage(&div);
        assert_eq!(bytes.len(), div.encoded_len());
    }
}
