use core::fmt;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{ModelError, Result};
use crate::intern::InternTable;
use crate::number_format::NumberFormats;

/// An ARGB color.
///
/// Serialized as a `#AARRGGBB` hex string.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Color {
    pub argb: u32,
}

impl Color {
    pub const fn new_argb(argb: u32) -> Self {
        Self { argb }
    }

    pub const fn black() -> Self {
        Self { argb: 0xFF000000 }
    }

    pub const fn white() -> Self {
        Self { argb: 0xFFFFFFFF }
    }

    fn to_hex(self) -> String {
        format!("#{:08X}", self.argb)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for Color {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let s = s.trim();
        let hex = s.strip_prefix('#').ok_or_else(|| {
            D::Error::custom("color must be a #AARRGGBB hex string (missing '#')")
        })?;
        if hex.len() != 8 {
            return Err(D::Error::custom(
                "color must be a #AARRGGBB hex string (8 hex digits)",
            ));
        }
        let argb = u32::from_str_radix(hex, 16).map_err(|_| D::Error::custom("invalid hex"))?;
        Ok(Color { argb })
    }
}

/// Underline style of a font.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Underline {
    #[default]
    None,
    Single,
    Double,
    SingleAccounting,
    DoubleAccounting,
}

/// Font formatting.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Font {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Font size in 1/100 points (e.g. 1100 = 11pt).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_100pt: Option<u16>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub bold: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub italic: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub strike: bool,
    #[serde(default, skip_serializing_if = "is_default_underline")]
    pub underline: Underline,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<Color>,
}

impl Font {
    /// Font 0 of a new workbook: Calibri 11pt.
    pub fn workbook_default() -> Self {
        Self {
            name: Some("Calibri".to_string()),
            size_100pt: Some(1100),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn bold(mut self) -> Self {
        self.bold = true;
        self
    }

    #[must_use]
    pub fn italic(mut self) -> Self {
        self.italic = true;
        self
    }
}

/// Fill pattern type (`patternFill/@patternType`).
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillPattern {
    #[default]
    None,
    Solid,
    Gray125,
    Gray0625,
    LightGray,
    MediumGray,
    DarkGray,
}

/// Fill (background) formatting.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Fill {
    #[serde(default)]
    pub pattern: FillPattern,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fg_color: Option<Color>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bg_color: Option<Color>,
}

impl Fill {
    pub fn solid(color: Color) -> Self {
        Self {
            pattern: FillPattern::Solid,
            fg_color: Some(color),
            bg_color: None,
        }
    }

    pub fn gray125() -> Self {
        Self {
            pattern: FillPattern::Gray125,
            ..Self::default()
        }
    }
}

/// Border line style.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BorderStyle {
    #[default]
    None,
    Thin,
    Medium,
    Thick,
    Dashed,
    Dotted,
    Double,
    Hair,
}

/// One side of a border.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BorderEdge {
    #[serde(default)]
    pub style: BorderStyle,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<Color>,
}

impl BorderEdge {
    pub const fn new(style: BorderStyle, color: Option<Color>) -> Self {
        Self { style, color }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BorderSide {
    Left,
    Right,
    Top,
    Bottom,
    Diagonal,
}

/// Border formatting.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Border {
    #[serde(default)]
    pub left: BorderEdge,
    #[serde(default)]
    pub right: BorderEdge,
    #[serde(default)]
    pub top: BorderEdge,
    #[serde(default)]
    pub bottom: BorderEdge,
    #[serde(default)]
    pub diagonal: BorderEdge,
    #[serde(default, skip_serializing_if = "is_false")]
    pub diagonal_up: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub diagonal_down: bool,
}

impl Border {
    pub fn edge(&self, side: BorderSide) -> &BorderEdge {
        match side {
            BorderSide::Left => &self.left,
            BorderSide::Right => &self.right,
            BorderSide::Top => &self.top,
            BorderSide::Bottom => &self.bottom,
            BorderSide::Diagonal => &self.diagonal,
        }
    }

    #[must_use]
    pub fn with_edge(mut self, side: BorderSide, edge: BorderEdge) -> Self {
        let slot = match side {
            BorderSide::Left => &mut self.left,
            BorderSide::Right => &mut self.right,
            BorderSide::Top => &mut self.top,
            BorderSide::Bottom => &mut self.bottom,
            BorderSide::Diagonal => &mut self.diagonal,
        };
        *slot = edge;
        self
    }
}

/// Horizontal alignment options (subset).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HorizontalAlignment {
    General,
    Left,
    Center,
    Right,
    Fill,
    Justify,
}

/// Vertical alignment options (subset).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerticalAlignment {
    Top,
    Center,
    Bottom,
}

/// Alignment formatting (subset).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Alignment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub horizontal: Option<HorizontalAlignment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vertical: Option<VerticalAlignment>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub wrap_text: bool,
    #[serde(default, skip_serializing_if = "is_zero_u8")]
    pub indent: u8,
    /// Text rotation in degrees.
    ///
    /// - `0` = horizontal
    /// - `-90..=90` = rotated text
    /// - `255` = vertical stacked text
    #[serde(default, skip_serializing_if = "is_zero_i16")]
    pub text_rotation: i16,
}

/// Cell protection flags.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct Protection {
    pub locked: bool,
    pub hidden: bool,
}

impl Default for Protection {
    fn default() -> Self {
        Self {
            locked: true,
            hidden: false,
        }
    }
}

/// A style described by value: the descriptors a cell format points at.
///
/// `None` means "use the workbook default" (font 0, fill 0, border 0, `General`).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Style {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font: Option<Font>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill: Option<Fill>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub border: Option<Border>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alignment: Option<Alignment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protection: Option<Protection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number_format: Option<String>,
}

/// An interned cell format record (`xf`): indices into the registry's leaf
/// tables plus inline alignment and protection.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct CellFormat {
    #[serde(default)]
    pub num_fmt_id: u16,
    #[serde(default)]
    pub font_id: u32,
    #[serde(default)]
    pub fill_id: u32,
    #[serde(default)]
    pub border_id: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alignment: Option<Alignment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protection: Option<Protection>,
    /// Index of the named cell style (`cellStyleXfs`) this format inherits from.
    /// Always `None` on cell style records themselves.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_style: Option<u32>,
}

fn is_false(b: &bool) -> bool {
    !*b
}

fn is_zero_i16(v: &i16) -> bool {
    *v == 0
}

fn is_zero_u8(v: &u8) -> bool {
    *v == 0
}

fn is_default_underline(u: &Underline) -> bool {
    *u == Underline::None
}

/// The workbook's style tables.
///
/// Fonts, fills, borders and number formats are interned by value, so any two
/// formats that look the same share leaf indices. Cell formats (`cellXfs`) and
/// cell style records (`cellStyleXfs`) are tables of [`CellFormat`]; index `0`
/// of each is the default format.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleRegistry {
    number_formats: NumberFormats,
    fonts: InternTable<Font>,
    fills: InternTable<Fill>,
    borders: InternTable<Border>,
    cell_style_xfs: InternTable<CellFormat>,
    cell_xfs: InternTable<CellFormat>,
}

impl Default for StyleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl StyleRegistry {
    pub fn new() -> Self {
        let mut registry = Self {
            number_formats: NumberFormats::new(),
            fonts: InternTable::new(),
            fills: InternTable::new(),
            borders: InternTable::new(),
            cell_style_xfs: InternTable::new(),
            cell_xfs: InternTable::new(),
        };
        registry.fonts.intern(Font::workbook_default());
        // Fills 0 and 1 are reserved by the file format.
        registry.fills.intern(Fill::default());
        registry.fills.intern(Fill::gray125());
        registry.borders.intern(Border::default());
        registry.cell_style_xfs.intern(CellFormat::default());
        registry.cell_xfs.intern(CellFormat {
            parent_style: Some(0),
            ..CellFormat::default()
        });
        registry
    }

    pub fn fonts(&self) -> &InternTable<Font> {
        &self.fonts
    }

    pub fn fills(&self) -> &InternTable<Fill> {
        &self.fills
    }

    pub fn borders(&self) -> &InternTable<Border> {
        &self.borders
    }

    pub fn number_formats(&self) -> &NumberFormats {
        &self.number_formats
    }

    /// Number of cell formats (`cellXfs`).
    pub fn len(&self) -> usize {
        self.cell_xfs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cell_xfs.is_empty()
    }

    pub fn cell_style_count(&self) -> usize {
        self.cell_style_xfs.len()
    }

    pub fn intern_font(&mut self, font: Font) -> u32 {
        self.fonts.intern(font)
    }

    pub fn intern_fill(&mut self, fill: Fill) -> u32 {
        self.fills.intern(fill)
    }

    pub fn intern_border(&mut self, border: Border) -> u32 {
        self.borders.intern(border)
    }

    pub fn intern_number_format(&mut self, code: &str) -> Result<u16> {
        self.number_formats.intern(code)
    }

    /// Index of a font equal to `font`, if the workbook has one.
    pub fn find_font(&self, font: &Font) -> Option<u32> {
        self.fonts.find(font)
    }

    pub fn font(&self, index: u32) -> Result<&Font> {
        lookup(&self.fonts, index, "font")
    }

    pub fn fill(&self, index: u32) -> Result<&Fill> {
        lookup(&self.fills, index, "fill")
    }

    pub fn border(&self, index: u32) -> Result<&Border> {
        lookup(&self.borders, index, "border")
    }

    /// Intern `style` as a cell format and return its index.
    ///
    /// Leaf descriptors are interned first, then the composite record, so
    /// equal styles always share one index.
    pub fn register_style(&mut self, style: &Style) -> Result<u32> {
        let format = CellFormat {
            parent_style: Some(0),
            ..self.format_for(style)?
        };
        Ok(self.cell_xfs.intern(format))
    }

    /// Intern `style` as a cell style record (`cellStyleXfs`).
    pub fn register_cell_style_record(&mut self, style: &Style) -> Result<u32> {
        let format = self.format_for(style)?;
        Ok(self.cell_style_xfs.intern(format))
    }

    /// Add a cell format initialised to the defaults.
    ///
    /// Appends a fresh record unless `dedupe` is set, in which case the
    /// default record's index is returned.
    pub fn create_cell_style(&mut self, dedupe: bool) -> u32 {
        let format = CellFormat {
            parent_style: Some(0),
            ..CellFormat::default()
        };
        if dedupe {
            self.cell_xfs.intern(format)
        } else {
            self.cell_xfs.append(format)
        }
    }

    /// The cell format record at `index`.
    pub fn style(&self, index: u32) -> Result<&CellFormat> {
        lookup(&self.cell_xfs, index, "cell format")
    }

    pub fn cell_style_record(&self, index: u32) -> Result<&CellFormat> {
        lookup(&self.cell_style_xfs, index, "cell style")
    }

    /// Resolve the cell format at `index` into descriptor values.
    pub fn resolve_style(&self, index: u32) -> Result<Style> {
        let format = self.style(index)?;
        self.resolve_format(format)
    }

    /// Copy style `index` of `source` into this registry.
    ///
    /// Descriptors are re-interned here by value; indices never carry over.
    /// `source` is only read.
    pub fn clone_style_from(&mut self, source: &StyleRegistry, index: u32) -> Result<u32> {
        let style = source.resolve_style(index)?;
        self.register_style(&style)
    }

    /// Derive a format from `index` with one border side replaced.
    ///
    /// The shared border descriptor is never edited in place: a new border is
    /// interned and a format pointing at it is returned.
    pub fn with_border_edge(&mut self, index: u32, side: BorderSide, edge: BorderEdge) -> Result<u32> {
        let mut format = self.style(index)?.clone();
        let border = self.border(format.border_id)?.clone().with_edge(side, edge);
        format.border_id = self.borders.intern(border);
        Ok(self.cell_xfs.intern(format))
    }

    /// Derive a format from `index` with a different fill.
    pub fn with_fill(&mut self, index: u32, fill: Fill) -> Result<u32> {
        let mut format = self.style(index)?.clone();
        format.fill_id = self.fills.intern(fill);
        Ok(self.cell_xfs.intern(format))
    }

    /// Derive a format from `index` with a different font.
    pub fn with_font(&mut self, index: u32, font: Font) -> Result<u32> {
        let mut format = self.style(index)?.clone();
        format.font_id = self.fonts.intern(font);
        Ok(self.cell_xfs.intern(format))
    }

    /// Derive a format from `index` with a different number format code.
    pub fn with_number_format(&mut self, index: u32, code: &str) -> Result<u32> {
        let mut format = self.style(index)?.clone();
        format.num_fmt_id = self.number_formats.intern(code)?;
        Ok(self.cell_xfs.intern(format))
    }

    // The number format goes first so a full id space leaves no other leaf
    // behind.
    fn format_for(&mut self, style: &Style) -> Result<CellFormat> {
        let num_fmt_id = match style.number_format.as_deref() {
            Some(code) => self.number_formats.intern(code)?,
            None => 0,
        };
        Ok(CellFormat {
            num_fmt_id,
            font_id: style
                .font
                .clone()
                .map_or(0, |font| self.fonts.intern(font)),
            fill_id: style
                .fill
                .clone()
                .map_or(0, |fill| self.fills.intern(fill)),
            border_id: style
                .border
                .clone()
                .map_or(0, |border| self.borders.intern(border)),
            alignment: style.alignment.clone(),
            protection: style.protection,
            parent_style: None,
        })
    }

    fn resolve_format(&self, format: &CellFormat) -> Result<Style> {
        Ok(Style {
            font: Some(self.font(format.font_id)?.clone()),
            fill: Some(self.fill(format.fill_id)?.clone()),
            border: Some(self.border(format.border_id)?.clone()),
            alignment: format.alignment.clone(),
            protection: format.protection,
            number_format: self.number_formats.code(format.num_fmt_id).map(str::to_string),
        })
    }
}

fn lookup<'a, T: Eq + std::hash::Hash + Clone>(
    table: &'a InternTable<T>,
    index: u32,
    what: &'static str,
) -> Result<&'a T> {
    table.get(index).ok_or(ModelError::OutOfRange {
        what,
        index: index as usize,
        len: table.len(),
    })
}
