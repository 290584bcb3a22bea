use crate::host::Size;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rgb {
    pub red: u32,
    pub green: u32,
    pub blue: u32,
}

impl Rgb {
    pub fn new(red: u32, green: u32, blue: u32) -> Self {
        Self { red, green, blue }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

/// One text overlay drawn on the host window.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TextInfo {
    pub color: Rgb,
    pub text: String,
    /// Top left corner of the text.
    pub position: Point,
}

impl TextInfo {
    /// Bounds of the drawn text given its measured extent.
    pub fn bounds(&self, extent: Size) -> Rect {
        Rect {
            left: self.position.x,
            top: self.position.y,
            right: self.position.x.saturating_add(extent.width),
            bottom: self.position.y.saturating_add(extent.height),
        }
    }
}

impl fmt::Display for TextInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "TextInfo")?;
        writeln!(f, "  Red:   {}", self.color.red)?;
        writeln!(f, "  Green: {}", self.color.green)?;
        writeln!(f, "  Blue:  {}", self.color.blue)?;
        writeln!(f, "  Left:  {}", self.position.x)?;
        writeln!(f, "  Top:   {}", self.position.y)?;
        write!(f, "  Text:  {}", self.text)
    }
}

/// The selected index points past the end of the record list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetInvalid {
    pub index: usize,
    pub len: usize,
}

impl fmt::Display for TargetInvalid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "text info target {} out of range ({} records)",
            self.index, self.len
        )
    }
}

impl std::error::Error for TargetInvalid {}

/// Ordered text records plus the optional selected index.
///
/// Without a selection every single-record operation addresses the last record.
#[derive(Debug, Default, Clone)]
pub struct RecordStore {
    records: Vec<TextInfo>,
    target: Option<usize>,
}

impl RecordStore {
    pub fn count(&self) -> usize {
        self.records.len()
    }

    pub fn records(&self) -> &[TextInfo] {
        &self.records
    }

    pub fn append_default(&mut self) {
        self.records.push(TextInfo::default());
    }

    /// Drop every record. The selected index is left untouched.
    pub fn clear_all(&mut self) {
        self.records.clear();
    }

    /// Set or clear the selected index. Bounds are checked on access, not here.
    pub fn select(&mut self, index: Option<usize>) {
        self.target = index;
    }

    pub fn target(&self) -> Option<usize> {
        self.target
    }

    /// Resolve the record single-field operations act on.
    ///
    /// * explicit index in range: that record
    /// * no index: the last record, creating a default one first if the store is empty
    /// * explicit index out of range: [`TargetInvalid`]
    pub fn resolve_target(&mut self) -> Result<&mut TextInfo, TargetInvalid> {
        match self.target {
            Some(index) => {
                let len = self.records.len();
                self.records
                    .get_mut(index)
                    .ok_or(TargetInvalid { index, len })
            }
            None => {
                if self.records.is_empty() {
                    tracing::debug!("no text info present; creating a default record");
                    self.records.push(TextInfo::default());
                }
                let last = self.records.len() - 1;
                Ok(&mut self.records[last])
            }
        }
    }

    pub fn set_color(&mut self, color: Rgb) -> Result<(), TargetInvalid> {
        self.resolve_target()?.color = color;
        Ok(())
    }

    pub fn set_text(&mut self, text: impl Into<String>) -> Result<(), TargetInvalid> {
        self.resolve_target()?.text = text.into();
        Ok(())
    }

    pub fn set_position(&mut self, position: Point) -> Result<(), TargetInvalid> {
        self.resolve_target()?.position = position;
        Ok(())
    }
}
