//! Style interning: dedupes [`CellStyle`] values behind a small opaque
//! [`StyleId`] index.

use super::CellStyle;
use ahash::AHashMap;

/// Opaque index into a [`StyleRegistry`]. Never constructed directly by
/// callers outside this crate; obtained from [`StyleRegistry::insert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StyleId(u32);

impl StyleId {
    /// The always-present default style at index 0.
    pub const DEFAULT: StyleId = StyleId(0);

    pub fn index(self) -> u32 {
        self.0
    }
}

/// Deduplicating store of [`CellStyle`] records. Value-typed: [`insert`]
/// returns a new registry rather than mutating in place, matching the rest
/// of the data model's pure-functional update style. Cheap to share across
/// clones of a [`crate::Sheet`]/[`crate::Workbook`] via `Rc`.
///
/// [`insert`]: StyleRegistry::insert
#[derive(Debug, Clone, PartialEq)]
pub struct StyleRegistry {
    styles: Vec<CellStyle>,
    index: AHashMap<CellStyle, u32>,
}

impl StyleRegistry {
    /// A registry containing only the default style at index 0.
    pub fn new() -> Self {
        let mut styles = Vec::with_capacity(16);
        let mut index = AHashMap::with_capacity(16);
        let default = CellStyle::default();
        styles.push(default.clone());
        index.insert(default, 0);
        StyleRegistry { styles, index }
    }

    /// Return a registry containing `style` (inserting it if not already
    /// present) and the `StyleId` it is interned under.
    pub fn insert(&self, style: CellStyle) -> (StyleRegistry, StyleId) {
        if let Some(&idx) = self.index.get(&style) {
            return (self.clone(), StyleId(idx));
        }
        let mut next = self.clone();
        let idx = next.styles.len() as u32;
        next.index.insert(style.clone(), idx);
        next.styles.push(style);
        (next, StyleId(idx))
    }

    pub fn get(&self, id: StyleId) -> Option<&CellStyle> {
        self.styles.get(id.0 as usize)
    }

    pub fn default_style(&self) -> &CellStyle {
        &self.styles[0]
    }

    pub fn len(&self) -> usize {
        self.styles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.styles.len() <= 1
    }

    pub fn iter(&self) -> impl Iterator<Item = (StyleId, &CellStyle)> {
        self.styles.iter().enumerate().map(|(i, s)| (StyleId(i as u32), s))
    }
}

impl Default for StyleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_has_one_style() {
        let reg = StyleRegistry::new();
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.get(StyleId::DEFAULT), Some(&CellStyle::default()));
    }

    #[test]
    fn insert_dedupes() {
        let reg = StyleRegistry::new();
        let (reg, id1) = reg.insert(CellStyle::new().bold(true));
        let (reg, id2) = reg.insert(CellStyle::new().bold(true));
        let (reg, id3) = reg.insert(CellStyle::new().italic(true));
        assert_eq!(id1, id2);
        assert_ne!(id1, id3);
        assert_eq!(reg.len(), 3);
    }

    #[test]
    fn insert_is_pure() {
        let reg = StyleRegistry::new();
        let (next, _) = reg.insert(CellStyle::new().bold(true));
        assert_eq!(reg.len(), 1);
        assert_eq!(next.len(), 2);
    }
}
