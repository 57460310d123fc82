//! Rendering boundary
//!
//! The session never renders. It tells an [`EditorSurface`] to splice one
//! character in or out at a visible offset, and falls back to replacing the
//! whole buffer when a splice fails.

use ropey::Rope;
use thiserror::Error;
use unicode_segmentation::UnicodeSegmentation;

/// A splice the surface could not perform
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SurfaceError {
    /// Offset beyond the surface's current length
    #[error("Offset {offset} out of bounds (length {length})")]
    OffsetOutOfBounds { offset: usize, length: usize },

    /// The surface refused the edit for its own reasons
    #[error("Surface rejected edit: {0}")]
    Rejected(String),
}

/// Editor buffer the session keeps in step with the replica
///
/// Offsets count the replica's stored characters. A stored character is
/// usually one grapheme cluster, but not always: characters from different
/// replicas can join into one cluster. Surfaces that index by something
/// else keep a width per character, as [`RopeSurface`] does.
pub trait EditorSurface {
    /// Insert `value` so that it lands at `offset`
    fn insert(&mut self, offset: usize, value: &str) -> Result<(), SurfaceError>;

    /// Remove the character at `offset`
    fn delete(&mut self, offset: usize) -> Result<(), SurfaceError>;

    /// Replace the whole buffer with these characters, in order
    fn replace_all(&mut self, characters: &[&str]);

    /// Current buffer contents
    fn text(&self) -> String;

    /// Called after a local edit was recorded
    ///
    /// Interactive editors already show the text the user typed. Surfaces
    /// that do not take input themselves update here.
    fn commit_local(&mut self, _characters: &[&str]) {}
}

/// Headless surface backed by a rope
///
/// # Example
///
/// ```rust
/// use cotext_core::sync::{EditorSurface, RopeSurface};
///
/// let mut surface = RopeSurface::from_text("hllo");
/// surface.insert(1, "e").unwrap();
/// surface.delete(4).unwrap();
/// assert_eq!(surface.text(), "hell");
/// ```
#[derive(Debug, Clone, Default)]
pub struct RopeSurface {
    rope: Rope,

    /// Width in chars of each stored character, in order
    widths: Vec<usize>,
}

impl RopeSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Surface showing `text`, one character per grapheme cluster
    pub fn from_text(text: &str) -> Self {
        let mut surface = Self::new();
        let graphemes: Vec<&str> = text.graphemes(true).collect();
        surface.replace_all(&graphemes);
        surface
    }

    /// Number of characters shown
    pub fn len(&self) -> usize {
        self.widths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.widths.is_empty()
    }

    fn char_offset(&self, offset: usize) -> usize {
        self.widths[..offset].iter().sum()
    }
}

impl EditorSurface for RopeSurface {
    fn insert(&mut self, offset: usize, value: &str) -> Result<(), SurfaceError> {
        if offset > self.widths.len() {
            return Err(SurfaceError::OffsetOutOfBounds {
                offset,
                length: self.widths.len(),
            });
        }
        let at = self.char_offset(offset);
        self.rope.insert(at, value);
        self.widths.insert(offset, value.chars().count());
        Ok(())
    }

    fn delete(&mut self, offset: usize) -> Result<(), SurfaceError> {
        if offset >= self.widths.len() {
            return Err(SurfaceError::OffsetOutOfBounds {
                offset,
                length: self.widths.len(),
            });
        }
        let start = self.char_offset(offset);
        let end = start + self.widths[offset];
        self.rope.remove(start..end);
        self.widths.remove(offset);
        Ok(())
    }

    fn replace_all(&mut self, characters: &[&str]) {
        self.rope = Rope::from_str(&characters.concat());
        self.widths = characters.iter().map(|c| c.chars().count()).collect();
    }

    fn text(&self) -> String {
        self.rope.to_string()
    }

    fn commit_local(&mut self, characters: &[&str]) {
        self.replace_all(characters);
    }
}
