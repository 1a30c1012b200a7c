use crate::Location;

/// A caret/anchor pair distinguished by `tag` within one mim-state. When
/// `caret_loc != anchor_loc` the pair describes a selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caret {
    pub tag: u32,
    pub caret_loc: Location,
    pub anchor_loc: Location,
}

impl Caret {
    pub fn new(tag: u32, loc: Location) -> Self {
        Self {
            tag,
            caret_loc: loc,
            anchor_loc: loc,
        }
    }

    pub fn has_selection(&self) -> bool {
        self.caret_loc != self.anchor_loc
    }

    /// Selection bounds in document order, regardless of which end is the
    /// live caret.
    pub fn range(&self) -> (Location, Location) {
        if self.caret_loc <= self.anchor_loc {
            (self.caret_loc, self.anchor_loc)
        } else {
            (self.anchor_loc, self.caret_loc)
        }
    }
}
