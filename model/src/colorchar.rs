use crate::Splash4;

/// A single Unicode codepoint with a packed color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ColorChar {
    pub ch: char,
    pub splash4: Splash4,
}

impl ColorChar {
    pub fn new(ch: char, splash4: Splash4) -> Self {
        Self { ch, splash4 }
    }
}
