//! Terminal dimensions.

/// Size of a terminal in character cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TerminalSize {
    /// Number of columns.
    pub cols: u16,
    /// Number of rows.
    pub rows: u16,
}

impl TerminalSize {
    /// Create a new terminal size.
    #[must_use]
    pub const fn new(cols: u16, rows: u16) -> Self {
        Self { cols, rows }
    }

    /// Returns true when either dimension is zero.
    ///
    /// Some terminals (and most pipes redirected through `script`) report
    /// 0x0 until the first resize.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.cols == 0 || self.rows == 0
    }

    /// Replace zero dimensions with the defaults.
    #[must_use]
    pub const fn or_default(self) -> Self {
        let default = Self::DEFAULT;
        Self {
            cols: if self.cols == 0 { default.cols } else { self.cols },
            rows: if self.rows == 0 { default.rows } else { self.rows },
        }
    }

    const DEFAULT: Self = Self { cols: 80, rows: 24 };
}

impl Default for TerminalSize {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl From<(u16, u16)> for TerminalSize {
    fn from((cols, rows): (u16, u16)) -> Self {
        Self { cols, rows }
    }
}

impl std::fmt::Display for TerminalSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.cols, self.rows)
    }
}
