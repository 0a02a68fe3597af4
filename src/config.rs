use crate::theme::Borders;

/// Behaviour of a [`Context`](crate::Context).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Treat events for unknown surfaces as fatal instead of dropping them.
    pub strict: bool,
    /// Whether new frames draw decorations around their content.
    pub decorate: bool,
    /// Size of the decorations.
    pub borders: Borders,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            strict: true,
            decorate: true,
            borders: Borders::default(),
        }
    }
}

impl Config {
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn decorate(mut self, decorate: bool) -> Self {
        self.decorate = decorate;
        self
    }

    pub fn borders(mut self, borders: Borders) -> Self {
        self.borders = borders;
        self
    }
}
