//! Terminal capability detection and colouring

use std::fmt::Display;

use owo_colors::{OwoColorize, colors::css};

/// Detects whether coloured output should be enabled
pub fn supports_color() -> bool {
    supports_color::on(supports_color::Stream::Stdout).is_some()
}

/// Detects terminal width, returning None if not available
pub fn terminal_width() -> Option<u16> {
    terminal_size::terminal_size().map(|(w, _)| w.0)
}

/// Check if terminal is too narrow to print a chain on one line
pub fn is_narrow() -> bool {
    terminal_width().is_some_and(|w| w < 80)
}

fn paint<T: Display + ?Sized>(value: &T, styled: impl FnOnce(&T) -> String) -> String {
    if supports_color() {
        styled(value)
    } else {
        value.to_string()
    }
}

/// Extension trait for colouring anything printable
pub trait Colorize: Display {
    /// Color as success (green)
    fn success(&self) -> String {
        paint(self, |v| v.fg::<css::Green>().to_string())
    }

    /// Color as warning (amber)
    fn warning(&self) -> String {
        paint(self, |v| v.fg::<css::Orange>().to_string())
    }

    /// Color as info (blue)
    fn info(&self) -> String {
        paint(self, |v| v.fg::<css::LightBlue>().to_string())
    }

    /// Dim the text
    fn dim(&self) -> String {
        paint(self, |v| v.dimmed().to_string())
    }
}

impl<T: Display + ?Sized> Colorize for T {}
