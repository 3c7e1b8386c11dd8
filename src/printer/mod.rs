//! Printers: colored text and markdown reports (termimad).

use owo_colors::OwoColorize;
use termimad::MadSkin;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Plain,
    Progress,
    Success,
    Warning,
    Error,
}

pub struct TextPrinter {
    pub tone: Tone,
}

impl TextPrinter {
    pub fn new(tone: Tone) -> Self {
        Self { tone }
    }

    fn paint(&self, text: &str) -> String {
        match self.tone {
            Tone::Plain => text.to_string(),
            Tone::Progress => format!("{}", text.cyan()),
            Tone::Success => format!("{}", text.green()),
            Tone::Warning => format!("{}", text.yellow()),
            Tone::Error => format!("{}", text.red()),
        }
    }

    pub fn print(&self, text: &str) {
        println!("{}", self.paint(text));
    }

    /// Diagnostics go to stderr so stdout only ever carries results.
    pub fn eprint(&self, text: &str) {
        eprintln!("{}", self.paint(text));
    }
}

pub struct MarkdownPrinter {
    pub skin: MadSkin,
}

impl Default for MarkdownPrinter {
    fn default() -> Self {
        let mut skin = MadSkin::default();
        skin.bold.set_fg(termimad::rgb(255, 187, 0));
        Self { skin }
    }
}

impl MarkdownPrinter {
    pub fn print(&self, text: &str) {
        self.skin.print_text(text);
        println!();
    }
}

/// Print a markdown report rendered or raw.
pub fn print_report(markdown: &str, prettify: bool) {
    if prettify {
        MarkdownPrinter::default().print(markdown);
    } else {
        println!("{markdown}");
    }
}
