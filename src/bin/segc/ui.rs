use nu_ansi_term::{Color, Style};
use std::fmt::Display;
use std::io::IsTerminal;

const HEADING_ICON: &str = "▸";

struct Palette {
    heading: Style,
    key: Style,
    value: Style,
    bullet: Style,
}

impl Palette {
    fn dark() -> Self {
        Self {
            heading: Style::new().bold().fg(Color::Cyan),
            key: Style::new().fg(Color::LightGray),
            value: Style::new().fg(Color::White),
            bullet: Style::new().fg(Color::Cyan),
        }
    }
}

/// Text-mode output helpers; colour only when stdout is a terminal.
pub struct Ui {
    palette: Palette,
    paint: bool,
}

impl Ui {
    pub fn new() -> Self {
        let paint = std::io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none();

        #[cfg(windows)]
        if paint {
            let _ = nu_ansi_term::enable_ansi_support();
        }

        Self {
            palette: Palette::dark(),
            paint,
        }
    }

    /// Heading with `key=value` pairs on the same line.
    pub fn summary<V: Display>(&self, title: &str, fields: &[(&str, V)]) {
        let pairs = fields
            .iter()
            .map(|(key, value)| {
                if self.paint {
                    format!(
                        "{}={}",
                        self.palette.key.paint(*key),
                        self.palette.value.paint(value.to_string())
                    )
                } else {
                    format!("{key}={value}")
                }
            })
            .collect::<Vec<_>>();
        println!("{}", summary_line(&self.title(title), &pairs));
    }

    /// Heading, then `text` indented beneath it line by line.
    pub fn block(&self, title: &str, text: &str) {
        self.heading(title);
        for line in indented(text) {
            if self.paint {
                println!("{}", self.palette.value.paint(line));
            } else {
                println!("{line}");
            }
        }
    }

    /// Heading, then entries numbered from 1 (matching condition ids and
    /// placeholder positions).
    pub fn numbered<I>(&self, title: &str, entries: I)
    where
        I: IntoIterator<Item = String>,
    {
        self.heading(title);
        let mut empty = true;
        for (idx, entry) in entries.into_iter().enumerate() {
            empty = false;
            let marker = format!("{:>3}.", idx + 1);
            if self.paint {
                println!("{} {entry}", self.palette.bullet.paint(marker));
            } else {
                println!("{marker} {entry}");
            }
        }
        if empty {
            println!("    (none)");
        }
    }

    fn heading(&self, title: &str) {
        println!("{}", self.title(title));
    }

    fn title(&self, title: &str) -> String {
        let formatted = format!("{HEADING_ICON} {title}");
        if self.paint {
            self.palette.heading.paint(formatted).to_string()
        } else {
            formatted
        }
    }
}

fn summary_line(title: &str, pairs: &[String]) -> String {
    if pairs.is_empty() {
        return title.to_string();
    }
    format!("{title}  {}", pairs.join("  "))
}

fn indented(text: &str) -> impl Iterator<Item = String> + '_ {
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| format!("  {}", line.trim_end()))
}
