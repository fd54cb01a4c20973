use std::fmt::Write;

/// Width of the `====` section markers.
pub const RULE_WIDTH: usize = 80;

/// Line-oriented builder for report text.
///
/// Sections are separated by `====` rules; lists use `- ` bullets and short
/// notices are wrapped in `* ... *`.
#[derive(Debug, Default)]
pub struct ReportWriter {
    out: String,
}

impl ReportWriter {
    pub fn new() -> Self {
        Self {
            out: String::with_capacity(8 * 1024),
        }
    }

    pub fn line(&mut self, text: impl AsRef<str>) -> &mut Self {
        self.out.push_str(text.as_ref());
        self.out.push('\n');
        self
    }

    pub fn blank(&mut self) -> &mut Self {
        self.out.push('\n');
        self
    }

    pub fn rule(&mut self) -> &mut Self {
        self.line("=".repeat(RULE_WIDTH))
    }

    pub fn divider(&mut self) -> &mut Self {
        self.line("-----")
    }

    /// Title between two rules.
    pub fn section(&mut self, title: &str) -> &mut Self {
        self.rule().line(title).rule()
    }

    /// `* TEXT *` followed by a blank line.
    pub fn notice(&mut self, text: &str) -> &mut Self {
        self.line(format!("* {} *", text)).blank()
    }

    pub fn bullet(&mut self, text: impl std::fmt::Display) -> &mut Self {
        let _ = writeln!(self.out, "- {}", text);
        self
    }

    pub fn finish(self) -> String {
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_section_layout() {
        let mut writer = ReportWriter::new();
        writer.section("TITLE").bullet("a | 1").notice("NOTHING");
        let text = writer.finish();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0].len(), RULE_WIDTH);
        assert_eq!(lines[1], "TITLE");
        assert_eq!(lines[3], "- a | 1");
        assert_eq!(lines[4], "* NOTHING *");
        assert!(text.ends_with("*\n\n"));
    }
}
