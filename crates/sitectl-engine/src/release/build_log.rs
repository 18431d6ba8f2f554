//! Timestamped build log accumulated during a release operation

use chrono::{SecondsFormat, Utc};

#[derive(Debug, Default, Clone)]
pub struct BuildLog {
    lines: Vec<String>,
}

impl BuildLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one line prefixed with an RFC 3339 UTC timestamp
    pub fn add(&mut self, line: impl AsRef<str>) {
        let stamp = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);
        self.lines.push(format!("{} {}", stamp, line.as_ref()));
    }

    /// Append a `warning:` line and mirror it to the tracing stream
    pub fn warn(&mut self, line: impl AsRef<str>) {
        let line = line.as_ref();
        tracing::warn!(build_log = line, "release warning");
        if line.starts_with("warning:") {
            self.add(line);
        } else {
            self.add(format!("warning: {}", line));
        }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// True when any line contains `needle`
    pub fn contains(&self, needle: &str) -> bool {
        self.lines.iter().any(|l| l.contains(needle))
    }

    pub fn render(&self) -> String {
        if self.lines.is_empty() {
            return String::new();
        }
        let mut out = self.lines.join("\n");
        out.push('\n');
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_is_newline_terminated() {
        let mut log = BuildLog::new();
        assert_eq!(log.render(), "");

        log.add("starting");
        log.warn("image skipped");

        let text = log.render();
        assert!(text.ends_with('\n'));
        assert_eq!(text.lines().count(), 2);
        assert!(log.lines()[1].contains(" warning: image skipped"));
    }
}
