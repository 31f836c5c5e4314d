//! SMTP replies.

/// A reply line (or lines) sent back to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub code: u16,
    pub lines: Vec<String>,
}

impl Reply {
    pub fn new(code: u16, text: impl Into<String>) -> Self {
        Self {
            code,
            lines: vec![text.into()],
        }
    }

    pub fn multiline(code: u16, lines: Vec<String>) -> Self {
        Self { code, lines }
    }

    pub fn ok() -> Self {
        Self::new(250, "OK")
    }

    pub fn start_data() -> Self {
        Self::new(354, "End data with <CR><LF>.<CR><LF>")
    }

    pub fn bye() -> Self {
        Self::new(221, "Bye")
    }

    pub fn bad_sequence(text: &str) -> Self {
        Self::new(503, format!("Error: {text}"))
    }

    pub fn syntax(text: &str) -> Self {
        Self::new(501, format!("Syntax error: {text}"))
    }

    pub fn store_unavailable() -> Self {
        Self::new(451, "Requested action aborted: local error in processing")
    }

    /// Wire form, `-` continuation on every line but the last.
    pub fn format(&self) -> String {
        let mut out = String::new();
        let last = self.lines.len().saturating_sub(1);
        for (i, line) in self.lines.iter().enumerate() {
            let sep = if i == last { ' ' } else { '-' };
            out.push_str(&format!("{}{}{}\r\n", self.code, sep, line));
        }
        if self.lines.is_empty() {
            out.push_str(&format!("{}\r\n", self.code));
        }
        out
    }
}
