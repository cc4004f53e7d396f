//! Indented CAOS text output.

/// Accumulates CAOS lines with tab indentation.
///
/// A queued comment is written on its own line just before the next line of
/// code, at that line's indentation.
#[derive(Debug, Clone, Default)]
pub struct CodeWriter {
    out: String,
    indent: usize,
    queued_comment: Option<String>,
}

impl CodeWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn indent(&self) -> usize {
        self.indent
    }

    pub fn set_indent(&mut self, indent: usize) {
        self.indent = indent;
    }

    pub fn write_line(&mut self, text: impl AsRef<str>) {
        self.write_code(0, text, 0);
    }

    /// Adjusts indentation by `pre`, writes `text`, then adjusts by `post`.
    pub fn write_code(&mut self, pre: isize, text: impl AsRef<str>, post: isize) {
        self.indent = self.indent.saturating_add_signed(pre);
        if let Some(comment) = self.queued_comment.take() {
            self.push_line(&format!("* {comment}"));
        }
        self.push_line(text.as_ref());
        self.indent = self.indent.saturating_add_signed(post);
    }

    pub fn write_comment(&mut self, text: impl AsRef<str>) {
        self.push_line(&format!("* {}", text.as_ref()));
    }

    pub fn queue_comment(&mut self, text: impl Into<String>) {
        self.queued_comment = Some(text.into());
    }

    /// Appends already-rendered text from another writer.
    pub fn append(&mut self, text: &str) {
        self.out.push_str(text);
    }

    pub fn as_str(&self) -> &str {
        &self.out
    }

    pub fn is_empty(&self) -> bool {
        self.out.is_empty()
    }

    pub fn into_string(self) -> String {
        self.out
    }

    fn push_line(&mut self, text: &str) {
        for _ in 0..self.indent {
            self.out.push('\t');
        }
        self.out.push_str(text);
        self.out.push('\n');
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indentation() {
        let mut w = CodeWriter::new();
        w.write_code(0, "doif va00 eq 1", 1);
        w.write_line("outs \"yes\"");
        w.write_code(-1, "endi", 0);
        assert_eq!(w.as_str(), "doif va00 eq 1\n\touts \"yes\"\nendi\n");
    }

    #[test]
    fn test_queued_comment_precedes_next_line() {
        let mut w = CodeWriter::new();
        w.set_indent(1);
        w.queue_comment("@ a.ral:3:1");
        w.write_line("setv va00 1");
        w.write_line("setv va01 2");
        assert_eq!(w.as_str(), "\t* @ a.ral:3:1\n\tsetv va00 1\n\tsetv va01 2\n");
    }

    #[test]
    fn test_dedent_saturates() {
        let mut w = CodeWriter::new();
        w.write_code(-3, "endm", 0);
        assert_eq!(w.indent(), 0);
        assert_eq!(w.into_string(), "endm\n");
    }
}
