use bytes::Bytes;

/// Bytes shown per diagnostic row, and past the failure offset.
pub const DIAGNOSTIC_WIDTH: usize = 40;

/// The payload did not decode as LLSD notation.
///
/// Keeps the failing byte offset and the offending bytes so callers can log a
/// bounded window around the failure instead of the whole payload.
#[derive(Debug, Clone, thiserror::Error)]
#[error("bad LLSD notation at byte {offset}: {message}")]
pub struct ParseError {
    offset: usize,
    message: String,
    data: Bytes,
}

impl ParseError {
    pub fn new(offset: usize, message: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            offset,
            message: message.into(),
            data: data.into(),
        }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// The complete payload that failed to parse.
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Escaped bytes from at most `window` before to `window` after the
    /// failure offset.
    pub fn excerpt(&self, window: usize) -> String {
        let start = self.offset.saturating_sub(window);
        let end = self.offset.saturating_add(window).min(self.data.len());
        escape(&self.data[start.min(end)..end])
    }

    /// Render the payload as escaped 40-byte rows, truncated 40 bytes past
    /// the failure offset, e.g.
    ///
    /// ```text
    /// 0000: {'pump':'x','data':{'command':'stop',' +
    /// 0040: args':[i1,i2 ... (8120 more)
    /// ```
    pub fn diagnostic_lines(&self) -> Vec<String> {
        let total = self.data.len();
        let trunc = self.offset.saturating_add(DIAGNOSTIC_WIDTH);
        let (shown, ellipsis) = if trunc < total {
            (&self.data[..trunc], format!("... ({} more)", total - trunc))
        } else {
            (&self.data[..], String::new())
        };

        let mut lines = Vec::new();
        let mut start = 0usize;
        while start + DIAGNOSTIC_WIDTH < shown.len() {
            lines.push(format!(
                "{start:04}: {} +",
                escape(&shown[start..start + DIAGNOSTIC_WIDTH])
            ));
            start += DIAGNOSTIC_WIDTH;
        }
        lines.push(format!("{start:04}: {}{ellipsis}", escape(&shown[start..])));
        lines
    }
}

fn escape(bytes: &[u8]) -> String {
    bytes
        .iter()
        .flat_map(|b| std::ascii::escape_default(*b))
        .map(char::from)
        .collect()
}
