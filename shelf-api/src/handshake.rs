use memchr::memmem;

/// Status line and headers of an upgrade handshake response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeResponse {
    pub status: u16,
    pub reason: String,
    pub headers: Vec<(String, String)>,
}

impl HandshakeResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn is_switching_protocols(&self) -> bool {
        self.status == 101
    }

    /// Parse a header block terminated by CRLFCRLF. Header names are lowercased.
    /// Returns `None` if the terminator is missing or the status line is invalid.
    pub fn parse(raw: &[u8]) -> Option<Self> {
        let end = header_end(raw)?;
        let head = std::str::from_utf8(&raw[..end]).ok()?;
        let mut lines = head.split("\r\n");
        let status_line = lines.next()?;
        let mut parts = status_line.splitn(3, ' ');
        let proto = parts.next()?;
        if !proto.starts_with("HTTP/") {
            return None;
        }
        let status = parts.next()?.parse::<u16>().ok()?;
        let reason = parts.next().unwrap_or("").trim().to_string();
        let headers = lines
            .filter(|l| !l.is_empty())
            .filter_map(|l| l.split_once(':'))
            .map(|(k, v)| (k.trim().to_ascii_lowercase(), v.trim().to_string()))
            .collect();
        Some(Self { status, reason, headers })
    }
}

/// Offset of the CRLFCRLF that ends a header block, if present.
pub fn header_end(buf: &[u8]) -> Option<usize> {
    memmem::find(buf, b"\r\n\r\n")
}
