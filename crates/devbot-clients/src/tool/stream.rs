//! Incremental `text/event-stream` line reader.

/// Buffers raw response chunks and yields the payload of every complete
/// `data:` line. Chunks may split lines and multi-byte characters anywhere.
#[derive(Debug, Default)]
pub(crate) struct DataLines {
    pending: Vec<u8>,
}

impl DataLines {
    /// Feed one chunk; returns the data payloads completed by it.
    pub(crate) fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);
        let mut out = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            if let Some(data) = data_payload(&line[..line.len() - 1]) {
                out.push(data);
            }
        }
        out
    }

    /// Payload of a final line that was not newline-terminated.
    pub(crate) fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.pending);
        data_payload(&rest)
    }
}

fn data_payload(line: &[u8]) -> Option<String> {
    let line = String::from_utf8_lossy(line);
    let line = line.strip_suffix('\r').unwrap_or(&line);
    let data = line.strip_prefix("data:")?;
    let data = data.strip_prefix(' ').unwrap_or(data);
    if data.is_empty() {
        return None;
    }
    Some(data.to_string())
}
