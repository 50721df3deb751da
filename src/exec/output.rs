// src/exec/output.rs

//! Append-only stdout/stderr accumulators shared by foreground runs and
//! background jobs.

use super::process::OutputStream;

/// Bytes captured from a process, per stream. Grows without bound.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedOutput {
    stdout: Vec<u8>,
    stderr: Vec<u8>,
}

impl CapturedOutput {
    pub fn append(&mut self, stream: OutputStream, data: &[u8]) {
        match stream {
            OutputStream::Stdout => self.stdout.extend_from_slice(data),
            OutputStream::Stderr => self.stderr.extend_from_slice(data),
        }
    }

    /// Append a human-readable note to stderr on its own line.
    pub fn note_stderr(&mut self, note: &str) {
        if !self.stderr.is_empty() && !self.stderr.ends_with(b"\n") {
            self.stderr.push(b'\n');
        }
        self.stderr.extend_from_slice(note.as_bytes());
    }

    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }

    pub fn len(&self) -> usize {
        self.stdout.len() + self.stderr.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn note_starts_on_fresh_line() {
        let mut out = CapturedOutput::default();
        out.append(OutputStream::Stderr, b"partial");
        out.note_stderr("Command timed out");
        assert_eq!(out.stderr_lossy(), "partial\nCommand timed out");

        let mut clean = CapturedOutput::default();
        clean.note_stderr("spawn failed");
        assert_eq!(clean.stderr_lossy(), "spawn failed");
    }

    #[test]
    fn multibyte_chars_split_across_chunks_decode_once_joined() {
        let mut out = CapturedOutput::default();
        let bytes = "héllo".as_bytes();
        out.append(OutputStream::Stdout, &bytes[..2]);
        out.append(OutputStream::Stdout, &bytes[2..]);
        assert_eq!(out.stdout_lossy(), "héllo");
        assert_eq!(out.stderr_lossy(), "");
    }
}
