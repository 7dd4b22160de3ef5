/// Sink for bytes written by `WRITE_CHAR`/`WRITE_STRING`/`WRITE_INT` etc.
/// `armd` implements this to both buffer the session console and publish a
/// console event to the broadcaster (§4.3, §4.9); tests use
/// [`BufferConsole`].
pub trait ConsoleSink: Send {
    fn write_bytes(&mut self, bytes: &[u8]);
}

/// In-memory console, used by unit/integration tests and as the default
/// sink when no session wiring is attached.
#[derive(Debug, Default)]
pub struct BufferConsole {
    pub buf: Vec<u8>,
}

impl ConsoleSink for BufferConsole {
    fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }
}

impl BufferConsole {
    pub fn as_str(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.buf)
    }
}
