/// Seam over the system clipboard so tests and headless environments can
/// substitute their own source. `Ok(None)` means "nothing usable there";
/// `Err` means access was denied or failed, which triggers the manual
/// paste prompt fallback.
pub trait ClipboardProvider {
    fn read_text(&mut self) -> Result<Option<String>, String>;
    fn write_text(&mut self, text: &str) -> Result<(), String>;
}

pub struct SystemClipboard {
    inner: Option<arboard::Clipboard>,
}

impl SystemClipboard {
    pub fn new() -> Self {
        Self {
            inner: arboard::Clipboard::new().ok(),
        }
    }
}

impl Default for SystemClipboard {
    fn default() -> Self {
        Self::new()
    }
}

impl ClipboardProvider for SystemClipboard {
    fn read_text(&mut self) -> Result<Option<String>, String> {
        let Some(clipboard) = self.inner.as_mut() else {
            return Err("clipboard unavailable".to_string());
        };
        match clipboard.get_text() {
            Ok(text) if text.is_empty() => Ok(None),
            Ok(text) => Ok(Some(text)),
            Err(arboard::Error::ContentNotAvailable) => Ok(None),
            Err(err) => Err(err.to_string()),
        }
    }

    fn write_text(&mut self, text: &str) -> Result<(), String> {
        let Some(clipboard) = self.inner.as_mut() else {
            return Err("clipboard unavailable".to_string());
        };
        clipboard.set_text(text).map_err(|err| err.to_string())
    }
}
