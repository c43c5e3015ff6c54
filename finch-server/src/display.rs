/// Sink for the structured-light pattern the Coordinator hands off on
/// `slm_image`/`slm_image_url`. A real SLM driver lives outside this
/// crate's scope; the `NoopDisplay` here is what `main` wires up until
/// one exists, and is also what tests use.
pub trait DisplaySink: Send {
    fn show_image(&mut self, bytes: &[u8]) -> Result<(), DisplayError>;
    fn show_image_url(&mut self, url: &str) -> Result<(), DisplayError>;
}

#[derive(Debug, thiserror::Error)]
pub enum DisplayError {
    #[error("display sink unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Default)]
pub struct NoopDisplay {
    pub last_image_len: Option<usize>,
    pub last_url: Option<String>,
}

impl DisplaySink for NoopDisplay {
    fn show_image(&mut self, bytes: &[u8]) -> Result<(), DisplayError> {
        self.last_image_len = Some(bytes.len());
        Ok(())
    }

    fn show_image_url(&mut self, url: &str) -> Result<(), DisplayError> {
        self.last_url = Some(url.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_display_records_what_it_was_shown() {
        let mut sink = NoopDisplay::default();
        sink.show_image(&[1, 2, 3]).unwrap();
        sink.show_image_url("http://example.invalid/pattern.png")
            .unwrap();
        assert_eq!(sink.last_image_len, Some(3));
        assert_eq!(
            sink.last_url.as_deref(),
            Some("http://example.invalid/pattern.png")
        );
    }
}
