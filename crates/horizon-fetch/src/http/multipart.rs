//! Multipart form data for file uploads.

use bytes::{Bytes, BytesMut};
use futures_util::TryStreamExt;
use reqwest::multipart::{Form, Part};

use crate::error::{FetchError, Result};

const DEFAULT_FILE_MIME: &str = "application/octet-stream";

#[derive(Clone, Debug, PartialEq, Eq)]
enum FormPart {
    Text {
        name: String,
        value: String,
    },
    File {
        name: String,
        filename: String,
        mime_type: Option<String>,
        bytes: Bytes,
    },
}

/// A multipart form encoded into a single request body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodedForm {
    /// `multipart/form-data; boundary=...`
    pub content_type: String,
    /// The encoded form.
    pub bytes: Bytes,
}

/// Multipart form data for file uploads.
///
/// The form is encoded by reqwest's multipart writer into one payload that is
/// sent verbatim as the request body, so upload progress can be measured
/// against its length.
///
/// # Example
///
/// ```ignore
/// use horizon_fetch::MultipartForm;
///
/// let form = MultipartForm::new()
///     .text("name", "John")
///     .file_bytes("avatar", png_bytes, "avatar.png", Some("image/png"));
/// let response = client.upload("https://example.com/upload", form, None).await?;
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MultipartForm {
    parts: Vec<FormPart>,
}

impl MultipartForm {
    /// Create a new empty multipart form.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of parts in the form.
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    /// Check if the form has no parts.
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Add a text field to the form.
    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parts.push(FormPart::Text {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    /// Add a file field from bytes.
    ///
    /// Without a MIME type, or with one that does not parse, the part is sent
    /// as `application/octet-stream`.
    pub fn file_bytes(
        mut self,
        name: impl Into<String>,
        bytes: impl Into<Bytes>,
        filename: impl Into<String>,
        mime_type: Option<&str>,
    ) -> Self {
        self.parts.push(FormPart::File {
            name: name.into(),
            filename: filename.into(),
            mime_type: mime_type.map(str::to_string),
            bytes: bytes.into(),
        });
        self
    }

    /// Encode the form into its wire representation.
    ///
    /// Every encoding uses a fresh random boundary, reported in the returned
    /// content type. An empty form encodes to an empty body.
    pub async fn encode(&self) -> Result<EncodedForm> {
        let form = self.to_reqwest();
        let content_type = format!("multipart/form-data; boundary={}", form.boundary());
        let bytes = form
            .into_stream()
            .try_fold(BytesMut::new(), |mut buf, chunk| async move {
                buf.extend_from_slice(&chunk);
                Ok::<_, reqwest::Error>(buf)
            })
            .await
            .map_err(|e| FetchError::Form(e.to_string()))?;

        Ok(EncodedForm {
            content_type,
            bytes: bytes.freeze(),
        })
    }

    /// Convert to a reqwest form.
    fn to_reqwest(&self) -> Form {
        self.parts.iter().fold(Form::new(), |form, part| match part {
            FormPart::Text { name, value } => form.text(name.clone(), value.clone()),
            FormPart::File {
                name,
                filename,
                mime_type,
                bytes,
            } => form.part(name.clone(), file_part(bytes, filename, mime_type.as_deref())),
        })
    }
}

fn file_part(bytes: &Bytes, filename: &str, mime_type: Option<&str>) -> Part {
    let part = || Part::bytes(bytes.to_vec()).file_name(filename.to_string());
    let mime = mime_type.unwrap_or(DEFAULT_FILE_MIME);

    // mime_str consumes the part, so a fresh one is built for the fallback
    part().mime_str(mime).unwrap_or_else(|e| {
        tracing::warn!(
            target: "horizon_fetch::http",
            "Invalid MIME type '{}': {}, using {}",
            mime,
            e,
            DEFAULT_FILE_MIME
        );
        part()
            .mime_str(DEFAULT_FILE_MIME)
            .unwrap_or_else(|_| part())
    })
}
