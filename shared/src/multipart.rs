//! `multipart/form-data` bodies for submissions carrying attachments.

use bytes::{BufMut, BytesMut};
use serde_json::Value;

use crate::capabilities::MAX_REQUEST_BODY_SIZE;
use crate::error::SyncError;
use crate::model::Payload;

const CRLF: &[u8] = b"\r\n";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartBody {
    pub body: Vec<u8>,
    /// `multipart/form-data` with the boundary parameter.
    pub content_type: String,
}

pub fn encode(payload: &Payload) -> Result<MultipartBody, SyncError> {
    let boundary = format!("----lingo{}", uuid::Uuid::new_v4().simple());
    encode_with_boundary(payload, &boundary)
}

pub(crate) fn encode_with_boundary(
    payload: &Payload,
    boundary: &str,
) -> Result<MultipartBody, SyncError> {
    let mut buf = BytesMut::new();

    for (name, value) in &payload.fields {
        let text = match value {
            Value::String(s) => s.clone(),
            Value::Null => continue,
            other => other.to_string(),
        };
        open_part(&mut buf, boundary);
        buf.put_slice(
            format!("Content-Disposition: form-data; name=\"{}\"", escape(name)).as_bytes(),
        );
        buf.put_slice(CRLF);
        buf.put_slice(CRLF);
        buf.put_slice(text.as_bytes());
        buf.put_slice(CRLF);
    }

    for attachment in &payload.attachments {
        open_part(&mut buf, boundary);
        buf.put_slice(
            format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"",
                escape(&attachment.field),
                escape(&attachment.file_name)
            )
            .as_bytes(),
        );
        buf.put_slice(CRLF);
        let content_type = if attachment.content_type.trim().is_empty() {
            "application/octet-stream"
        } else {
            attachment.content_type.as_str()
        };
        buf.put_slice(format!("Content-Type: {}", strip_newlines(content_type)).as_bytes());
        buf.put_slice(CRLF);
        buf.put_slice(CRLF);
        buf.put_slice(&attachment.bytes);
        buf.put_slice(CRLF);

        if buf.len() > MAX_REQUEST_BODY_SIZE {
            return Err(SyncError::validation(
                attachment.field.clone(),
                format!("exceeds the {} MB upload limit", MAX_REQUEST_BODY_SIZE / (1024 * 1024)),
            ));
        }
    }

    buf.put_slice(b"--");
    buf.put_slice(boundary.as_bytes());
    buf.put_slice(b"--");
    buf.put_slice(CRLF);

    Ok(MultipartBody {
        body: buf.to_vec(),
        content_type: format!("multipart/form-data; boundary={boundary}"),
    })
}

fn open_part(buf: &mut BytesMut, boundary: &str) {
    buf.put_slice(b"--");
    buf.put_slice(boundary.as_bytes());
    buf.put_slice(CRLF);
}

/// Quotes are percent-encoded in names and filenames, as browsers do.
fn escape(value: &str) -> String {
    strip_newlines(value).replace('"', "%22")
}

fn strip_newlines(value: &str) -> String {
    value.chars().filter(|c| !matches!(c, '\r' | '\n')).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Attachment;
    use serde_json::json;

    #[test]
    fn test_text_and_file_parts() {
        let payload = Payload::new()
            .with_text("word", "banana")
            .with_attachment(Attachment::new("image", "banana.png", "image/png", vec![1, 2, 3]));
        let encoded = encode_with_boundary(&payload, "XYZ").unwrap();
        let text = String::from_utf8_lossy(&encoded.body);

        assert!(text.starts_with("--XYZ\r\nContent-Disposition: form-data; name=\"word\"\r\n\r\nbanana\r\n"));
        assert!(text.contains("name=\"image\"; filename=\"banana.png\"\r\nContent-Type: image/png\r\n\r\n"));
        assert!(text.ends_with("--XYZ--\r\n"));
        assert_eq!(encoded.content_type, "multipart/form-data; boundary=XYZ");
    }

    #[test]
    fn test_non_string_values_as_json_text() {
        let payload = Payload::new().with_value("options", json!(["a", "b"]));
        let encoded = encode_with_boundary(&payload, "B").unwrap();
        let text = String::from_utf8_lossy(&encoded.body);
        assert!(text.contains("\r\n\r\n[\"a\",\"b\"]\r\n"));
    }

    #[test]
    fn test_header_injection_neutralised() {
        let payload = Payload::new().with_attachment(Attachment::new(
            "image",
            "evil\"\r\nX-Injected: 1.png",
            "image/png",
            vec![0],
        ));
        let encoded = encode_with_boundary(&payload, "B").unwrap();
        let text = String::from_utf8_lossy(&encoded.body);
        assert!(text.contains("filename=\"evil%22X-Injected: 1.png\""));
        assert!(!text.contains("\r\nX-Injected"));
    }

    #[test]
    fn test_boundaries_are_unique() {
        let payload = Payload::new().with_text("word", "a");
        let a = encode(&payload).unwrap();
        let b = encode(&payload).unwrap();
        assert_ne!(a.content_type, b.content_type);
    }
}
