//! HTTP/1.1 response builder.
//!
//! Provides a fluent builder API for constructing HTTP responses, in-place
//! accessors for middleware that rewrites a response, and serialization of the
//! response onto an async writer.

use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

use super::{Body, Headers, StatusCode};

/// An HTTP/1.1 response, ready to be serialized and sent.
///
/// # Examples
///
/// ```
/// use rttp_idempotency::http::{Response, StatusCode};
///
/// # tokio_test_block(async {
/// let response = Response::new(StatusCode::OK)
///     .header("Content-Type", "application/json")
///     .body(r#"{"status":"ok"}"#);
///
/// let mut wire = Vec::new();
/// response.write_to(&mut wire).await.unwrap();
/// let text = std::str::from_utf8(&wire).unwrap();
/// assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
/// assert!(text.contains("Content-Length: 15\r\n"));
/// # });
/// # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
/// #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
/// # }
/// ```
#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    headers: Headers,
    body: Body,
    keep_alive: bool,
}

impl Response {
    /// Creates a new response with the given status and an empty body.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: Headers::new(),
            body: Body::empty(),
            keep_alive: true,
        }
    }

    /// Appends a response header. Multiple calls with the same name are additive.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Appends a header in-place. Intended for middleware pipelines that receive
    /// a `Response` from downstream and need to decorate it without consuming it.
    pub fn add_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.insert(name, value);
    }

    /// Sets the response body from a string.
    ///
    /// The `Content-Length` header is written automatically by [`write_to`](Self::write_to).
    #[must_use]
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Body::from(body.into());
        self
    }

    /// Sets the response body from raw bytes.
    #[must_use]
    pub fn body_bytes(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Body::Full(body.into());
        self
    }

    /// Streams the body from a channel; each received chunk is sent as one
    /// HTTP chunk, and the body ends when every sender is dropped.
    #[must_use]
    pub fn streaming(mut self, chunks: mpsc::Receiver<Bytes>) -> Self {
        self.body = Body::Streaming(chunks);
        self
    }

    /// Controls whether the `Connection: keep-alive` or `Connection: close` header is written.
    #[must_use]
    pub fn keep_alive(mut self, keep_alive: bool) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    /// Returns the status code of this response.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    pub fn set_headers(&mut self, headers: Headers) {
        self.headers = headers;
    }

    /// Returns the response body.
    pub fn body_ref(&self) -> &Body {
        &self.body
    }

    pub fn set_body(&mut self, body: impl Into<Body>) {
        self.body = body.into();
    }

    pub fn is_keep_alive(&self) -> bool {
        self.keep_alive
    }

    pub fn set_keep_alive(&mut self, keep_alive: bool) {
        self.keep_alive = keep_alive;
    }

    /// Serializes the response onto `writer` using HTTP/1.1 wire format.
    ///
    /// Automatically adds:
    /// - `Content-Type: text/plain; charset=utf-8` if a buffered body is
    ///   non-empty and no `Content-Type` header was set.
    /// - `Connection: keep-alive` or `Connection: close`.
    /// - `Content-Length: <n>` for buffered bodies, or
    ///   `Transfer-Encoding: chunked` for streaming ones.
    ///
    /// The headers stored on the response are not modified by these additions
    /// until the response is consumed here.
    pub async fn write_to<W>(self, writer: &mut W) -> std::io::Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        let Response {
            status,
            mut headers,
            body,
            keep_alive,
        } = self;

        let has_content = body.as_bytes().is_some_and(|bytes| !bytes.is_empty());
        if has_content && !headers.contains("content-type") {
            headers.insert("Content-Type", "text/plain; charset=utf-8");
        }

        let connection = if keep_alive { "keep-alive" } else { "close" };
        headers.insert("Connection", connection);

        match body {
            Body::Full(bytes) => {
                let mut buf = BytesMut::with_capacity(128 + headers.len() * 64 + bytes.len());
                put_head(&mut buf, status, &headers);
                // Content-Length is always the last header before the blank line
                buf.put(format!("Content-Length: {}\r\n\r\n", bytes.len()).as_bytes());
                buf.put(bytes);
                writer.write_all(&buf).await?;
            }
            Body::Streaming(mut chunks) => {
                let mut buf = BytesMut::with_capacity(128 + headers.len() * 64);
                put_head(&mut buf, status, &headers);
                buf.put(&b"Transfer-Encoding: chunked\r\n\r\n"[..]);
                writer.write_all(&buf).await?;

                while let Some(chunk) = chunks.recv().await {
                    // A zero-length chunk would terminate the body early.
                    if chunk.is_empty() {
                        continue;
                    }
                    writer
                        .write_all(format!("{:X}\r\n", chunk.len()).as_bytes())
                        .await?;
                    writer.write_all(&chunk).await?;
                    writer.write_all(b"\r\n").await?;
                }
                writer.write_all(b"0\r\n\r\n").await?;
            }
        }

        writer.flush().await
    }
}

fn put_head(buf: &mut BytesMut, status: StatusCode, headers: &Headers) {
    buf.put(
        format!(
            "HTTP/1.1 {} {}\r\n",
            status.as_u16(),
            status.canonical_reason()
        )
        .as_bytes(),
    );
    for (name, value) in headers.iter() {
        buf.put(format!("{name}: {value}\r\n").as_bytes());
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new(StatusCode::OK)
    }
}
