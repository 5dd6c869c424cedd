/// Message codec (C1).
///
/// Builds outbound request bytes and synthesizes the 503 response. Upstream
/// replies are never parsed; they are opaque bytes forwarded as-is by
/// [`crate::transaction`].
const FIXED_USER_AGENT: &str = "rproxy/1.0";

/// Builds `METHOD TARGET HTTP/1.1\r\n` plus the fixed headers, any
/// caller-supplied headers, and an optional body, terminated by `\r\n\r\n`.
pub fn build_request(
    method: &str,
    target: &str,
    host: &str,
    headers: &[(String, String)],
    body: Option<&[u8]>,
) -> Vec<u8> {
    let mut out = format!("{} {} HTTP/1.1\r\n", method, target).into_bytes();
    out.extend_from_slice(format!("Host: {}\r\n", host).as_bytes());
    out.extend_from_slice(format!("User-Agent: {}\r\n", FIXED_USER_AGENT).as_bytes());
    out.extend_from_slice(b"Accept: */*\r\n");
    for (key, value) in headers {
        out.extend_from_slice(format!("{}: {}\r\n", key, value).as_bytes());
    }
    if let Some(body) = body {
        out.extend_from_slice(format!("Content-Length: {}\r\n\r\n", body.len()).as_bytes());
        out.extend_from_slice(body);
    }
    out.extend_from_slice(b"\r\n\r\n");
    out
}

/// Builds the literal health-probe request: `HEAD / HTTP/1.1\r\nHost:
/// <host>\r\n\r\n`, exactly, with no other headers. Kept separate from
/// [`build_request`] because the probe's bytes are fixed by contract, not a
/// superset of the general request shape.
pub fn build_probe_request(host: &str) -> Vec<u8> {
    format!("HEAD / HTTP/1.1\r\nHost: {}\r\n\r\n", host).into_bytes()
}

/// Wraps a plain-text message in a minimal HTML document, matching the
/// original implementation's `messageHtml` helper.
pub fn message_html(message: &str) -> String {
    format!(
        "<!DOCTYPE html>\n\
         <html lang=\"en\">\n\
         <head>\n\
         <meta charset=\"UTF-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n\
         <title>Document</title>\n\
         </head>\n\
         <body>{}</body>\n\
         </html>\n",
        message
    )
}

/// Builds the literal 503 response bytes synthesized whenever no usable
/// upstream exists.
pub fn build_503() -> Vec<u8> {
    let body = message_html("Unable to connect to server");
    let mut out = b"HTTP/1.1 503 Service Unavailable\r\n".to_vec();
    out.extend_from_slice(b"Content-Type: text/html\r\n");
    out.extend_from_slice(format!("Content-Length: {}\r\n\r\n", body.len()).as_bytes());
    out.extend_from_slice(body.as_bytes());
    out
}
