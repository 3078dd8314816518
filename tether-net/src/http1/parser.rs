use http::{HeaderName, HeaderValue, Method};

use super::headers::Headers;
use super::request::Request;
use super::types::{
    Header, HttpVersion, Limits, ParseError, ParseErrorKind, ResponseHead, SerializeError,
    StatusLine,
};

const CRLF: &[u8] = b"\r\n";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeadStatus {
    NeedMore,
    Complete { head: ResponseHead, consumed: usize },
}

/// Parses a response status line and header block from the start of `buffer`.
///
/// Never blocks and never guesses: until the blank line that ends the header block
/// has arrived this returns [`HeadStatus::NeedMore`]. `consumed` counts the bytes of
/// the head including the terminating blank line; anything after it is body. Lines
/// may end in CRLF or a bare LF.
pub fn parse_response_head(buffer: &[u8], limits: Limits) -> Result<HeadStatus, ParseError> {
    let (headers_end, terminator_len) = match find_headers_end(buffer, limits)? {
        Some(found) => found,
        None => return Ok(HeadStatus::NeedMore),
    };

    let line_end = find_line_end(buffer, 0)
        .ok_or_else(|| ParseError::new(ParseErrorKind::UnexpectedEof, buffer.len()))?;
    let status_bytes = &buffer[..line_end];
    let line = parse_status_line(status_bytes.strip_suffix(b"\r").unwrap_or(status_bytes))?;

    let headers_start = line_end + 1;
    let header_bytes = if headers_start <= headers_end {
        &buffer[headers_start..headers_end]
    } else {
        &[]
    };
    let raw_headers = parse_headers(header_bytes, headers_start)?;
    check_content_length(&raw_headers, headers_start)?;

    let mut headers = Headers::new();
    for header in raw_headers {
        headers.push(header);
    }

    Ok(HeadStatus::Complete {
        head: ResponseHead { line, headers },
        consumed: headers_end + terminator_len,
    })
}

/// Serializes a request for the wire. Every header name must be an RFC 9110 token and
/// every value free of CR, LF and NUL, or nothing is produced.
pub fn serialize_request(request: &Request) -> Result<Vec<u8>, SerializeError> {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(
        format!("{} {} HTTP/1.1\r\n", request.method, request.target()).as_bytes(),
    );

    if !request.headers.contains("host") {
        if let Some(authority) = request.authority() {
            write_checked_header(&mut bytes, "Host", &authority)?;
        }
    }
    for header in request.headers.iter() {
        write_checked_header(&mut bytes, &header.name, &header.value)?;
    }

    let framed =
        request.headers.contains("content-length") || request.headers.contains("transfer-encoding");
    match &request.body {
        Some(body) if !framed => {
            write_header(&mut bytes, "Content-Length", &body.len().to_string());
        }
        None if !framed && expects_body(&request.method) => {
            write_header(&mut bytes, "Content-Length", "0");
        }
        _ => {}
    }

    bytes.extend_from_slice(CRLF);
    if let Some(body) = &request.body {
        bytes.extend_from_slice(body);
    }
    Ok(bytes)
}

pub fn serialize_response_head(head: &ResponseHead) -> Vec<u8> {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(
        format!(
            "{} {} {}\r\n",
            head.line.version.as_str(),
            head.line.status_code,
            head.line.reason
        )
        .as_bytes(),
    );
    for header in head.headers.iter() {
        write_header(&mut bytes, &header.name, &header.value);
    }
    bytes.extend_from_slice(CRLF);
    bytes
}

fn write_header(bytes: &mut Vec<u8>, name: &str, value: &str) {
    bytes.extend_from_slice(name.as_bytes());
    bytes.extend_from_slice(b": ");
    bytes.extend_from_slice(value.as_bytes());
    bytes.extend_from_slice(CRLF);
}

fn write_checked_header(
    bytes: &mut Vec<u8>,
    name: &str,
    value: &str,
) -> Result<(), SerializeError> {
    if HeaderName::from_bytes(name.as_bytes()).is_err() {
        return Err(SerializeError::InvalidHeaderName(name.to_string()));
    }
    if HeaderValue::from_bytes(value.as_bytes()).is_err() {
        return Err(SerializeError::InvalidHeaderValue(name.to_string()));
    }
    write_header(bytes, name, value);
    Ok(())
}

fn expects_body(method: &Method) -> bool {
    *method == Method::POST || *method == Method::PUT || *method == Method::PATCH
}

/// Locates the blank line closing the head. Returns the index of the line feed ending
/// the last header line (or the status line) and the length of what follows it up to
/// and including the blank line.
fn find_headers_end(
    buffer: &[u8],
    limits: Limits,
) -> Result<Option<(usize, usize)>, ParseError> {
    let too_large = || ParseError::new(ParseErrorKind::HeaderTooLarge, limits.max_header_bytes);
    let mut from = 0;
    while let Some(index) = find_line_end(buffer, from) {
        if index > limits.max_header_bytes {
            return Err(too_large());
        }
        match &buffer[index + 1..] {
            [b'\n', ..] => return Ok(Some((index, 2))),
            [b'\r', b'\n', ..] => return Ok(Some((index, 3))),
            _ => from = index + 1,
        }
    }
    if buffer.len() > limits.max_header_bytes {
        return Err(too_large());
    }
    Ok(None)
}

fn find_line_end(buffer: &[u8], start: usize) -> Option<usize> {
    twoway::find_bytes(&buffer[start..], b"\n").map(|offset| start + offset)
}

fn parse_status_line(line: &[u8]) -> Result<StatusLine, ParseError> {
    let invalid = || ParseError::new(ParseErrorKind::InvalidStatusLine, 0);
    let text = std::str::from_utf8(line).map_err(|_| invalid())?;

    let mut parts = text.splitn(3, ' ');
    let version_raw = parts.next().unwrap_or("");
    if !version_raw.starts_with("HTTP/") {
        return Err(invalid());
    }
    let status_raw = parts.next().ok_or_else(invalid)?;
    if status_raw.len() != 3 || !status_raw.bytes().all(|byte| byte.is_ascii_digit()) {
        return Err(invalid());
    }
    let status_code = status_raw.parse::<u16>().map_err(|_| invalid())?;
    let reason = parts.next().unwrap_or("").trim_end();

    Ok(StatusLine {
        version: parse_http_version(version_raw),
        status_code,
        reason: reason.to_string(),
    })
}

fn parse_http_version(version_raw: &str) -> HttpVersion {
    match version_raw {
        "HTTP/1.0" => HttpVersion::Http10,
        "HTTP/1.1" => HttpVersion::Http11,
        other => HttpVersion::Other(other.to_string()),
    }
}

fn parse_headers(bytes: &[u8], base_offset: usize) -> Result<Vec<Header>, ParseError> {
    let mut headers: Vec<Header> = Vec::new();
    let mut offset = base_offset;

    for raw_line in bytes.split(|byte| *byte == b'\n') {
        let line_len = raw_line.len() + 1;
        let raw_line = raw_line.strip_suffix(b"\r").unwrap_or(raw_line);
        if raw_line.is_empty() {
            offset += line_len;
            continue;
        }
        let line = String::from_utf8_lossy(raw_line);

        if line.starts_with([' ', '\t']) {
            // obs-fold: continuation of the previous header value
            let previous = headers
                .last_mut()
                .ok_or_else(|| ParseError::new(ParseErrorKind::InvalidHeader, offset))?;
            previous.value.push(' ');
            previous.value.push_str(line.trim());
            offset += line_len;
            continue;
        }

        let (raw_name, value) = line
            .split_once(':')
            .ok_or_else(|| ParseError::new(ParseErrorKind::InvalidHeader, offset))?;
        let name = raw_name.trim();
        if name.is_empty() || name.contains([' ', '\t']) {
            return Err(ParseError::new(ParseErrorKind::InvalidHeader, offset));
        }

        headers.push(Header {
            name: name.to_string(),
            value: value.trim().to_string(),
            raw_name: raw_name.to_string(),
        });
        offset += line_len;
    }

    Ok(headers)
}

/// Repeated or comma-joined Content-Length values must all agree.
fn check_content_length(headers: &[Header], offset: usize) -> Result<(), ParseError> {
    let mut length: Option<u64> = None;
    for header in headers
        .iter()
        .filter(|header| header.name.eq_ignore_ascii_case("content-length"))
    {
        for element in header.value.split(',') {
            let parsed = parse_decimal(element.trim())
                .ok_or_else(|| ParseError::new(ParseErrorKind::InvalidContentLength, offset))?;
            match length {
                Some(existing) if existing != parsed => {
                    return Err(ParseError::new(
                        ParseErrorKind::InvalidContentLength,
                        offset,
                    ));
                }
                _ => length = Some(parsed),
            }
        }
    }
    Ok(())
}

/// Parsed Content-Length of an already validated header map.
pub(crate) fn content_length(headers: &Headers) -> Option<u64> {
    headers
        .get("content-length")
        .and_then(|value| value.split(',').next())
        .and_then(|value| parse_decimal(value.trim()))
}

/// `1*DIGIT` only; `u64::from_str` would also take a leading `+`.
fn parse_decimal(text: &str) -> Option<u64> {
    if text.is_empty() || !text.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}
