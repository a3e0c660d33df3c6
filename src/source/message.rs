//! RFC 5322 message decoding into pager text.
//!
//! The pager stream is the display header block, a blank line, the text
//! body (HTML converted to text when no text part exists) and one marker
//! line per attachment.

use humansize::{format_size, BINARY};
use mail_parser::{Address, Message, MessageParser, MimeHeaders};
use tracing::{debug, warn};

use crate::error::{PagerError, Result};
use crate::pager::Markers;

/// A message ready to be paged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedMessage {
    pub text: Vec<u8>,
    pub subject: Option<String>,
    pub attachments: usize,
}

/// Decode `raw` into pager text, tagging attachment lines with `markers`.
pub fn decode_message(raw: &[u8], markers: &Markers) -> Result<DecodedMessage> {
    let data = skip_from_line(raw);
    if data.iter().all(u8::is_ascii_whitespace) {
        return Err(PagerError::MessageParse("message is empty".into()));
    }

    let Some(msg) = MessageParser::default().parse(data) else {
        warn!(len = data.len(), "mail-parser rejected message, paging raw text");
        return Ok(DecodedMessage {
            text: normalize_newlines(&String::from_utf8_lossy(data)).into_bytes(),
            subject: None,
            attachments: 0,
        });
    };

    let mut out = Vec::with_capacity(data.len());
    push_headers(&mut out, &msg);
    out.push(b'\n');

    let body = msg
        .body_text(0)
        .map(|s| s.into_owned())
        .or_else(|| msg.body_html(0).map(|html| html_to_text(&html)))
        .unwrap_or_default();
    let body = normalize_newlines(&body);
    out.extend_from_slice(body.as_bytes());
    if !body.is_empty() && !body.ends_with('\n') {
        out.push(b'\n');
    }

    let mut attachments = 0;
    for (idx, part) in msg.attachments().enumerate() {
        if attachments == 0 {
            out.push(b'\n');
        }
        let name = part
            .attachment_name()
            .map(String::from)
            .unwrap_or_else(|| format!("attachment_{idx}"));
        let content_type = part
            .content_type()
            .map(|ct| match ct.subtype() {
                Some(sub) => format!("{}/{sub}", ct.ctype()),
                None => ct.ctype().to_string(),
            })
            .unwrap_or_else(|| "application/octet-stream".to_string());
        let size = format_size(part.contents().len() as u64, BINARY);

        out.extend_from_slice(markers.attachment());
        out.extend_from_slice(
            format!(
                "[-- Attachment #{}: {} ({content_type}, {size}) --]\n",
                idx + 1,
                name.replace('\n', " ")
            )
            .as_bytes(),
        );
        attachments += 1;
    }

    debug!(bytes = out.len(), attachments, "Message decoded");
    Ok(DecodedMessage {
        text: out,
        subject: msg.subject().map(String::from),
        attachments,
    })
}

/// The header fields shown above the body, in display order.
fn push_headers(out: &mut Vec<u8>, msg: &Message<'_>) {
    let mut field = |name: &str, value: Option<String>| {
        if let Some(value) = value.filter(|v| !v.is_empty()) {
            out.extend_from_slice(format!("{name}: {}\n", value.replace(['\r', '\n'], " ")).as_bytes());
        }
    };
    field("Date", msg.date().map(|d| d.to_rfc822()));
    field("From", msg.from().map(format_address));
    field("To", msg.to().map(format_address));
    field("Cc", msg.cc().map(format_address));
    field("Reply-To", msg.reply_to().map(format_address));
    field("Subject", msg.subject().map(String::from));
}

fn format_addr(addr: &mail_parser::Addr<'_>) -> String {
    match (addr.name.as_deref(), addr.address.as_deref()) {
        (Some(name), Some(email)) => format!("{name} <{email}>"),
        (Some(name), None) => name.to_string(),
        (None, Some(email)) => email.to_string(),
        (None, None) => String::new(),
    }
}

fn format_address(address: &Address<'_>) -> String {
    match address {
        Address::List(list) => list
            .iter()
            .map(format_addr)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(", "),
        Address::Group(groups) => groups
            .iter()
            .map(|group| {
                let members = group
                    .addresses
                    .iter()
                    .map(format_addr)
                    .collect::<Vec<_>>()
                    .join(", ");
                match group.name.as_deref() {
                    Some(name) => format!("{name}: {members};"),
                    None => members,
                }
            })
            .collect::<Vec<_>>()
            .join(", "),
    }
}

/// Skip a BOM and the `From ` separator line of an mbox entry.
fn skip_from_line(data: &[u8]) -> &[u8] {
    let data = data.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(data);
    if data.starts_with(b"From ") {
        if let Some(pos) = data.iter().position(|&b| b == b'\n') {
            return &data[pos + 1..];
        }
    }
    data
}

fn normalize_newlines(text: &str) -> String {
    text.replace("\r\n", "\n")
}

/// Whether `data` starts like a mail message rather than plain text.
pub fn looks_like_message(data: &[u8]) -> bool {
    let data = skip_from_line(data);
    let first = data.split(|&b| b == b'\n').next().unwrap_or_default();
    match first.iter().position(|&b| b == b':') {
        Some(colon) if colon > 0 => first[..colon]
            .iter()
            .all(|&b| b.is_ascii_graphic() && b != b':'),
        _ => false,
    }
}

/// Elements that start a new line of text.
const BLOCK_ELEMENTS: &[&str] = &[
    "br", "p", "div", "tr", "li", "blockquote", "h1", "h2", "h3", "h4", "h5", "h6",
];

/// Convert an HTML body to text lines for the pager.
///
/// Tags are dropped, block elements break the line, `script` and `style`
/// elements vanish with their content and entities are decoded. Blank
/// runs collapse to a single blank line.
pub fn html_to_text(html: &str) -> String {
    let mut text = String::with_capacity(html.len());
    let mut rest = html;
    while let Some(open) = rest.find('<') {
        push_decoded(&mut text, &rest[..open]);
        let tag = &rest[open + 1..];
        let Some(close) = tag.find('>') else {
            rest = "";
            break;
        };
        let name = element_name(&tag[..close]);
        rest = &tag[close + 1..];
        if (name == "script" || name == "style") && !tag.starts_with('/') {
            rest = skip_element(rest, &name);
        } else if BLOCK_ELEMENTS.contains(&name.as_str()) {
            text.push('\n');
        }
    }
    push_decoded(&mut text, rest);

    let mut lines: Vec<&str> = Vec::new();
    for line in text.lines().map(str::trim) {
        if line.is_empty() && lines.last().map_or(true, |l| l.is_empty()) {
            continue;
        }
        lines.push(line);
    }
    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    lines.join("\n")
}

/// Lowercase element name of the tag body between `<` and `>`.
fn element_name(tag: &str) -> String {
    tag.trim_start_matches('/')
        .split(|c: char| c.is_ascii_whitespace() || c == '/')
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase()
}

/// The text after the closing tag of `name`, or nothing if it never closes.
fn skip_element<'a>(html: &'a str, name: &str) -> &'a str {
    // ASCII lowering keeps byte offsets aligned with `html`
    let lower = html.to_ascii_lowercase();
    let Some(end) = lower.find(&format!("</{name}")) else {
        return "";
    };
    match html[end..].find('>') {
        Some(gt) => &html[end + gt + 1..],
        None => "",
    }
}

/// Append `text` with character references replaced.
fn push_decoded(out: &mut String, text: &str) {
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let after = &rest[amp + 1..];
        let decoded = after
            .find(';')
            .filter(|&semi| semi <= 8)
            .and_then(|semi| Some((decode_entity(&after[..semi])?, semi)));
        match decoded {
            Some((ch, semi)) => {
                out.push(ch);
                rest = &after[semi + 1..];
            }
            None => {
                out.push('&');
                rest = after;
            }
        }
    }
    out.push_str(rest);
}

fn decode_entity(name: &str) -> Option<char> {
    let ch = match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => ' ',
        _ => {
            let number = name.strip_prefix('#')?;
            let code = match number.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => number.parse().ok()?,
            };
            match char::from_u32(code)? {
                '\u{a0}' => ' ',
                c => c,
            }
        }
    };
    Some(ch)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIMPLE: &[u8] = b"From: Alice <alice@example.com>\r\n\
To: bob@example.com\r\n\
Subject: Lunch\r\n\
Date: Mon, 2 Oct 2023 10:00:00 +0000\r\n\
\r\n\
Hi Bob,\r\n\
> are you free?\r\n\
Sure.\r\n";

    fn lines(decoded: &DecodedMessage) -> Vec<String> {
        String::from_utf8_lossy(&decoded.text)
            .lines()
            .map(String::from)
            .collect()
    }

    #[test]
    fn test_decode_simple_message() {
        let decoded = decode_message(SIMPLE, &Markers::with_nonce(1)).expect("decode");
        let lines = lines(&decoded);
        assert!(lines[0].starts_with("Date: "));
        assert_eq!(lines[1], "From: Alice <alice@example.com>");
        assert_eq!(lines[2], "To: bob@example.com");
        assert_eq!(lines[3], "Subject: Lunch");
        assert_eq!(lines[4], "");
        assert_eq!(&lines[5..], ["Hi Bob,", "> are you free?", "Sure."]);
        assert_eq!(decoded.subject.as_deref(), Some("Lunch"));
        assert_eq!(decoded.attachments, 0);
        assert!(!decoded.text.contains(&b'\r'));
    }

    #[test]
    fn test_decode_html_only() {
        let raw = b"Subject: News\r\nContent-Type: text/html\r\n\r\n<p>Hello &amp; welcome</p>\r\n";
        let decoded = decode_message(raw, &Markers::with_nonce(1)).expect("decode");
        let text = String::from_utf8_lossy(&decoded.text);
        assert!(text.contains("Hello & welcome"));
        assert!(!text.contains("<p>"));
    }

    #[test]
    fn test_decode_attachment_marker() {
        let raw = b"From: a@example.com\r\n\
Subject: Report\r\n\
MIME-Version: 1.0\r\n\
Content-Type: multipart/mixed; boundary=\"XX\"\r\n\
\r\n\
--XX\r\n\
Content-Type: text/plain\r\n\
\r\n\
See attached.\r\n\
--XX\r\n\
Content-Type: application/pdf; name=\"report.pdf\"\r\n\
Content-Disposition: attachment; filename=\"report.pdf\"\r\n\
Content-Transfer-Encoding: base64\r\n\
\r\n\
JVBERi0xLjQK\r\n\
--XX--\r\n";
        let markers = Markers::with_nonce(3);
        let decoded = decode_message(raw, &markers).expect("decode");
        assert_eq!(decoded.attachments, 1);
        let line = decoded
            .text
            .split(|&b| b == b'\n')
            .find(|l| markers.is_attachment(l))
            .expect("marker line");
        let visible = String::from_utf8_lossy(&line[markers.attachment().len()..]);
        assert!(visible.starts_with("[-- Attachment #1: report.pdf (application/pdf, "));
        assert!(visible.ends_with(" --]"));
    }

    #[test]
    fn test_decode_empty_is_error() {
        let err = decode_message(b"  \n", &Markers::with_nonce(1)).unwrap_err();
        assert!(matches!(err, PagerError::MessageParse(_)));
    }

    #[test]
    fn test_skip_from_line() {
        let data = b"From user@example.com Thu Jan 01 00:00:00 2024\nSubject: Test\n\nBody\n";
        assert!(skip_from_line(data).starts_with(b"Subject:"));
        let bare = b"Subject: Test\n\nBody\n";
        assert_eq!(skip_from_line(bare), bare);
    }

    #[test]
    fn test_looks_like_message() {
        assert!(looks_like_message(b"Subject: hi\n\nbody"));
        assert!(looks_like_message(b"From x@y Mon Jan 1\nFrom: x@y\n"));
        assert!(!looks_like_message(b"just some text: with a colon\n"));
        assert!(!looks_like_message(b": leading colon\n"));
    }

    #[test]
    fn test_html_to_text_removes_scripts() {
        assert_eq!(html_to_text("Before<script>alert('x')</script>After"), "BeforeAfter");
        assert_eq!(html_to_text("Tom &amp; Jerry &lt;3&gt;"), "Tom & Jerry <3>");
    }

    #[test]
    fn test_html_to_text_breaks_blocks() {
        let html = "<DIV class=\"a\">one</DIV><div>two<br/>three</div>\n\n<p></p><p>four</p>";
        assert_eq!(html_to_text(html), "one\n\ntwo\nthree\n\nfour");
    }

    #[test]
    fn test_html_to_text_entities() {
        assert_eq!(html_to_text("a&nbsp;b &#38; c &#x3C;d&#62;"), "a b & c <d>");
        assert_eq!(html_to_text("fish & chips &unknown;"), "fish & chips &unknown;");
    }
}
