// Built-in codecs.
//
// `Registry::standard()` registers, in order:
//
// - `base64`      : standard alphabet, padded
// - `hex`         : runs of two or more hex digits
// - `html`        : runs of character references
// - `url-path`    : path segments of an HTTP request line
// - `url-query`   : percent-encoded query tokens
// - `http-headers`: header values and body of an HTTP message
// - `json`        : values of a top-level JSON object
// - `gzip`, `zlib`: whole-buffer compressed streams, keyed on their magic
// - `brotli`      : whole-buffer compressed stream, tried on any other input
//
// Structural codecs (`http-headers`, `json`) decode with the identity and have
// no encoder: edits to their children are not spliced back.

use std::io::{Read, Write};
use std::sync::{Arc, LazyLock};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use brotli::{CompressorWriter, Decompressor};
use flate2::Compression;
use flate2::read::{GzDecoder, ZlibDecoder};
use flate2::write::{GzEncoder, ZlibEncoder};
use regex::bytes::Regex;

use super::{Codec, CodecDescriptor, Extraction, Extractor, Filter, Registry, Transform};
use crate::fingerprint::Fingerprint;

/// Shortest decoded payload the text codecs accept.
pub const MIN_DECODED_LEN: usize = 4;

const GZIP_MAGIC: &[u8] = &[0x1f, 0x8b];
const ZLIB_MAGIC: &[u8] = &[0x78, 0x9c];

const BROTLI_BUFFER: usize = 4096;
const BROTLI_QUALITY: u32 = 11;
const BROTLI_LGWIN: u32 = 22;

const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";
const LINE_TERMINATOR: &[u8] = b"\r\n";

static BASE64_TOKEN: LazyLock<Regex> = LazyLock::new(|| compile(r"[A-Za-z0-9/+]+={0,2}"));
static HEX_TOKEN: LazyLock<Regex> = LazyLock::new(|| compile(r"[A-Fa-f0-9]{2,}"));
static HTML_REFERENCES: LazyLock<Regex> = LazyLock::new(|| {
    compile(r"(?:&(?:#[0-9]{2,}|#[xX][0-9A-Fa-f]+|amp|lt|gt|quot|apos);)+")
});
static HTML_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    compile(r"&(#[0-9]+|#[xX][0-9A-Fa-f]+|amp|lt|gt|quot|apos);")
});
static QUERY_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    compile(r"[A-Za-z0-9._~+\-]*(?:%[0-9A-Fa-f]{2}[A-Za-z0-9._~+\-]*)+")
});
static REQUEST_LINE: LazyLock<Regex> = LazyLock::new(|| {
    compile(
        r"^(GET|HEAD|POST|PUT|DELETE|CONNECT|OPTIONS|TRACE|PATCH) (/[^ \r\n]*) HTTP/([0-9]\.[0-9])",
    )
});
static HTTP_START: LazyLock<Regex> = LazyLock::new(|| {
    compile(
        r"^(?:(?:GET|HEAD|POST|PUT|DELETE|CONNECT|OPTIONS|TRACE|PATCH) /[^\r\n]* HTTP/[0-9]\.[0-9]|HTTP/[0-9]\.[0-9] [1-5][0-9]{2}[^\r\n]*)\r\n",
    )
});

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("built-in pattern is valid")
}

/// ASCII and at least [`MIN_DECODED_LEN`] bytes.
pub fn printable() -> Filter {
    Filter::ascii().and(Filter::min_len(MIN_DECODED_LEN))
}

fn matches_of(re: &'static LazyLock<Regex>) -> Extractor {
    Extractor::new(move |input| {
        let candidates = re.find_iter(input).map(|m| m.as_bytes().to_vec()).collect();
        Extraction::new(candidates, Vec::new())
    })
}

/// Fold a sequence of names into identity bytes. Empty when there are none.
fn identity_of<'a>(names: impl IntoIterator<Item = &'a [u8]>) -> Vec<u8> {
    let mut identity = Fingerprint::empty();
    for name in names {
        identity.fold(&[name]);
    }
    identity.as_bytes().to_vec()
}

// ---------------------------------------------------------------------------
// Text encodings
// ---------------------------------------------------------------------------

pub fn base64() -> CodecDescriptor {
    CodecDescriptor::new(
        "base64",
        matches_of(&BASE64_TOKEN),
        Transform::fallible(|raw: &[u8]| STANDARD.decode(raw)),
    )
    .with_encoder(Transform::new(|data| STANDARD.encode(data).into_bytes()))
    .with_filter(printable())
}

pub fn hex() -> CodecDescriptor {
    CodecDescriptor::new(
        "hex",
        matches_of(&HEX_TOKEN),
        Transform::fallible(|raw: &[u8]| hex::decode(raw)),
    )
    .with_encoder(Transform::new(|data| hex::encode(data).into_bytes()))
    .with_filter(printable())
}

/// Character references. Decoding resolves numeric and the five predefined
/// named references; encoding escapes `<>&'"`, so numeric references come
/// back as literal characters.
pub fn html() -> CodecDescriptor {
    CodecDescriptor::new(
        "html",
        matches_of(&HTML_REFERENCES),
        Transform::text_fallible(html_unescape),
    )
    .with_encoder(Transform::text(html_escape))
    .with_filter(printable())
}

fn html_unescape(text: &str) -> Result<String, String> {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for caps in HTML_REFERENCE.captures_iter(text.as_bytes()) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        out.push_str(&text[last..whole.start()]);
        let name = &text[name.start()..name.end()];
        let c = match name {
            "amp" => '&',
            "lt" => '<',
            "gt" => '>',
            "quot" => '"',
            "apos" => '\'',
            _ => {
                let code = match name.strip_prefix("#x").or_else(|| name.strip_prefix("#X")) {
                    Some(digits) => u32::from_str_radix(digits, 16),
                    None => name[1..].parse(),
                }
                .map_err(|e| format!("bad character reference &{name};: {e}"))?;
                char::from_u32(code).ok_or_else(|| format!("invalid code point {code}"))?
            }
        };
        out.push(c);
        last = whole.end();
    }
    out.push_str(&text[last..]);
    Ok(out)
}

fn html_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '\'' => out.push_str("&#39;"),
            '"' => out.push_str("&#34;"),
            c => out.push(c),
        }
    }
    out
}

// ---------------------------------------------------------------------------
// URL encodings
// ---------------------------------------------------------------------------

/// Path segments of an HTTP request line at the start of the input. The
/// identity is the method and protocol version.
pub fn url_path() -> CodecDescriptor {
    CodecDescriptor::new(
        "url-path",
        Extractor::new(|input| {
            let Some(caps) = REQUEST_LINE.captures(input) else {
                return Extraction::none();
            };
            let (Some(method), Some(path), Some(version)) = (caps.get(1), caps.get(2), caps.get(3))
            else {
                return Extraction::none();
            };
            let candidates = path
                .as_bytes()
                .split(|&b| b == b'/')
                .filter(|segment| !segment.is_empty())
                .map(<[u8]>::to_vec)
                .collect();
            let mut identity = method.as_bytes().to_vec();
            identity.extend_from_slice(b" HTTP/");
            identity.extend_from_slice(version.as_bytes());
            Extraction::new(candidates, identity)
        }),
        Transform::fallible(|raw: &[u8]| percent_decode(raw, false)),
    )
    .with_encoder(Transform::new(|data| percent_encode(data, Escape::PathSegment)))
    .with_filter(printable())
}

/// Query-string tokens containing at least one `%XX` escape.
pub fn url_query() -> CodecDescriptor {
    CodecDescriptor::new(
        "url-query",
        matches_of(&QUERY_TOKEN),
        Transform::fallible(|raw: &[u8]| percent_decode(raw, true)),
    )
    .with_encoder(Transform::new(|data| percent_encode(data, Escape::Query)))
    .with_filter(printable())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Escape {
    PathSegment,
    Query,
}

fn percent_decode(raw: &[u8], plus_is_space: bool) -> Result<Vec<u8>, String> {
    let mut out = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        match raw[i] {
            b'%' => {
                let hi = raw.get(i + 1).and_then(|&b| (b as char).to_digit(16));
                let lo = raw.get(i + 2).and_then(|&b| (b as char).to_digit(16));
                let (Some(hi), Some(lo)) = (hi, lo) else {
                    return Err(format!("invalid escape at offset {i}"));
                };
                out.push((hi * 16 + lo) as u8);
                i += 3;
            }
            b'+' if plus_is_space => {
                out.push(b' ');
                i += 1;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    Ok(out)
}

fn percent_encode(data: &[u8], mode: Escape) -> Vec<u8> {
    const HEX: &[u8; 16] = b"0123456789ABCDEF";
    let mut out = Vec::with_capacity(data.len());
    for &b in data {
        let keep = b.is_ascii_alphanumeric()
            || matches!(b, b'-' | b'_' | b'.' | b'~')
            || (mode == Escape::PathSegment && matches!(b, b'$' | b'&' | b'+' | b':' | b'=' | b'@'));
        if keep {
            out.push(b);
        } else if mode == Escape::Query && b == b' ' {
            out.push(b'+');
        } else {
            out.extend_from_slice(&[b'%', HEX[(b >> 4) as usize], HEX[(b & 0x0f) as usize]]);
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Structural codecs
// ---------------------------------------------------------------------------

/// Header values of an HTTP request or response, then its body. The identity
/// folds the header names in order.
pub fn http_headers() -> CodecDescriptor {
    CodecDescriptor::new(
        "http-headers",
        Extractor::new(split_http),
        Transform::identity(),
    )
    .with_filter(Filter::ascii())
}

fn split_http(input: &[u8]) -> Extraction {
    if !HTTP_START.is_match(input) {
        return Extraction::none();
    }
    let Some(split) = find(input, HEADER_TERMINATOR) else {
        return Extraction::none();
    };
    let (head, body) = (&input[..split], &input[split + HEADER_TERMINATOR.len()..]);

    let mut candidates = Vec::new();
    let mut names = Vec::new();
    // The first line is the request or status line.
    for line in split_lines(head).skip(1) {
        let Some(colon) = line.iter().position(|&b| b == b':') else {
            continue;
        };
        names.push(&line[..colon]);
        candidates.push(line[colon + 1..].to_vec());
    }
    if !body.is_empty() {
        candidates.push(body.to_vec());
    }
    Extraction::new(candidates, identity_of(names))
}

fn split_lines(input: &[u8]) -> impl Iterator<Item = &[u8]> {
    let mut rest = Some(input);
    std::iter::from_fn(move || {
        let current = rest?;
        match find(current, LINE_TERMINATOR) {
            Some(end) => {
                rest = Some(&current[end + LINE_TERMINATOR.len()..]);
                Some(&current[..end])
            }
            None => {
                rest = None;
                Some(current)
            }
        }
    })
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Values of a top-level JSON object, in document order. String values are
/// yielded unquoted, other values re-serialized. The identity folds the keys.
pub fn json() -> CodecDescriptor {
    CodecDescriptor::new("json", Extractor::new(split_json), Transform::identity())
        .with_filter(Filter::ascii())
}

fn split_json(input: &[u8]) -> Extraction {
    let Ok(serde_json::Value::Object(object)) = serde_json::from_slice::<serde_json::Value>(input) else {
        return Extraction::none();
    };

    let mut candidates = Vec::with_capacity(object.len());
    for value in object.values() {
        let bytes = match value {
            serde_json::Value::String(s) => s.clone().into_bytes(),
            other => match serde_json::to_vec(other) {
                Ok(bytes) => bytes,
                Err(e) => {
                    log::trace!("json: cannot re-serialize value: {e}");
                    continue;
                }
            },
        };
        candidates.push(bytes);
    }
    Extraction::new(candidates, identity_of(object.keys().map(|k| k.as_bytes())))
}

// ---------------------------------------------------------------------------
// Compression
// ---------------------------------------------------------------------------

pub fn gzip() -> CodecDescriptor {
    CodecDescriptor::new(
        "gzip",
        whole_if_prefixed(GZIP_MAGIC),
        Transform::fallible(|raw: &[u8]| {
            let mut out = Vec::new();
            GzDecoder::new(raw).read_to_end(&mut out).map(|_| out)
        }),
    )
    .with_encoder(Transform::fallible(|data: &[u8]| {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data)?;
        encoder.finish()
    }))
    .with_filter(printable())
}

pub fn zlib() -> CodecDescriptor {
    CodecDescriptor::new(
        "zlib",
        whole_if_prefixed(ZLIB_MAGIC),
        Transform::fallible(|raw: &[u8]| {
            let mut out = Vec::new();
            ZlibDecoder::new(raw).read_to_end(&mut out).map(|_| out)
        }),
    )
    .with_encoder(Transform::fallible(|data: &[u8]| {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data)?;
        encoder.finish()
    }))
    .with_filter(printable())
}

/// Brotli streams carry no magic number, so the whole buffer is the
/// candidate unless a gzip or zlib header claims it. Anything that is not a
/// brotli stream fails to decode and is filtered out.
pub fn brotli() -> CodecDescriptor {
    CodecDescriptor::new(
        "brotli",
        Extractor::new(|input| {
            if input.is_empty() || input.starts_with(GZIP_MAGIC) || input.starts_with(ZLIB_MAGIC) {
                return Extraction::none();
            }
            Extraction::new(vec![input.to_vec()], Vec::new())
        }),
        Transform::fallible(|raw: &[u8]| {
            let mut out = Vec::new();
            Decompressor::new(raw, BROTLI_BUFFER)
                .read_to_end(&mut out)
                .map(|_| out)
        }),
    )
    .with_encoder(Transform::fallible(|data: &[u8]| -> std::io::Result<Vec<u8>> {
        let mut encoder =
            CompressorWriter::new(Vec::new(), BROTLI_BUFFER, BROTLI_QUALITY, BROTLI_LGWIN);
        encoder.write_all(data)?;
        Ok(encoder.into_inner())
    }))
    .with_filter(printable())
}

fn whole_if_prefixed(magic: &'static [u8]) -> Extractor {
    Extractor::new(move |input| {
        if input.starts_with(magic) {
            Extraction::new(vec![input.to_vec()], Vec::new())
        } else {
            Extraction::none()
        }
    })
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Every built-in codec, in standard registry order.
pub fn all() -> Vec<CodecDescriptor> {
    vec![
        base64(),
        hex(),
        html(),
        url_path(),
        url_query(),
        http_headers(),
        json(),
        gzip(),
        zlib(),
        brotli(),
    ]
}

impl Registry {
    /// The built-in codecs in standard order.
    pub fn standard() -> Self {
        Registry {
            codecs: all()
                .into_iter()
                .map(|c| Arc::new(c) as Arc<dyn Codec>)
                .collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn decoded(codec: &CodecDescriptor, input: &[u8]) -> Vec<Vec<u8>> {
        codec
            .extract(input)
            .candidates
            .iter()
            .map(|raw| codec.decode(raw))
            .filter(|d| codec.accept(d))
            .collect()
    }

    #[test]
    fn base64_finds_padded_token() {
        let codec = base64();
        assert_eq!(decoded(&codec, b"data: SGVsbG8=, done"), vec![b"Hello".to_vec()]);
        let encoder = codec.encoder().unwrap();
        assert_eq!(encoder.apply(b"Hello"), b"SGVsbG8=");
    }

    #[test]
    fn base64_rejects_binary_and_short() {
        let codec = base64();
        assert!(codec.decode(b"Hello").is_empty());
        assert!(decoded(&codec, b"data done").is_empty());
    }

    #[test]
    fn hex_decodes_even_runs() {
        let codec = hex();
        assert_eq!(decoded(&codec, b"id=68656c6c6f;"), vec![b"hello".to_vec()]);
        assert!(codec.decode(b"abc").is_empty());
        assert_eq!(codec.encoder().unwrap().apply(b"hi!!"), b"68692121");
    }

    #[test]
    fn html_resolves_reference_runs() {
        let codec = html();
        let found = decoded(&codec, b"x=&#60;b&#62; y=&lt;&lt;&gt;&gt;");
        assert_eq!(found, vec![b"<<>>".to_vec()]);
        assert_eq!(
            html_unescape("&#72;&#x69;&amp;&quot;").unwrap(),
            "Hi&\""
        );
        assert_eq!(html_escape("<a href='x'>"), "&lt;a href=&#39;x&#39;&gt;");
    }

    #[test]
    fn url_path_segments_and_identity() {
        let codec = url_path();
        let ex = codec.extract(b"GET /api/hello%20world/x HTTP/1.1\r\nHost: h\r\n\r\n");
        assert_eq!(
            ex.candidates,
            vec![b"api".to_vec(), b"hello%20world".to_vec(), b"x".to_vec()]
        );
        assert_eq!(ex.identity, b"GET HTTP/1.1");
        assert_eq!(codec.decode(b"hello%20world"), b"hello world");
        assert_eq!(codec.encoder().unwrap().apply(b"hello world"), b"hello%20world");
        assert!(codec.extract(b"not a request").is_empty());
    }

    #[test]
    fn url_query_round_trips() {
        let codec = url_query();
        let ex = codec.extract(b"?q=a+b%21c&x=plain");
        assert_eq!(ex.candidates, vec![b"a+b%21c".to_vec()]);
        let text = codec.decode(b"a+b%21c");
        assert_eq!(text, b"a b!c");
        assert_eq!(codec.encoder().unwrap().apply(&text), b"a+b%21c");
        assert!(codec.decode(b"%zz").is_empty());
    }

    #[test]
    fn http_headers_split_values_and_body() {
        let codec = http_headers();
        let msg = b"HTTP/1.1 200 OK\r\nServer: nginx\r\nX-Time: 12:00\r\n\r\n{\"a\":1}";
        let ex = codec.extract(msg);
        assert_eq!(
            ex.candidates,
            vec![b" nginx".to_vec(), b" 12:00".to_vec(), b"{\"a\":1}".to_vec()]
        );
        assert_eq!(ex.identity, identity_of([&b"Server"[..], &b"X-Time"[..]]));
        assert!(codec.encoder().is_none());
    }

    #[test]
    fn http_headers_require_start_line_and_blank_line() {
        let codec = http_headers();
        assert!(codec.extract(b"Server: nginx\r\n\r\nbody").is_empty());
        assert!(codec.extract(b"HTTP/1.1 200 OK\r\nServer: nginx\r\n").is_empty());
    }

    #[test]
    fn json_identity_tracks_keys_not_values() {
        let codec = json();
        let alice = codec.extract(br#"{"user":"alice","n":1}"#);
        let bob = codec.extract(br#"{"user":"bob","n":2}"#);
        assert_eq!(alice.identity, bob.identity);
        assert_eq!(alice.candidates, vec![b"alice".to_vec(), b"1".to_vec()]);

        let reordered = codec.extract(br#"{"n":1,"user":"alice"}"#);
        assert_ne!(alice.identity, reordered.identity);
        assert!(codec.extract(b"[1,2]").is_empty());
    }

    #[test]
    fn gzip_and_zlib_whole_buffer() {
        for codec in [gzip(), zlib()] {
            let compressed = codec.encoder().unwrap().apply(b"compressed payload");
            let ex = codec.extract(&compressed);
            assert_eq!(ex.candidates, vec![compressed.clone()], "{}", codec.name());
            assert_eq!(codec.decode(&compressed), b"compressed payload");
            assert!(codec.extract(b"plain").is_empty());
        }
    }

    #[test]
    fn brotli_whole_buffer_unless_other_magic() {
        let codec = brotli();
        let compressed = codec.encoder().unwrap().apply(b"compressed payload");
        assert!(!compressed.is_empty());
        assert_eq!(codec.extract(&compressed).candidates, vec![compressed.clone()]);
        assert_eq!(codec.decode(&compressed), b"compressed payload");

        let gz = gzip().encoder().unwrap().apply(b"compressed payload");
        assert!(codec.extract(&gz).is_empty());
        assert!(codec.extract(b"").is_empty());
        assert!(!codec.accept(&codec.decode(b"definitely not brotli")));
    }

    #[test]
    fn standard_registry_order() {
        let registry = Registry::standard();
        assert_eq!(
            registry.names().collect::<Vec<_>>(),
            [
                "base64",
                "hex",
                "html",
                "url-path",
                "url-query",
                "http-headers",
                "json",
                "gzip",
                "zlib",
                "brotli"
            ]
        );
    }
}
