//! Line-break normalization for HTML handed to the document renderer
//!
//! Renderers treat raw newlines in HTML unpredictably, so every line break
//! outside a verbatim region is collapsed to a single space. Verbatim regions
//! (`<code>` and `<pre>` elements, including `<pre><code>` nests) are copied
//! byte-for-byte so code samples keep their line structure.
//!
//! Verbatim regions are found in a single pass with a stack of open verbatim
//! tags. Tag names inside HTML comments or attribute values of other tags do
//! not count. Malformed markup never fails: an opening tag without a matching
//! close keeps everything up to the end of the input verbatim.
//!
//! ```
//! use wiki_export::normalize::normalize_line_breaks;
//!
//! assert_eq!(normalize_line_breaks("The\r\ncat page\n"), "The cat page ");
//! assert_eq!(
//!     normalize_line_breaks("Code:\n<pre><code>a\nb</code></pre>\nEnd"),
//!     "Code: <pre><code>a\nb</code></pre> End"
//! );
//! ```

use std::ops::Range;

/// Elements whose content is reproduced verbatim
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum VerbatimTag {
    Code,
    Pre,
}

impl VerbatimTag {
    fn from_name(name: &str) -> Option<Self> {
        if name.eq_ignore_ascii_case("code") {
            Some(VerbatimTag::Code)
        } else if name.eq_ignore_ascii_case("pre") {
            Some(VerbatimTag::Pre)
        } else {
            None
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TagKind {
    Open,
    Close,
    SelfClosing,
}

/// A recognised verbatim tag starting at the current `<`
#[derive(Debug)]
struct TagToken {
    tag: VerbatimTag,
    kind: TagKind,
    /// Byte length of the tag text, including `<` and `>`
    len: usize,
}

/// Replace line breaks outside `<code>`/`<pre>` regions with single spaces.
///
/// `\r\n`, lone `\r` and lone `\n` each become one space. A trailing line
/// break becomes a trailing space. Opening tags are recognised with or without
/// attributes (`<code data-lang="python">` behaves like `<code>`).
pub fn normalize_line_breaks(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut last = 0;

    for span in verbatim_spans(input) {
        push_collapsed(&mut out, &input[last..span.start]);
        out.push_str(&input[span.clone()]);
        last = span.end;
    }
    push_collapsed(&mut out, &input[last..]);

    out
}

/// Byte ranges of the outermost verbatim regions of `input`
///
/// Each range runs from the `<` of an opening `<code>`/`<pre>` tag through the
/// `>` of the closing tag that balances it, or to the end of the input when
/// it is never closed. Outside a region, HTML comments and the full text of
/// other tags (quoted attribute values included) are skipped, so a `<code>`
/// mentioned there opens nothing.
pub(crate) fn verbatim_spans(input: &str) -> Vec<Range<usize>> {
    let mut spans = Vec::new();
    let mut open: Vec<VerbatimTag> = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while let Some(p) = input[i..].find('<') {
        i += p;
        let rest = &input[i..];

        if let Some(token) = scan_tag(rest) {
            match token.kind {
                TagKind::Open => {
                    if open.is_empty() {
                        start = i;
                    }
                    open.push(token.tag);
                }
                TagKind::Close => {
                    if let Some(pos) = open.iter().rposition(|t| *t == token.tag) {
                        open.truncate(pos);
                        if open.is_empty() {
                            spans.push(start..i + token.len);
                        }
                    }
                }
                TagKind::SelfClosing => {}
            }
            i += token.len;
        } else if open.is_empty()
            && let Some(len) = markup_len(rest)
        {
            i += len;
        } else {
            i += 1;
        }
    }

    if !open.is_empty() {
        spans.push(start..input.len());
    }
    spans
}

fn push_collapsed(out: &mut String, text: &str) {
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\r' => {
                chars.next_if_eq(&'\n');
                out.push(' ');
            }
            '\n' => out.push(' '),
            c => out.push(c),
        }
    }
}

/// Length of a comment or non-verbatim tag starting at the `<` of `s`
///
/// An unclosed comment runs to the end of the input. A tag without a closing
/// `>` is not markup; its `<` is plain text.
fn markup_len(s: &str) -> Option<usize> {
    if let Some(body) = s.strip_prefix("<!--") {
        return Some(body.find("-->").map_or(s.len(), |p| 4 + p + 3));
    }

    let bytes = s.as_bytes();
    let starts_tag = match bytes.get(1) {
        Some(b'!' | b'?') => true,
        Some(b'/') => bytes.get(2).is_some_and(u8::is_ascii_alphabetic),
        Some(b) => b.is_ascii_alphabetic(),
        None => false,
    };
    if !starts_tag {
        return None;
    }
    tag_end(bytes, 1)
}

/// Index just past the `>` closing a tag, scanning from `from`
///
/// `>` inside single- or double-quoted attribute values does not count.
fn tag_end(bytes: &[u8], from: usize) -> Option<usize> {
    let mut quote: Option<u8> = None;
    for (offset, &b) in bytes[from..].iter().enumerate() {
        match quote {
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None if b == b'"' || b == b'\'' => quote = Some(b),
            None if b == b'>' => return Some(from + offset + 1),
            None => {}
        }
    }
    None
}

/// Recognise a `<code>`/`<pre>` tag (opening, closing or self-closing) at the
/// start of `s`.
///
/// Quoted attribute values may contain `>`. A tag missing its closing `>`
/// extends to the end of the input.
fn scan_tag(s: &str) -> Option<TagToken> {
    let bytes = s.as_bytes();
    let mut pos = 1;
    let closing = bytes.get(pos) == Some(&b'/');
    if closing {
        pos += 1;
    }

    let name_len = bytes[pos..]
        .iter()
        .take_while(|b| b.is_ascii_alphanumeric())
        .count();
    let tag = VerbatimTag::from_name(&s[pos..pos + name_len])?;
    pos += name_len;

    // `<codex>` or `<pre-wrap>` are different elements.
    match bytes.get(pos) {
        None => {}
        Some(b'>' | b'/') => {}
        Some(b) if b.is_ascii_whitespace() => {}
        Some(_) => return None,
    }

    let end = tag_end(bytes, pos);
    let len = end.unwrap_or(s.len());

    let kind = if closing {
        TagKind::Close
    } else if end.is_some() && len >= 2 && bytes[len - 2] == b'/' {
        TagKind::SelfClosing
    } else {
        TagKind::Open
    };

    Some(TagToken { tag, kind, len })
}
