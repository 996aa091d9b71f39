//! End-of-line style detection

use tracing::warn;

/// An end-of-line byte sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eol {
    Lf,
    CrLf,
    Cr,
}

impl Eol {
    pub fn as_bytes(self) -> &'static [u8] {
        match self {
            Eol::Lf => b"\n",
            Eol::CrLf => b"\r\n",
            Eol::Cr => b"\r",
        }
    }
}

/// Detect the dominant end-of-line style of `content`.
///
/// Counts `\r\n`, lone `\n` and lone `\r` in a single pass and returns the
/// most frequent. Returns `None` for empty or EOL-free content. Mixed styles
/// produce a warning but still resolve to the dominant one.
pub fn eol_detect(content: &[u8]) -> Option<Eol> {
    let mut crlf = 0usize;
    let mut lf = 0usize;
    let mut cr = 0usize;

    let mut i = 0;
    while i < content.len() {
        match content[i] {
            b'\r' => {
                if content.get(i + 1) == Some(&b'\n') {
                    crlf += 1;
                    i += 2;
                    continue;
                }
                cr += 1;
            }
            b'\n' => lf += 1,
            _ => {}
        }
        i += 1;
    }

    let total = crlf + lf + cr;
    if total == 0 {
        return None;
    }

    let styles_present = [crlf, lf, cr].iter().filter(|&&n| n > 0).count();
    if styles_present > 1 {
        warn!(crlf, lf, cr, "inconsistent end-of-line styles in content");
    }

    // Ties break toward the more specific sequence first.
    if crlf >= lf && crlf >= cr {
        Some(Eol::CrLf)
    } else if lf >= cr {
        Some(Eol::Lf)
    } else {
        Some(Eol::Cr)
    }
}

/// Split `content` into line segments by `eol`.
///
/// No trailing terminator means the last segment is simply the tail; a
/// trailing terminator yields a final empty segment, so rejoining with the
/// same EOL reproduces the input exactly.
pub fn split_lines<'a>(content: &'a [u8], eol: Eol) -> Vec<&'a [u8]> {
    let sep = eol.as_bytes();
    let mut lines = Vec::new();
    let mut start = 0;
    let mut i = 0;
    while i + sep.len() <= content.len() {
        if &content[i..i + sep.len()] == sep {
            lines.push(&content[start..i]);
            i += sep.len();
            start = i;
        } else {
            i += 1;
        }
    }
    lines.push(&content[start..]);
    lines
}

/// Rejoin line segments with `eol`
pub fn join_lines(lines: &[&[u8]], eol: Eol) -> Vec<u8> {
    let sep = eol.as_bytes();
    let mut out = Vec::new();
    for (i, line) in lines.iter().enumerate() {
        if i > 0 {
            out.extend_from_slice(sep);
        }
        out.extend_from_slice(line);
    }
    out
}
