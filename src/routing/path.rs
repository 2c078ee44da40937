//! Path canonicalization.

use std::borrow::Cow;

/// Canonical form of a URL path: a single leading `/`, no empty, `.` or `..`
/// elements. A trailing slash on the input is kept.
///
/// `..` elements climb towards the root but never above it, so `/../a`
/// becomes `/a`. The input is borrowed back when it is already clean.
pub fn clean_path(p: &str) -> Cow<'_, str> {
    if p.is_empty() {
        return Cow::Borrowed("/");
    }

    let bytes = p.as_bytes();
    let n = bytes.len();
    let mut out = Output::new(bytes);

    let mut r = 1;
    if bytes[0] != b'/' {
        r = 0;
        out.add_root();
    }
    let mut trailing = n > 2 && bytes[n - 1] == b'/';

    while r < n {
        match bytes[r] {
            // empty element; the trailing slash is re-added at the end
            b'/' => r += 1,
            b'.' if r + 1 == n => {
                trailing = true;
                r += 1;
            }
            b'.' if bytes[r + 1] == b'/' => r += 1,
            b'.' if bytes[r + 1] == b'.' && (r + 2 == n || bytes[r + 2] == b'/') => {
                r += 2;
                out.pop_element();
            }
            _ => {
                if out.w > 1 {
                    out.push(b'/');
                }
                while r < n && bytes[r] != b'/' {
                    out.push(bytes[r]);
                    r += 1;
                }
            }
        }
    }

    if trailing && out.w > 1 {
        out.push(b'/');
    }
    out.finish(p)
}

/// Write side of [`clean_path`]. Until the first byte that differs from the
/// input, the output is a prefix of the input and nothing is allocated.
struct Output<'a> {
    src: &'a [u8],
    buf: Option<Vec<u8>>,
    /// Length of the output so far. Starts past the leading `/`.
    w: usize,
}

impl<'a> Output<'a> {
    fn new(src: &'a [u8]) -> Self {
        Self { src, buf: None, w: 1 }
    }

    fn at(&self, i: usize) -> u8 {
        match &self.buf {
            Some(buf) => buf[i],
            None => self.src[i],
        }
    }

    fn push(&mut self, c: u8) {
        match &mut self.buf {
            Some(buf) => {
                buf.truncate(self.w);
                buf.push(c);
            }
            None if self.src.get(self.w) == Some(&c) => {}
            None => self.force(c),
        }
        self.w += 1;
    }

    /// The input lacks its leading `/`; the output starts owned with one.
    fn add_root(&mut self) {
        let mut buf = Vec::with_capacity(self.src.len() + 1);
        buf.push(b'/');
        self.buf = Some(buf);
    }

    /// Switch to an owned buffer holding the output so far plus `c`.
    fn force(&mut self, c: u8) {
        let mut buf = Vec::with_capacity(self.src.len() + 1);
        buf.extend_from_slice(&self.src[..self.w]);
        buf.push(c);
        self.buf = Some(buf);
    }

    /// Drop the last element, never going above the root.
    fn pop_element(&mut self) {
        if self.w > 1 {
            self.w -= 1;
            while self.w > 1 && self.at(self.w) != b'/' {
                self.w -= 1;
            }
        }
    }

    fn finish(self, p: &'a str) -> Cow<'a, str> {
        match self.buf {
            None => match p.get(..self.w) {
                Some(prefix) => Cow::Borrowed(prefix),
                None => Cow::Owned(String::from_utf8_lossy(&self.src[..self.w]).into_owned()),
            },
            Some(mut buf) => {
                buf.truncate(self.w);
                match String::from_utf8(buf) {
                    Ok(s) => Cow::Owned(s),
                    Err(e) => Cow::Owned(String::from_utf8_lossy(e.as_bytes()).into_owned()),
                }
            }
        }
    }
}
