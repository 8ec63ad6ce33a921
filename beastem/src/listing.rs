//! Z80 assembly listing file parser (§6): maps machine addresses back to
//! source lines so the debugger can show original assembly at the current
//! PC. Listing files are page-scoped text files in the shape an assembler
//! (z80asm, pasmo, ...) emits:
//!
//! ```text
//!   1    0000 3E 42       LD A, 42h
//!   2    0002 C9          RET
//!   3+   0003             ; macro expansion continuation
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::error::BeastError;

const MAX_LINE_LENGTH: usize = 300;
const VALIDATION_WINDOW: usize = 4096;

#[derive(Clone, Debug, Default)]
pub struct Line {
    pub text: String,
    /// Text before the address field (line number, '+' continuation marks).
    pub head: String,
    pub address: u16,
    pub bytes: [u8; 4],
    pub byte_count: u8,
    /// True when the line carries machine code but no source text: a
    /// continuation of a multi-byte DB/DW directive.
    pub is_data: bool,
    pub has_address: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Location {
    pub file_num: usize,
    pub line_num: usize,
}

pub struct Source {
    pub short_name: String,
    pub path: PathBuf,
    pub file_num: usize,
    /// Memory page (0-31) used to build this file's physical addresses.
    pub page: u8,
    pub lines: Vec<Line>,
    pub watch: bool,
    last_read: Option<SystemTime>,
}

impl Source {
    pub fn is_updated(&self) -> bool {
        if !self.watch {
            return false;
        }
        match (fs::metadata(&self.path).and_then(|m| m.modified()), self.last_read) {
            (Ok(modified), Some(last)) => modified > last,
            (Ok(_), None) => true,
            _ => false,
        }
    }

    pub fn toggle_watch(&mut self) {
        self.watch = !self.watch;
    }
}

#[derive(Default)]
pub struct Listing {
    sources: Vec<Source>,
    line_map: BTreeMap<u32, Location>,
}

impl Listing {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_valid_file(path: impl AsRef<Path>) -> bool {
        match fs::read(path) {
            Ok(bytes) => is_valid_listing(&bytes),
            Err(_) => false,
        }
    }

    /// Registers a listing file. Returns `Ok(None)` if the file doesn't look
    /// like a text listing (caller should suggest `-f` for binary images).
    pub fn add_file(&mut self, path: impl Into<PathBuf>, page: u8, watch: bool) -> Result<Option<usize>, BeastError> {
        let path = path.into();
        let bytes = fs::read(&path)?;
        if !is_valid_listing(&bytes) {
            return Ok(None);
        }

        let file_num = self.sources.len();
        let short_name = path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());

        self.sources.push(Source {
            short_name,
            path,
            file_num,
            page,
            lines: Vec::new(),
            watch,
            last_read: None,
        });
        Ok(Some(file_num))
    }

    pub fn remove_file(&mut self, file_num: usize) {
        if file_num >= self.sources.len() {
            return;
        }
        self.sources.remove(file_num);
        for source in self.sources.iter_mut() {
            if source.file_num > file_num {
                source.file_num -= 1;
            }
        }
        self.line_map.retain(|_, loc| {
            if loc.file_num == file_num {
                false
            } else {
                if loc.file_num > file_num {
                    loc.file_num -= 1;
                }
                true
            }
        });
    }

    pub fn file_count(&self) -> usize {
        self.sources.len()
    }

    pub fn files(&self) -> &[Source] {
        &self.sources
    }

    /// Parses (or reparses) the listing file at `file_num`, rebuilding its
    /// address-to-line mapping.
    pub fn load_file(&mut self, file_num: usize) -> Result<(), BeastError> {
        let text = fs::read_to_string(&self.sources[file_num].path)?;
        let bytes_validated = is_valid_listing(text.as_bytes());
        let file_name = self.sources[file_num].path.to_string_lossy().into_owned();
        if !bytes_validated {
            return Err(BeastError::ListingParse {
                file: file_name,
                line: 0,
                reason: "does not look like a text listing; load binaries with the image loader instead".into(),
            });
        }

        self.line_map.retain(|_, loc| loc.file_num != file_num);

        let page = self.sources[file_num].page;
        let mut lines = Vec::new();
        let mut found_address = false;
        let mut address: u16 = 0;
        let mut address_line: usize = 0;

        for (line_num, raw) in text.lines().enumerate() {
            if raw.is_empty() {
                break;
            }
            let trimmed = raw.trim_start();
            let mut line = Line { text: raw.to_string(), ..Default::default() };

            if let Some((start, end, next_address)) = match_address(trimmed) {
                if found_address && next_address != address {
                    self.line_map.insert(
                        ((page as u32) << 14) | (address as u32 & 0x3FFF),
                        Location { file_num, line_num: address_line },
                    );
                }
                found_address = true;
                address = next_address;
                address_line = line_num;

                line.has_address = true;
                line.address = address;
                line.head = trimmed[..start].to_string();

                let rest = trimmed[end..].as_bytes();
                let mut byte_count = 0usize;
                let mut pos = 0usize;
                while byte_count < 4
                    && pos + 2 < rest.len()
                    && rest[pos] == b' '
                    && is_hex_digit(rest[pos + 1])
                    && is_hex_digit(rest[pos + 2])
                {
                    line.bytes[byte_count] = (hex_value(rest[pos + 1]) << 4) | hex_value(rest[pos + 2]);
                    byte_count += 1;
                    pos += 3;
                }
                line.byte_count = byte_count as u8;

                if byte_count > 0 {
                    line.is_data = rest[pos..].iter().all(|b| b.is_ascii_whitespace());
                }
            }

            lines.push(line);
        }

        if found_address {
            self.line_map.insert(
                ((page as u32) << 14) | (address as u32 & 0x3FFF),
                Location { file_num, line_num: address_line },
            );
        }

        let source = &mut self.sources[file_num];
        source.lines = lines;
        source.last_read = fs::metadata(&source.path).and_then(|m| m.modified()).ok();
        Ok(())
    }

    pub fn location(&self, address: u32) -> Option<Location> {
        self.line_map.get(&address).copied()
    }

    pub fn line(&self, location: Location) -> Option<&Line> {
        self.sources.get(location.file_num)?.lines.get(location.line_num)
    }
}

fn is_valid_listing(bytes: &[u8]) -> bool {
    let window = &bytes[..bytes.len().min(VALIDATION_WINDOW)];
    if window.len() < 5 {
        return false;
    }
    let mut line_length = 0usize;
    for &b in window {
        if b == 0 {
            return false;
        }
        if b == b'\n' || b == b'\r' {
            if line_length > MAX_LINE_LENGTH {
                return false;
            }
            line_length = 0;
        } else {
            line_length += 1;
        }
    }
    line_length <= MAX_LINE_LENGTH
}

fn is_hex_digit(b: u8) -> bool {
    b.is_ascii_hexdigit()
}

fn hex_value(b: u8) -> u8 {
    match b {
        b'0'..=b'9' => b - b'0',
        b'a'..=b'f' => 10 + (b - b'a'),
        b'A'..=b'F' => 10 + (b - b'A'),
        _ => 0,
    }
}

/// Matches `^[0-9]+(\++\s*|\s+)([0-9a-f]{4})` (case-insensitive) against
/// `text`, returning the byte range and value of the 4-digit hex address.
fn match_address(text: &str) -> Option<(usize, usize, u16)> {
    let bytes = text.as_bytes();
    let mut pos = 0usize;
    while pos < bytes.len() && bytes[pos].is_ascii_digit() {
        pos += 1;
    }
    if pos == 0 {
        return None;
    }

    if pos < bytes.len() && bytes[pos] == b'+' {
        while pos < bytes.len() && bytes[pos] == b'+' {
            pos += 1;
        }
        while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
            pos += 1;
        }
    } else {
        let before = pos;
        while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
            pos += 1;
        }
        if pos == before {
            return None;
        }
    }

    if pos + 4 > bytes.len() {
        return None;
    }
    let candidate = &bytes[pos..pos + 4];
    if !candidate.iter().all(|&b| is_hex_digit(b)) {
        return None;
    }
    let value = u16::from_str_radix(std::str::from_utf8(candidate).ok()?, 16).ok()?;
    Some((pos, pos + 4, value))
}
