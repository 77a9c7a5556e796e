use encoding_rs::{Encoding, UTF_16BE, UTF_16LE, UTF_8, WINDOWS_1252};
use std::fs;
use std::path::Path;
use tracing::debug;

use crate::error::AnalysisError;
use crate::frame::DataFrame;

// Candidate order is policy: UTF-8 first as the common case, Latin-1 as the
// permissive single-byte fallback, UTF-16 only for BOM-marked exports, and
// Windows-1252 last for the smart-punctuation range Latin-1 rejects. First
// successful decode-and-parse wins.
const ATTEMPTED_ENCODINGS: &str = "utf-8, latin-1, utf-16, windows-1252";

pub fn load(path: &Path) -> Result<DataFrame, AnalysisError> {
    let bytes = fs::read(path)?;

    let candidates: [(&str, fn(&[u8]) -> Option<String>); 4] = [
        ("utf-8", decode_utf8),
        ("latin-1", decode_latin1),
        ("utf-16", decode_utf16),
        ("windows-1252", decode_windows_1252),
    ];

    for (label, decode) in candidates {
        let Some(text) = decode(&bytes) else {
            continue;
        };

        match parse_csv(&text) {
            Ok(frame) => {
                debug!("Decoded {} as {}", path.display(), label);
                return Ok(frame);
            }
            Err(_) => continue,
        }
    }

    Err(AnalysisError::DecodeFailure {
        path: path.display().to_string(),
        attempted: ATTEMPTED_ENCODINGS.to_string(),
    })
}

// A decode only counts when it is lossless and yields plausible text. NUL
// bytes, C1 control characters, and replacement characters mean the candidate
// encoding swallowed foreign bytes rather than decoded them.
fn text_is_plausible(text: &str) -> bool {
    !text
        .chars()
        .any(|c| c == '\u{0}' || ('\u{80}'..='\u{9f}').contains(&c) || c == '\u{fffd}')
}

fn clean_decode(encoding: &'static Encoding, bytes: &[u8]) -> Option<String> {
    let (text, had_errors) = encoding.decode_with_bom_removal(bytes);
    if had_errors || !text_is_plausible(&text) {
        return None;
    }
    Some(text.into_owned())
}

fn decode_utf8(bytes: &[u8]) -> Option<String> {
    clean_decode(UTF_8, bytes)
}

// ISO-8859-1 proper: a straight byte-to-code-point mapping. encoding_rs only
// ships the WHATWG latin1 alias (which is Windows-1252), so this one is done
// by hand; the plausibility check rejects the C1 range.
fn decode_latin1(bytes: &[u8]) -> Option<String> {
    let text: String = bytes.iter().map(|&b| b as char).collect();
    if text_is_plausible(&text) {
        Some(text)
    } else {
        None
    }
}

fn decode_utf16(bytes: &[u8]) -> Option<String> {
    match bytes {
        [0xff, 0xfe, ..] => clean_decode(UTF_16LE, bytes),
        [0xfe, 0xff, ..] => clean_decode(UTF_16BE, bytes),
        _ => None,
    }
}

fn decode_windows_1252(bytes: &[u8]) -> Option<String> {
    let (text, had_errors) = WINDOWS_1252.decode_without_bom_handling(bytes);
    if had_errors || !text_is_plausible(&text) {
        return None;
    }
    Some(text.into_owned())
}

fn parse_csv(text: &str) -> Result<DataFrame, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader.headers()?.iter().map(String::from).collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let cells = record
            .iter()
            .map(|cell| {
                if cell.is_empty() {
                    None
                } else {
                    Some(cell.to_string())
                }
            })
            .collect();
        rows.push(cells);
    }

    Ok(DataFrame::from_rows(headers, rows))
}
