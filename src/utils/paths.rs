use std::io;
use std::path::{Component, Path, PathBuf};

use percent_encoding::percent_decode_str;

use crate::error::DecodeError;

// Drop one leading path-root token ("/" or "\") so the rest is relative.
pub fn strip_path_root(path: &str) -> &str {
    path.strip_prefix(|c: char| c == '/' || c == '\\')
        .unwrap_or(path)
}

// Strict percent-decoding: every '%' must start a two-hex-digit escape and
// the decoded bytes must be UTF-8.
pub fn decode_path(raw: &str) -> Result<String, DecodeError> {
    let bytes = raw.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex_hi = bytes.get(i + 1).is_some_and(u8::is_ascii_hexdigit);
            let hex_lo = bytes.get(i + 2).is_some_and(u8::is_ascii_hexdigit);
            if !(hex_hi && hex_lo) {
                return Err(DecodeError);
            }
            i += 3;
        } else {
            i += 1;
        }
    }
    percent_decode_str(raw)
        .decode_utf8()
        .map(|s| s.into_owned())
        .map_err(|_| DecodeError)
}

// Make the configured root absolute and collapse "." / ".." lexically.
// The directory does not have to exist yet.
pub fn normalize_root(root: &Path) -> io::Result<PathBuf> {
    let abs = std::path::absolute(root)?;
    let mut out = PathBuf::new();
    for comp in abs.components() {
        match comp {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    Ok(dunce::simplified(&out).to_path_buf())
}

fn has_drive_prefix(p: &str) -> bool {
    let b = p.as_bytes();
    b.len() >= 2 && b[0].is_ascii_alphabetic() && b[1] == b':'
}

// Normalize a relative path, rejecting NUL bytes, absolute segments, drive
// prefixes and attempts to climb above the start.
pub fn normalize_rel(rel: &str) -> Option<PathBuf> {
    if rel.contains('\0') {
        return None;
    }
    let cleaned = rel.replace('\\', "/");
    if cleaned.starts_with('/') || has_drive_prefix(&cleaned) {
        return None;
    }
    let mut parts: Vec<&str> = Vec::new();
    for seg in cleaned.split('/') {
        if seg.is_empty() || seg == "." {
            continue;
        }
        if seg == ".." {
            parts.pop()?;
        } else {
            parts.push(seg);
        }
    }
    Some(parts.into_iter().collect())
}

// Join root + relative and prove the result stays under root. Lexical only:
// nothing here touches the filesystem.
pub fn resolve_path(root: &Path, rel: &str) -> Option<PathBuf> {
    let rel_norm = normalize_rel(rel)?;
    if rel_norm.as_os_str().is_empty() {
        return Some(root.to_path_buf());
    }
    let joined = root.join(&rel_norm);
    if joined.starts_with(root) {
        Some(joined)
    } else {
        None
    }
}

// True when any segment below root starts with '.'. A path that is not under
// root at all is reported hidden.
pub fn is_hidden(root: &Path, path: &Path) -> bool {
    let Ok(tail) = path.strip_prefix(root) else {
        return true;
    };
    tail.components().any(|c| match c {
        Component::Normal(seg) => seg.as_encoded_bytes().first() == Some(&b'.'),
        _ => false,
    })
}
