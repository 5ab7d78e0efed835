//! Post-processing: turn raw provider text into the Final Source.
//!
//! Even well-prompted models sometimes wrap their answer in a
//! ```` ```latex ```` fence, prepend a sentence of prose, or forget the
//! package they were told to load. The rules here fix those quirks with plain
//! string and regex operations. None of them parse LaTeX: a malformed
//! document passes straight through so the compiler reports the real error.
//!
//! ## Rule Order
//!
//! Line endings and invisible characters are normalised before fence
//! detection, so a stray `\r` or BOM cannot stop the outer-fence regex from
//! anchoring. Preamble repair runs last and only on the recolor path.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

/// Extract the LaTeX source from a raw provider response.
///
/// 1. Normalise line endings (CRLF → LF)
/// 2. Strip invisible Unicode (BOM, zero-width spaces)
/// 3. If the whole response is one fenced block, keep its body
/// 4. Otherwise keep the first ```` ```latex ```` / ```` ```tex ```` block
///    embedded in surrounding prose
/// 5. Otherwise keep the trimmed response as-is
pub fn extract_source(raw: &str) -> String {
    let s = normalise_line_endings(raw);
    let s = remove_invisible_chars(&s);
    let trimmed = s.trim();

    if let Some(body) = strip_outer_fence(trimmed) {
        debug!("Stripped outer code fence from provider output");
        return body.trim().to_string();
    }
    if let Some(body) = first_latex_block(trimmed) {
        warn!("Provider output had prose around the LaTeX block; keeping the block only");
        return body.trim().to_string();
    }
    if !trimmed.contains("\\documentclass") {
        warn!("Provider output does not look like a full LaTeX document; compiling anyway");
    }
    trimmed.to_string()
}

/// Ensure `\usepackage{<package>}` is declared.
///
/// If no `\usepackage[...]{...}` line names the package, one is inserted
/// right after the first `\documentclass[...]{...}`. A source without a
/// document class is returned unchanged.
pub fn ensure_package(source: &str, package: &str) -> String {
    if declares_package(source, package) {
        return source.to_string();
    }
    match RE_DOCUMENTCLASS.find(source) {
        Some(m) => {
            debug!("Adding \\usepackage{{{}}} to preamble", package);
            let mut out = String::with_capacity(source.len() + package.len() + 16);
            out.push_str(&source[..m.end()]);
            out.push_str("\n\\usepackage{");
            out.push_str(package);
            out.push('}');
            out.push_str(&source[m.end()..]);
            out
        }
        None => {
            warn!(
                "No \\documentclass found; cannot add \\usepackage{{{}}}",
                package
            );
            source.to_string()
        }
    }
}

/// True when a `\usepackage` declaration lists `package` (possibly among
/// others, possibly with options).
pub fn declares_package(source: &str, package: &str) -> bool {
    RE_USEPACKAGE.captures_iter(source).any(|caps| {
        caps[1]
            .split(',')
            .any(|name| name.trim() == package)
    })
}

// ── Fences ───────────────────────────────────────────────────────────────────

static RE_OUTER_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[A-Za-z]*[ \t]*\n(.*?)\s*```$").unwrap());

static RE_LATEX_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(?:latex|tex)[ \t]*\n?(.*?)\s*```").unwrap());

/// Body of the response when it is exactly one fenced block. A body that
/// itself holds a fence line means several blocks, which is not a match.
fn strip_outer_fence(input: &str) -> Option<&str> {
    RE_OUTER_FENCE
        .captures(input)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .filter(|body| !body.lines().any(|l| l.trim_start().starts_with("```")))
}

fn first_latex_block(input: &str) -> Option<&str> {
    RE_LATEX_BLOCK
        .captures(input)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .filter(|body| !body.trim().is_empty())
}

// ── Preamble ─────────────────────────────────────────────────────────────────

static RE_DOCUMENTCLASS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\documentclass\s*(?:\[[^\]]*\])?\s*\{[^}]*\}").unwrap());

static RE_USEPACKAGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\usepackage\s*(?:\[[^\]]*\])?\s*\{([^}]*)\}").unwrap());

// ── Normalisation ────────────────────────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

fn remove_invisible_chars(input: &str) -> String {
    input.replace(['\u{200B}', '\u{FEFF}', '\u{200C}', '\u{200D}', '\u{2060}'], "")
}

// ── Tests ────────────────────────────────────────────────────────────────────
