//! Stdout progress-line parsing, shared by both Model Server Manager
//! variants (§4.3 step 4).

use std::sync::LazyLock;

use leaxer_core::events::GenerationPhase;
use regex::Regex;

/// Progress bar format emitted by the image-generation server, e.g.
/// `"  50%|=====>    | 10/20 [00:05<00:05, 2.00it/s]"`.
pub static IMAGE_PROGRESS_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\|[=>\s]+\|\s*(\d+)/(\d+)").expect("valid regex"));

/// llama.cpp-style servers emit no numeric progress bar (§4.3 ADDED); this
/// matches the `eval time` / partial decode lines that carry a step count
/// when present. Call sites treat a non-match as "no intermediate
/// percentage available", never synthesizing one.
pub static TEXT_PROGRESS_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"eval time.*?(\d+)\s*/\s*(\d+)\s*tokens").expect("valid regex"));

/// A parsed `(current, total)` progress pair with its derived phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedProgress {
    pub current: u32,
    pub total: u32,
    pub phase: GenerationPhase,
}

/// Match `line` against `regex`, returning the parsed progress if it
/// captures two integers. `phase = loading if total>200 else inference`
/// (§4.3 step 4).
#[must_use]
pub fn parse_progress_line(line: &str, regex: &Regex) -> Option<ParsedProgress> {
    let caps = regex.captures(line)?;
    let current: u32 = caps.get(1)?.as_str().parse().ok()?;
    let total: u32 = caps.get(2)?.as_str().parse().ok()?;
    let phase = if total > 200 {
        GenerationPhase::Loading
    } else {
        GenerationPhase::Inference
    };
    Some(ParsedProgress { current, total, phase })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_image_progress_bar() {
        let line = "  50%|=====>    | 10/20 [00:05<00:05, 2.00it/s]";
        let parsed = parse_progress_line(line, &IMAGE_PROGRESS_REGEX).unwrap();
        assert_eq!(parsed.current, 10);
        assert_eq!(parsed.total, 20);
        assert_eq!(parsed.phase, GenerationPhase::Inference);
    }

    #[test]
    fn large_total_is_loading_phase() {
        let line = "model loading |==========| 450/900";
        let parsed = parse_progress_line(line, &IMAGE_PROGRESS_REGEX).unwrap();
        assert_eq!(parsed.phase, GenerationPhase::Loading);
    }

    #[test]
    fn non_matching_line_returns_none() {
        assert!(parse_progress_line("server is listening on port 1234", &IMAGE_PROGRESS_REGEX).is_none());
    }
}
