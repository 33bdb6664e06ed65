use std::future::Future;

use futures::future::{join_all, try_join_all};
use nd_core::{Result, Source};

/// Most sources a single run accepts.
pub const MAX_SOURCES: usize = 6;

/// Prompt variant a source is routed to in the first stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceBranch {
    /// Reprinted unmodified. Wins over `Primary` when both flags are set.
    Verbatim,
    /// Split into halves, each condensed separately.
    Primary,
    Default,
}

impl SourceBranch {
    pub fn of(source: &Source) -> Self {
        if source.use_verbatim {
            SourceBranch::Verbatim
        } else if source.is_primary_source {
            SourceBranch::Primary
        } else {
            SourceBranch::Default
        }
    }
}

/// Runs `f` over every source concurrently. The first error rejects the
/// whole batch; results keep input order.
pub async fn fan_out<'a, T, F, Fut>(sources: &'a [Source], f: F) -> Result<Vec<T>>
where
    F: Fn(&'a Source) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    try_join_all(sources.iter().map(f)).await
}

/// Like [`fan_out`], but waits for every source and reports each outcome.
pub async fn fan_out_settled<'a, T, F, Fut>(sources: &'a [Source], f: F) -> Vec<(u32, Result<T>)>
where
    F: Fn(&'a Source) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let results = join_all(sources.iter().map(f)).await;
    sources.iter().map(|s| s.number).zip(results).collect()
}

/// Splits `text` in two at the paragraph break nearest its middle, falling
/// back to the nearest sentence end, then to the nearest char boundary.
pub fn split_halves(text: &str) -> (String, String) {
    let text = text.trim();
    let mid = text.len() / 2;

    let nearest = |candidates: Vec<usize>| {
        candidates
            .into_iter()
            .filter(|&i| i > 0 && i < text.len())
            .min_by_key(|&i| i.abs_diff(mid))
    };

    let paragraph_breaks = text.match_indices("\n\n").map(|(i, _)| i).collect();
    let sentence_ends = text
        .match_indices(|c| c == '.' || c == '!' || c == '?')
        .map(|(i, _)| i + 1)
        .filter(|&i| text[i..].starts_with(char::is_whitespace))
        .collect();

    let cut = nearest(paragraph_breaks)
        .or_else(|| nearest(sentence_ends))
        .unwrap_or_else(|| {
            let mut cut = mid;
            while !text.is_char_boundary(cut) {
                cut += 1;
            }
            cut
        });

    let (first, second) = text.split_at(cut);
    (first.trim().to_string(), second.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use nd_core::Error;

    fn sources(n: u32) -> Vec<Source> {
        (1..=n).map(|i| Source::new(i, format!("S{}", i), format!("text {}", i))).collect()
    }

    #[test]
    fn test_branch_selection() {
        let mut source = Source::new(1, "AP", "x");
        assert_eq!(SourceBranch::of(&source), SourceBranch::Default);
        source.is_primary_source = true;
        assert_eq!(SourceBranch::of(&source), SourceBranch::Primary);
        source.use_verbatim = true;
        assert_eq!(SourceBranch::of(&source), SourceBranch::Verbatim);
    }

    #[tokio::test]
    async fn test_fan_out_preserves_order() {
        let sources = sources(3);
        let out = fan_out(&sources, |s| async move {
            // later sources finish first
            tokio::time::sleep(std::time::Duration::from_millis(10 * (4 - s.number as u64))).await;
            Ok(s.number * 10)
        })
        .await
        .unwrap();
        assert_eq!(out, vec![10, 20, 30]);
    }

    #[tokio::test]
    async fn test_fan_out_rejects_when_one_source_fails() {
        let sources = sources(3);
        let result = fan_out(&sources, |s| async move {
            if s.number == 2 {
                Err(Error::Inference("boom".to_string()))
            } else {
                Ok(s.number)
            }
        })
        .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_fan_out_settled_reports_each_source() {
        let sources = sources(3);
        let results = fan_out_settled(&sources, |s| async move {
            if s.number == 2 {
                Err(Error::Inference("boom".to_string()))
            } else {
                Ok(s.number)
            }
        })
        .await;
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].0, 1);
        assert!(results[0].1.is_ok());
        assert!(results[1].1.is_err());
        assert_eq!(*results[2].1.as_ref().unwrap(), 3);
    }

    #[test]
    fn test_split_halves_prefers_paragraphs() {
        let text = "First paragraph here.\n\nSecond paragraph. It has two sentences.";
        let (a, b) = split_halves(text);
        assert_eq!(a, "First paragraph here.");
        assert_eq!(b, "Second paragraph. It has two sentences.");
    }

    #[test]
    fn test_split_halves_falls_back_to_sentences() {
        let (a, b) = split_halves("One two three. Four five six.");
        assert_eq!(a, "One two three.");
        assert_eq!(b, "Four five six.");
    }

    #[test]
    fn test_split_halves_without_boundaries() {
        let (a, b) = split_halves("abcdef");
        assert_eq!(a, "abc");
        assert_eq!(b, "def");
        let (a, b) = split_halves("ééé");
        assert_eq!(format!("{}{}", a, b), "ééé");
    }
}
