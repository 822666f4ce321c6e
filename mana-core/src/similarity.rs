//! Syntactic similarity primitives
//!
//! - Token-set similarity scored on a 0-100 scale
//! - URL splitting into a normalized network location and path

use regex::Regex;
use std::collections::BTreeSet;
use std::sync::LazyLock;
use url::Url;

use crate::MAX_SIMILARITY;

static TOKEN_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\w+").unwrap());

fn tokenize(text: &str) -> BTreeSet<&str> {
    TOKEN_REGEX.find_iter(text).map(|m| m.as_str()).collect()
}

/// Plain edit-distance similarity on a 0-100 scale. Empty input scores 0.
pub fn ratio(a: &str, b: &str) -> u8 {
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    let score = strsim::normalized_levenshtein(a, b) * f64::from(MAX_SIMILARITY);
    score.round().clamp(0.0, f64::from(MAX_SIMILARITY)) as u8
}

fn join_tokens(head: &str, tail: &[&str]) -> String {
    let tail = tail.join(" ");
    match (head.is_empty(), tail.is_empty()) {
        (true, _) => tail,
        (false, true) => head.to_string(),
        (false, false) => format!("{} {}", head, tail),
    }
}

/// Token-set similarity (0-100).
///
/// Both strings are split into word tokens. Shared tokens are compared
/// against each side's full sorted token list, so a string whose tokens are
/// a subset of the other's scores 100. Case is preserved: callers that want
/// case-insensitive scoring lowercase first.
pub fn token_set_ratio(s1: &str, s2: &str) -> u8 {
    let tokens1 = tokenize(s1);
    let tokens2 = tokenize(s2);

    if tokens1.is_empty() || tokens2.is_empty() {
        return 0;
    }

    let shared: Vec<&str> = tokens1.intersection(&tokens2).copied().collect();
    let only1: Vec<&str> = tokens1.difference(&tokens2).copied().collect();
    let only2: Vec<&str> = tokens2.difference(&tokens1).copied().collect();

    let sorted_shared = shared.join(" ");
    let combined1 = join_tokens(&sorted_shared, &only1);
    let combined2 = join_tokens(&sorted_shared, &only2);

    [
        ratio(&sorted_shared, &combined1),
        ratio(&sorted_shared, &combined2),
        ratio(&combined1, &combined2),
    ]
    .into_iter()
    .max()
    .unwrap_or(0)
}

/// A URL reduced to what matching cares about
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitUrl {
    /// Lowercased host, with the port when one is explicit
    pub netloc: String,
    /// Lowercased path without trailing slashes; empty for the root
    pub path: String,
}

impl SplitUrl {
    pub fn has_path(&self) -> bool {
        !self.path.is_empty()
    }
}

/// Split a URL into network location and path.
///
/// Scheme-less input such as `www.acme.org/about` is read as `http://`.
/// Returns `None` for anything without a host.
pub fn split_url(raw: &str) -> Option<SplitUrl> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    let url = match Url::parse(raw) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            Url::parse(&format!("http://{}", raw)).ok()?
        }
        Err(_) => return None,
    };

    let host = url.host_str()?.to_lowercase();
    let netloc = match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host,
    };

    Some(SplitUrl {
        netloc,
        path: url.path().trim_end_matches('/').to_lowercase(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_strings_score_max() {
        assert_eq!(token_set_ratio("acme", "acme"), 100);
        assert_eq!(token_set_ratio("friends of the earth", "earth friends of the"), 100);
    }

    #[test]
    fn test_subset_tokens_score_max() {
        assert_eq!(token_set_ratio("greenpeace.org", "greenpeace.org.uk"), 100);
    }

    #[test]
    fn test_case_is_significant() {
        let score = token_set_ratio("GreenpeaceUK", "greenpeaceuk2");
        assert!(score < 82, "score was {}", score);
        assert!(token_set_ratio("greenpeaceuk", "greenpeaceuk2") >= 82);
    }

    #[test]
    fn test_empty_scores_zero() {
        assert_eq!(token_set_ratio("", "acme"), 0);
        assert_eq!(token_set_ratio("--", "acme"), 0);
        assert_eq!(ratio("", ""), 0);
    }

    #[test]
    fn test_unrelated_strings_score_low() {
        assert!(token_set_ratio("amnesty", "wwf") < 50);
    }

    #[test]
    fn test_split_url_normalizes() {
        let bare = split_url("http://X.org").unwrap();
        let slash = split_url("http://x.org/").unwrap();
        assert_eq!(bare, slash);
        assert_eq!(bare.netloc, "x.org");
        assert!(!bare.has_path());

        let deep = split_url("https://www.Acme.org/About/").unwrap();
        assert_eq!(deep.netloc, "www.acme.org");
        assert_eq!(deep.path, "/about");
    }

    #[test]
    fn test_split_url_without_scheme() {
        let split = split_url("www.acme.org/news").unwrap();
        assert_eq!(split.netloc, "www.acme.org");
        assert_eq!(split.path, "/news");
    }

    #[test]
    fn test_split_url_keeps_explicit_port() {
        assert_eq!(split_url("http://acme.org:8080/").unwrap().netloc, "acme.org:8080");
        assert_eq!(split_url("http://acme.org:80/").unwrap().netloc, "acme.org");
    }

    #[test]
    fn test_split_url_rejects_hostless() {
        assert!(split_url("").is_none());
        assert!(split_url("mailto:info@acme.org").is_none());
    }
}
