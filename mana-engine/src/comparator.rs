//! Origin comparison
//!
//! Pure functions deciding whether two origins point at the same
//! publisher:
//! - **Exact**: identical screen names, or equivalent URLs
//! - **Fuzzy**: token-set similarity above a threshold
//!
//! RSS origins never take part; feeds are matched through the Web origin
//! they were discovered from.

use tracing::trace;

use mana_core::{split_url, token_set_ratio, Origin, OriginKind, TwitterOrigin, WebOrigin};

/// Which pair of origin types produced a match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    Twitter,
    Web,
    TwitterWeb,
}

/// A positive comparison with its audit reason
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginMatch {
    pub kind: MatchKind,
    pub reason: String,
}

impl OriginMatch {
    fn new(kind: MatchKind, reason: String) -> Self {
        Self { kind, reason }
    }
}

/// Exact URL equivalence: same network location, and the same path unless
/// both are empty. Missing or unparseable URLs never match.
pub fn urls_match_exactly(url1: Option<&str>, url2: Option<&str>) -> bool {
    let (Some(url1), Some(url2)) = (url1, url2) else {
        return false;
    };
    let (Some(split1), Some(split2)) = (split_url(url1), split_url(url2)) else {
        return false;
    };

    if split1.netloc != split2.netloc {
        return false;
    }
    if !split1.has_path() && !split2.has_path() {
        return true;
    }
    split1.path == split2.path
}

/// Fuzzy URL equivalence. The network locations must clear `threshold`
/// first; the paths are only scored when at least one side has one.
pub fn urls_match_fuzzily(url1: Option<&str>, url2: Option<&str>, threshold: u8) -> bool {
    let (Some(url1), Some(url2)) = (url1, url2) else {
        return false;
    };
    let (Some(split1), Some(split2)) = (split_url(url1), split_url(url2)) else {
        return false;
    };

    let netloc_score = token_set_ratio(&split1.netloc, &split2.netloc);
    trace!(
        "netloc score {} ~ {} = {}",
        split1.netloc,
        split2.netloc,
        netloc_score
    );
    if netloc_score < threshold {
        return false;
    }
    if !split1.has_path() && !split2.has_path() {
        return true;
    }
    token_set_ratio(&split1.path, &split2.path) >= threshold
}

/// Fuzzy string equivalence. Case is significant.
pub fn strings_match_fuzzily(s1: &str, s2: &str, threshold: u8) -> bool {
    token_set_ratio(s1, s2) >= threshold
}

/// Exact comparison of two origins
pub fn compare_exact(o1: &Origin, o2: &Origin) -> Option<OriginMatch> {
    match (&o1.kind, &o2.kind) {
        (OriginKind::Rss(_), _) | (_, OriginKind::Rss(_)) => None,
        (OriginKind::Twitter(t1), OriginKind::Twitter(t2)) => {
            (t1.screen_name == t2.screen_name).then(|| {
                OriginMatch::new(
                    MatchKind::Twitter,
                    format!("Same Twitter screen name: {}", t1.screen_name),
                )
            })
        }
        (OriginKind::Web(w1), OriginKind::Web(w2)) => {
            urls_match_exactly(w1.expanded_url.as_deref(), w2.expanded_url.as_deref()).then(|| {
                OriginMatch::new(
                    MatchKind::Web,
                    format!(
                        "Same Web origin: {}",
                        w1.expanded_url.as_deref().unwrap_or_default()
                    ),
                )
            })
        }
        (OriginKind::Twitter(t), OriginKind::Web(w)) | (OriginKind::Web(w), OriginKind::Twitter(t)) => {
            exact_twitter_web(t, w)
        }
    }
}

fn exact_twitter_web(twitter: &TwitterOrigin, web: &WebOrigin) -> Option<OriginMatch> {
    let profile_url = twitter.profile_url();
    urls_match_exactly(profile_url, web.expanded_url.as_deref()).then(|| {
        OriginMatch::new(
            MatchKind::TwitterWeb,
            format!(
                "Same Twitter profile URL & Web origin: {}",
                profile_url.unwrap_or_default()
            ),
        )
    })
}

/// Fuzzy comparison of two origins at `threshold`
pub fn compare_fuzzy(o1: &Origin, o2: &Origin, threshold: u8) -> Option<OriginMatch> {
    match (&o1.kind, &o2.kind) {
        (OriginKind::Rss(_), _) | (_, OriginKind::Rss(_)) => None,
        (OriginKind::Twitter(t1), OriginKind::Twitter(t2)) => {
            strings_match_fuzzily(&t1.screen_name, &t2.screen_name, threshold).then(|| {
                OriginMatch::new(
                    MatchKind::Twitter,
                    format!(
                        "Similar Twitter screen names: {} ~ {}",
                        t1.screen_name, t2.screen_name
                    ),
                )
            })
        }
        (OriginKind::Web(w1), OriginKind::Web(w2)) => {
            let (base1, base2) = (w1.base_url.as_deref(), w2.base_url.as_deref());
            urls_match_fuzzily(base1, base2, threshold).then(|| {
                OriginMatch::new(
                    MatchKind::Web,
                    format!(
                        "Similar Web origins: {} ~ {}",
                        base1.unwrap_or_default(),
                        base2.unwrap_or_default()
                    ),
                )
            })
        }
        (OriginKind::Twitter(t), OriginKind::Web(w)) | (OriginKind::Web(w), OriginKind::Twitter(t)) => {
            let (profile_url, base_url) = (t.profile_url(), w.base_url.as_deref());
            urls_match_fuzzily(profile_url, base_url, threshold).then(|| {
                OriginMatch::new(
                    MatchKind::TwitterWeb,
                    format!(
                        "Similar Twitter profile URL & Web origin: {} ~ {}",
                        profile_url.unwrap_or_default(),
                        base_url.unwrap_or_default()
                    ),
                )
            })
        }
    }
}

/// First exact match over every origin pair
pub fn first_exact_match(origins1: &[Origin], origins2: &[Origin]) -> Option<OriginMatch> {
    origins1
        .iter()
        .flat_map(|o1| origins2.iter().map(move |o2| (o1, o2)))
        .find_map(|(o1, o2)| compare_exact(o1, o2))
}

/// First fuzzy match over every origin pair
pub fn first_fuzzy_match(
    origins1: &[Origin],
    origins2: &[Origin],
    threshold: u8,
) -> Option<OriginMatch> {
    origins1
        .iter()
        .flat_map(|o1| origins2.iter().map(move |o2| (o1, o2)))
        .find_map(|(o1, o2)| compare_fuzzy(o1, o2, threshold))
}
