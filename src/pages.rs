use crate::error::{Result, StampError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::warn;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "pages", rename_all = "lowercase")]
pub enum TargetSpec {
    #[default]
    Current,
    All,
    Range(String),
}

impl TargetSpec {
    pub fn parse(s: &str) -> TargetSpec {
        match s.trim().to_ascii_lowercase().as_str() {
            "current" => TargetSpec::Current,
            "all" => TargetSpec::All,
            _ => TargetSpec::Range(s.to_string()),
        }
    }
}

/// Resolves `spec` into ascending, distinct zero-based page indices.
///
/// `Current` is returned as-is; it is up to the mutator to reject an index past
/// the end of the document. Range tokens that do not parse or fall outside
/// `[0, page_count)` are dropped.
pub fn resolve_targets(spec: &TargetSpec, current: usize, page_count: usize) -> Result<Vec<usize>> {
    let indices: Vec<usize> = match spec {
        TargetSpec::Current => vec![current],
        TargetSpec::All => (0..page_count).collect(),
        TargetSpec::Range(text) => parse_page_list(text, page_count).into_iter().collect(),
    };

    if indices.is_empty() {
        return Err(StampError::NoTargetPages);
    }
    Ok(indices)
}

fn parse_page_list(text: &str, page_count: usize) -> BTreeSet<usize> {
    let mut pages = BTreeSet::new();

    for token in text.split(',').map(str::trim) {
        if token.is_empty() {
            continue;
        }
        let Some((first, last)) = parse_token(token) else {
            warn!(token, "ignoring unparseable page token");
            continue;
        };
        if first > last {
            warn!(token, "ignoring reversed page range");
            continue;
        }
        let before = pages.len();
        pages.extend((first..=last.min(page_count)).map(|n| n - 1));
        if pages.len() == before && last > page_count {
            warn!(token, page_count, "ignoring pages past the end of the document");
        }
    }

    pages
}

/// A token is `k` or `a-b`, 1-based. Zero is never a page.
fn parse_token(token: &str) -> Option<(usize, usize)> {
    let (first, last) = match token.split_once('-') {
        Some((a, b)) => (parse_page_number(a)?, parse_page_number(b)?),
        None => {
            let n = parse_page_number(token)?;
            (n, n)
        }
    };
    Some((first, last))
}

fn parse_page_number(s: &str) -> Option<usize> {
    let s = s.trim();
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse::<usize>().ok().filter(|&n| n > 0)
}
