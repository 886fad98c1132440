use lazy_static::lazy_static;
use regex::Regex;

use crate::session::normalize::normalize;

/// Which of several candidate records an operation acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisambiguationStrategy {
    Latest,
    Oldest,
    All,
    ById(i64),
}

impl DisambiguationStrategy {
    /// Suffix appended to the operation name for the strategy variant.
    pub fn variant_suffix(&self) -> &'static str {
        match self {
            Self::Latest => "latest",
            Self::Oldest => "oldest",
            Self::All => "all",
            Self::ById(_) => "by_id",
        }
    }
}

/// Parsed intent of one confirmation reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyIntent {
    Cancel,
    Strategy(DisambiguationStrategy),
    /// Short free text after particle stripping, read as an ingredient
    /// name.
    Ingredient(String),
    Unrecognized,
}

lazy_static! {
    // Keyword tables hold normalized forms (katakana folded to hiragana,
    // width and case folded) so one table covers every input script.
    static ref CANCEL_KEYWORDS: Vec<&'static str> =
        vec!["きゃんせる", "cancel", "やめる", "やめて", "中止", "やっぱりいい"];

    static ref LATEST_KEYWORDS: Vec<&'static str> = vec!["最新", "latest", "新しいほう", "新しい方"];
    static ref OLDEST_KEYWORDS: Vec<&'static str> =
        vec!["最古", "oldest", "一番古い", "古いほう", "古い方"];
    static ref ALL_KEYWORDS: Vec<&'static str> = vec!["すべて", "全部", "全て", "ぜんぶ", "all"];

    static ref NUMERIC_ID: Regex = Regex::new(r"^(?:id)?([0-9]+)(?:番|番目)?$").unwrap();

    // Polite suffixes and trailing particles stripped before reading the
    // remainder as an ingredient name. Longest first, applied repeatedly.
    static ref PARTICLE_SUFFIXES: Vec<&'static str> = vec![
        "でお願いします",
        "をお願いします",
        "でおねがいします",
        "をおねがいします",
        "お願いします",
        "おねがいします",
        "でお願い",
        "お願い",
        "でおねがい",
        "おねがい",
        "にしてください",
        "でください",
        "ください",
        "がいいです",
        "にして",
        "でいい",
        "です",
        "で",
        "を",
        "が",
        "は",
        "の",
    ];
}

/// Longest acceptable ingredient reply, in characters.
const MAX_INGREDIENT_CHARS: usize = 20;

/// Classify a confirmation reply. Priority: cancel keyword, explicit
/// disambiguation keyword or numeric id, then a short remainder read as an
/// ingredient name; anything else is unrecognized and re-prompts.
pub fn parse_reply(text: &str) -> ReplyIntent {
    let normalized = normalize(text);
    if normalized.is_empty() {
        return ReplyIntent::Unrecognized;
    }

    if CANCEL_KEYWORDS.iter().any(|k| normalized.contains(k)) {
        return ReplyIntent::Cancel;
    }

    if LATEST_KEYWORDS.iter().any(|k| normalized.contains(k)) {
        return ReplyIntent::Strategy(DisambiguationStrategy::Latest);
    }
    if OLDEST_KEYWORDS.iter().any(|k| normalized.contains(k)) {
        return ReplyIntent::Strategy(DisambiguationStrategy::Oldest);
    }
    if ALL_KEYWORDS.iter().any(|k| normalized.contains(k)) {
        return ReplyIntent::Strategy(DisambiguationStrategy::All);
    }

    if let Some(caps) = NUMERIC_ID.captures(&normalized) {
        if let Ok(id) = caps[1].parse::<i64>() {
            return ReplyIntent::Strategy(DisambiguationStrategy::ById(id));
        }
    }

    let stripped = strip_particles(&normalized);
    if !stripped.is_empty() && stripped.chars().count() <= MAX_INGREDIENT_CHARS {
        return ReplyIntent::Ingredient(stripped);
    }

    ReplyIntent::Unrecognized
}

fn strip_particles(text: &str) -> String {
    let mut current = text.to_string();
    loop {
        let mut stripped = false;
        for suffix in PARTICLE_SUFFIXES.iter() {
            if current.chars().count() > suffix.chars().count() {
                if let Some(rest) = current.strip_suffix(suffix) {
                    current = rest.to_string();
                    stripped = true;
                    break;
                }
            }
        }
        if !stripped {
            return current;
        }
    }
}
