//! Ingredient-name normalization and matching.
//!
//! Ingredient names arrive in every mixture of scripts a user can type:
//! half-width katakana, full-width ASCII, stray punctuation. Matching
//! happens on a normalized form — width-folded, katakana→hiragana,
//! whitespace/punctuation stripped, case-folded — with exact matches
//! preferred over substring matches in either direction.

/// Normalize a name for matching.
pub fn normalize(text: &str) -> String {
    let mut folded: Vec<char> = Vec::with_capacity(text.chars().count());
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        // Full-width ASCII -> ASCII.
        if ('\u{FF01}'..='\u{FF5E}').contains(&c) {
            folded.push(char::from_u32(c as u32 - 0xFEE0).unwrap_or(c));
            continue;
        }
        if c == '\u{3000}' {
            folded.push(' ');
            continue;
        }

        // Half-width katakana -> full-width, combining a following
        // voicing mark into the base character.
        if let Some(base) = half_width_kana(c) {
            let combined = match chars.peek().copied() {
                Some('\u{FF9E}') => apply_dakuten(base),
                Some('\u{FF9F}') => apply_handakuten(base),
                _ => None,
            };
            if combined.is_some() {
                chars.next();
            }
            folded.push(combined.unwrap_or(base));
            continue;
        }

        // Orphan voicing marks carry no matchable content.
        if c == '\u{FF9E}' || c == '\u{FF9F}' {
            continue;
        }

        folded.push(c);
    }

    folded
        .into_iter()
        .map(katakana_to_hiragana)
        .filter(|c| !c.is_whitespace() && !is_punctuation(*c))
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// True when the normalized forms match exactly or one contains the other.
pub fn names_match(a: &str, b: &str) -> bool {
    let (a, b) = (normalize(a), normalize(b));
    if a.is_empty() || b.is_empty() {
        return false;
    }
    a == b || a.contains(&b) || b.contains(&a)
}

/// Map a selection's ingredient names onto the caller's known inventory
/// names. Exact normalized matches win over substring matches; unmatched
/// names are dropped, never added. Returns matched inventory names in
/// inventory order of discovery, deduplicated.
pub fn match_ingredients(names: &[String], inventory: &[String]) -> Vec<String> {
    let inventory_norm: Vec<(String, &String)> = inventory
        .iter()
        .map(|name| (normalize(name), name))
        .collect();

    let mut matched: Vec<String> = Vec::new();

    for name in names {
        let norm = normalize(name);
        if norm.is_empty() {
            continue;
        }

        let exact = inventory_norm
            .iter()
            .find(|(inv_norm, _)| !inv_norm.is_empty() && *inv_norm == norm);
        let found = exact.or_else(|| {
            inventory_norm.iter().find(|(inv_norm, _)| {
                !inv_norm.is_empty() && (inv_norm.contains(&norm) || norm.contains(inv_norm))
            })
        });

        if let Some((_, original)) = found {
            if !matched.contains(*original) {
                matched.push((*original).clone());
            }
        }
    }

    matched
}

fn katakana_to_hiragana(c: char) -> char {
    if ('\u{30A1}'..='\u{30F6}').contains(&c) {
        char::from_u32(c as u32 - 0x60).unwrap_or(c)
    } else {
        c
    }
}

fn is_punctuation(c: char) -> bool {
    c.is_ascii_punctuation()
        || matches!(
            c,
            '、' | '。'
                | '・'
                | '「'
                | '」'
                | '『'
                | '』'
                | '（'
                | '）'
                | '［'
                | '］'
                | '｛'
                | '｝'
                | '！'
                | '？'
                | '：'
                | '；'
                | '〜'
                | '～'
                | '…'
                | '‥'
                | '．'
                | '，'
        )
}

fn half_width_kana(c: char) -> Option<char> {
    let mapped = match c {
        'ｦ' => 'ヲ',
        'ｧ' => 'ァ',
        'ｨ' => 'ィ',
        'ｩ' => 'ゥ',
        'ｪ' => 'ェ',
        'ｫ' => 'ォ',
        'ｬ' => 'ャ',
        'ｭ' => 'ュ',
        'ｮ' => 'ョ',
        'ｯ' => 'ッ',
        'ｰ' => 'ー',
        'ｱ' => 'ア',
        'ｲ' => 'イ',
        'ｳ' => 'ウ',
        'ｴ' => 'エ',
        'ｵ' => 'オ',
        'ｶ' => 'カ',
        'ｷ' => 'キ',
        'ｸ' => 'ク',
        'ｹ' => 'ケ',
        'ｺ' => 'コ',
        'ｻ' => 'サ',
        'ｼ' => 'シ',
        'ｽ' => 'ス',
        'ｾ' => 'セ',
        'ｿ' => 'ソ',
        'ﾀ' => 'タ',
        'ﾁ' => 'チ',
        'ﾂ' => 'ツ',
        'ﾃ' => 'テ',
        'ﾄ' => 'ト',
        'ﾅ' => 'ナ',
        'ﾆ' => 'ニ',
        'ﾇ' => 'ヌ',
        'ﾈ' => 'ネ',
        'ﾉ' => 'ノ',
        'ﾊ' => 'ハ',
        'ﾋ' => 'ヒ',
        'ﾌ' => 'フ',
        'ﾍ' => 'ヘ',
        'ﾎ' => 'ホ',
        'ﾏ' => 'マ',
        'ﾐ' => 'ミ',
        'ﾑ' => 'ム',
        'ﾒ' => 'メ',
        'ﾓ' => 'モ',
        'ﾔ' => 'ヤ',
        'ﾕ' => 'ユ',
        'ﾖ' => 'ヨ',
        'ﾗ' => 'ラ',
        'ﾘ' => 'リ',
        'ﾙ' => 'ル',
        'ﾚ' => 'レ',
        'ﾛ' => 'ロ',
        'ﾜ' => 'ワ',
        'ﾝ' => 'ン',
        _ => return None,
    };
    Some(mapped)
}

fn apply_dakuten(base: char) -> Option<char> {
    match base {
        'ウ' => Some('ヴ'),
        'カ' | 'キ' | 'ク' | 'ケ' | 'コ' | 'サ' | 'シ' | 'ス' | 'セ' | 'ソ' | 'タ' | 'チ'
        | 'ツ' | 'テ' | 'ト' | 'ハ' | 'ヒ' | 'フ' | 'ヘ' | 'ホ' => {
            char::from_u32(base as u32 + 1)
        }
        _ => None,
    }
}

fn apply_handakuten(base: char) -> Option<char> {
    match base {
        'ハ' | 'ヒ' | 'フ' | 'ヘ' | 'ホ' => char::from_u32(base as u32 + 2),
        _ => None,
    }
}
