//! Text normalisation and Chinese-numeral helpers shared by the parsers.

// ── Width and separator normalisation ─────────────────────────────────────────

/// Map full-width digits and punctuation to their half-width forms.
pub fn to_halfwidth(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '０'..='９' => char::from_u32(c as u32 - '０' as u32 + '0' as u32).unwrap_or(c),
            '．' => '.',
            '／' => '/',
            '－' => '-',
            '～' => '~',
            '：' => ':',
            _ => c,
        })
        .collect()
}

/// Half-width conversion plus separator folding used by the date parser.
///
/// Slashes, dashes, tildes and the range word `至` all become `-`;
/// the ideographic full stop becomes `.` and the ideographic space a plain one.
pub fn normalize_separators(s: &str) -> String {
    to_halfwidth(s)
        .chars()
        .map(|c| match c {
            '。' => '.',
            '/' | '—' | '~' | '至' => '-',
            '\u{3000}' => ' ',
            _ => c,
        })
        .collect::<String>()
        .trim()
        .to_string()
}

/// First `n` characters of `s` (not bytes).
pub fn head(s: &str, n: usize) -> String {
    s.chars().take(n).collect()
}

// ── Chinese numerals ──────────────────────────────────────────────────────────

/// Value of a single Chinese numeral character.
pub fn cn_digit(c: char) -> Option<u32> {
    let v = match c {
        '零' | '〇' | '○' | 'Ｏ' => 0,
        '一' => 1,
        '二' | '两' => 2,
        '三' => 3,
        '四' => 4,
        '五' => 5,
        '六' => 6,
        '七' => 7,
        '八' => 8,
        '九' => 9,
        '十' => 10,
        '廿' => 20,
        '卅' => 30,
        _ => return None,
    };
    Some(v)
}

/// Parse a day/month/era-year token such as `初十`, `廿五`, `二十`, `07`.
///
/// Explicit ASCII digits win over numeral characters. A leading `十`/`廿`/`卅`
/// counts once; a units digit directly before `十` multiplies it; every other
/// numeral is summed. Returns `None` for zero or unparseable input.
pub fn cn_to_int(token: &str) -> Option<u32> {
    let s = token.trim().replace('初', "");
    if s.is_empty() {
        return None;
    }

    let arabic: String = s.chars().filter(|c| c.is_ascii_digit()).collect();
    if !arabic.is_empty() {
        return arabic.parse::<u32>().ok().filter(|&v| v > 0);
    }

    let chars: Vec<char> = s.chars().collect();
    let mut total = 0u32;
    let mut i = 0;
    if let Some(&first) = chars.first() {
        if matches!(first, '十' | '廿' | '卅') {
            total += cn_digit(first).unwrap_or(0);
            i = 1;
        }
    }
    while i < chars.len() {
        let Some(v) = cn_digit(chars[i]) else {
            i += 1;
            continue;
        };
        if v < 10 && chars.get(i + 1) == Some(&'十') {
            total += v * 10;
            i += 2;
        } else {
            total += v;
            i += 1;
        }
    }
    (total > 0).then_some(total)
}

/// Parse a month token (with or without the trailing `月`), accepting 1–12 only.
pub fn cn_month_to_int(token: &str) -> Option<u32> {
    let tok = token.replace('月', "");
    cn_to_int(&tok).filter(|m| (1..=12).contains(m))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
