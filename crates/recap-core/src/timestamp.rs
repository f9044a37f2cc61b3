/// Format seconds as `MM:SS`, or `HH:MM:SS` from one hour on.
pub fn format_timestamp(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds as u64
    } else {
        0
    };
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;
    if hours > 0 {
        format!("{hours:02}:{minutes:02}:{secs:02}")
    } else {
        format!("{minutes:02}:{secs:02}")
    }
}

/// Parse a clean `SS`, `MM:SS` or `HH:MM:SS` timestamp. The last field may carry a fraction.
pub fn parse_timestamp(value: &str) -> Option<f64> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    let parts: Vec<&str> = value.split(':').collect();
    if parts.len() > 3 {
        return None;
    }

    let mut total = 0.0;
    for (idx, part) in parts.iter().enumerate() {
        let is_last = idx + 1 == parts.len();
        let number = if is_last {
            parse_decimal(part)?
        } else {
            parse_whole(part)?
        };
        if idx > 0 && number >= 60.0 {
            return None;
        }
        total = total * 60.0 + number;
    }
    Some(total)
}

/// Recover a time from loosely formatted text such as `~1:30`, `1m30s` or `around 90s`.
///
/// Only the first time expression is read, so ranges like `01:30-02:00` yield
/// their start.
pub fn extract_approximate_time(value: &str) -> Option<f64> {
    if let Some(candidate) = first_clock_run(value)
        && candidate.contains(':')
    {
        return parse_timestamp(candidate);
    }
    parse_unit_time(value)
}

fn first_clock_run(value: &str) -> Option<&str> {
    let start = value.find(|ch: char| ch.is_ascii_digit())?;
    let rest = &value[start..];
    let end = rest
        .find(|ch: char| !(ch.is_ascii_digit() || ch == ':' || ch == '.'))
        .unwrap_or(rest.len());
    Some(rest[..end].trim_end_matches([':', '.']))
}

fn parse_unit_time(value: &str) -> Option<f64> {
    let tokens = number_tokens(value);
    let mut total: Option<f64> = None;
    let mut last_multiplier = f64::INFINITY;

    for (number, multiplier) in &tokens {
        let Some(multiplier) = multiplier else {
            if total.is_some() {
                break;
            }
            continue;
        };
        if *multiplier >= last_multiplier {
            break;
        }
        total = Some(total.unwrap_or(0.0) + number * multiplier);
        last_multiplier = *multiplier;
    }

    total.or_else(|| tokens.first().map(|(number, _)| *number))
}

fn number_tokens(value: &str) -> Vec<(f64, Option<f64>)> {
    let chars: Vec<char> = value.chars().collect();
    let mut tokens = Vec::new();
    let mut idx = 0;

    while idx < chars.len() {
        if !chars[idx].is_ascii_digit() {
            idx += 1;
            continue;
        }
        let start = idx;
        while idx < chars.len() && (chars[idx].is_ascii_digit() || chars[idx] == '.') {
            idx += 1;
        }
        let number: String = chars[start..idx].iter().collect();
        let Some(number) = parse_decimal(number.trim_end_matches('.')) else {
            continue;
        };

        let mut cursor = idx;
        while cursor < chars.len() && chars[cursor] == ' ' {
            cursor += 1;
        }
        let word_start = cursor;
        while cursor < chars.len() && chars[cursor].is_ascii_alphabetic() {
            cursor += 1;
        }
        let word: String = chars[word_start..cursor].iter().collect();
        let multiplier = unit_multiplier(&word.to_ascii_lowercase());
        if multiplier.is_some() {
            idx = cursor;
        }
        tokens.push((number, multiplier));
    }

    tokens
}

fn unit_multiplier(word: &str) -> Option<f64> {
    match word {
        "h" | "hr" | "hrs" | "hour" | "hours" => Some(3600.0),
        "m" | "min" | "mins" | "minute" | "minutes" => Some(60.0),
        "s" | "sec" | "secs" | "second" | "seconds" => Some(1.0),
        _ => None,
    }
}

fn parse_whole(part: &str) -> Option<f64> {
    if part.is_empty() || !part.chars().all(|ch| ch.is_ascii_digit()) {
        return None;
    }
    part.parse::<u64>().ok().map(|value| value as f64)
}

fn parse_decimal(part: &str) -> Option<f64> {
    let mut pieces = part.splitn(2, '.');
    let whole = pieces.next()?;
    if whole.is_empty() || !whole.chars().all(|ch| ch.is_ascii_digit()) {
        return None;
    }
    if let Some(fraction) = pieces.next()
        && (fraction.is_empty() || !fraction.chars().all(|ch| ch.is_ascii_digit()))
    {
        return None;
    }
    part.parse::<f64>().ok()
}
