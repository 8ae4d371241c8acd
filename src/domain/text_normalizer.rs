//! 文本规范化
//!
//! 在分段之前把数字、日期、时间等改写成适合朗读的中文形式。

use std::str::FromStr;
use std::sync::OnceLock;

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

const ZH_DIGITS: [&str; 10] = ["零", "一", "二", "三", "四", "五", "六", "七", "八", "九"];
const GROUP_UNITS: [&str; 4] = ["", "万", "亿", "兆"];

/// 规范化级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NormalizationLevel {
    /// 原样返回
    Off,
    /// 数字 / 日期 / 百分比 / 时间改写 + 空白整理
    #[default]
    Basic,
}

impl std::fmt::Display for NormalizationLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NormalizationLevel::Off => write!(f, "off"),
            NormalizationLevel::Basic => write!(f, "basic"),
        }
    }
}

impl FromStr for NormalizationLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "off" => Ok(NormalizationLevel::Off),
            "basic" => Ok(NormalizationLevel::Basic),
            other => Err(format!("Unsupported text normalization level: {}", other)),
        }
    }
}

struct Patterns {
    date: Regex,
    percent: Regex,
    chapter_num: Regex,
    time: Regex,
    number: Regex,
    multispace: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        date: Regex::new(r"(\d{4})[/-](\d{1,2})[/-](\d{1,2})").expect("valid date regex"),
        percent: Regex::new(r"(\d+(?:\.\d+)?)\s*%").expect("valid percent regex"),
        chapter_num: Regex::new(r"第\s*(\d+)\s*([章节卷部篇回集])").expect("valid chapter regex"),
        time: Regex::new(r"(\d{1,2}):(\d{2})").expect("valid time regex"),
        number: Regex::new(r"\d+(?:\.\d+)?").expect("valid number regex"),
        multispace: Regex::new(r"[ \t]+").expect("valid whitespace regex"),
    })
}

#[inline]
fn is_cjk(ch: char) -> bool {
    ('\u{4e00}'..='\u{9fff}').contains(&ch)
}

/// 1..=9999 转中文
fn four_digit_to_zh(value: u64) -> String {
    if value == 0 {
        return String::new();
    }

    let digits = [value / 1000, (value / 100) % 10, (value / 10) % 10, value % 10];
    let units = ["千", "百", "十", ""];
    let mut pieces = String::new();
    let mut pending_zero = false;

    for (idx, &digit) in digits.iter().enumerate() {
        if digit == 0 {
            if !pieces.is_empty() && digits[idx + 1..].iter().any(|&rest| rest > 0) {
                pending_zero = true;
            }
            continue;
        }

        if pending_zero {
            pieces.push_str(ZH_DIGITS[0]);
            pending_zero = false;
        }

        if units[idx] == "十" && digit == 1 && pieces.is_empty() {
            pieces.push('十');
        } else {
            pieces.push_str(ZH_DIGITS[digit as usize]);
            pieces.push_str(units[idx]);
        }
    }

    pieces
}

fn int_to_zh(value: u64) -> String {
    if value == 0 {
        return ZH_DIGITS[0].to_string();
    }

    let mut groups = Vec::new();
    let mut rest = value;
    while rest > 0 {
        groups.push(rest % 10000);
        rest /= 10000;
    }

    let mut pieces = String::new();
    let mut pending_zero = false;
    for idx in (0..groups.len()).rev() {
        let group = groups[idx];
        if group == 0 {
            if !pieces.is_empty() {
                pending_zero = true;
            }
            continue;
        }

        if pending_zero {
            pieces.push_str(ZH_DIGITS[0]);
            pending_zero = false;
        } else if !pieces.is_empty() && group < 1000 {
            pieces.push_str(ZH_DIGITS[0]);
        }

        pieces.push_str(&four_digit_to_zh(group));
        pieces.push_str(GROUP_UNITS[idx]);
    }

    pieces
}

/// 逐位读出，例如年份或超出"兆"量级的数字
fn digits_to_zh(digits: &str) -> String {
    digits
        .chars()
        .filter_map(|ch| ch.to_digit(10))
        .map(|d| ZH_DIGITS[d as usize])
        .collect()
}

fn integer_to_zh(digits: &str) -> String {
    match digits.parse::<u64>() {
        Ok(value) if value < 10_000_u64.pow(GROUP_UNITS.len() as u32) => int_to_zh(value),
        _ => digits_to_zh(digits),
    }
}

/// 数字字符串转中文读法（支持负号和小数）
pub fn number_to_zh(token: &str) -> String {
    let token = token.trim();
    if token.is_empty() {
        return String::new();
    }

    if let Some(rest) = token.strip_prefix('-') {
        return format!("负{}", number_to_zh(rest));
    }

    match token.split_once('.') {
        Some((integer_part, frac_part)) => {
            let integer_part = if integer_part.is_empty() { "0" } else { integer_part };
            let frac = digits_to_zh(frac_part);
            if frac.is_empty() {
                integer_to_zh(integer_part)
            } else {
                format!("{}点{}", integer_to_zh(integer_part), frac)
            }
        }
        None => integer_to_zh(token),
    }
}

/// 替换匹配项，但跳过前后紧邻数字的匹配
fn replace_isolated<A, F>(re: &Regex, text: &str, accept: A, render: F) -> String
where
    A: Fn(Option<char>, Option<char>) -> bool,
    F: Fn(&Captures) -> String,
{
    let mut out = String::with_capacity(text.len());
    let mut last = 0;

    for caps in re.captures_iter(text) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        let before = text[..whole.start()].chars().next_back();
        let after = text[whole.end()..].chars().next();
        if !accept(before, after) {
            continue;
        }
        out.push_str(&text[last..whole.start()]);
        out.push_str(&render(&caps));
        last = whole.end();
    }

    out.push_str(&text[last..]);
    out
}

fn not_digit(ch: Option<char>) -> bool {
    !ch.is_some_and(|c| c.is_ascii_digit())
}

/// 为 TTS 规范化文本
pub fn normalize_text(text: &str, level: NormalizationLevel) -> String {
    if level == NormalizationLevel::Off {
        return text.to_string();
    }

    let p = patterns();
    let digit_bounded =
        |before: Option<char>, after: Option<char>| not_digit(before) && not_digit(after);

    let normalized = replace_isolated(&p.date, text, digit_bounded, |caps| {
        format!(
            "{}年{}月{}日",
            digits_to_zh(&caps[1]),
            number_to_zh(&caps[2]),
            number_to_zh(&caps[3])
        )
    });

    let normalized = replace_isolated(
        &p.percent,
        &normalized,
        |before, _| not_digit(before),
        |caps| format!("百分之{}", number_to_zh(&caps[1])),
    );

    let normalized = p
        .chapter_num
        .replace_all(&normalized, |caps: &Captures| {
            format!("第{}{}", number_to_zh(&caps[1]), &caps[2])
        })
        .into_owned();

    let normalized = replace_isolated(&p.time, &normalized, digit_bounded, |caps| {
        format!("{}点{}分", number_to_zh(&caps[1]), number_to_zh(&caps[2]))
    });

    let normalized = replace_isolated(
        &p.number,
        &normalized,
        |before, after| before.is_some_and(is_cjk) && after.is_some_and(is_cjk),
        |caps| number_to_zh(&caps[0]),
    );

    let joined = normalized
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    p.multispace.replace_all(&joined, " ").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_to_zh() {
        assert_eq!(int_to_zh(0), "零");
        assert_eq!(int_to_zh(10), "十");
        assert_eq!(int_to_zh(15), "十五");
        assert_eq!(int_to_zh(105), "一百零五");
        assert_eq!(int_to_zh(2024), "二千零二十四");
        assert_eq!(int_to_zh(10010), "一万零十");
        assert_eq!(int_to_zh(100_000_000), "一亿");
    }

    #[test]
    fn test_number_to_zh_decimal_and_negative() {
        assert_eq!(number_to_zh("12.5"), "十二点五");
        assert_eq!(number_to_zh("-3"), "负三");
        assert_eq!(number_to_zh("7."), "七");
    }

    #[test]
    fn test_off_is_identity() {
        let text = "  2024-01-05  \n\n 50% ";
        assert_eq!(normalize_text(text, NormalizationLevel::Off), text);
    }

    #[test]
    fn test_date_percent_time() {
        assert_eq!(
            normalize_text("会议在2024-01-05举行", NormalizationLevel::Basic),
            "会议在二零二四年一月五日举行"
        );
        assert_eq!(
            normalize_text("增长了12.5%", NormalizationLevel::Basic),
            "增长了百分之十二点五"
        );
        assert_eq!(
            normalize_text("现在是 9:05 了", NormalizationLevel::Basic),
            "现在是 九点五分 了"
        );
        assert_eq!(
            normalize_text("约在 9:30 见", NormalizationLevel::Basic),
            "约在 九点三十分 见"
        );
    }

    #[test]
    fn test_chapter_number() {
        assert_eq!(normalize_text("第12章 开始", NormalizationLevel::Basic), "第十二章 开始");
    }

    #[test]
    fn test_number_between_cjk() {
        assert_eq!(normalize_text("他走了3步", NormalizationLevel::Basic), "他走了三步");
        // 前后不是汉字时保持原样
        assert_eq!(normalize_text("Room 42 is open", NormalizationLevel::Basic), "Room 42 is open");
    }

    #[test]
    fn test_whitespace_cleanup() {
        let text = "  第一行  \n\n\t 第二行\t\t内容 \n   ";
        assert_eq!(normalize_text(text, NormalizationLevel::Basic), "第一行\n第二行 内容");
    }

    #[test]
    fn test_time_adjacent_to_digits_untouched() {
        assert_eq!(normalize_text("编号123:45", NormalizationLevel::Basic), "编号123:45");
    }

    #[test]
    fn test_level_from_str() {
        assert_eq!("BASIC".parse::<NormalizationLevel>().unwrap(), NormalizationLevel::Basic);
        assert_eq!("off".parse::<NormalizationLevel>().unwrap(), NormalizationLevel::Off);
        assert!("full".parse::<NormalizationLevel>().is_err());
    }
}
