//! Output naming templates
//!
//! A template is a literal file name with at most one `${pattern}`
//! placeholder. The pattern uses the familiar letter notation of
//! date formats (`yyyy`, `MM`, `dd`, `HH`, `mm`, `ss`, `SSS`, ...), so
//! `export-${yyyyMMdd}.zip` becomes `export-20240118.zip`.
//!
//! Templates are parsed once during configuration resolution; rendering
//! cannot fail afterwards.

use chrono::{DateTime, Datelike, FixedOffset, Local, Timelike};
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

static PLACEHOLDER: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]*)\}"));

/// The single instant a run is stamped with
///
/// Every name, temporary suffix and trigger parameter of a run derives
/// from the same value so they stay consistent with each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunInstant(DateTime<FixedOffset>);

impl RunInstant {
    pub fn now() -> Self {
        Self(Local::now().fixed_offset())
    }

    pub fn at(instant: DateTime<FixedOffset>) -> Self {
        Self(instant)
    }

    pub fn datetime(&self) -> &DateTime<FixedOffset> {
        &self.0
    }

    pub fn epoch_millis(&self) -> i64 {
        self.0.timestamp_millis()
    }

    /// `yyyyMMddHHmmss` rendering used for the trigger's timestamp parameter
    pub fn compact(&self) -> String {
        self.0.format("%Y%m%d%H%M%S").to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Era,
    Year,
    Month,
    DayOfMonth,
    DayOfYear,
    DayOfWeek,
    DayNumberOfWeek,
    WeekOfYear,
    WeekOfMonth,
    DayOfWeekInMonth,
    AmPm,
    Hour0To23,
    Hour1To24,
    Hour0To11,
    Hour1To12,
    Minute,
    Second,
    Millisecond,
    Zone,
}

impl Field {
    fn from_letter(letter: char) -> Option<Self> {
        Some(match letter {
            'G' => Field::Era,
            'y' | 'Y' => Field::Year,
            'M' | 'L' => Field::Month,
            'd' => Field::DayOfMonth,
            'D' => Field::DayOfYear,
            'E' => Field::DayOfWeek,
            'u' => Field::DayNumberOfWeek,
            'w' => Field::WeekOfYear,
            'W' => Field::WeekOfMonth,
            'F' => Field::DayOfWeekInMonth,
            'a' => Field::AmPm,
            'H' => Field::Hour0To23,
            'k' => Field::Hour1To24,
            'K' => Field::Hour0To11,
            'h' => Field::Hour1To12,
            'm' => Field::Minute,
            's' => Field::Second,
            'S' => Field::Millisecond,
            'Z' | 'z' | 'X' => Field::Zone,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Literal(String),
    Field(Field, usize),
}

/// Compiled date pattern
#[derive(Debug, Clone, PartialEq, Eq)]
struct DatePattern {
    tokens: Vec<Token>,
}

impl DatePattern {
    fn parse(pattern: &str) -> Result<Self, String> {
        let chars: Vec<char> = pattern.chars().collect();
        let mut tokens = Vec::new();
        let mut literal = String::new();
        let mut i = 0;

        while i < chars.len() {
            let c = chars[i];
            if c == '\'' {
                // '' is an escaped quote, anything else opens a quoted run
                if chars.get(i + 1) == Some(&'\'') {
                    literal.push('\'');
                    i += 2;
                    continue;
                }
                i += 1;
                loop {
                    match chars.get(i) {
                        None => return Err(format!("unterminated quote in '{pattern}'")),
                        Some('\'') if chars.get(i + 1) == Some(&'\'') => {
                            literal.push('\'');
                            i += 2;
                        }
                        Some('\'') => {
                            i += 1;
                            break;
                        }
                        Some(&q) => {
                            literal.push(q);
                            i += 1;
                        }
                    }
                }
            } else if c.is_ascii_alphabetic() {
                let field = Field::from_letter(c)
                    .ok_or_else(|| format!("illegal pattern character '{c}' in '{pattern}'"))?;
                let start = i;
                while chars.get(i) == Some(&c) {
                    i += 1;
                }
                if !literal.is_empty() {
                    tokens.push(Token::Literal(std::mem::take(&mut literal)));
                }
                tokens.push(Token::Field(field, i - start));
            } else {
                literal.push(c);
                i += 1;
            }
        }

        if !literal.is_empty() {
            tokens.push(Token::Literal(literal));
        }
        Ok(Self { tokens })
    }

    fn format(&self, at: &DateTime<FixedOffset>) -> String {
        let mut out = String::new();
        for token in &self.tokens {
            match token {
                Token::Literal(text) => out.push_str(text),
                Token::Field(field, width) => out.push_str(&format_field(*field, *width, at)),
            }
        }
        out
    }
}

fn padded(value: impl Into<i64>, width: usize) -> String {
    format!("{:0width$}", value.into(), width = width)
}

fn format_field(field: Field, width: usize, at: &DateTime<FixedOffset>) -> String {
    match field {
        Field::Era => (if at.year() > 0 { "AD" } else { "BC" }).to_string(),
        Field::Year if width == 2 => padded(at.year().rem_euclid(100), 2),
        Field::Year => padded(at.year(), width),
        Field::Month if width >= 4 => at.format("%B").to_string(),
        Field::Month if width == 3 => at.format("%b").to_string(),
        Field::Month => padded(at.month(), width),
        Field::DayOfMonth => padded(at.day(), width),
        Field::DayOfYear => padded(at.ordinal(), width),
        Field::DayOfWeek if width >= 4 => at.format("%A").to_string(),
        Field::DayOfWeek => at.format("%a").to_string(),
        Field::DayNumberOfWeek => padded(at.weekday().number_from_monday(), width),
        Field::WeekOfYear => padded(at.iso_week().week(), width),
        Field::WeekOfMonth => padded(week_of_month(at), width),
        Field::DayOfWeekInMonth => padded((at.day() - 1) / 7 + 1, width),
        Field::AmPm => at.format("%p").to_string(),
        Field::Hour0To23 => padded(at.hour(), width),
        Field::Hour1To24 => padded(if at.hour() == 0 { 24 } else { at.hour() }, width),
        Field::Hour0To11 => padded(at.hour() % 12, width),
        Field::Hour1To12 => padded(at.hour12().1, width),
        Field::Minute => padded(at.minute(), width),
        Field::Second => padded(at.second(), width),
        Field::Millisecond => padded(at.timestamp_subsec_millis(), width),
        Field::Zone => at.format("%z").to_string(),
    }
}

/// Monday-based week of the month; the week holding the 1st is week 1
fn week_of_month(at: &DateTime<FixedOffset>) -> u32 {
    // weekday of the 1st, Monday = 0
    let first = (at.weekday().num_days_from_monday() + 7 - (at.day() - 1) % 7) % 7;
    (at.day() - 1 + first) / 7 + 1
}

/// A validated output name template
#[derive(Clone, PartialEq, Eq)]
pub struct OutputTemplate {
    raw: String,
    prefix: String,
    pattern: Option<DatePattern>,
    suffix: String,
}

impl OutputTemplate {
    /// Parse a template, rejecting more than one placeholder or an
    /// unusable date pattern
    pub fn parse(raw: &str) -> Result<Self, String> {
        let regex = PLACEHOLDER
            .as_ref()
            .map_err(|e| format!("placeholder matcher unavailable: {e}"))?;

        let mut matches = regex.captures_iter(raw);
        let Some(first) = matches.next() else {
            return Ok(Self {
                raw: raw.to_string(),
                prefix: raw.to_string(),
                pattern: None,
                suffix: String::new(),
            });
        };
        if matches.next().is_some() {
            return Err(format!(
                "'{raw}' contains more than one ${{...}} placeholder"
            ));
        }

        let (Some(whole), Some(inner)) = (first.get(0), first.get(1)) else {
            return Err(format!("'{raw}' has a malformed placeholder"));
        };
        let pattern = DatePattern::parse(inner.as_str())
            .map_err(|e| format!("'{raw}' has an invalid date pattern: {e}"))?;

        Ok(Self {
            raw: raw.to_string(),
            prefix: raw[..whole.start()].to_string(),
            pattern: Some(pattern),
            suffix: raw[whole.end()..].to_string(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn has_placeholder(&self) -> bool {
        self.pattern.is_some()
    }

    /// Substitute the placeholder with the formatted instant
    pub fn render(&self, instant: &RunInstant) -> String {
        match &self.pattern {
            Some(pattern) => format!(
                "{}{}{}",
                self.prefix,
                pattern.format(instant.datetime()),
                self.suffix
            ),
            None => self.raw.clone(),
        }
    }
}

impl fmt::Debug for OutputTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("OutputTemplate").field(&self.raw).finish()
    }
}

impl fmt::Display for OutputTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Temporary name a file is first uploaded under
pub fn temporary_name(remote_name: &str, millis: i64) -> String {
    format!("{remote_name}.{millis}")
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn instant(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> RunInstant {
        let offset = FixedOffset::east_opt(0).unwrap();
        RunInstant::at(offset.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap())
    }

    #[test]
    fn test_compact_pattern() {
        let t = OutputTemplate::parse("date-${yyyyMMddHHmmss}.zip").unwrap();
        assert_eq!(t.render(&instant(2013, 1, 31, 3, 14, 0)), "date-20130131031400.zip");
    }

    #[test]
    fn test_separated_pattern() {
        let t = OutputTemplate::parse("date-${yyyy-MM-dd-HH-mm-ss}.zip").unwrap();
        assert_eq!(
            t.render(&instant(2013, 1, 31, 3, 14, 0)),
            "date-2013-01-31-03-14-00.zip"
        );
    }

    #[test]
    fn test_template_without_placeholder_is_identity() {
        let t = OutputTemplate::parse("fixed-name.zip").unwrap();
        assert!(!t.has_placeholder());
        assert_eq!(t.render(&instant(2013, 1, 31, 3, 14, 0)), "fixed-name.zip");
    }

    #[test]
    fn test_two_placeholders_rejected() {
        let err = OutputTemplate::parse("${yyyy}-${MM}.zip").unwrap_err();
        assert!(err.contains("more than one"));
    }

    #[test]
    fn test_unknown_pattern_letter_rejected() {
        assert!(OutputTemplate::parse("x-${yyyyQQ}.zip").is_err());
    }

    #[test]
    fn test_quoted_literals_and_short_fields() {
        let t = OutputTemplate::parse("r-${yy'T'H.m}.csv").unwrap();
        assert_eq!(t.render(&instant(2013, 1, 31, 3, 4, 0)), "r-13T3.4.csv");

        let t = OutputTemplate::parse("q-${''yyyy''}").unwrap();
        assert_eq!(t.render(&instant(2013, 1, 31, 3, 4, 0)), "q-'2013'");
    }

    #[test]
    fn test_twelve_hour_and_month_names() {
        let t = OutputTemplate::parse("${hh a MMM}").unwrap();
        assert_eq!(t.render(&instant(2013, 1, 31, 15, 0, 0)), "03 PM Jan");
    }

    #[test]
    fn test_week_fields() {
        // Thursday 2013-01-31
        let at = instant(2013, 1, 31, 3, 14, 0);

        let t = OutputTemplate::parse("weekly-${yyyy-ww}.zip").unwrap();
        assert_eq!(t.render(&at), "weekly-2013-05.zip");

        let t = OutputTemplate::parse("${W F u}").unwrap();
        assert_eq!(t.render(&at), "5 5 4");

        // Tuesday 2013-01-01 and Monday 2013-01-07
        assert_eq!(t.render(&instant(2013, 1, 1, 0, 0, 0)), "1 1 2");
        assert_eq!(t.render(&instant(2013, 1, 7, 0, 0, 0)), "2 1 1");
    }

    #[test]
    fn test_day_number_is_not_a_year() {
        let t = OutputTemplate::parse("${uu}").unwrap();
        assert_eq!(t.render(&instant(2013, 1, 6, 0, 0, 0)), "07");
    }

    #[test]
    fn test_temporary_name_and_compact() {
        let at = instant(2013, 1, 31, 3, 14, 0);
        assert_eq!(at.compact(), "20130131031400");
        assert_eq!(
            temporary_name("data.zip", at.epoch_millis()),
            "data.zip.1359602040000"
        );
    }
}
