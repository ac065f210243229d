//! Positional composite formatting.
//!
//! Templates use `{index[,alignment][:spec]}` items. `{{` and `}}` are literal
//! braces. Numbers and dates are rendered with the [`FormatConventions`] of
//! the formatting locale.
//!
//! Supported specifiers:
//! - integers: `D`, `N`, `F`, `P`, `X`, `E`, `G` with optional precision (`N2`, `D4`)
//! - floats: `G`, `F`, `N`, `P`, `E` with optional precision
//!
//! Alignments are limited to fewer than 1,000,000 columns and precisions to
//! at most 99 digits.
//! - dates: `d`, `t`, `T`, `g`, `G`, `s`, `u`, `o`, or a custom pattern
//!   (`dd-MM-yyyy HH:mm`)

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike};
use thiserror::Error;

use crate::locale::Locale;

const MAX_ALIGNMENT: u32 = 999_999;
const MAX_PRECISION: usize = 99;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FormatError {
    #[error("unclosed placeholder starting at byte {offset}")]
    UnclosedPlaceholder { offset: usize },

    #[error("unexpected `}}` at byte {offset}")]
    UnexpectedClosingBrace { offset: usize },

    #[error("invalid placeholder `{{{body}}}` at byte {offset}")]
    InvalidPlaceholder { offset: usize, body: String },

    #[error("placeholder index {index} is out of range ({count} arguments supplied)")]
    IndexOutOfRange { index: usize, count: usize },

    #[error("unsupported {kind} format specifier `{spec}`")]
    UnsupportedSpecifier { kind: &'static str, spec: String },
}

/// A positional format argument.
#[derive(Clone, Debug, PartialEq)]
pub enum FormatArg {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    DateTime(NaiveDateTime),
}

impl From<String> for FormatArg {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<&str> for FormatArg {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<&String> for FormatArg {
    fn from(v: &String) -> Self {
        Self::Str(v.clone())
    }
}

impl From<i64> for FormatArg {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for FormatArg {
    fn from(v: i32) -> Self {
        Self::Int(v as i64)
    }
}

impl From<u32> for FormatArg {
    fn from(v: u32) -> Self {
        Self::Int(v as i64)
    }
}

impl From<usize> for FormatArg {
    fn from(v: usize) -> Self {
        Self::Int(v as i64)
    }
}

impl From<f64> for FormatArg {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<f32> for FormatArg {
    fn from(v: f32) -> Self {
        Self::Float(v as f64)
    }
}

impl From<bool> for FormatArg {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<NaiveDateTime> for FormatArg {
    fn from(v: NaiveDateTime) -> Self {
        Self::DateTime(v)
    }
}

impl From<NaiveDate> for FormatArg {
    fn from(v: NaiveDate) -> Self {
        Self::DateTime(v.and_time(NaiveTime::default()))
    }
}

impl<Tz: TimeZone> From<DateTime<Tz>> for FormatArg {
    fn from(v: DateTime<Tz>) -> Self {
        Self::DateTime(v.naive_local())
    }
}

/// Number and date conventions of a locale.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FormatConventions {
    pub decimal_separator: char,
    pub group_separator: char,
    pub date_separator: &'static str,
    pub short_date: &'static str,
    pub short_time: &'static str,
    pub long_time: &'static str,
    pub am: &'static str,
    pub pm: &'static str,
}

impl FormatConventions {
    pub const INVARIANT: Self = Self {
        decimal_separator: '.',
        group_separator: ',',
        date_separator: "/",
        short_date: "MM/dd/yyyy",
        short_time: "HH:mm",
        long_time: "HH:mm:ss",
        am: "AM",
        pm: "PM",
    };

    const EN_US: Self = Self {
        short_date: "M/d/yyyy",
        short_time: "h:mm tt",
        long_time: "h:mm:ss tt",
        ..Self::INVARIANT
    };

    const EN_GB: Self = Self {
        short_date: "dd/MM/yyyy",
        ..Self::INVARIANT
    };

    const EN_AU: Self = Self {
        short_date: "d/MM/yyyy",
        short_time: "h:mm tt",
        long_time: "h:mm:ss tt",
        am: "am",
        pm: "pm",
        ..Self::INVARIANT
    };

    const COMMA_DOT: Self = Self {
        decimal_separator: ',',
        group_separator: '.',
        short_date: "dd/MM/yyyy",
        ..Self::INVARIANT
    };

    const DE: Self = Self {
        date_separator: ".",
        short_date: "dd.MM.yyyy",
        ..Self::COMMA_DOT
    };

    const FR: Self = Self {
        group_separator: '\u{202f}',
        ..Self::COMMA_DOT
    };

    const RU: Self = Self {
        group_separator: '\u{a0}',
        ..Self::DE
    };

    const NL: Self = Self {
        date_separator: "-",
        short_date: "d-M-yyyy",
        ..Self::COMMA_DOT
    };

    const JA: Self = Self {
        short_date: "yyyy/MM/dd",
        short_time: "H:mm",
        long_time: "H:mm:ss",
        am: "午前",
        pm: "午後",
        ..Self::INVARIANT
    };

    const ZH: Self = Self {
        short_date: "yyyy/M/d",
        am: "上午",
        pm: "下午",
        ..Self::INVARIANT
    };

    const KO: Self = Self {
        date_separator: "-",
        short_date: "yyyy-MM-dd",
        short_time: "tt h:mm",
        long_time: "tt h:mm:ss",
        am: "오전",
        pm: "오후",
        ..Self::INVARIANT
    };

    const HI: Self = Self {
        date_separator: "-",
        short_date: "dd-MM-yyyy",
        short_time: "h:mm tt",
        long_time: "h:mm:ss tt",
        am: "am",
        pm: "pm",
        ..Self::INVARIANT
    };

    /// Built-in conventions: exact name, then language, then invariant.
    pub fn for_locale(locale: &Locale) -> Self {
        let exact = match locale.name() {
            "en-US" => Some(Self::EN_US),
            "en-GB" | "en-IE" | "en-IN" => Some(Self::EN_GB),
            "en-AU" | "en-NZ" => Some(Self::EN_AU),
            _ => None,
        };
        exact.unwrap_or_else(|| match locale.language() {
            "en" => Self::EN_US,
            "de" => Self::DE,
            "fr" => Self::FR,
            "es" | "it" | "pt" | "id" => Self::COMMA_DOT,
            "ru" | "uk" => Self::RU,
            "nl" => Self::NL,
            "ja" => Self::JA,
            "zh" => Self::ZH,
            "ko" => Self::KO,
            "hi" => Self::HI,
            _ => Self::INVARIANT,
        })
    }
}

impl Default for FormatConventions {
    fn default() -> Self {
        Self::INVARIANT
    }
}

/// Substitute `args` into `template`.
pub fn format_positional(
    template: &str,
    args: &[FormatArg],
    conventions: &FormatConventions,
) -> Result<String, FormatError> {
    if !template.contains(['{', '}']) {
        return Ok(template.to_string());
    }

    let mut out = String::with_capacity(template.len() + 16);
    let mut chars = template.char_indices().peekable();

    while let Some((pos, c)) = chars.next() {
        match c {
            '{' => {
                if matches!(chars.peek(), Some((_, '{'))) {
                    chars.next();
                    out.push('{');
                    continue;
                }

                let mut body = String::new();
                let mut closed = false;
                for (_, n) in chars.by_ref() {
                    if n == '}' {
                        closed = true;
                        break;
                    }
                    body.push(n);
                }
                if !closed {
                    return Err(FormatError::UnclosedPlaceholder { offset: pos });
                }

                let item = Item::parse(&body, pos)?;
                let arg = args.get(item.index).ok_or(FormatError::IndexOutOfRange {
                    index: item.index,
                    count: args.len(),
                })?;
                let rendered = render(arg, item.spec, conventions)?;
                push_aligned(&mut out, &rendered, item.alignment);
            }
            '}' => {
                if matches!(chars.peek(), Some((_, '}'))) {
                    chars.next();
                    out.push('}');
                } else {
                    return Err(FormatError::UnexpectedClosingBrace { offset: pos });
                }
            }
            _ => out.push(c),
        }
    }

    Ok(out)
}

struct Item<'a> {
    index: usize,
    alignment: i32,
    spec: Option<&'a str>,
}

impl<'a> Item<'a> {
    fn parse(body: &'a str, offset: usize) -> Result<Self, FormatError> {
        let invalid = || FormatError::InvalidPlaceholder {
            offset,
            body: body.to_string(),
        };

        let (head, spec) = match body.split_once(':') {
            Some((head, spec)) => (head, Some(spec)),
            None => (body, None),
        };
        let (index, alignment) = match head.split_once(',') {
            Some((index, alignment)) => (index, Some(alignment)),
            None => (head, None),
        };

        let index = index.trim().parse::<usize>().map_err(|_| invalid())?;
        let alignment = match alignment {
            Some(a) => a.trim().parse::<i32>().map_err(|_| invalid())?,
            None => 0,
        };
        if alignment.unsigned_abs() > MAX_ALIGNMENT {
            return Err(invalid());
        }

        Ok(Self {
            index,
            alignment,
            spec: spec.filter(|s| !s.is_empty()),
        })
    }
}

fn push_aligned(out: &mut String, s: &str, alignment: i32) {
    let width = alignment.unsigned_abs() as usize;
    let pad = width.saturating_sub(s.chars().count());
    if alignment > 0 {
        out.extend(std::iter::repeat(' ').take(pad));
        out.push_str(s);
    } else {
        out.push_str(s);
        out.extend(std::iter::repeat(' ').take(pad));
    }
}

fn render(
    arg: &FormatArg,
    spec: Option<&str>,
    conventions: &FormatConventions,
) -> Result<String, FormatError> {
    match arg {
        FormatArg::Str(s) => Ok(s.clone()),
        FormatArg::Bool(b) => Ok(b.to_string()),
        FormatArg::Int(i) => format_int(*i, spec, conventions),
        FormatArg::Float(f) => format_float(*f, spec, conventions),
        FormatArg::DateTime(dt) => format_datetime(dt, spec, conventions),
    }
}

/// Split a numeric specifier such as `N2` into its letter and precision.
fn numeric_spec(spec: &str, kind: &'static str) -> Result<(char, Option<usize>), FormatError> {
    let unsupported = || FormatError::UnsupportedSpecifier {
        kind,
        spec: spec.to_string(),
    };
    let mut chars = spec.chars();
    let letter = chars.next().ok_or_else(unsupported)?;
    let rest = chars.as_str();
    if rest.is_empty() {
        return Ok((letter.to_ascii_uppercase(), None));
    }
    let precision = rest.parse::<usize>().map_err(|_| unsupported())?;
    if precision > MAX_PRECISION {
        return Err(unsupported());
    }
    Ok((letter.to_ascii_uppercase(), Some(precision)))
}

fn format_int(
    value: i64,
    spec: Option<&str>,
    conventions: &FormatConventions,
) -> Result<String, FormatError> {
    let Some(spec) = spec else {
        return Ok(value.to_string());
    };
    let (letter, precision) = numeric_spec(spec, "integer")?;
    let sign = if value < 0 { "-" } else { "" };
    let digits = value.unsigned_abs().to_string();

    let out = match letter {
        'G' => match precision {
            Some(p) if p > 0 && digits.len() > p => {
                return format_float(value as f64, Some(spec), conventions)
            }
            _ => value.to_string(),
        },
        'D' => {
            let width = precision.unwrap_or(0);
            format!("{sign}{digits:0>width$}")
        }
        'N' => {
            let mut s = format!("{sign}{}", group_digits(&digits, conventions.group_separator));
            push_fraction(&mut s, "", precision.unwrap_or(2), conventions);
            s
        }
        'F' => {
            let mut s = format!("{sign}{digits}");
            push_fraction(&mut s, "", precision.unwrap_or(2), conventions);
            s
        }
        'P' | 'E' => return format_float(value as f64, Some(spec), conventions),
        'X' => {
            let width = precision.unwrap_or(0);
            let hex = if spec.starts_with('x') {
                format!("{value:x}")
            } else {
                format!("{value:X}")
            };
            format!("{hex:0>width$}")
        }
        _ => {
            return Err(FormatError::UnsupportedSpecifier {
                kind: "integer",
                spec: spec.to_string(),
            })
        }
    };
    Ok(out)
}

fn format_float(
    value: f64,
    spec: Option<&str>,
    conventions: &FormatConventions,
) -> Result<String, FormatError> {
    let localize = |s: String| s.replace('.', &conventions.decimal_separator.to_string());

    let Some(spec) = spec else {
        return Ok(localize(value.to_string()));
    };
    let (letter, precision) = numeric_spec(spec, "float")?;
    let exponent_char = if spec.starts_with(char::is_lowercase) { 'e' } else { 'E' };

    let out = match letter {
        'G' => match precision {
            Some(p) if p > 0 => localize(general(value, p, exponent_char)),
            _ => localize(value.to_string()),
        },
        'F' => localize(format!("{value:.prec$}", prec = precision.unwrap_or(2))),
        'N' => grouped_fixed(value, precision.unwrap_or(2), conventions),
        'P' => format!(
            "{}%",
            grouped_fixed(value * 100.0, precision.unwrap_or(2), conventions)
        ),
        'E' => localize(scientific(value, precision.unwrap_or(6), exponent_char, 3)),
        _ => {
            return Err(FormatError::UnsupportedSpecifier {
                kind: "float",
                spec: spec.to_string(),
            })
        }
    };
    Ok(out)
}

/// `1.23E+003` style: the exponent always carries a sign and is padded to
/// `exponent_digits`.
fn scientific(value: f64, precision: usize, exponent_char: char, exponent_digits: usize) -> String {
    let raw = format!("{value:.precision$e}");
    let Some((mantissa, exponent)) = raw.split_once('e') else {
        return raw;
    };
    let exponent: i32 = exponent.parse().unwrap_or(0);
    let sign = if exponent < 0 { '-' } else { '+' };
    format!(
        "{mantissa}{exponent_char}{sign}{:0exponent_digits$}",
        exponent.unsigned_abs()
    )
}

/// At most `precision` significant digits, switching to scientific notation
/// when the exponent is at least `precision` or below -5.
fn general(value: f64, precision: usize, exponent_char: char) -> String {
    if value == 0.0 || !value.is_finite() {
        return value.to_string();
    }
    let rounded = format!("{value:.prec$e}", prec = precision - 1);
    let Some((mantissa, exponent)) = rounded.split_once('e') else {
        return rounded;
    };
    let exponent: i32 = exponent.parse().unwrap_or(0);

    if exponent >= precision as i32 || exponent < -5 {
        let mantissa = trim_fraction(mantissa);
        let sign = if exponent < 0 { '-' } else { '+' };
        return format!("{mantissa}{exponent_char}{sign}{:02}", exponent.unsigned_abs());
    }
    let decimals = (precision as i32 - 1 - exponent).max(0) as usize;
    trim_fraction(&format!("{value:.decimals$}")).to_string()
}

fn trim_fraction(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

fn grouped_fixed(value: f64, precision: usize, conventions: &FormatConventions) -> String {
    let fixed = format!("{:.precision$}", value.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), ""));
    let sign = if value < 0.0 { "-" } else { "" };
    let mut out = format!("{sign}{}", group_digits(int_part, conventions.group_separator));
    if precision > 0 {
        out.push(conventions.decimal_separator);
        out.push_str(frac_part);
    }
    out
}

fn push_fraction(out: &mut String, digits: &str, precision: usize, conventions: &FormatConventions) {
    if precision == 0 {
        return;
    }
    out.push(conventions.decimal_separator);
    out.push_str(digits);
    out.extend(std::iter::repeat('0').take(precision.saturating_sub(digits.len())));
}

fn group_digits(digits: &str, separator: char) -> String {
    let len = digits.len();
    let mut out = String::with_capacity(len + len / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push(separator);
        }
        out.push(c);
    }
    out
}

fn format_datetime(
    dt: &NaiveDateTime,
    spec: Option<&str>,
    conventions: &FormatConventions,
) -> Result<String, FormatError> {
    let spec = spec.unwrap_or("G");
    let mut chars = spec.chars();
    let single = match (chars.next(), chars.next()) {
        (Some(c), None) => Some(c),
        _ => None,
    };
    let Some(letter) = single else {
        return date_pattern(dt, spec, conventions);
    };

    match letter {
        'd' => date_pattern(dt, conventions.short_date, conventions),
        't' => date_pattern(dt, conventions.short_time, conventions),
        'T' => date_pattern(dt, conventions.long_time, conventions),
        'g' => Ok(format!(
            "{} {}",
            date_pattern(dt, conventions.short_date, conventions)?,
            date_pattern(dt, conventions.short_time, conventions)?
        )),
        'G' => Ok(format!(
            "{} {}",
            date_pattern(dt, conventions.short_date, conventions)?,
            date_pattern(dt, conventions.long_time, conventions)?
        )),
        's' => Ok(dt.format("%Y-%m-%dT%H:%M:%S").to_string()),
        'u' => Ok(dt.format("%Y-%m-%d %H:%M:%SZ").to_string()),
        'o' | 'O' => Ok(format!(
            "{}.{:07}",
            dt.format("%Y-%m-%dT%H:%M:%S"),
            dt.nanosecond() % 1_000_000_000 / 100
        )),
        _ => Err(FormatError::UnsupportedSpecifier {
            kind: "date",
            spec: spec.to_string(),
        }),
    }
}

/// Render a custom date pattern (`yyyy`, `MM`, `dd`, `HH`, `mm`, `ss`, `fff`, `tt`, ...).
fn date_pattern(
    dt: &NaiveDateTime,
    pattern: &str,
    conventions: &FormatConventions,
) -> Result<String, FormatError> {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::with_capacity(pattern.len() + 8);
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let run = chars[i..].iter().take_while(|&&n| n == c).count();

        match c {
            '\'' | '"' => {
                let Some(close) = chars[i + 1..].iter().position(|&n| n == c) else {
                    return Err(FormatError::UnsupportedSpecifier {
                        kind: "date",
                        spec: pattern.to_string(),
                    });
                };
                out.extend(&chars[i + 1..i + 1 + close]);
                i += close + 2;
                continue;
            }
            '\\' => {
                if let Some(&n) = chars.get(i + 1) {
                    out.push(n);
                }
                i += 2;
                continue;
            }
            '/' => {
                out.push_str(conventions.date_separator);
                i += 1;
                continue;
            }
            'y' => {
                let year = dt.year();
                match run {
                    1 => out.push_str(&(year % 100).to_string()),
                    2 => out.push_str(&format!("{:02}", year % 100)),
                    _ => out.push_str(&format!("{year:0run$}")),
                }
            }
            'M' => match run {
                1 => out.push_str(&dt.month().to_string()),
                2 => out.push_str(&format!("{:02}", dt.month())),
                3 => out.push_str(&dt.format("%b").to_string()),
                _ => out.push_str(&dt.format("%B").to_string()),
            },
            'd' => match run {
                1 => out.push_str(&dt.day().to_string()),
                2 => out.push_str(&format!("{:02}", dt.day())),
                3 => out.push_str(&dt.format("%a").to_string()),
                _ => out.push_str(&dt.format("%A").to_string()),
            },
            'H' => push_two(&mut out, dt.hour(), run),
            'h' => push_two(&mut out, dt.hour12().1, run),
            'm' => push_two(&mut out, dt.minute(), run),
            's' => push_two(&mut out, dt.second(), run),
            'f' => {
                let digits = run.min(9);
                let nanos = dt.nanosecond() % 1_000_000_000;
                let scaled = nanos / 10u32.pow(9 - digits as u32);
                out.push_str(&format!("{scaled:0digits$}"));
            }
            't' => {
                let designator = if dt.hour12().0 {
                    conventions.pm
                } else {
                    conventions.am
                };
                if run == 1 {
                    out.extend(designator.chars().next());
                } else {
                    out.push_str(designator);
                }
            }
            _ => out.extend(std::iter::repeat(c).take(run)),
        }
        i += run;
    }

    Ok(out)
}

fn push_two(out: &mut String, value: u32, run: usize) {
    if run == 1 {
        out.push_str(&value.to_string());
    } else {
        out.push_str(&format!("{value:02}"));
    }
}
