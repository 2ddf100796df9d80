//! Human-readable reference code templates.
//!
//! A template mixes literal text with three placeholders: `{prefix}`,
//! `{year}` and `{seq}`. Numeric placeholders accept a zero-pad width,
//! written `{seq:05d}`. Literal braces are written `{{` and `}}`.
//!
//! Parsing rejects templates whose codes could be read two ways. `{prefix}`
//! must be the first placeholder and be followed by a separator that cannot
//! occur in a prefix, and two numbers may only touch when the year is padded
//! to its full four digits. Distinct `(prefix, year, seq)` triples therefore
//! always render distinct codes.
//!
//! ```
//! use erp_core::sequence::SequenceTemplate;
//!
//! let template = SequenceTemplate::parse("{prefix}/{year:04d}/{seq:05d}").unwrap();
//! assert_eq!(template.render("RCPT", 2025, 42), "RCPT/2025/00042");
//! ```

use std::fmt;

use crate::errors::CoreError;

/// Template used when neither the prefix nor the configuration names one.
pub const DEFAULT_TEMPLATE: &str = "{prefix}/{year:04d}/{seq:05d}";

/// Stored `year` for counters that never reset.
pub const PERPETUAL_YEAR: i32 = 0;

const MAX_PAD_WIDTH: usize = 20;

/// Years run 1 to 9999, so a year padded to this width is fixed-width.
const FULL_YEAR_WIDTH: usize = 4;

/// Characters allowed in a sequence prefix.
#[must_use]
pub const fn is_prefix_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placeholder {
    Prefix,
    Year,
    Seq,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Field { field: Placeholder, width: usize },
}

/// A parsed and validated code template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceTemplate {
    source: String,
    segments: Vec<Segment>,
}

impl SequenceTemplate {
    /// Parse a template string.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Validation` on unbalanced braces, unknown
    /// placeholders, malformed pad specs, a template without `{prefix}` or
    /// `{seq}`, or a layout that could render one code for two requests.
    pub fn parse(source: &str) -> Result<Self, CoreError> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = source.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    literal.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    literal.push('}');
                }
                '{' => {
                    let mut spec = String::new();
                    let mut closed = false;
                    for inner in chars.by_ref() {
                        if inner == '}' {
                            closed = true;
                            break;
                        }
                        spec.push(inner);
                    }
                    if !closed {
                        return Err(invalid(source, "unclosed '{'"));
                    }
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(parse_placeholder(source, &spec)?);
                }
                '}' => return Err(invalid(source, "unmatched '}'")),
                other => literal.push(other),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        let template = Self {
            source: source.to_string(),
            segments,
        };
        if !template.uses(Placeholder::Seq) {
            return Err(invalid(source, "missing {seq} placeholder"));
        }
        check_prefix_boundary(source, &template.segments)?;
        check_number_boundaries(source, &template.segments)?;
        Ok(template)
    }

    /// Whether the template renders the year, which yearly counters need so
    /// codes from different years cannot collide.
    #[must_use]
    pub fn includes_year(&self) -> bool {
        self.uses(Placeholder::Year)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Substitute the placeholders.
    #[must_use]
    pub fn render(&self, prefix: &str, year: i32, seq: i64) -> String {
        let mut out = String::with_capacity(self.source.len() + 8);
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Field { field, width } => {
                    let rendered = match field {
                        Placeholder::Prefix => prefix.to_string(),
                        Placeholder::Year => format!("{year:0width$}"),
                        Placeholder::Seq => format!("{seq:0width$}"),
                    };
                    out.push_str(&rendered);
                }
            }
        }
        out
    }

    fn uses(&self, wanted: Placeholder) -> bool {
        self.segments
            .iter()
            .any(|s| matches!(s, Segment::Field { field, .. } if *field == wanted))
    }
}

impl fmt::Display for SequenceTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn parse_placeholder(source: &str, spec: &str) -> Result<Segment, CoreError> {
    let (name, format) = match spec.split_once(':') {
        Some((name, format)) => (name, Some(format)),
        None => (spec, None),
    };
    let field = match name {
        "prefix" => Placeholder::Prefix,
        "year" => Placeholder::Year,
        "seq" => Placeholder::Seq,
        other => return Err(invalid(source, &format!("unknown placeholder '{other}'"))),
    };
    let width = match format {
        None => 0,
        Some(_) if field == Placeholder::Prefix => {
            return Err(invalid(source, "{prefix} takes no format spec"));
        }
        Some(format) => parse_pad_width(format)
            .ok_or_else(|| invalid(source, &format!("bad format spec '{format}'")))?,
    };
    Ok(Segment::Field { field, width })
}

/// Accepts `d`, `Nd` and `0Nd`.
fn parse_pad_width(format: &str) -> Option<usize> {
    let digits = format.strip_suffix('d')?;
    if digits.is_empty() {
        return Some(0);
    }
    let width: usize = digits.trim_start_matches('0').parse().ok().or_else(|| {
        // "0d" or "00d"
        digits.chars().all(|c| c == '0').then_some(0)
    })?;
    (width <= MAX_PAD_WIDTH).then_some(width)
}

/// Everything before the first `{prefix}` is fixed text, and the prefix ends
/// at a character no prefix contains.
fn check_prefix_boundary(source: &str, segments: &[Segment]) -> Result<(), CoreError> {
    let first = segments
        .iter()
        .position(|s| matches!(s, Segment::Field { .. }));
    match first.map(|i| (&segments[i], segments.get(i + 1))) {
        Some((Segment::Field { field: Placeholder::Prefix, .. }, Some(Segment::Literal(next))))
            if next.chars().next().is_some_and(|c| !is_prefix_char(c)) =>
        {
            Ok(())
        }
        Some((Segment::Field { field: Placeholder::Prefix, .. }, _)) => Err(invalid(
            source,
            "{prefix} must be followed by a separator such as '/' or '-'",
        )),
        _ => Err(invalid(source, "{prefix} must be the first placeholder")),
    }
}

/// Two numbers need a non-digit between them unless one is a full-width year.
fn check_number_boundaries(source: &str, segments: &[Segment]) -> Result<(), CoreError> {
    let fixed_width = |field: Placeholder, width: usize| {
        field == Placeholder::Year && width >= FULL_YEAR_WIDTH
    };
    // (previous number is fixed-width, non-digit seen since it)
    let mut previous: Option<(bool, bool)> = None;
    for segment in segments {
        match segment {
            Segment::Literal(text) => {
                if let Some((_, separated)) = previous.as_mut() {
                    *separated |= text.chars().any(|c| !c.is_ascii_digit());
                }
            }
            Segment::Field { field: Placeholder::Prefix, .. } => {}
            Segment::Field { field, width } => {
                let fixed = fixed_width(*field, *width);
                if let Some((previous_fixed, separated)) = previous {
                    if !(separated || previous_fixed || fixed) {
                        return Err(invalid(
                            source,
                            "adjacent numbers need a separator or a {year:04d} between them",
                        ));
                    }
                }
                previous = Some((fixed, false));
            }
        }
    }
    Ok(())
}

fn invalid(source: &str, reason: &str) -> CoreError {
    CoreError::Validation(format!("invalid sequence template '{source}': {reason}"))
}

/// Which counter a request draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SequenceScope {
    /// Numbering restarts at 1 every calendar year.
    Yearly(i32),
    /// One counter across all years.
    Perpetual,
}

impl SequenceScope {
    #[must_use]
    pub const fn new(year: i32, reset_yearly: bool) -> Self {
        if reset_yearly {
            Self::Yearly(year)
        } else {
            Self::Perpetual
        }
    }

    /// The `year` column value of the counter row.
    #[must_use]
    pub const fn storage_year(self) -> i32 {
        match self {
            Self::Yearly(year) => year,
            Self::Perpetual => PERPETUAL_YEAR,
        }
    }
}
