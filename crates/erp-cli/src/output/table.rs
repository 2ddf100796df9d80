/// Column padding between cells.
const GAP: &str = "  ";
const MIN_WIDTH: usize = 4;

#[derive(Clone, Copy, Debug, Default)]
pub struct TableOptions {
    pub max_width: Option<usize>,
}

impl TableOptions {
    /// Respect `COLUMNS` when the shell exports it.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            max_width: std::env::var("COLUMNS").ok().and_then(|v| v.parse().ok()),
        }
    }
}

/// Render an aligned plain-text table.
#[must_use]
pub fn render(headers: &[&str], rows: &[Vec<String>], options: TableOptions) -> String {
    let mut widths = headers
        .iter()
        .enumerate()
        .map(|(index, header)| {
            rows.iter()
                .filter_map(|row| row.get(index))
                .map(|cell| cell.chars().count())
                .chain(std::iter::once(header.chars().count()))
                .max()
                .unwrap_or(0)
                .max(MIN_WIDTH)
        })
        .collect::<Vec<_>>();
    if let Some(max_width) = options.max_width {
        shrink_to_fit(&mut widths, max_width);
    }

    let mut lines = Vec::with_capacity(rows.len() + 2);
    let header_line = line(headers.iter().copied(), &widths);
    lines.push("-".repeat(header_line.chars().count()));
    lines.insert(0, header_line);
    for row in rows {
        lines.push(line(row.iter().map(String::as_str), &widths));
    }
    lines.join("\n")
}

fn line<'a>(cells: impl Iterator<Item = &'a str>, widths: &[usize]) -> String {
    cells
        .zip(widths)
        .map(|(cell, width)| {
            let cell = truncate(cell, *width);
            if is_numeric(&cell) {
                format!("{cell:>width$}")
            } else {
                format!("{cell:<width$}")
            }
        })
        .collect::<Vec<_>>()
        .join(GAP)
        .trim_end()
        .to_string()
}

/// Narrow the widest column one step at a time until the table fits.
fn shrink_to_fit(widths: &mut [usize], max_width: usize) {
    let gaps = widths.len().saturating_sub(1) * GAP.len();
    while widths.iter().sum::<usize>() + gaps > max_width {
        let Some(widest) = widths
            .iter_mut()
            .filter(|w| **w > MIN_WIDTH)
            .max_by_key(|w| **w)
        else {
            break;
        };
        *widest -= 1;
    }
}

fn truncate(value: &str, width: usize) -> String {
    if value.chars().count() <= width {
        return value.to_string();
    }
    let mut out = value.chars().take(width.saturating_sub(1)).collect::<String>();
    out.push('…');
    out
}

fn is_numeric(value: &str) -> bool {
    let digits = value.strip_prefix('-').unwrap_or(value);
    !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn aligns_columns() {
        let rendered = render(
            &["prefix", "year"],
            &[
                vec!["RCPT".into(), "2025".into()],
                vec!["ADM".into(), "0".into()],
            ],
            TableOptions::default(),
        );
        assert_eq!(
            rendered,
            "prefix  year\n------------\nRCPT    2025\nADM        0"
        );
    }

    #[test]
    fn shrinks_widest_column() {
        let rendered = render(
            &["key", "description"],
            &[vec!["A".into(), "a very long description of a setting".into()]],
            TableOptions {
                max_width: Some(20),
            },
        );
        for line in rendered.lines() {
            assert!(line.chars().count() <= 20, "too wide: {line}");
        }
        assert!(rendered.contains('…'));
    }
}
