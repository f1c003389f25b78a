use serde::Serialize;

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Column width in characters; usage strings are mostly non-ASCII.
fn width(cell: &str) -> usize {
    cell.chars().count()
}

fn pad(cell: &str, to: usize) -> String {
    let mut out = cell.to_string();
    out.extend(std::iter::repeat(' ').take(to.saturating_sub(width(cell))));
    out
}

/// Left-aligned table; the last column is not padded.
pub fn print_table(headers: &[&str], rows: &[Vec<String>]) {
    let mut widths: Vec<usize> = headers.iter().map(|h| width(h)).collect();
    for row in rows {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(width(cell));
        }
    }

    let line = |cells: Vec<&str>| {
        let last = cells.len().saturating_sub(1);
        let padded: Vec<String> = cells
            .iter()
            .enumerate()
            .map(|(i, c)| if i == last { c.to_string() } else { pad(c, widths[i]) })
            .collect();
        println!("{}", padded.join("  ").trim_end());
    };

    line(headers.to_vec());
    let rule: Vec<String> = widths.iter().map(|&w| "-".repeat(w)).collect();
    line(rule.iter().map(String::as_str).collect());
    for row in rows {
        line(row.iter().map(String::as_str).collect());
    }
}

/// `key: value` lines with the keys aligned.
pub fn print_fields(fields: &[(&str, &str)]) {
    let key_width = fields.iter().map(|(k, _)| width(k)).max().unwrap_or(0);
    for (key, value) in fields {
        println!("{}  {value}", pad(&format!("{key}:"), key_width + 1));
    }
}
