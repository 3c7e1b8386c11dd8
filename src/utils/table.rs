//! Numeric tables read from CSV, TSV or JSON.
//!
//! Missing cells (empty, `NA`, `NaN`, `.`) load as NaN; what happens to them is up to
//! each procedure's validation.

use std::{fs, path::Path};

use anyhow::{anyhow, bail, Context, Result};
use serde_json::Value;

use crate::data::DataMatrix;

/// Column-oriented table with names.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub headers: Vec<String>,
    pub columns: Vec<Vec<f64>>,
}

/// Read a table file. The format follows the extension: `.csv`, `.tsv`/`.tab`,
/// `.json`; `.txt`, `.dat` and extensionless files are sniffed from the content.
pub fn read_table(file_path: &str) -> Result<Table> {
    let path = Path::new(file_path);

    if !path.exists() {
        bail!("Data file '{}' does not exist", file_path);
    }
    if !path.is_file() {
        bail!("'{}' is not a file", file_path);
    }

    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read file '{}'", file_path))?;

    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("")
        .to_lowercase();

    let table = match extension.as_str() {
        "csv" => parse_delimited(&text, ','),
        "tsv" | "tab" => parse_delimited(&text, '\t'),
        "json" => parse_json(&text),
        "txt" | "dat" | "" => parse_auto(&text),
        _ => {
            bail!("Unsupported file type: .{}\nCurrently supported: .csv, .tsv, .tab, .json, .txt and files without extension", extension);
        }
    };
    table.with_context(|| format!("Failed to parse '{}'", file_path))
}

/// Guess the format: JSON when it starts like JSON, TSV when tabs are present,
/// otherwise CSV.
pub fn parse_auto(text: &str) -> Result<Table> {
    let trimmed = text.trim_start();
    if trimmed.starts_with('[') || trimmed.starts_with('{') {
        parse_json(text)
    } else if trimmed.lines().next().is_some_and(|l| l.contains('\t')) {
        parse_delimited(text, '\t')
    } else {
        parse_delimited(text, ',')
    }
}

/// Delimited text. The first line is a header when any of its cells is neither a
/// number nor a missing marker.
pub fn parse_delimited(text: &str, delimiter: char) -> Result<Table> {
    let lines: Vec<(usize, &str)> = text
        .lines()
        .map(str::trim_end)
        .enumerate()
        .filter(|(_, l)| !l.trim().is_empty())
        .collect();

    let (_, first) = *lines.first().ok_or_else(|| anyhow!("the file has no rows"))?;
    let first_cells = split_line(first, delimiter);
    let has_header = first_cells.iter().any(|c| parse_cell(c).is_none());

    let headers: Vec<String> = if has_header {
        first_cells.iter().map(|c| c.trim().to_string()).collect()
    } else {
        default_headers(first_cells.len())
    };

    let mut rows: Vec<Vec<f64>> = Vec::new();
    let skip = usize::from(has_header);
    for &(no, line) in &lines[skip..] {
        let cells = split_line(line, delimiter);
        if cells.len() != headers.len() {
            bail!(
                "line {}: expected {} fields, found {}",
                no + 1,
                headers.len(),
                cells.len()
            );
        }
        let row = cells
            .iter()
            .enumerate()
            .map(|(j, c)| {
                parse_cell(c).ok_or_else(|| {
                    anyhow!("line {}: `{}` in column {} is not a number", no + 1, c.trim(), headers[j])
                })
            })
            .collect::<Result<Vec<f64>>>()?;
        rows.push(row);
    }
    if rows.is_empty() {
        bail!("the file has a header but no data rows");
    }
    Table::from_rows(headers, rows)
}

/// JSON input in one of three shapes: an array of row arrays, an array of objects
/// (one per row, keys are column names), or `{"columns": [...], "rows": [[...]]}`.
pub fn parse_json(text: &str) -> Result<Table> {
    let value: Value = serde_json::from_str(text).context("invalid JSON")?;
    match value {
        Value::Array(items) if items.iter().all(Value::is_array) => {
            let rows = items
                .iter()
                .enumerate()
                .map(|(i, r)| json_row(r, i))
                .collect::<Result<Vec<_>>>()?;
            let width = rows.first().map(Vec::len).unwrap_or(0);
            Table::from_rows(default_headers(width), rows)
        }
        Value::Array(items) if items.iter().all(Value::is_object) => {
            let headers: Vec<String> = match items.first() {
                Some(Value::Object(first)) => first.keys().cloned().collect(),
                _ => bail!("the JSON array is empty"),
            };
            let rows = items
                .iter()
                .enumerate()
                .map(|(i, obj)| {
                    headers
                        .iter()
                        .map(|h| json_cell(obj.get(h).unwrap_or(&Value::Null), i, h))
                        .collect::<Result<Vec<f64>>>()
                })
                .collect::<Result<Vec<_>>>()?;
            Table::from_rows(headers, rows)
        }
        Value::Object(map) => {
            let rows = map
                .get("rows")
                .and_then(Value::as_array)
                .ok_or_else(|| anyhow!("expected a `rows` array"))?
                .iter()
                .enumerate()
                .map(|(i, r)| json_row(r, i))
                .collect::<Result<Vec<_>>>()?;
            let width = rows.first().map(Vec::len).unwrap_or(0);
            let headers = match map.get("columns").and_then(Value::as_array) {
                Some(cols) => cols
                    .iter()
                    .map(|c| c.as_str().map(str::to_string).ok_or_else(|| anyhow!("column names must be strings")))
                    .collect::<Result<Vec<_>>>()?,
                None => default_headers(width),
            };
            Table::from_rows(headers, rows)
        }
        _ => bail!("unsupported JSON layout"),
    }
}

fn json_row(row: &Value, i: usize) -> Result<Vec<f64>> {
    row.as_array()
        .ok_or_else(|| anyhow!("row {} is not an array", i + 1))?
        .iter()
        .enumerate()
        .map(|(j, v)| json_cell(v, i, &format!("V{}", j + 1)))
        .collect()
}

fn json_cell(v: &Value, row: usize, column: &str) -> Result<f64> {
    match v {
        Value::Null => Ok(f64::NAN),
        Value::Number(n) => n.as_f64().ok_or_else(|| anyhow!("row {}: bad number in {}", row + 1, column)),
        Value::String(s) => parse_cell(s).ok_or_else(|| anyhow!("row {}: `{}` in {} is not a number", row + 1, s, column)),
        Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
        _ => bail!("row {}: nested value in {}", row + 1, column),
    }
}

fn default_headers(n: usize) -> Vec<String> {
    (1..=n).map(|i| format!("V{i}")).collect()
}

/// Number, NaN for a missing marker, `None` for anything else.
fn parse_cell(cell: &str) -> Option<f64> {
    let c = cell.trim().trim_matches('"');
    match c {
        "" | "NA" | "na" | "NaN" | "nan" | "." | "null" => Some(f64::NAN),
        _ => c.parse::<f64>().ok(),
    }
}

/// Split one line, honouring double-quoted fields.
fn split_line(line: &str, delimiter: char) -> Vec<String> {
    let mut cells = Vec::new();
    let mut cur = String::new();
    let mut quoted = false;
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' if quoted && chars.peek() == Some(&'"') => {
                cur.push('"');
                chars.next();
            }
            '"' => quoted = !quoted,
            c if c == delimiter && !quoted => cells.push(std::mem::take(&mut cur)),
            c => cur.push(c),
        }
    }
    cells.push(cur);
    cells
}

impl Table {
    fn from_rows(headers: Vec<String>, rows: Vec<Vec<f64>>) -> Result<Self> {
        if let Some((i, r)) = rows.iter().enumerate().find(|(_, r)| r.len() != headers.len()) {
            bail!("row {} has {} values, expected {}", i + 1, r.len(), headers.len());
        }
        let columns = (0..headers.len())
            .map(|j| rows.iter().map(|r| r[j]).collect())
            .collect();
        Ok(Self { headers, columns })
    }

    pub fn nrows(&self) -> usize {
        self.columns.first().map(Vec::len).unwrap_or(0)
    }

    fn index_of(&self, name: &str) -> Result<usize> {
        self.headers
            .iter()
            .position(|h| h == name)
            .or_else(|| {
                // Fall back to 1-based positions.
                name.parse::<usize>()
                    .ok()
                    .filter(|&i| i >= 1 && i <= self.headers.len())
                    .map(|i| i - 1)
            })
            .ok_or_else(|| {
                anyhow!(
                    "no column named `{}` (available: {})",
                    name,
                    self.headers.join(", ")
                )
            })
    }

    /// Keep `names` in the given order; an empty list keeps everything.
    pub fn select(&self, names: &[String]) -> Result<Table> {
        if names.is_empty() {
            return Ok(self.clone());
        }
        let idx = names
            .iter()
            .map(|n| self.index_of(n))
            .collect::<Result<Vec<_>>>()?;
        Ok(Table {
            headers: idx.iter().map(|&i| self.headers[i].clone()).collect(),
            columns: idx.iter().map(|&i| self.columns[i].clone()).collect(),
        })
    }

    pub fn column(&self, name: &str) -> Result<&[f64]> {
        Ok(&self.columns[self.index_of(name)?])
    }

    pub fn to_matrix(&self) -> Result<DataMatrix> {
        let m = DataMatrix::from_columns(self.columns.clone())?.with_names(self.headers.clone())?;
        Ok(m)
    }

    /// Every column as one group, with missing cells (ragged padding) removed.
    pub fn groups(&self) -> Vec<Vec<f64>> {
        self.columns
            .iter()
            .map(|c| c.iter().copied().filter(|v| v.is_finite()).collect())
            .collect()
    }

    /// Long format: split `value` by the distinct codes of `by`, in first-seen order.
    pub fn groups_by(&self, value: &str, by: &str) -> Result<Vec<(String, Vec<f64>)>> {
        let values = self.column(value)?;
        let codes = self.column(by)?;
        let mut groups: Vec<(f64, Vec<f64>)> = Vec::new();
        for (&v, &code) in values.iter().zip(codes) {
            if !v.is_finite() || !code.is_finite() {
                continue;
            }
            match groups.iter_mut().find(|(c, _)| *c == code) {
                Some((_, g)) => g.push(v),
                None => groups.push((code, vec![v])),
            }
        }
        Ok(groups
            .into_iter()
            .map(|(code, g)| (format!("{by}={code}"), g))
            .collect())
    }

    /// Two columns as paired samples; rows missing either value are dropped.
    pub fn paired(&self, a: &str, b: &str) -> Result<(Vec<f64>, Vec<f64>)> {
        let (x, y) = (self.column(a)?, self.column(b)?);
        Ok(x.iter()
            .zip(y)
            .filter(|(p, q)| p.is_finite() && q.is_finite())
            .map(|(p, q)| (*p, *q))
            .unzip())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_with_header_quotes_and_missing() {
        let t = parse_delimited("\"Q1\",\"Q, 2\"\n1,2\n3,NA\n\n5,6\n", ',').unwrap();
        assert_eq!(t.headers, vec!["Q1", "Q, 2"]);
        assert_eq!(t.columns[0], vec![1.0, 3.0, 5.0]);
        assert!(t.columns[1][1].is_nan());
    }

    #[test]
    fn headerless_tsv_gets_default_names() {
        let t = parse_auto("1\t2\n3\t4\n").unwrap();
        assert_eq!(t.headers, vec!["V1", "V2"]);
        assert_eq!(t.nrows(), 2);
    }

    #[test]
    fn bad_cells_and_ragged_lines_are_reported() {
        let err = parse_delimited("a,b\n1,x\n", ',').unwrap_err();
        assert!(err.to_string().contains("line 2"));
        let err = parse_delimited("a,b\n1,2,3\n", ',').unwrap_err();
        assert!(err.to_string().contains("expected 2 fields"));
    }

    #[test]
    fn json_layouts() {
        let t = parse_json("[[1, 2], [3, null]]").unwrap();
        assert_eq!(t.headers, vec!["V1", "V2"]);
        assert!(t.columns[1][1].is_nan());

        let t = parse_json(r#"{"columns": ["x", "y"], "rows": [[1, 2], [3, 4]]}"#).unwrap();
        assert_eq!(t.column("y").unwrap(), &[2.0, 4.0]);

        let t = parse_json(r#"[{"a": 1, "b": "2"}, {"a": 3, "b": "NA"}]"#).unwrap();
        assert_eq!(t.column("a").unwrap(), &[1.0, 3.0]);
    }

    #[test]
    fn selection_groups_and_pairs() {
        let t = parse_delimited("g,score,pre\n1,10,9\n2,12,\n1,11,10\n2,15,13\n", ',').unwrap();
        let sel = t.select(&["score".into(), "1".into()]).unwrap();
        assert_eq!(sel.headers, vec!["score", "g"]);
        assert!(t.select(&["nope".into()]).is_err());

        let groups = t.groups_by("score", "g").unwrap();
        assert_eq!(groups[0], ("g=1".to_string(), vec![10.0, 11.0]));
        assert_eq!(groups[1].1, vec![12.0, 15.0]);

        let (a, b) = t.paired("score", "pre").unwrap();
        assert_eq!(a, vec![10.0, 11.0, 15.0]);
        assert_eq!(b, vec![9.0, 10.0, 13.0]);

        let wide = parse_delimited("a,b\n1,4\n2,\n", ',').unwrap();
        assert_eq!(wide.groups(), vec![vec![1.0, 2.0], vec![4.0]]);
    }

    #[test]
    fn reads_files_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scores.tsv");
        fs::write(&path, "a\tb\n1\t2\n").unwrap();
        let t = read_table(path.to_str().unwrap()).unwrap();
        assert_eq!(t.to_matrix().unwrap().names(), &["a".to_string(), "b".to_string()]);
        assert!(read_table("/nonexistent/file.csv").is_err());
    }
}
