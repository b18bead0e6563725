//! Table and JSON rendering of command results.

use comfy_table::modifiers::{UTF8_ROUND_CORNERS, UTF8_SOLID_INNER_BORDERS};
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};
use polars::prelude::{AnyValue, DataFrame};
use serde_json::{Map, Value, json};

use nps_engine::{Capabilities, EnrichmentReport};
use nps_ingest::any_to_string;
use nps_model::{Relation, SummaryRow};

pub fn summary_table(rows: &[SummaryRow], by_stream: bool) -> Table {
    let mut table = Table::new();
    let mut header = vec![header_cell("Category")];
    if by_stream {
        header.push(header_cell("Stream"));
    }
    header.extend(
        ["N", "Mean z", "SD z", "Mean %ile", "Min %ile", "Max %ile"]
            .into_iter()
            .map(header_cell),
    );
    table.set_header(header);
    apply_table_style(&mut table);

    let first_numeric = if by_stream { 2 } else { 1 };
    for index in first_numeric..first_numeric + 6 {
        align_column(&mut table, index, CellAlignment::Right);
    }

    for row in rows {
        let mut cells = vec![Cell::new(&row.category)];
        if by_stream {
            cells.push(match row.stream {
                Some(stream) => Cell::new(stream),
                None => dim_cell("-"),
            });
        }
        cells.push(if row.is_empty() {
            dim_cell(row.count)
        } else {
            Cell::new(row.count)
        });
        for value in [
            row.mean_z,
            row.sd_z,
            row.mean_percentile,
            row.min_percentile,
            row.max_percentile,
        ] {
            cells.push(number_cell(value));
        }
        table.add_row(cells);
    }
    table
}

pub fn relations_table(relations: &[Relation]) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Relation"),
        header_cell("Format"),
        header_cell("Source"),
        header_cell("Registered"),
    ]);
    apply_table_style(&mut table);
    for relation in relations {
        let format = match relation.fallback_from {
            Some(original) => Cell::new(format!("{} (fallback from {original})", relation.format))
                .fg(Color::Yellow),
            None => Cell::new(relation.format),
        };
        table.add_row(vec![
            Cell::new(&relation.name)
                .fg(Color::Blue)
                .add_attribute(Attribute::Bold),
            format,
            Cell::new(relation.path.display()),
            Cell::new(relation.registered_at.format("%Y-%m-%d %H:%M:%S")),
        ]);
    }
    table
}

/// Enrichment outcome per stream, with unmapped-key counts.
pub fn enrichment_table(reports: &[EnrichmentReport]) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Stream"),
        header_cell("View"),
        header_cell("Unmapped keys"),
        header_cell("Unkeyed rows"),
        header_cell("Examples"),
    ]);
    apply_table_style(&mut table);
    align_column(&mut table, 2, CellAlignment::Right);
    align_column(&mut table, 3, CellAlignment::Right);
    for report in reports {
        let examples: Vec<&str> = report
            .unmapped
            .iter()
            .take(5)
            .map(|key| key.key.as_str())
            .collect();
        table.add_row(vec![
            Cell::new(report.stream),
            Cell::new(&report.view),
            if report.unmapped.is_empty() {
                dim_cell(0)
            } else {
                Cell::new(report.unmapped.len()).fg(Color::Yellow)
            },
            if report.unkeyed_rows == 0 {
                dim_cell(0)
            } else {
                Cell::new(report.unkeyed_rows).fg(Color::Yellow)
            },
            if examples.is_empty() {
                dim_cell("-")
            } else {
                Cell::new(examples.join(", "))
            },
        ]);
    }
    table
}

pub fn frame_table(frame: &DataFrame) -> Table {
    let mut table = Table::new();
    let header: Vec<Cell> = frame
        .get_column_names()
        .into_iter()
        .map(|name| header_cell(name.as_str()))
        .collect();
    table.set_header(header);
    apply_table_style(&mut table);
    for idx in 0..frame.height() {
        let row: Vec<Cell> = frame
            .get_columns()
            .iter()
            .map(|column| match column.get(idx) {
                Ok(AnyValue::Null) | Err(_) => dim_cell("null"),
                Ok(value) => Cell::new(any_to_string(value)),
            })
            .collect();
        table.add_row(row);
    }
    table
}

pub fn capabilities_line(capabilities: &Capabilities) -> String {
    let names: Vec<&str> = capabilities.iter().map(|c| c.as_str()).collect();
    if names.is_empty() {
        "Capabilities: none (row-text only)".to_string()
    } else {
        format!("Capabilities: {}", names.join(", "))
    }
}

/// Rows of a frame as JSON objects keyed by column name.
pub fn frame_json(frame: &DataFrame) -> Value {
    let rows: Vec<Value> = (0..frame.height())
        .map(|idx| {
            let mut object = Map::new();
            for column in frame.get_columns() {
                let value = column.get(idx).map_or(Value::Null, any_to_json);
                object.insert(column.name().to_string(), value);
            }
            Value::Object(object)
        })
        .collect();
    Value::Array(rows)
}

fn any_to_json(value: AnyValue<'_>) -> Value {
    match value {
        AnyValue::Null => Value::Null,
        AnyValue::Boolean(v) => json!(v),
        AnyValue::Int8(v) => json!(v),
        AnyValue::Int16(v) => json!(v),
        AnyValue::Int32(v) => json!(v),
        AnyValue::Int64(v) => json!(v),
        AnyValue::UInt8(v) => json!(v),
        AnyValue::UInt16(v) => json!(v),
        AnyValue::UInt32(v) => json!(v),
        AnyValue::UInt64(v) => json!(v),
        AnyValue::Float32(v) => json!(v),
        AnyValue::Float64(v) => json!(v),
        other => Value::String(any_to_string(other)),
    }
}

fn number_cell(value: Option<f64>) -> Cell {
    match value {
        Some(v) => Cell::new(format!("{v:.2}")),
        None => dim_cell("-"),
    }
}

fn apply_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .apply_modifier(UTF8_SOLID_INNER_BORDERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
}

fn align_column(table: &mut Table, index: usize, alignment: CellAlignment) {
    if let Some(column) = table.column_mut(index) {
        column.set_cell_alignment(alignment);
    }
}

fn header_cell(label: &str) -> Cell {
    Cell::new(label)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
}

fn dim_cell<T: ToString>(value: T) -> Cell {
    Cell::new(value).fg(Color::DarkGrey)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nps_model::Stream;
    use polars::prelude::df;

    fn row(category: &str, count: i64, mean: Option<f64>) -> SummaryRow {
        SummaryRow {
            category: category.to_string(),
            stream: Some(Stream::Cognitive),
            count,
            mean_z: mean.map(|m| (m - 50.0) / 34.0),
            sd_z: None,
            mean_percentile: mean,
            min_percentile: mean,
            max_percentile: mean,
        }
    }

    #[test]
    fn test_summary_table_shape() {
        let rows = vec![row("Attention", 2, Some(67.0)), row("Memory", 0, None)];
        let mut table = summary_table(&rows, true);
        assert_eq!(table.column_count(), 8);
        let text = table.to_string();
        assert!(text.contains("Attention"));
        assert!(text.contains("67.00"));
        assert!(text.contains("neurocog"));
    }

    #[test]
    fn test_frame_json() {
        let frame = df!(
            "scale" => ["Digit Span", "Coding"],
            "percentile" => [Some(50i64), None]
        )
        .unwrap();
        assert_eq!(
            frame_json(&frame),
            json!([
                {"scale": "Digit Span", "percentile": 50},
                {"scale": "Coding", "percentile": null}
            ])
        );
    }

    #[test]
    fn test_frame_table_marks_nulls() {
        let frame = df!("domain" => [None::<&str>, Some("Memory")]).unwrap();
        let text = frame_table(&frame).to_string();
        assert!(text.contains("null"));
        assert!(text.contains("Memory"));
    }
}
