//! Downloaded spreadsheet → normalized report rows.
//!
//! The portal exports an `.xlsx` with Finnish column headers. The first
//! worksheet's first row is the header row; headers are matched exactly
//! (including accented and symbol characters) against [`COLUMN_MAP`] and
//! renamed to stable field names. Columns outside the map are ignored,
//! mapped columns are never dropped, and row order is preserved.

use anyhow::{Context, Result};
use calamine::{open_workbook, Data, Reader, Xlsx};
use serde_json::{Map, Value};
use std::path::Path;

/// Source column header → output field name.
pub const COLUMN_MAP: &[(&str, &str)] = &[
    ("Ajankohta", "time"),
    ("Osoite", "address"),
    ("Tila", "state"),
    ("Kokonaissiirto (kWh)", "fullDistributionKwh"),
    ("Laskutettava kulutus (kWh)", "invoicedConsumptionKwh"),
    ("Yleissiirto (kWh)", "generalDistributionKWh"),
    ("Kokonaismaksu (€)", "fullPriceEur"),
    ("Sähkövero, ALV 0 (€)", "electricityTaxVat0Eur"),
    ("ALV (€)", "valueAddedTax"),
    ("Perusmaksu ALV 0 (€)", "feeVat0Eur"),
    ("Energiamaksu, ALV 0 (€)", "energyPriceVat0Eur"),
    ("Yleissiirto, ALV 0 (€)", "generalDistributionPriceVat0Eur"),
    ("Ulkolämpötila (°C)", "outsideTemp"),
];

/// Field carrying the caller-supplied metering point, merged into every row.
pub const METERING_POINT_FIELD: &str = "meteringPointId";

/// Parse the downloaded report and attach the metering point to every row.
pub fn parse_report(path: &Path, metering_point_id: &str) -> Result<Vec<Value>> {
    let mut workbook: Xlsx<_> = open_workbook(path)
        .with_context(|| format!("failed to open report workbook {}", path.display()))?;
    let range = workbook
        .worksheet_range_at(0)
        .context("report workbook has no sheets")?
        .context("failed to read report sheet")?;

    let mut rows = range.rows();
    let header = rows.next().context("report sheet is empty")?;
    let headers: Vec<String> = header.iter().map(|cell| cell.to_string()).collect();

    map_rows(&headers, rows, metering_point_id)
}

/// Map raw rows onto named-field records under the header row.
pub fn map_rows<'a, I>(headers: &[String], rows: I, metering_point_id: &str) -> Result<Vec<Value>>
where
    I: Iterator<Item = &'a [Data]>,
{
    let fields: Vec<Option<&str>> = headers
        .iter()
        .map(|header| {
            COLUMN_MAP
                .iter()
                .find(|(source, _)| source == header)
                .map(|(_, field)| *field)
        })
        .collect();

    let mut records = Vec::new();
    for row in rows {
        let mut record = Map::new();
        for (index, field) in fields.iter().enumerate() {
            if let Some(field) = field {
                let value = match row.get(index) {
                    Some(cell) => cell_to_json(cell),
                    None => Value::Null,
                };
                record.insert((*field).to_string(), value);
            }
        }
        record.insert(
            METERING_POINT_FIELD.to_string(),
            Value::String(metering_point_id.to_string()),
        );
        records.push(Value::Object(record));
    }
    Ok(records)
}

/// Write the rows as a pretty-printed UTF-8 JSON array.
pub fn write_output(path: &Path, rows: &[Value]) -> Result<()> {
    let json = serde_json::to_string_pretty(rows).context("failed to serialize report rows")?;
    std::fs::write(path, json)
        .with_context(|| format!("failed to write output to {}", path.display()))?;
    Ok(())
}

fn cell_to_json(cell: &Data) -> Value {
    match cell {
        Data::Empty => Value::Null,
        Data::String(s) => Value::String(s.clone()),
        Data::Float(f) => serde_json::json!(f),
        Data::Int(i) => serde_json::json!(i),
        Data::Bool(b) => Value::Bool(*b),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map(|naive| Value::String(naive.format("%Y-%m-%dT%H:%M:%S").to_string()))
            .unwrap_or(Value::Null),
        Data::DateTimeIso(s) => Value::String(s.clone()),
        Data::DurationIso(s) => Value::String(s.clone()),
        Data::Error(e) => Value::String(format!("{e:?}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_maps_and_renames_columns() {
        let headers = headers(&["Ajankohta", "Kokonaissiirto (kWh)", "Ulkolämpötila (°C)"]);
        let rows = vec![
            vec![
                Data::String("1.1.2024 klo 00-01".to_string()),
                Data::Float(0.42),
                Data::Float(-3.5),
            ],
            vec![
                Data::String("1.1.2024 klo 01-02".to_string()),
                Data::Float(0.38),
                Data::Float(-4.0),
            ],
        ];

        let records = map_rows(&headers, rows.iter().map(|r| r.as_slice()), "MP123").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["time"], "1.1.2024 klo 00-01");
        assert_eq!(records[0]["fullDistributionKwh"], 0.42);
        assert_eq!(records[0]["outsideTemp"], -3.5);
        // Row order preserved.
        assert_eq!(records[1]["time"], "1.1.2024 klo 01-02");
    }

    #[test]
    fn test_unmapped_columns_ignored() {
        let headers = headers(&["Ajankohta", "Sisäinen sarake"]);
        let rows = vec![vec![
            Data::String("1.1.2024".to_string()),
            Data::String("ei kiinnosta".to_string()),
        ]];

        let records = map_rows(&headers, rows.iter().map(|r| r.as_slice()), "MP123").unwrap();
        let record = records[0].as_object().unwrap();
        assert!(record.contains_key("time"));
        assert!(!record.values().any(|v| v == "ei kiinnosta"));
    }

    #[test]
    fn test_metering_point_merged_into_every_row() {
        let headers = headers(&["Ajankohta"]);
        let rows = vec![
            vec![Data::String("a".to_string())],
            vec![Data::String("b".to_string())],
        ];

        let records = map_rows(&headers, rows.iter().map(|r| r.as_slice()), "MP-77").unwrap();
        for record in &records {
            assert_eq!(record[METERING_POINT_FIELD], "MP-77");
        }
    }

    #[test]
    fn test_empty_and_short_cells_become_null() {
        let headers = headers(&["Ajankohta", "ALV (€)"]);
        // Second row is shorter than the header row.
        let rows = vec![
            vec![Data::String("a".to_string()), Data::Empty],
            vec![Data::String("b".to_string())],
        ];

        let records = map_rows(&headers, rows.iter().map(|r| r.as_slice()), "MP").unwrap();
        assert_eq!(records[0]["valueAddedTax"], Value::Null);
        assert_eq!(records[1]["valueAddedTax"], Value::Null);
    }

    #[test]
    fn test_output_is_pretty_json_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("output.json");
        let rows = vec![serde_json::json!({ "time": "a", "meteringPointId": "MP" })];

        write_output(&path, &rows).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.starts_with('['));
        assert!(written.contains('\n'));
        let parsed: Vec<Value> = serde_json::from_str(&written).unwrap();
        assert_eq!(parsed, rows);
    }
}
