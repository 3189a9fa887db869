//! CSV source: one POI per row, columns mapped by [`CsvColumns`].
//!
//! Rows are streamed from the reader, so arbitrarily large files are
//! imported with bounded memory. Columns not mapped to a POI field become
//! attributes (empty values are dropped). Decimal commas are accepted in
//! coordinate columns.

use std::collections::BTreeMap;
use std::io::Read;

use equity_map_city_models::{Coordinate, CsvColumns};
use equity_map_poi_models::{Accessibility, PoiRecord, RejectedRecord, Wheelchair};

use crate::{PoiError, rejected};

const DEFAULT_NAME: &str = "Unknown";
const WHEELCHAIR_COLUMN: &str = "wheelchair";

/// Column positions resolved from the header row.
struct ColumnIndexes {
    name: Option<usize>,
    lat: Option<usize>,
    lng: Option<usize>,
    address: Option<usize>,
    id: Option<usize>,
    wheelchair: Option<usize>,
}

/// Reads POI records for `layer` from CSV data.
///
/// Each item is either a record or a [`RejectedRecord`] for a row that
/// could not be read or whose coordinate is not a number. Rows with an
/// empty or zero coordinate are returned with `coordinate: None` and are
/// rejected by validation during import.
///
/// # Errors
///
/// Returns [`PoiError::Csv`] if the header row cannot be read.
pub fn read_records<R: Read>(
    reader: R,
    layer: &str,
    columns: &CsvColumns,
) -> Result<impl Iterator<Item = Result<PoiRecord, RejectedRecord>>, PoiError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers: Vec<String> = csv_reader
        .headers()?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').to_string())
        .collect();
    let position = |name: &str| headers.iter().position(|h| h == name);
    let indexes = ColumnIndexes {
        name: position(&columns.name),
        lat: position(&columns.lat),
        lng: position(&columns.lng),
        address: position(&columns.address),
        id: position(&columns.id),
        wheelchair: position(WHEELCHAIR_COLUMN),
    };

    if indexes.lat.is_none() || indexes.lng.is_none() {
        log::warn!(
            "CSV for layer '{layer}' has no '{}'/'{}' columns; every row will be rejected",
            columns.lat,
            columns.lng
        );
    }

    let layer = layer.to_string();
    Ok(csv_reader
        .into_records()
        .enumerate()
        .map(move |(i, row)| {
            let row_id = format!("row-{}", i + 1);
            let row = row.map_err(|e| rejected(&layer, &row_id, e))?;
            parse_row(&row, &headers, &indexes, &layer, row_id)
        }))
}

fn parse_row(
    row: &csv::StringRecord,
    headers: &[String],
    indexes: &ColumnIndexes,
    layer: &str,
    row_id: String,
) -> Result<PoiRecord, RejectedRecord> {
    let field = |idx: Option<usize>| {
        idx.and_then(|i| row.get(i))
            .filter(|v| !v.is_empty())
            .map(ToString::to_string)
    };

    let source_id = field(indexes.id).unwrap_or(row_id);

    let lat = parse_degrees(field(indexes.lat).as_deref())
        .map_err(|raw| rejected(layer, &source_id, format!("invalid latitude '{raw}'")))?;
    let lng = parse_degrees(field(indexes.lng).as_deref())
        .map_err(|raw| rejected(layer, &source_id, format!("invalid longitude '{raw}'")))?;
    let coordinate = match (lat, lng) {
        (Some(lat), Some(lng)) if lat != 0.0 && lng != 0.0 => Some(Coordinate::new(lat, lng)),
        _ => None,
    };

    let mapped: Vec<usize> = [
        indexes.name,
        indexes.lat,
        indexes.lng,
        indexes.address,
        indexes.id,
        indexes.wheelchair,
    ]
    .into_iter()
    .flatten()
    .collect();
    let attributes: BTreeMap<String, String> = row
        .iter()
        .enumerate()
        .filter(|(i, v)| !mapped.contains(i) && !v.is_empty())
        .filter_map(|(i, v)| headers.get(i).map(|h| (h.clone(), v.to_string())))
        .collect();

    let wheelchair = field(indexes.wheelchair).and_then(|v| v.parse::<Wheelchair>().ok());

    Ok(PoiRecord {
        layer: layer.to_string(),
        name: field(indexes.name).unwrap_or_else(|| DEFAULT_NAME.to_string()),
        source_id,
        coordinate,
        address: field(indexes.address),
        attributes,
        accessibility: Accessibility { wheelchair },
    })
}

/// Parses a degree value, accepting a decimal comma. `Ok(None)` for an
/// absent value, `Err(raw)` for text that is not a number.
fn parse_degrees(raw: Option<&str>) -> Result<Option<f64>, String> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    raw.replace(',', ".")
        .parse::<f64>()
        .map(Some)
        .map_err(|_| raw.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\u{feff}id,name,lat,lng,address,operator,wheelchair\n\
        a1,Spielplatz Luisenpark,49.4790,8.4930,Theodor-Heuss-Anlage,Stadt,yes\n\
        a2,Ohne Koordinaten,,,Somewhere,,\n\
        a3,Kaputt,abc,8.49,,,\n\
        ,Anonymous,\"49,48\",\"8,47\",,,\n\
        a5,Null Island,0,0,,,\n";

    fn read(data: &str) -> Vec<Result<PoiRecord, RejectedRecord>> {
        read_records(data.as_bytes(), "playgrounds", &CsvColumns::default())
            .unwrap()
            .collect()
    }

    #[test]
    fn parses_mapped_columns_and_attributes() {
        let rows = read(SAMPLE);
        let first = rows[0].as_ref().unwrap();
        assert_eq!(first.source_id, "a1");
        assert_eq!(first.name, "Spielplatz Luisenpark");
        assert_eq!(first.coordinate, Some(Coordinate::new(49.479, 8.493)));
        assert_eq!(first.address.as_deref(), Some("Theodor-Heuss-Anlage"));
        assert_eq!(first.attributes.get("operator").map(String::as_str), Some("Stadt"));
        assert_eq!(first.attributes.len(), 1);
        assert_eq!(first.accessibility.wheelchair, Some(Wheelchair::Yes));
    }

    #[test]
    fn missing_coordinates_pass_through_as_none() {
        let rows = read(SAMPLE);
        assert_eq!(rows[1].as_ref().unwrap().coordinate, None);
        assert_eq!(rows[4].as_ref().unwrap().coordinate, None);
    }

    #[test]
    fn unparseable_coordinate_is_rejected_with_source_id() {
        let rows = read(SAMPLE);
        let err = rows[2].as_ref().unwrap_err();
        assert_eq!(err.source_id, "a3");
        assert!(err.reason.contains("latitude"));
    }

    #[test]
    fn falls_back_to_row_number_and_decimal_comma() {
        let rows = read(SAMPLE);
        let anon = rows[3].as_ref().unwrap();
        assert_eq!(anon.source_id, "row-4");
        assert_eq!(anon.coordinate, Some(Coordinate::new(49.48, 8.47)));
    }

    #[test]
    fn custom_column_names() {
        let data = "objekt_id;bezeichnung;breite;laenge\n";
        let columns = CsvColumns {
            name: "bezeichnung".to_string(),
            lat: "breite".to_string(),
            lng: "laenge".to_string(),
            address: "standort".to_string(),
            id: "objekt_id".to_string(),
        };
        // Comma-delimited data with German headers.
        let data = data.replace(';', ",") + "TB-1,Marktbrunnen,49.872,8.651\n";
        let rows: Vec<_> = read_records(data.as_bytes(), "drinking-water", &columns)
            .unwrap()
            .collect();
        let rec = rows[0].as_ref().unwrap();
        assert_eq!(rec.source_id, "TB-1");
        assert_eq!(rec.name, "Marktbrunnen");
        assert_eq!(rec.layer, "drinking-water");
    }
}
