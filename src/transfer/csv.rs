use csv::{QuoteStyle, ReaderBuilder, StringRecord, Terminator, Trim, WriterBuilder};
use thiserror::Error;

use crate::location::TrackPoint;

pub const HEADERS: [&str; 9] = [
    "timestamp",
    "latitude",
    "longitude",
    "altitude",
    "speed",
    "course",
    "horizontalAccuracy",
    "verticalAccuracy",
    "speedAccuracy",
];

/// The first three headers must be present and numeric on every row.
const REQUIRED: usize = 3;
const MISSING: f64 = -1.0;

#[derive(Debug, Error)]
pub enum CsvError {
    #[error("file has no header row")]
    Empty,
    #[error("missing required column {0}")]
    MissingColumn(&'static str),
    #[error("line #{line}: '{row}' doesn't have a required number value of {column}")]
    InvalidValue {
        line: u64,
        column: &'static str,
        row: String,
    },
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

fn cells(p: &TrackPoint) -> [String; 9] {
    [
        p.timestamp.to_string(),
        p.latitude.to_string(),
        p.longitude.to_string(),
        p.altitude.to_string(),
        p.speed.to_string(),
        p.course.to_string(),
        p.horizontal_accuracy.to_string(),
        p.vertical_accuracy.to_string(),
        p.speed_accuracy.to_string(),
    ]
}

/// Header plus one row per point, joined by `\n` with no trailing newline.
pub fn render(points: &[TrackPoint]) -> Result<String, CsvError> {
    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::Never)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    writer.write_record(HEADERS)?;
    for point in points {
        writer.write_record(cells(point))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))?;
    let mut content = String::from_utf8_lossy(&bytes).into_owned();
    if content.ends_with('\n') {
        content.pop();
    }
    Ok(content)
}

/// Parses a whole file. Columns are matched by header name, so extra or
/// reordered columns are fine. Optional columns default to `-1`.
pub fn parse(content: &str) -> Result<Vec<TrackPoint>, CsvError> {
    let mut reader = ReaderBuilder::new()
        .quoting(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(content.as_bytes());

    let header = reader.headers()?.clone();
    if header.iter().all(str::is_empty) {
        return Err(CsvError::Empty);
    }

    let columns: Vec<Option<usize>> = HEADERS
        .iter()
        .map(|name| header.iter().position(|h| h == *name))
        .collect();
    if let Some(idx) = columns[..REQUIRED].iter().position(Option::is_none) {
        return Err(CsvError::MissingColumn(HEADERS[idx]));
    }

    let mut points = Vec::new();
    for record in reader.records() {
        let record = record?;
        if record.iter().all(str::is_empty) {
            continue;
        }
        points.push(to_point(&record, &columns)?);
    }

    Ok(points)
}

fn to_point(record: &StringRecord, columns: &[Option<usize>]) -> Result<TrackPoint, CsvError> {
    let mut values = [MISSING; HEADERS.len()];

    for (header_idx, column) in columns.iter().enumerate() {
        let value = column
            .and_then(|c| record.get(c))
            .and_then(parse_number);
        match value {
            Some(v) => values[header_idx] = v,
            None if header_idx < REQUIRED => {
                return Err(CsvError::InvalidValue {
                    line: record.position().map(|p| p.line()).unwrap_or(0),
                    column: HEADERS[header_idx],
                    row: record.iter().collect::<Vec<_>>().join(","),
                });
            }
            None => {}
        }
    }

    Ok(TrackPoint {
        timestamp: values[0],
        latitude: values[1],
        longitude: values[2],
        altitude: values[3],
        speed: values[4],
        course: values[5],
        horizontal_accuracy: values[6],
        vertical_accuracy: values[7],
        speed_accuracy: values[8],
    })
}

fn parse_number(cell: &str) -> Option<f64> {
    cell.parse::<f64>().ok().filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_matches_file_format() {
        assert_eq!(
            render(&[]).unwrap(),
            "timestamp,latitude,longitude,altitude,speed,course,horizontalAccuracy,verticalAccuracy,speedAccuracy"
        );
    }

    #[test]
    fn rows_use_header_order() {
        let point = TrackPoint {
            timestamp: 1665849600.5,
            latitude: 37.3842192,
            longitude: -122.0267635,
            altitude: 12.0,
            speed: 1.25,
            speed_accuracy: 0.5,
            course: 270.0,
            horizontal_accuracy: 4.0,
            vertical_accuracy: 3.0,
        };
        let content = render(&[point, point]).unwrap();
        let lines: Vec<&str> = content.split('\n').collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1], "1665849600.5,37.3842192,-122.0267635,12,1.25,270,4,3,0.5");
        assert!(!content.ends_with('\n'));
    }

    #[test]
    fn reordered_and_extra_columns_are_matched_by_name() {
        let content = "longitude,note,timestamp,latitude,speed\r\n2.5,hello,100,1.5,3\r\n";
        let points = parse(content).unwrap();
        assert_eq!(points.len(), 1);
        let p = points[0];
        assert_eq!((p.timestamp, p.latitude, p.longitude), (100.0, 1.5, 2.5));
        assert_eq!(p.speed, 3.0);
        assert_eq!(p.altitude, -1.0);
        assert_eq!(p.horizontal_accuracy, -1.0);
    }

    #[test]
    fn non_numeric_optional_value_defaults() {
        let points = parse("timestamp,latitude,longitude,altitude\n1,2,3,n/a\n4,5,6").unwrap();
        assert_eq!(points[0].altitude, -1.0);
        assert_eq!(points[1].altitude, -1.0);
    }

    #[test]
    fn missing_required_column_is_rejected() {
        let err = parse("timestamp,latitude,altitude\n1,2,3").unwrap_err();
        assert!(matches!(err, CsvError::MissingColumn("longitude")));
    }

    #[test]
    fn bad_required_value_reports_line() {
        let err = parse("timestamp,latitude,longitude\n1,2,3\n\n4,x,6").unwrap_err();
        match err {
            CsvError::InvalidValue { line, column, row } => {
                assert_eq!(line, 4);
                assert_eq!(column, "latitude");
                assert_eq!(row, "4,x,6");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn rendered_rows_parse_back() {
        let point = TrackPoint {
            timestamp: 1665849600.123456,
            latitude: -33.8688,
            longitude: 151.2093,
            altitude: -1.0,
            speed: 0.0,
            speed_accuracy: -1.0,
            course: 359.9,
            horizontal_accuracy: 65.0,
            vertical_accuracy: 10.0,
        };
        assert_eq!(parse(&render(&[point]).unwrap()).unwrap(), vec![point]);
    }

    #[test]
    fn short_row_counts_as_missing_value() {
        assert!(parse("timestamp,latitude,longitude\n1,2").is_err());
    }

    #[test]
    fn empty_content_has_no_header() {
        assert!(matches!(parse("\n\n"), Err(CsvError::Empty)));
        assert!(parse(&HEADERS.join(",")).unwrap().is_empty());
    }
}
