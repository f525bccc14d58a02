use std::{
    fs::File,
    io::{prelude::*, BufReader, Cursor},
    path::Path,
    str::FromStr,
};

const TEST_DATA_FILENAME: &str = "TEST DATA";

/// How the first line of a tabular input is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Header {
    /// The first line names the columns and is discarded.
    Skip,
    /// Every line is a record.
    Absent,
}

/// Parse the file at the specified path into a stream of `T`.
///
/// Each line is treated as a separate record. Leading and trailing spaces
/// are trimmed before being handed to the parser. Blank lines and lines
/// beginning with `#` are ignored.
///
/// If a record cannot be parsed, this logs the parse error with its file name and
/// line number, and skips it.
///
/// See also [`parse_str`] for equivalent functionality for strings, useful for test data.
pub fn parse<'a, T>(path: &'a Path, header: Header) -> std::io::Result<impl 'a + Iterator<Item = T>>
where
    T: 'a + FromStr,
    <T as FromStr>::Err: std::fmt::Display,
{
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    parse_reader(reader, file_name, header)
}

/// Parse the provided data into a stream of `T`.
///
/// Each line is treated as a separate record. Leading and trailing spaces
/// are trimmed before being handed to the parser. Blank lines and lines
/// beginning with `#` are ignored.
///
/// If a record cannot be parsed, this logs the parse error and skips it.
///
/// See also [`parse`] for equivalent functionality for input files.
pub fn parse_str<'a, T>(data: &'a str, header: Header) -> std::io::Result<impl '_ + Iterator<Item = T>>
where
    T: 'a + FromStr,
    <T as FromStr>::Err: std::fmt::Display,
{
    parse_reader(Cursor::new(data), TEST_DATA_FILENAME, header)
}

/// Parse the contents of the provided reader into a stream of `T`.
///
/// Often [`parse`] or [`parse_str`] are more ergonomic.
///
/// The whole input is read before any record is parsed, so a read failure (including
/// invalid UTF-8) is returned as an error rather than cutting the stream short.
///
/// The file name can technically be anything which is `Display`, but it's used within
/// log messages as the file name, so it should be reasonably interpretable as such.
pub fn parse_reader<'a, T, Reader, Filename>(
    mut reader: Reader,
    file_name: Filename,
    header: Header,
) -> std::io::Result<impl 'a + Iterator<Item = T>>
where
    T: 'a + FromStr,
    <T as FromStr>::Err: std::fmt::Display,
    Reader: Read,
    Filename: std::fmt::Display,
{
    let mut data = String::new();
    reader.read_to_string(&mut data)?;

    let skip = match header {
        Header::Skip => 1,
        Header::Absent => 0,
    };

    let mut records = Vec::new();
    for (idx, raw) in data.lines().enumerate().skip(skip) {
        let record = raw.trim();
        if record.is_empty() || record.starts_with('#') {
            continue;
        }
        match T::from_str(record) {
            Ok(t) => records.push(t),
            Err(e) => {
                tracing::warn!("{}:{}: {} for {:?}; skipping", file_name, idx + 1, e, record);
            }
        }
    }
    Ok(records.into_iter())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, parse_display::FromStr)]
    #[display("{name},{value}")]
    struct Row {
        name: String,
        value: u32,
    }

    #[test]
    fn test_skips_header_and_comments() {
        let data = "name,value\n# a comment\na,1\n\nb,2\n";
        let rows: Vec<Row> = parse_str(data, Header::Skip).unwrap().collect();
        assert_eq!(
            rows,
            vec![
                Row {
                    name: "a".into(),
                    value: 1
                },
                Row {
                    name: "b".into(),
                    value: 2
                },
            ]
        );
    }

    #[test]
    fn test_bad_records_are_skipped_not_fatal() {
        let data = "a,1\nb,not a number\nc,3";
        let rows: Vec<Row> = parse_str(data, Header::Absent).unwrap().collect();
        let names: Vec<_> = rows.iter().map(|row| row.name.as_str()).collect();
        assert_eq!(names, ["a", "c"]);
    }

    #[test]
    fn test_unreadable_input_is_an_error() {
        let data: &[u8] = b"name,value\na,1\nb,\xff\nc,3\n";
        let parsed = parse_reader::<Row, _, _>(data, "bytes", Header::Skip);
        assert_eq!(
            parsed.err().map(|err| err.kind()),
            Some(std::io::ErrorKind::InvalidData)
        );
    }

    #[test]
    fn test_blank_lines_after_header() {
        let data = "name,value\na,1\n\nc,3";
        let rows: Vec<Row> = parse_str(data, Header::Skip).unwrap().collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].value, 3);
    }

    #[test]
    fn test_empty_input() {
        let rows: Vec<Row> = parse_str("", Header::Skip).unwrap().collect();
        assert!(rows.is_empty());
    }
}
