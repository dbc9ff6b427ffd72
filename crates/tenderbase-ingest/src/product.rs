//! Product record parser.
//!
//! Same contract as the contract parser: one validated intermediate
//! [`ProductRecord`] or a [`SkipReason`] per row, business keys only.

use std::fs::File;
use std::path::Path;

use csv::StringRecord;

use tenderbase_model::entities::{MAX_KPGZ, MAX_NAME, MAX_VALUE};

use crate::error::{IngestError, SkipReason};
use crate::fields::{char_len, clean_text, required_text};
use crate::json::{decode_items, int_field, text_field};

// Positional column layout of the product extract.
const COL_EXTERNAL_ID: usize = 0;
const COL_NAME: usize = 1;
const COL_CATEGORY_TITLE: usize = 2;
const COL_CATEGORY_KPGZ: usize = 3;
const COL_PROPERTIES_JSON: usize = 4;
const COLUMNS: usize = 5;

/// One property descriptor as it appears in the embedded JSON.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawProperty {
    pub external_id: i64,
    pub name: String,
    pub value: String,
}

/// A validated product row, references still unresolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductRecord {
    pub external_id: i64,
    pub name: String,
    pub category_title: String,
    pub category_kpgz: String,
    pub properties: Vec<RawProperty>,
}

fn parse_properties(raw: &str) -> Result<Vec<RawProperty>, SkipReason> {
    let items = decode_items(raw)?;
    let mut properties = Vec::with_capacity(items.len());
    for obj in &items {
        let Some(id) = int_field(obj, "id") else {
            continue;
        };
        let Some(name) = text_field(obj, "name") else {
            continue;
        };
        let Some(value) = text_field(obj, "value") else {
            continue;
        };
        if id <= 0
            || name.is_empty()
            || char_len(&name) > MAX_NAME
            || char_len(&value) > MAX_VALUE
        {
            continue;
        }
        properties.push(RawProperty {
            external_id: id,
            name,
            value,
        });
    }
    Ok(properties)
}

/// Validate one product row. Every early return is a countable skip.
pub fn parse_product_row(row: &StringRecord) -> Result<ProductRecord, SkipReason> {
    if row.len() < COLUMNS {
        return Err(SkipReason::MissingField);
    }

    let external_raw = clean_text(&row[COL_EXTERNAL_ID]);
    if external_raw.is_empty() {
        return Err(SkipReason::MissingField);
    }
    let external_id: i64 = external_raw.parse().map_err(|_| SkipReason::BadNumber)?;
    if external_id <= 0 {
        return Err(SkipReason::NonPositive);
    }

    let name = required_text(row, COL_NAME, MAX_NAME)?;
    let category_title = required_text(row, COL_CATEGORY_TITLE, MAX_NAME)?;
    let category_kpgz = required_text(row, COL_CATEGORY_KPGZ, MAX_KPGZ)?;

    let properties = parse_properties(&row[COL_PROPERTIES_JSON])?;
    if properties.is_empty() {
        return Err(SkipReason::NoValidItems);
    }

    Ok(ProductRecord {
        external_id,
        name,
        category_title,
        category_kpgz,
        properties,
    })
}

/// Forward-only reader over the product extract. Not restartable.
pub struct ProductReader {
    inner: csv::Reader<File>,
    row: StringRecord,
    line: u64,
}

impl ProductReader {
    pub fn open(path: &Path) -> Result<Self, IngestError> {
        let file = File::open(path)?;
        let inner = csv::ReaderBuilder::new()
            .delimiter(b';')
            .has_headers(true)
            .flexible(true)
            .from_reader(file);
        Ok(Self {
            inner,
            row: StringRecord::new(),
            line: 0,
        })
    }

    /// Next row as a parse outcome, `None` at end of stream.
    pub fn next_row(&mut self) -> Result<Option<Result<ProductRecord, SkipReason>>, IngestError> {
        match self.inner.read_record(&mut self.row) {
            Ok(false) => Ok(None),
            Ok(true) => {
                self.line = self.row.position().map_or(0, |p| p.line());
                Ok(Some(parse_product_row(&self.row)))
            }
            Err(e) if e.is_io_error() => Err(e.into()),
            Err(e) => {
                self.line = e.position().map_or(0, |p| p.line());
                Ok(Some(Err(SkipReason::BadRow)))
            }
        }
    }

    /// Line on which the most recently read record starts. Quoted fields
    /// may span several physical lines; this always reports the first.
    pub fn line(&self) -> u64 {
        self.line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(fields: &[&str]) -> StringRecord {
        StringRecord::from(fields.to_vec())
    }

    fn valid_row() -> Vec<String> {
        vec![
            "1001".to_string(),
            "Бумага офисная А4".to_string(),
            "Бумага и канцелярия".to_string(),
            "01.15.02.11".to_string(),
            r#"[{"id": 7, "name": "Плотность", "value": "80 г/м2"}]"#.to_string(),
        ]
    }

    fn parse(fields: Vec<String>) -> Result<ProductRecord, SkipReason> {
        let fields: Vec<&str> = fields.iter().map(String::as_str).collect();
        parse_product_row(&row(&fields))
    }

    #[test]
    fn valid_row_parses() {
        let record = parse(valid_row()).unwrap();
        assert_eq!(record.external_id, 1001);
        assert_eq!(record.category_kpgz, "01.15.02.11");
        assert_eq!(record.properties.len(), 1);
        assert_eq!(record.properties[0].name, "Плотность");
        assert_eq!(record.properties[0].value, "80 г/м2");
    }

    #[test]
    fn non_positive_external_id_is_skipped() {
        let mut fields = valid_row();
        fields[COL_EXTERNAL_ID] = "0".to_string();
        assert_eq!(parse(fields), Err(SkipReason::NonPositive));

        let mut fields = valid_row();
        fields[COL_EXTERNAL_ID] = "abc".to_string();
        assert_eq!(parse(fields), Err(SkipReason::BadNumber));
    }

    #[test]
    fn oversized_kpgz_is_skipped() {
        let mut fields = valid_row();
        fields[COL_CATEGORY_KPGZ] = "0".repeat(33);
        assert_eq!(parse(fields), Err(SkipReason::TooLong));
    }

    #[test]
    fn property_values_are_cleaned() {
        let mut fields = valid_row();
        fields[COL_PROPERTIES_JSON] =
            r#"[{"id": 7, "name": " \"Цвет\" ", "value": " белый "}]"#.to_string();
        let record = parse(fields).unwrap();
        assert_eq!(record.properties[0].name, "Цвет");
        assert_eq!(record.properties[0].value, "белый");
    }

    #[test]
    fn invalid_properties_are_filtered() {
        let mut fields = valid_row();
        fields[COL_PROPERTIES_JSON] = format!(
            r#"[
                {{"id": 0, "name": "a", "value": "v"}},
                {{"id": 2, "value": "v"}},
                {{"id": 3, "name": "b", "value": "{}"}},
                {{"id": 4, "name": "ok", "value": "v"}}
            ]"#,
            "x".repeat(256)
        );
        let record = parse(fields).unwrap();
        assert_eq!(record.properties.len(), 1);
        assert_eq!(record.properties[0].external_id, 4);
    }

    #[test]
    fn empty_or_all_invalid_properties_skip_the_row() {
        let mut fields = valid_row();
        fields[COL_PROPERTIES_JSON] = "[]".to_string();
        assert_eq!(parse(fields), Err(SkipReason::NoValidItems));

        let mut fields = valid_row();
        fields[COL_PROPERTIES_JSON] = r#"[{"id": -1, "name": "a", "value": "v"}]"#.to_string();
        assert_eq!(parse(fields), Err(SkipReason::NoValidItems));
    }

    #[test]
    fn malformed_properties_json_skips_the_row() {
        let mut fields = valid_row();
        fields[COL_PROPERTIES_JSON] = "not json".to_string();
        assert_eq!(parse(fields), Err(SkipReason::BadJson));
    }
}
