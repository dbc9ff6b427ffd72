//! Contract record parser.
//!
//! Streams the `;`-delimited contract extract and turns each row into a
//! validated intermediate [`ContractRecord`] or a [`SkipReason`]. Records
//! carry business-key strings, not resolved entities; the resolve step
//! runs separately so the identity-map mutation stays visible.

use std::fs::File;
use std::path::Path;

use chrono::{DateTime, NaiveDateTime, Utc};
use csv::StringRecord;
use rust_decimal::Decimal;

use tenderbase_model::entities::{MAX_INN, MAX_KPP, MAX_NAME};

use crate::error::{IngestError, SkipReason};
use crate::fields::{clean_text, required_text};
use crate::json::{decimal_field, decode_items, int_field, parse_decimal};

/// Fixed datetime format of the source dialect, taken as UTC.
const DATE_FORMAT: &str = "%d.%m.%Y %H:%M";

// Positional column layout of the contract extract.
const COL_NUMBER: usize = 0;
const COL_PUBLIC_AT: usize = 1;
const COL_CONCLUSION_AT: usize = 2;
const COL_PRICE: usize = 3;
const COL_CUSTOMER: usize = 4; // Inn, Kpp, Name
const COL_PROVIDER: usize = 7; // Inn, Kpp, Name
const COL_ORDERS_JSON: usize = 10;
const COLUMNS: usize = 11;

/// One order line item as it appears in the embedded JSON.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawOrder {
    pub product_external_id: i64,
    pub quantity: Decimal,
    pub amount: Decimal,
}

/// Organization reference by business key, as read from the row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrgFields {
    pub inn: String,
    pub kpp: String,
    pub name: String,
}

/// A validated contract row, references still unresolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractRecord {
    pub number: String,
    pub public_at: DateTime<Utc>,
    pub conclusion_at: Option<DateTime<Utc>>,
    pub price: Decimal,
    pub customer: OrgFields,
    pub provider: OrgFields,
    pub orders: Vec<RawOrder>,
}

pub(crate) fn parse_datetime(raw: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw, DATE_FORMAT)
        .ok()
        .map(|dt| dt.and_utc())
}

fn org_fields(row: &StringRecord, base: usize) -> Result<OrgFields, SkipReason> {
    Ok(OrgFields {
        inn: required_text(row, base, MAX_INN)?,
        kpp: required_text(row, base + 1, MAX_KPP)?,
        name: required_text(row, base + 2, MAX_NAME)?,
    })
}

fn parse_orders(raw: &str) -> Result<Vec<RawOrder>, SkipReason> {
    let items = decode_items(raw)?;
    let mut orders = Vec::with_capacity(items.len());
    for obj in &items {
        let Some(id) = int_field(obj, "id") else {
            continue;
        };
        let Some(quantity) = decimal_field(obj, "quantity") else {
            continue;
        };
        let Some(amount) = decimal_field(obj, "amount") else {
            continue;
        };
        if id <= 0 || quantity < Decimal::ZERO || amount <= Decimal::ZERO {
            continue;
        }
        orders.push(RawOrder {
            product_external_id: id,
            quantity,
            amount,
        });
    }
    Ok(orders)
}

/// Validate one contract row. Every early return is a countable skip.
pub fn parse_contract_row(row: &StringRecord) -> Result<ContractRecord, SkipReason> {
    if row.len() < COLUMNS {
        return Err(SkipReason::MissingField);
    }

    let number = required_text(row, COL_NUMBER, MAX_NAME)?;

    let public_at =
        parse_datetime(clean_text(&row[COL_PUBLIC_AT])).ok_or(SkipReason::BadDate)?;

    let conclusion_raw = clean_text(&row[COL_CONCLUSION_AT]);
    let conclusion_at = if conclusion_raw.is_empty() {
        None
    } else {
        Some(parse_datetime(conclusion_raw).ok_or(SkipReason::BadDate)?)
    };
    if matches!(conclusion_at, Some(conclusion) if public_at > conclusion) {
        return Err(SkipReason::DateOrder);
    }

    let price = parse_decimal(clean_text(&row[COL_PRICE])).ok_or(SkipReason::BadNumber)?;
    if price <= Decimal::ZERO {
        return Err(SkipReason::NonPositive);
    }

    let customer = org_fields(row, COL_CUSTOMER)?;
    let provider = org_fields(row, COL_PROVIDER)?;

    let orders = parse_orders(&row[COL_ORDERS_JSON])?;
    if orders.is_empty() {
        return Err(SkipReason::NoValidItems);
    }

    Ok(ContractRecord {
        number,
        public_at,
        conclusion_at,
        price,
        customer,
        provider,
        orders,
    })
}

/// Forward-only reader over the contract extract. Not restartable; re-open
/// the file to re-parse.
pub struct ContractReader {
    inner: csv::Reader<File>,
    row: StringRecord,
    line: u64,
}

impl ContractReader {
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

    /// Next row as a parse outcome, `None` at end of stream. Row-local csv
    /// errors are skips; an I/O failure mid-stream is fatal.
    pub fn next_row(&mut self) -> Result<Option<Result<ContractRecord, SkipReason>>, IngestError> {
        match self.inner.read_record(&mut self.row) {
            Ok(false) => Ok(None),
            Ok(true) => {
                self.line = self.row.position().map_or(0, |p| p.line());
                Ok(Some(parse_contract_row(&self.row)))
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
    use chrono::TimeZone;

    fn row(fields: &[&str]) -> StringRecord {
        StringRecord::from(fields.to_vec())
    }

    fn valid_row() -> Vec<String> {
        vec![
            "ГК-77/21".to_string(),
            "01.03.2021 10:30".to_string(),
            "15.03.2021 18:00".to_string(),
            "12500.50".to_string(),
            "7701234567".to_string(),
            "770101001".to_string(),
            "ГБОУ Школа № 17".to_string(),
            "7812345678".to_string(),
            "781201001".to_string(),
            "ООО Поставщик".to_string(),
            r#"[{"id": 3, "quantity": 10, "amount": 1250.05}]"#.to_string(),
        ]
    }

    fn parse(fields: Vec<String>) -> Result<ContractRecord, SkipReason> {
        let fields: Vec<&str> = fields.iter().map(String::as_str).collect();
        parse_contract_row(&row(&fields))
    }

    #[test]
    fn valid_row_parses() {
        let record = parse(valid_row()).unwrap();
        assert_eq!(record.number, "ГК-77/21");
        assert_eq!(
            record.public_at,
            Utc.with_ymd_and_hms(2021, 3, 1, 10, 30, 0).unwrap()
        );
        assert_eq!(record.price, Decimal::new(1_250_050, 2));
        assert_eq!(record.customer.inn, "7701234567");
        assert_eq!(record.provider.name, "ООО Поставщик");
        assert_eq!(record.orders.len(), 1);
        assert_eq!(record.orders[0].product_external_id, 3);
    }

    #[test]
    fn public_after_conclusion_is_skipped() {
        let mut fields = valid_row();
        fields[COL_PUBLIC_AT] = "16.03.2021 10:30".to_string();
        assert_eq!(parse(fields), Err(SkipReason::DateOrder));
    }

    #[test]
    fn blank_conclusion_is_none() {
        let mut fields = valid_row();
        fields[COL_CONCLUSION_AT] = String::new();
        assert_eq!(parse(fields).unwrap().conclusion_at, None);
    }

    #[test]
    fn unparsable_dates_are_skipped() {
        let mut fields = valid_row();
        fields[COL_PUBLIC_AT] = "2021-03-01T10:30".to_string();
        assert_eq!(parse(fields), Err(SkipReason::BadDate));

        let mut fields = valid_row();
        fields[COL_CONCLUSION_AT] = "когда-нибудь".to_string();
        assert_eq!(parse(fields), Err(SkipReason::BadDate));
    }

    #[test]
    fn bad_price_is_skipped() {
        let mut fields = valid_row();
        fields[COL_PRICE] = "дорого".to_string();
        assert_eq!(parse(fields), Err(SkipReason::BadNumber));

        let mut fields = valid_row();
        fields[COL_PRICE] = "0".to_string();
        assert_eq!(parse(fields), Err(SkipReason::NonPositive));

        let mut fields = valid_row();
        fields[COL_PRICE] = "-1.0".to_string();
        assert_eq!(parse(fields), Err(SkipReason::NonPositive));
    }

    #[test]
    fn oversized_inn_is_skipped() {
        let mut fields = valid_row();
        fields[COL_CUSTOMER] = "1234567890123".to_string(); // 13 > 12
        assert_eq!(parse(fields), Err(SkipReason::TooLong));
    }

    #[test]
    fn blank_number_is_skipped() {
        let mut fields = valid_row();
        fields[COL_NUMBER] = "  \"\"  ".to_string();
        assert_eq!(parse(fields), Err(SkipReason::MissingField));
    }

    #[test]
    fn short_row_is_skipped() {
        let record = row(&["ГК-1", "01.03.2021 10:30"]);
        assert_eq!(parse_contract_row(&record), Err(SkipReason::MissingField));
    }

    #[test]
    fn invalid_order_items_are_filtered() {
        let mut fields = valid_row();
        fields[COL_ORDERS_JSON] = r#"[
            {"id": 3, "quantity": 1, "amount": 0},
            {"id": 0, "quantity": 1, "amount": 5},
            {"quantity": 1, "amount": 5},
            {"id": 4, "quantity": 0, "amount": 5}
        ]"#
        .to_string();
        // Zero quantity is allowed; everything else above is not.
        let record = parse(fields).unwrap();
        assert_eq!(record.orders.len(), 1);
        assert_eq!(record.orders[0].product_external_id, 4);
    }

    #[test]
    fn all_invalid_orders_skip_the_row() {
        let mut fields = valid_row();
        fields[COL_ORDERS_JSON] = r#"[{"id": 3, "quantity": 1, "amount": 0}]"#.to_string();
        assert_eq!(parse(fields), Err(SkipReason::NoValidItems));

        let mut fields = valid_row();
        fields[COL_ORDERS_JSON] = "[]".to_string();
        assert_eq!(parse(fields), Err(SkipReason::NoValidItems));
    }

    #[test]
    fn malformed_orders_json_skips_the_row() {
        let mut fields = valid_row();
        fields[COL_ORDERS_JSON] = "[{".to_string();
        assert_eq!(parse(fields), Err(SkipReason::BadJson));
    }

    #[test]
    fn reader_reports_record_start_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("contracts.csv");
        // Record one has a quoted number spanning two physical lines, so
        // record two starts on line 4, not line 3.
        let data = concat!(
            "Number;PublicAt;ConclusionAt;Price;CustomerInn;CustomerKpp;CustomerName;",
            "ProviderInn;ProviderKpp;ProviderName;Orders\n",
            "\"ГК-77/21\nдоп. соглашение 1\";01.03.2021 10:30;;100;7701234567;770101001;",
            "Заказчик;7812345678;781201001;Поставщик;",
            "[{\"id\": 1, \"quantity\": 1, \"amount\": 5}]\n",
            "ГК-2;не дата;;100;7701234567;770101001;",
            "Заказчик;7812345678;781201001;Поставщик;[]\n",
        );
        std::fs::write(&path, data).unwrap();

        let mut reader = ContractReader::open(&path).unwrap();

        let first = reader.next_row().unwrap().unwrap();
        assert!(first.is_ok());
        assert_eq!(reader.line(), 2);

        let second = reader.next_row().unwrap().unwrap();
        assert_eq!(second.unwrap_err(), SkipReason::BadDate);
        assert_eq!(reader.line(), 4);

        assert!(reader.next_row().unwrap().is_none());
    }
}
