use bigdecimal::{BigDecimal, Zero};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use csv::{ReaderBuilder, Trim};
use serde::Serialize;
use std::io::Read;
use std::str::FromStr;

use crate::db::PaymentStore;
use crate::error::AppResult;
use crate::models::NewBankTransaction;

// 网银导出格式: Tanggal;Deskripsi;Debit;Kredit;Saldo
const COL_DATE: usize = 0;
const COL_DESCRIPTION: usize = 1;
const COL_CREDIT: usize = 3;
const MIN_COLUMNS: usize = 4;

const DATE_FORMAT: &str = "%d/%m/%Y";
const MAX_NOTE_CHARS: usize = 255;
const MAX_INTEGER_DIGITS: usize = 18;
const MAX_FRACTION_DIGITS: usize = 2;

/// 解析结果
#[derive(Debug, Default)]
pub struct StatementImport {
    pub transactions: Vec<NewBankTransaction>,
    pub skipped_rows: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportSummary {
    pub imported: u64,
    pub skipped_rows: usize,
}

/// 解析银行流水 CSV (分号分隔，首行为表头)
///
/// 只导入入账 (Kredit) 列有正数金额的行；日期无法解析时使用 `imported_at`。
pub fn parse_statement<R: Read>(
    reader: R,
    bank_label: &str,
    imported_at: DateTime<Utc>,
) -> AppResult<StatementImport> {
    let mut csv_reader = ReaderBuilder::new()
        .delimiter(b';')
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(reader);

    // 表头都读不出来说明不是文本 CSV
    csv_reader.headers()?;

    let mut result = StatementImport::default();

    for record in csv_reader.records() {
        let record = match record {
            Ok(r) => r,
            Err(e) => {
                tracing::debug!("跳过无法读取的行: {}", e);
                result.skipped_rows += 1;
                continue;
            }
        };

        if record.len() < MIN_COLUMNS {
            result.skipped_rows += 1;
            continue;
        }

        let Some(amount) = parse_amount(&record[COL_CREDIT]) else {
            result.skipped_rows += 1;
            continue;
        };

        let trx_time = parse_date(&record[COL_DATE]).unwrap_or(imported_at);

        result.transactions.push(NewBankTransaction {
            bank: bank_label.to_string(),
            account: String::new(),
            amount,
            note: record[COL_DESCRIPTION].chars().take(MAX_NOTE_CHARS).collect(),
            ref_code: String::new(),
            trx_time,
        });
    }

    Ok(result)
}

/// 解析并写入流水
pub async fn import_statement<R: Read>(
    store: &dyn PaymentStore,
    reader: R,
    bank_label: &str,
) -> AppResult<ImportSummary> {
    let parsed = parse_statement(reader, bank_label, Utc::now())?;

    tracing::info!(
        "[Import] 解析到 {} 条入账流水, 跳过 {} 行",
        parsed.transactions.len(), parsed.skipped_rows
    );

    let imported = store.insert_transactions(&parsed.transactions).await?;

    Ok(ImportSummary {
        imported,
        skipped_rows: parsed.skipped_rows,
    })
}

/// 印尼格式金额: "." 为千分位, "," 为小数点
/// 例如 "344.389,00" -> 344389.00
///
/// 只接受纯数字加至多一个小数点，整数部分不超过 18 位、小数不超过 2 位，
/// 与 bank_transactions.amount NUMERIC(20,2) 一致。
fn parse_amount(raw: &str) -> Option<BigDecimal> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '.')
        .map(|c| if c == ',' { '.' } else { c })
        .collect();

    let (int_part, frac_part) = match cleaned.split_once('.') {
        Some((i, f)) => (i, f),
        None => (cleaned.as_str(), ""),
    };

    if int_part.is_empty()
        || int_part.len() > MAX_INTEGER_DIGITS
        || frac_part.len() > MAX_FRACTION_DIGITS
        || !int_part.chars().all(|c| c.is_ascii_digit())
        || !frac_part.chars().all(|c| c.is_ascii_digit())
    {
        return None;
    }

    let normalized = if frac_part.is_empty() {
        int_part.to_string()
    } else {
        format!("{}.{}", int_part, frac_part)
    };

    let amount = BigDecimal::from_str(&normalized).ok()?;
    if amount <= BigDecimal::zero() {
        return None;
    }
    Some(amount)
}

fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let date = NaiveDate::parse_from_str(raw, DATE_FORMAT).ok()?;
    Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    const STATEMENT: &str = "\
Tanggal;Deskripsi;Debit;Kredit;Saldo
01/03/2024;TRSF E-BANKING CR 9F1C2A BUDI;;344.389,00;1.344.389,00
01/03/2024;BIAYA ADM;15.000,00;;1.329.389,00
02/03/2024;SETORAN TUNAI;;500.000;1.829.389,00
bukan tanggal;TRSF DARI SITI;;250.000,00;2.079.389,00
03/03/2024;BARIS PENDEK
";

    fn imported_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 5, 10, 30, 0).unwrap()
    }

    #[test]
    fn parses_credit_rows_only() {
        let parsed = parse_statement(STATEMENT.as_bytes(), "BCA", imported_at()).unwrap();

        assert_eq!(parsed.transactions.len(), 3);
        assert_eq!(parsed.skipped_rows, 2); // 借记行 + 短行

        let first = &parsed.transactions[0];
        assert_eq!(first.bank, "BCA");
        assert_eq!(first.amount, BigDecimal::from(344_389));
        assert_eq!(first.note, "TRSF E-BANKING CR 9F1C2A BUDI");
        assert_eq!(first.trx_time, Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap());

        assert_eq!(parsed.transactions[1].amount, BigDecimal::from(500_000));
    }

    #[test]
    fn bad_date_falls_back_to_import_time() {
        let parsed = parse_statement(STATEMENT.as_bytes(), "BCA", imported_at()).unwrap();
        let third = &parsed.transactions[2];
        assert_eq!(third.trx_time, imported_at());
        assert_eq!(third.amount, BigDecimal::from(250_000));
    }

    #[test]
    fn amount_uses_comma_as_decimal_separator() {
        assert_eq!(parse_amount("1.234.567,89"), Some(BigDecimal::from_str("1234567.89").unwrap()));
        assert_eq!(parse_amount(" 500 000 "), Some(BigDecimal::from(500_000)));
        assert_eq!(parse_amount(""), None);
        assert_eq!(parse_amount("0,00"), None);
        assert_eq!(parse_amount("abc"), None);
    }

    #[test]
    fn exponent_notation_is_rejected() {
        assert_eq!(parse_amount("1e25"), None);
        assert_eq!(parse_amount("1E3"), None);
        assert_eq!(parse_amount("-5.000"), None);
    }

    #[test]
    fn integer_part_longer_than_column_is_rejected() {
        assert_eq!(parse_amount("123456789012345678901234,00"), None);
        assert_eq!(parse_amount("1234567890123456789"), None);
        assert_eq!(
            parse_amount("123456789012345678,99"),
            Some(BigDecimal::from_str("123456789012345678.99").unwrap())
        );
    }

    #[test]
    fn more_than_two_decimals_is_rejected() {
        assert_eq!(parse_amount("10,125"), None);
        assert_eq!(parse_amount("10,1"), Some(BigDecimal::from_str("10.1").unwrap()));
        assert_eq!(parse_amount("10,"), Some(BigDecimal::from(10)));
    }

    #[test]
    fn unstorable_amounts_are_counted_as_skipped_rows() {
        let input = "h;h;h;h\n\
01/03/2024;A;;1e25\n\
01/03/2024;B;;123456789012345678901234,00\n\
01/03/2024;C;;10,125\n\
01/03/2024;D;;10,12\n";
        let parsed = parse_statement(input.as_bytes(), "BANK", imported_at()).unwrap();

        assert_eq!(parsed.skipped_rows, 3);
        assert_eq!(parsed.transactions.len(), 1);
        assert_eq!(parsed.transactions[0].note, "D");
        assert_eq!(parsed.transactions[0].amount, BigDecimal::from_str("10.12").unwrap());
    }

    #[test]
    fn long_notes_are_truncated() {
        let input = format!("h;h;h;h\n01/03/2024;{};;10.000\n", "x".repeat(400));
        let parsed = parse_statement(input.as_bytes(), "BANK", imported_at()).unwrap();
        assert_eq!(parsed.transactions[0].note.chars().count(), 255);
    }

    #[test]
    fn binary_header_is_rejected() {
        let input: &[u8] = &[0xff, 0xfe, b';', 0x00, b'\n'];
        assert!(matches!(
            parse_statement(input, "BANK", imported_at()),
            Err(crate::error::AppError::Csv(_))
        ));
    }
}
