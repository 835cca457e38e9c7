use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;
use thiserror::Error;

use crate::model::{PaymentCard, PaymentCategory, PaymentRecord, Session, UserId};
use crate::sim::Operation;
use crate::Amount;

/// Errors that can occur when reading the operations script
#[derive(Debug, Error)]
pub enum CsvError {
    #[error("failed to open {path}: {source}")]
    Open { path: String, source: csv::Error },

    #[error("line {line}: failed to parse row: {source}")]
    Parse { line: usize, source: csv::Error },

    #[error("line {line}: unrecognized operation type '{op}'")]
    UnrecognizedType { line: usize, op: String },

    #[error("line {line}: {op} missing {field}")]
    MissingField {
        line: usize,
        op: String,
        field: &'static str,
    },

    #[error("line {line}: {op} has invalid {field} '{value}'")]
    InvalidField {
        line: usize,
        op: String,
        field: &'static str,
        value: String,
    },
}

/// Errors that can occur when writing the final report
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to write csv: {0}")]
    Csv(#[from] csv::Error),

    #[error("failed to write report: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Deserialize)]
struct InputRow {
    r#type: String,
    user: Option<UserId>,
    target: Option<u64>,
    value: Option<String>,
    label: Option<String>,
}

#[derive(Debug, Serialize)]
struct SessionRow<'a> {
    session: u32,
    time_slot: &'a str,
    capacity: u32,
    reserved: u32,
}

#[derive(Debug, Serialize)]
struct CardRow {
    card: u32,
    number: String,
    balance: String,
    valid: bool,
}

#[derive(Debug, Serialize)]
struct LedgerRow<'a> {
    payment: u64,
    card: u32,
    amount: String,
    currency: &'a str,
    status: String,
    reason: Option<&'static str>,
    category: &'static str,
    refund_of: Option<u64>,
}

/// Field accessors for one row, carrying what error reporting needs
struct Row {
    line: usize,
    inner: InputRow,
}

impl Row {
    fn missing(&self, field: &'static str) -> CsvError {
        CsvError::MissingField {
            line: self.line,
            op: self.inner.r#type.clone(),
            field,
        }
    }

    fn invalid(&self, field: &'static str, value: impl ToString) -> CsvError {
        CsvError::InvalidField {
            line: self.line,
            op: self.inner.r#type.clone(),
            field,
            value: value.to_string(),
        }
    }

    fn user(&self) -> Result<UserId, CsvError> {
        self.inner.user.ok_or_else(|| self.missing("user"))
    }

    fn target<T: TryFrom<u64>>(&self) -> Result<T, CsvError> {
        let target = self.inner.target.ok_or_else(|| self.missing("target"))?;
        T::try_from(target).map_err(|_| self.invalid("target", target))
    }

    fn value(&self) -> Option<&str> {
        self.inner.value.as_deref().filter(|v| !v.is_empty())
    }

    fn capacity(&self) -> Result<u32, CsvError> {
        let value = self.value().ok_or_else(|| self.missing("capacity"))?;
        value.parse().map_err(|_| self.invalid("capacity", value))
    }

    fn amount(&self) -> Result<Option<Amount>, CsvError> {
        let Some(value) = self.value() else {
            return Ok(None);
        };
        match value.parse::<f64>() {
            Ok(amount) if amount.is_finite() => Ok(Some(Amount::from_float(amount))),
            _ => Err(self.invalid("amount", value)),
        }
    }

    fn label(&self) -> Option<&str> {
        self.inner.label.as_deref().filter(|v| !v.is_empty())
    }

    fn into_operation(self) -> Result<Operation, CsvError> {
        match self.inner.r#type.as_str() {
            "session" => Ok(Operation::AddSession {
                session: self.target()?,
                capacity: self.capacity()?,
                time_slot: self.label().unwrap_or_default().to_string(),
            }),
            "book" => Ok(Operation::Book {
                user: self.user()?,
                session: self.target()?,
            }),
            "cancel" => Ok(Operation::Cancel {
                user: self.user()?,
                reservation: self.target()?,
            }),
            "cancel_all" => Ok(Operation::CancelAll { user: self.user()? }),
            "capacity" => Ok(Operation::SetCapacity {
                session: self.target()?,
                capacity: self.capacity()?,
            }),
            "charge" => {
                let category = match self.label() {
                    Some(label) => label
                        .parse::<PaymentCategory>()
                        .map_err(|_| self.invalid("category", label))?,
                    None => PaymentCategory::default(),
                };
                Ok(Operation::Charge {
                    card: self.target()?,
                    amount: self.amount()?.ok_or_else(|| self.missing("amount"))?,
                    category,
                })
            }
            "refund" => Ok(Operation::Refund {
                payment: self.target()?,
                amount: self.amount()?,
            }),
            other => Err(CsvError::UnrecognizedType {
                line: self.line,
                op: other.to_string(),
            }),
        }
    }
}

/// Read operations from a csv file
pub fn read_operations(
    path: impl AsRef<Path>,
) -> Result<impl Iterator<Item = Result<Operation, CsvError>>, CsvError> {
    let path = path.as_ref();
    let reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)
        .map_err(|source| CsvError::Open {
            path: path.display().to_string(),
            source,
        })?;

    Ok(reader
        .into_deserialize::<InputRow>()
        .enumerate()
        .map(|(idx, result)| {
            let line = idx + 2; // 1-indexed, skip header
            let inner = result.map_err(|source| CsvError::Parse { line, source })?;
            Row { line, inner }.into_operation()
        }))
}

/// Write sessions, cards and the ledger as three csv sections separated by a blank line
pub fn write_report<W: io::Write>(
    mut out: W,
    sessions: &[Session],
    cards: &[PaymentCard],
    ledger: &[PaymentRecord],
) -> Result<(), ReportError> {
    write_sessions(&mut out, sessions)?;
    writeln!(out)?;
    write_cards(&mut out, cards)?;
    writeln!(out)?;
    write_ledger(&mut out, ledger)?;
    out.flush()?;
    Ok(())
}

/// Headers are written explicitly so an empty section still has one
fn writer<W: io::Write>(out: W, header: &[&str]) -> Result<csv::Writer<W>, ReportError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(out);
    writer.write_record(header)?;
    Ok(writer)
}

fn write_sessions<W: io::Write>(out: W, sessions: &[Session]) -> Result<(), ReportError> {
    let mut writer = writer(out, &["session", "time_slot", "capacity", "reserved"])?;
    for session in sessions {
        writer.serialize(SessionRow {
            session: session.id,
            time_slot: &session.time_slot,
            capacity: session.capacity,
            reserved: session.reserved,
        })?;
    }
    writer.flush()?;
    Ok(())
}

fn write_cards<W: io::Write>(out: W, cards: &[PaymentCard]) -> Result<(), ReportError> {
    let mut writer = writer(out, &["card", "number", "balance", "valid"])?;
    for card in cards {
        writer.serialize(CardRow {
            card: card.id,
            number: card.masked_number(),
            balance: card.balance.to_string(),
            valid: card.is_valid,
        })?;
    }
    writer.flush()?;
    Ok(())
}

fn write_ledger<W: io::Write>(out: W, ledger: &[PaymentRecord]) -> Result<(), ReportError> {
    let header = [
        "payment",
        "card",
        "amount",
        "currency",
        "status",
        "reason",
        "category",
        "refund_of",
    ];
    let mut writer = writer(out, &header)?;
    for record in ledger {
        writer.serialize(LedgerRow {
            payment: record.id,
            card: record.card,
            amount: record.amount.to_string(),
            currency: &record.currency,
            status: record.status.to_string(),
            reason: record.failure_reason.map(|r| r.as_str()),
            category: record.category.as_str(),
            refund_of: record.refund_of,
        })?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::model::{NewPayment, PaymentStatus};
    use tempfile::NamedTempFile;

    const HEADER: &str = "type,user,target,value,label\n";

    fn write_csv(rows: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(HEADER.as_bytes()).unwrap();
        file.write_all(rows.as_bytes()).unwrap();
        file
    }

    fn read(rows: &str) -> Vec<Result<Operation, CsvError>> {
        let file = write_csv(rows);
        read_operations(file.path()).unwrap().collect()
    }

    fn read_one(rows: &str) -> Operation {
        let results = read(rows);
        assert_eq!(results.len(), 1);
        results.into_iter().next().unwrap().unwrap()
    }

    #[test]
    fn read_session() {
        assert_eq!(
            read_one("session,,3,12,Mon 07:00\n"),
            Operation::AddSession {
                session: 3,
                capacity: 12,
                time_slot: "Mon 07:00".into()
            }
        );
    }

    #[test]
    fn read_booking_operations() {
        assert_eq!(read_one("book,10,3,,\n"), Operation::Book { user: 10, session: 3 });
        assert_eq!(
            read_one("cancel,10,7,,\n"),
            Operation::Cancel {
                user: 10,
                reservation: 7
            }
        );
        assert_eq!(read_one("cancel_all,10,,,\n"), Operation::CancelAll { user: 10 });
        assert_eq!(
            read_one("capacity,,3,8,\n"),
            Operation::SetCapacity {
                session: 3,
                capacity: 8
            }
        );
    }

    #[test]
    fn read_charge_with_and_without_category() {
        assert_eq!(
            read_one("charge,,1,19.99,gear_rental\n"),
            Operation::Charge {
                card: 1,
                amount: Amount::from_minor(1999),
                category: PaymentCategory::GearRental
            }
        );
        assert_eq!(
            read_one("charge,,1,5,\n"),
            Operation::Charge {
                card: 1,
                amount: Amount::from_major(5),
                category: PaymentCategory::Subscription
            }
        );
    }

    #[test]
    fn read_refund_with_optional_amount() {
        assert_eq!(
            read_one("refund,,4,,\n"),
            Operation::Refund {
                payment: 4,
                amount: None
            }
        );
        assert_eq!(
            read_one("refund,,4,2.5,\n"),
            Operation::Refund {
                payment: 4,
                amount: Some(Amount::from_minor(250))
            }
        );
    }

    #[test]
    fn read_with_whitespace_and_short_rows() {
        let results = read("book, 10, 3\n");
        assert_eq!(results.len(), 1);
        assert!(results[0].is_ok());
    }

    #[test]
    fn read_returns_error_for_unknown_type() {
        let results = read("upgrade,1,1,,\n");
        let err = results[0].as_ref().unwrap_err();
        assert!(matches!(err, CsvError::UnrecognizedType { line: 2, .. }));
    }

    #[test]
    fn read_returns_error_for_missing_fields() {
        let results = read("book,,3,,\ncharge,,1,,\n");
        assert!(matches!(
            results[0].as_ref().unwrap_err(),
            CsvError::MissingField {
                line: 2,
                field: "user",
                ..
            }
        ));
        assert!(matches!(
            results[1].as_ref().unwrap_err(),
            CsvError::MissingField {
                line: 3,
                field: "amount",
                ..
            }
        ));
    }

    #[test]
    fn read_returns_error_for_invalid_fields() {
        let results = read("book,1,99999999999,,\ncharge,,1,lots,\ncharge,,1,5,protein\n");
        for (result, field) in results.iter().zip(["target", "amount", "category"]) {
            assert!(
                matches!(result, Err(CsvError::InvalidField { field: f, .. }) if *f == field),
                "{result:?}"
            );
        }
    }

    #[test]
    fn missing_file_fails_to_open() {
        assert!(matches!(
            read_operations("does/not/exist.csv"),
            Err(CsvError::Open { .. })
        ));
    }

    #[test]
    fn empty_sections_keep_their_header() {
        let mut out = Vec::new();
        write_report(&mut out, &[], &[], &[]).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "session,time_slot,capacity,reserved\n\
             \n\
             card,number,balance,valid\n\
             \n\
             payment,card,amount,currency,status,reason,category,refund_of\n"
        );
    }

    #[test]
    fn report_has_three_sections() {
        let mut session = Session::new(1, 1, "Mon 07:00", 5);
        session.reserved = 2;
        let card = PaymentCard::new(1, "4242424242424242", "Ada", (12, 2030), "123", Amount::from_major(70));
        let entry = NewPayment {
            card: 1,
            amount: Amount::from_major(-30),
            currency: "GBP".into(),
            status: PaymentStatus::Succeeded,
            category: PaymentCategory::GearPurchase,
            description: String::new(),
            failure_reason: None,
            target: None,
            refund_of: Some(1),
            simulated_delay_ms: 0,
        }
        .into_record(2);

        let mut out = Vec::new();
        write_report(&mut out, &[session], &[card], &[entry]).unwrap();
        let out = String::from_utf8(out).unwrap();

        assert_eq!(
            out,
            "session,time_slot,capacity,reserved\n\
             1,Mon 07:00,5,2\n\
             \n\
             card,number,balance,valid\n\
             1,**** **** **** 4242,70.00,true\n\
             \n\
             payment,card,amount,currency,status,reason,category,refund_of\n\
             2,1,-30.00,GBP,succeeded,,gear_purchase,1\n"
        );
    }
}
