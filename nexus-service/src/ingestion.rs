//! The download → parse → dedupe → confirmation-match → watermark pipeline
//! (spec.md §4.3/§4.4): the business logic behind `POST
//! /bank-accounts/{a}/fetch-transactions` and the scheduler's `fetch` task.

use crate::ebics_runtime::load_runtime_subscriber;
use crate::error::ServiceError;
use crate::state::AppState;
use chrono::{Duration, NaiveDate, Utc};
use nexus_ebics::order::{Btf, OrderType};
use nexus_ebics::transaction::{self, DateRange, OrderSelector};
use nexus_iso20022::camt::{self, FetchLevel};
use nexus_ledger::types::{BankAccount, BankConnection, BankMessageLevel, CreditDebitIndicator, EntryStatus};
use serde::Deserialize;

/// `{ "level": ..., "rangeType": ..., "number"?: int }`, the `fetch` task
/// params and `POST /fetch-transactions` body (spec.md §4.5/§6.3).
#[derive(Debug, Clone, Deserialize)]
pub struct FetchParams {
    /// Which fetch level(s) to run.
    pub level: FetchLevelSelector,
    /// How to compute the date range for the download.
    pub range_type: RangeType,
    /// Extra day count for `RangeType::PreviousDays`.
    #[serde(default)]
    pub number: Option<i64>,
}

/// `level` selector: one specific level, or all three.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchLevelSelector {
    /// camt.052.
    Report,
    /// camt.053.
    Statement,
    /// camt.054.
    Notification,
    /// All three, in report/statement/notification order.
    All,
}

impl FetchLevelSelector {
    fn levels(self) -> Vec<FetchLevel> {
        match self {
            FetchLevelSelector::Report => vec![FetchLevel::Report],
            FetchLevelSelector::Statement => vec![FetchLevel::Statement],
            FetchLevelSelector::Notification => vec![FetchLevel::Notification],
            FetchLevelSelector::All => vec![FetchLevel::Report, FetchLevel::Statement, FetchLevel::Notification],
        }
    }
}

/// How to compute the download's date range.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RangeType {
    /// No explicit range; the bank's own default (usually "since last
    /// download").
    Latest,
    /// The full history the bank is willing to return.
    All,
    /// From the level's stored watermark to now.
    SinceLast,
    /// The last `number` days.
    PreviousDays,
}

/// Outcome of one `fetch-transactions` call, across every level it ran.
#[derive(Debug, Clone, Default)]
pub struct FetchOutcome {
    /// Count of newly ingested (non-duplicate) entries.
    pub new_transactions: u64,
}

fn date_range_for(range_type: RangeType, number: Option<i64>, watermark: Option<chrono::DateTime<Utc>>) -> Option<DateRange> {
    let today = Utc::now().date_naive();
    match range_type {
        RangeType::Latest => None,
        RangeType::All => Some(DateRange { start: NaiveDate::from_ymd_opt(1999, 1, 1).unwrap(), end: today }),
        RangeType::SinceLast => {
            let start = watermark.map(|w| w.date_naive()).unwrap_or(NaiveDate::from_ymd_opt(1999, 1, 1).unwrap());
            Some(DateRange { start, end: today })
        }
        RangeType::PreviousDays => {
            let days = number.unwrap_or(1).max(0);
            Some(DateRange { start: today - Duration::days(days), end: today })
        }
    }
}

fn selector_for(level: FetchLevel, dialect: nexus_iso20022::dialect::Dialect) -> OrderSelector {
    match dialect {
        nexus_iso20022::dialect::Dialect::H004 => OrderSelector::OrderType(match level {
            FetchLevel::Report => OrderType::C52,
            FetchLevel::Statement => OrderType::C53,
            FetchLevel::Notification => OrderType::C54,
        }),
        nexus_iso20022::dialect::Dialect::H005 => OrderSelector::Btf(match level {
            FetchLevel::Report => Btf::camt052(),
            FetchLevel::Statement => Btf::camt053(),
            FetchLevel::Notification => Btf::camt054(),
        }),
    }
}

/// Run the download(s) described by `params` against `account`'s default
/// connection, parse every resulting camt document, dedupe against the
/// ledger, match confirmations, advance watermarks, and invoke the facade
/// bus — all inside the account's advisory serialization.
pub async fn fetch_transactions(
    state: &AppState,
    account: &BankAccount,
    params: &FetchParams,
) -> Result<FetchOutcome, ServiceError> {
    let connection_id = account
        .default_connection_id
        .ok_or_else(|| crate::error::AppError::bad_request("bank account has no default connection"))?;
    let connection: BankConnection = state.db.get_connection_by_id(connection_id).await?;
    let stored_subscriber = state.db.get_subscriber(connection.id).await?;
    let runtime_subscriber = load_runtime_subscriber(&stored_subscriber, &connection.dialect)?;

    let _guard = runtime_subscriber.lock().await;

    let mut outcome = FetchOutcome::default();
    for level in params.level.levels() {
        outcome.new_transactions += fetch_one_level(state, &connection, &runtime_subscriber, account, level, params).await?;
    }
    Ok(outcome)
}

async fn fetch_one_level(
    state: &AppState,
    connection: &BankConnection,
    runtime_subscriber: &nexus_ebics::subscriber::EbicsSubscriber,
    account: &BankAccount,
    level: FetchLevel,
    params: &FetchParams,
) -> Result<u64, ServiceError> {
    let watermark = account.watermark(level);
    let date_range = date_range_for(params.range_type, params.number, watermark);
    let selector = selector_for(level, runtime_subscriber.dialect);

    let result = match transaction::run_download(&state.transport, runtime_subscriber, selector, date_range).await {
        Ok(r) => r,
        Err(e) => return Err(e.into()),
    };

    if result.no_data_available {
        return Ok(0);
    }

    let documents = extract_camt_documents(&result.order_data)?;

    let mut new_count = 0u64;
    let mut watermark_cursor = account.watermark(level);

    for xml in &documents {
        let parsed = match camt::parse(level, xml) {
            Ok(p) => p,
            Err(e) => {
                let mut tx = state.db.begin().await?;
                state
                    .db
                    .insert_bank_message_tx(&mut tx, connection.id, BankMessageLevel::from(level), None, xml.as_bytes(), true)
                    .await?;
                tx.commit().await?;
                tracing::warn!(error = %e, "camt parse failed; message recorded with errors=true");
                continue;
            }
        };

        // One document's message row, entries, serial watermark, and
        // creation-timestamp watermark commit or roll back together
        // (spec.md §5): a crash partway through must never leave the
        // ledger rows in place with a stale watermark.
        let mut tx = state.db.begin().await?;

        let message = state
            .db
            .insert_bank_message_tx(
                &mut tx,
                connection.id,
                BankMessageLevel::from(level),
                Some(&parsed.message_id),
                xml.as_bytes(),
                false,
            )
            .await?;
        state.db.update_highest_seen_serial_id_tx(&mut tx, account.id, message.serial_id).await?;

        let mut stored_entries = Vec::new();
        for entry in &parsed.entries {
            let inserted = state
                .db
                .insert_transaction_entry_tx(
                    &mut tx,
                    account.id,
                    &entry.transaction_id,
                    CreditDebitIndicator::from(entry.credit_debit_indicator),
                    &entry.currency,
                    entry.amount,
                    EntryStatus::from(entry.status),
                    entry.transaction_json.clone(),
                )
                .await?;

            if let Some(stored_entry) = inserted {
                stored_entries.push((entry.clone(), stored_entry));
            }
        }

        let should_advance = match watermark_cursor {
            Some(existing) => parsed.creation_date_time > existing,
            None => true,
        };
        if should_advance {
            state.db.update_watermark_tx(&mut tx, account.id, level, parsed.creation_date_time).await?;
            watermark_cursor = Some(parsed.creation_date_time);
        }

        tx.commit().await?;

        for (entry, stored_entry) in &stored_entries {
            new_count += 1;

            if entry.credit_debit_indicator == nexus_iso20022::entry::CreditDebitIndicator::Debit {
                if let Some(payment_information_id) = &entry.payment_information_id {
                    if let Some(initiation) = state
                        .db
                        .find_initiation_by_payment_information_id(account.id, payment_information_id)
                        .await?
                    {
                        state.db.confirm_initiation(initiation.id, stored_entry.id).await?;
                    }
                }
            }

            state.facade_bus.on_ingested(stored_entry).await?;
        }
    }

    if new_count > 0 {
        state.notifiers.notify(account.id);
    }

    Ok(new_count)
}

/// Unwrap a downloaded order-data payload into its constituent camt.05x XML
/// documents. Banks either return a single raw XML document, or (when the
/// order detail asked for `Container/@containerType=ZIP`, spec.md §6.1) a
/// ZIP archive holding one or more documents; this distinguishes the two by
/// the ZIP local-file-header magic rather than trusting the order type,
/// since some banks zip single-document downloads unconditionally.
fn extract_camt_documents(order_data: &[u8]) -> Result<Vec<String>, ServiceError> {
    const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
    if !order_data.starts_with(ZIP_MAGIC) {
        let xml = String::from_utf8(order_data.to_vec())
            .map_err(|e| anyhow::anyhow!("order data is not valid UTF-8: {e}"))?;
        return Ok(vec![xml]);
    }

    let cursor = std::io::Cursor::new(order_data);
    let mut archive = zip::ZipArchive::new(cursor)
        .map_err(|e| anyhow::anyhow!("order data claims to be a ZIP container but failed to open: {e}"))?;

    let mut documents = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let mut file = archive
            .by_index(i)
            .map_err(|e| anyhow::anyhow!("reading ZIP entry {i}: {e}"))?;
        let mut contents = String::new();
        std::io::Read::read_to_string(&mut file, &mut contents)
            .map_err(|e| anyhow::anyhow!("ZIP entry {i} is not valid UTF-8 XML: {e}"))?;
        documents.push(contents);
    }
    Ok(documents)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_xml_passes_through_as_a_single_document() {
        let xml = b"<Document>not zipped</Document>".to_vec();
        let docs = extract_camt_documents(&xml).unwrap();
        assert_eq!(docs, vec!["<Document>not zipped</Document>".to_string()]);
    }

    #[test]
    fn zip_container_yields_one_document_per_entry() {
        let mut buf = Vec::new();
        {
            let cursor = std::io::Cursor::new(&mut buf);
            let mut writer = zip::ZipWriter::new(cursor);
            let options = zip::write::FileOptions::default()
                .compression_method(zip::CompressionMethod::Deflated);
            writer.start_file("camt053-1.xml", options).unwrap();
            std::io::Write::write_all(&mut writer, b"<Document>first</Document>").unwrap();
            writer.start_file("camt053-2.xml", options).unwrap();
            std::io::Write::write_all(&mut writer, b"<Document>second</Document>").unwrap();
            writer.finish().unwrap();
        }

        let docs = extract_camt_documents(&buf).unwrap();
        assert_eq!(docs.len(), 2);
        assert!(docs.contains(&"<Document>first</Document>".to_string()));
        assert!(docs.contains(&"<Document>second</Document>".to_string()));
    }
}
