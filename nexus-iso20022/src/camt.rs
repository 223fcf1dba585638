//! Parsing of camt.052 (`BkToCstmrAcctRpt`), camt.053 (`BkToCstmrStmt`), and
//! camt.054 (`BkToCstmrDbtCdtNtfctn`) into the canonical entry model.

use crate::entry::{BankTransactionEntry, CreditDebitIndicator, EntryStatus};
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Which of the three fetch levels a document was downloaded for. Each
/// level owns a distinct watermark on `BankAccount`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FetchLevel {
    /// camt.052.
    Report,
    /// camt.053.
    Statement,
    /// camt.054.
    Notification,
}

/// The result of parsing one camt.05x document: its header plus every
/// successfully canonicalized entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedDocument {
    /// `GrpHdr/MsgId`.
    pub message_id: String,
    /// `GrpHdr/CreDtTm`, the new watermark candidate for this level.
    pub creation_date_time: DateTime<Utc>,
    /// Entries with an `AcctSvcrRef`; entries lacking one are dropped.
    pub entries: Vec<BankTransactionEntry>,
}

#[derive(Debug, Deserialize, Serialize)]
struct GroupHeader {
    #[serde(rename = "MsgId")]
    message_id: String,
    #[serde(rename = "CreDtTm")]
    creation_date_time: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Serialize)]
struct ReportOrStatement {
    #[serde(rename = "Ntry", default)]
    entries: Vec<RawEntry>,
}

#[derive(Debug, Deserialize, Serialize)]
struct AmountField {
    #[serde(rename = "@Ccy")]
    currency: String,
    #[serde(rename = "$text")]
    value: String,
}

#[derive(Debug, Deserialize, Serialize)]
struct StatusField {
    #[serde(rename = "Cd")]
    code: String,
}

#[derive(Debug, Deserialize, Serialize)]
struct Refs {
    #[serde(rename = "PmtInfId", default)]
    payment_information_id: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
struct TxDtls {
    #[serde(rename = "Refs", default)]
    refs: Option<Refs>,
}

#[derive(Debug, Deserialize, Serialize)]
struct Batch {
    #[serde(rename = "TxDtls", default)]
    transaction_details: Vec<TxDtls>,
}

#[derive(Debug, Deserialize, Serialize)]
struct EntryDetails {
    #[serde(rename = "Btch", default)]
    batch: Option<Batch>,
    #[serde(rename = "TxDtls", default)]
    transaction_details: Vec<TxDtls>,
}

#[derive(Debug, Deserialize, Serialize)]
struct RawEntry {
    #[serde(rename = "Amt")]
    amount: AmountField,
    #[serde(rename = "CdtDbtInd")]
    credit_debit_indicator: String,
    #[serde(rename = "Sts")]
    status: StatusField,
    #[serde(rename = "AcctSvcrRef", default)]
    acct_svcr_ref: Option<String>,
    #[serde(rename = "NtryDtls", default)]
    entry_details: Vec<EntryDetails>,
}

impl RawEntry {
    fn referenced_payment_information_id(&self) -> Option<String> {
        for details in &self.entry_details {
            if let Some(batch) = &details.batch {
                for tx in &batch.transaction_details {
                    if let Some(refs) = &tx.refs {
                        if refs.payment_information_id.is_some() {
                            return refs.payment_information_id.clone();
                        }
                    }
                }
            }
            for tx in &details.transaction_details {
                if let Some(refs) = &tx.refs {
                    if refs.payment_information_id.is_some() {
                        return refs.payment_information_id.clone();
                    }
                }
            }
        }
        None
    }
}

fn canonicalize(group_header: GroupHeader, groups: Vec<ReportOrStatement>) -> ParsedDocument {
    let mut entries = Vec::new();

    for group in &groups {
        for raw in &group.entries {
            let acct_svcr_ref = match &raw.acct_svcr_ref {
                Some(r) => r.clone(),
                None => {
                    tracing::warn!("camt entry without AcctSvcrRef dropped");
                    continue;
                }
            };

            let credit_debit_indicator = match raw.credit_debit_indicator.as_str() {
                "CRDT" => CreditDebitIndicator::Credit,
                "DBIT" => CreditDebitIndicator::Debit,
                other => {
                    tracing::warn!(indicator = other, "unrecognized CdtDbtInd, dropping entry");
                    continue;
                }
            };

            let status = match raw.status.code.as_str() {
                "BOOK" => EntryStatus::Book,
                "PDNG" => EntryStatus::Pending,
                "INFO" => EntryStatus::Info,
                other => {
                    tracing::warn!(status = other, "unrecognized Sts code, dropping entry");
                    continue;
                }
            };

            let amount = match Decimal::from_str(&raw.amount.value) {
                Ok(a) => a,
                Err(e) => {
                    tracing::warn!(error = %e, "unparseable Amt, dropping entry");
                    continue;
                }
            };

            let payment_information_id = if credit_debit_indicator == CreditDebitIndicator::Debit
            {
                raw.referenced_payment_information_id()
            } else {
                None
            };

            let transaction_json = serde_json::to_value(raw).unwrap_or(serde_json::Value::Null);

            entries.push(BankTransactionEntry {
                transaction_id: BankTransactionEntry::dedup_key(&acct_svcr_ref),
                credit_debit_indicator,
                currency: raw.amount.currency.clone(),
                amount,
                status,
                transaction_json,
                payment_information_id,
            });
        }
    }

    ParsedDocument {
        message_id: group_header.message_id,
        creation_date_time: group_header.creation_date_time,
        entries,
    }
}

#[derive(Debug, Deserialize)]
struct Document052 {
    #[serde(rename = "BkToCstmrAcctRpt")]
    body: Body052,
}

#[derive(Debug, Deserialize)]
struct Body052 {
    #[serde(rename = "GrpHdr")]
    group_header: GroupHeader,
    #[serde(rename = "Rpt", default)]
    reports: Vec<ReportOrStatement>,
}

#[derive(Debug, Deserialize)]
struct Document053 {
    #[serde(rename = "BkToCstmrStmt")]
    body: Body053,
}

#[derive(Debug, Deserialize)]
struct Body053 {
    #[serde(rename = "GrpHdr")]
    group_header: GroupHeader,
    #[serde(rename = "Stmt", default)]
    statements: Vec<ReportOrStatement>,
}

#[derive(Debug, Deserialize)]
struct Document054 {
    #[serde(rename = "BkToCstmrDbtCdtNtfctn")]
    body: Body054,
}

#[derive(Debug, Deserialize)]
struct Body054 {
    #[serde(rename = "GrpHdr")]
    group_header: GroupHeader,
    #[serde(rename = "Ntfctn", default)]
    notifications: Vec<ReportOrStatement>,
}

/// Parse a camt.052.001.xx `BkToCstmrAcctRpt` document.
pub fn parse_camt052(xml: &str) -> Result<ParsedDocument> {
    let doc: Document052 = quick_xml::de::from_str(xml)?;
    Ok(canonicalize(doc.body.group_header, doc.body.reports))
}

/// Parse a camt.053.001.xx `BkToCstmrStmt` document.
pub fn parse_camt053(xml: &str) -> Result<ParsedDocument> {
    let doc: Document053 = quick_xml::de::from_str(xml)?;
    Ok(canonicalize(doc.body.group_header, doc.body.statements))
}

/// Parse a camt.054.001.xx `BkToCstmrDbtCdtNtfctn` document.
pub fn parse_camt054(xml: &str) -> Result<ParsedDocument> {
    let doc: Document054 = quick_xml::de::from_str(xml)?;
    Ok(canonicalize(doc.body.group_header, doc.body.notifications))
}

/// Parse any of the three supported camt message types, selected by `level`.
pub fn parse(level: FetchLevel, xml: &str) -> Result<ParsedDocument> {
    match level {
        FetchLevel::Report => parse_camt052(xml),
        FetchLevel::Statement => parse_camt053(xml),
        FetchLevel::Notification => parse_camt054(xml),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CAMT053: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Document xmlns="urn:iso:std:iso:20022:tech:xsd:camt.053.001.02">
  <BkToCstmrStmt>
    <GrpHdr>
      <MsgId>MSG-1</MsgId>
      <CreDtTm>2026-01-05T10:00:00Z</CreDtTm>
    </GrpHdr>
    <Stmt>
      <Ntry>
        <Amt Ccy="EUR">12.34</Amt>
        <CdtDbtInd>CRDT</CdtDbtInd>
        <Sts><Cd>BOOK</Cd></Sts>
        <AcctSvcrRef>REF-1</AcctSvcrRef>
      </Ntry>
      <Ntry>
        <Amt Ccy="EUR">5.00</Amt>
        <CdtDbtInd>DBIT</CdtDbtInd>
        <Sts><Cd>BOOK</Cd></Sts>
        <AcctSvcrRef>REF-2</AcctSvcrRef>
        <NtryDtls>
          <Btch>
            <TxDtls>
              <Refs><PmtInfId>PMTINF-9</PmtInfId></Refs>
            </TxDtls>
          </Btch>
        </NtryDtls>
      </Ntry>
      <Ntry>
        <Amt Ccy="EUR">1.00</Amt>
        <CdtDbtInd>CRDT</CdtDbtInd>
        <Sts><Cd>BOOK</Cd></Sts>
      </Ntry>
    </Stmt>
  </BkToCstmrStmt>
</Document>"#;

    #[test]
    fn parses_group_header() {
        let doc = parse_camt053(CAMT053).unwrap();
        assert_eq!(doc.message_id, "MSG-1");
    }

    #[test]
    fn entry_without_acct_svcr_ref_is_dropped() {
        let doc = parse_camt053(CAMT053).unwrap();
        assert_eq!(doc.entries.len(), 2);
    }

    #[test]
    fn dedup_key_uses_acct_svcr_ref_prefix() {
        let doc = parse_camt053(CAMT053).unwrap();
        assert_eq!(doc.entries[0].transaction_id, "AcctSvcrRef:REF-1");
    }

    #[test]
    fn debit_entry_picks_up_payment_information_id() {
        let doc = parse_camt053(CAMT053).unwrap();
        let debit = &doc.entries[1];
        assert_eq!(debit.credit_debit_indicator, CreditDebitIndicator::Debit);
        assert_eq!(
            debit.payment_information_id.as_deref(),
            Some("PMTINF-9")
        );
    }

    #[test]
    fn credit_entry_has_no_payment_information_id() {
        let doc = parse_camt053(CAMT053).unwrap();
        assert_eq!(doc.entries[0].payment_information_id, None);
    }
}
