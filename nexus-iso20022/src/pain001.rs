//! pain.001 (Customer Credit Transfer Initiation) generation.
//!
//! One `PaymentInitiation` maps to exactly one `CdtTrfTxInf` — this version
//! never batches several initiations into one `PmtInf`/message.

use crate::dialect::Dialect;
use crate::error::{Error, Result};
use chrono::{DateTime, NaiveDate, Utc};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use rust_decimal::Decimal;
use std::io::Cursor;
use uuid::Uuid;

/// A party on one side of a credit transfer (debtor or creditor).
#[derive(Debug, Clone)]
pub struct Party {
    /// IBAN.
    pub iban: String,
    /// BIC, when known.
    pub bic: Option<String>,
    /// Display name.
    pub name: String,
}

/// The abstract input to pain.001 generation. Everything identifier-shaped
/// is assigned by [`generate_identifiers`], not supplied by the caller.
#[derive(Debug, Clone)]
pub struct PaymentInitiationData {
    /// The bank account the transfer debits, used only to scope identifier
    /// generation (its IBAN/BIC live on `debtor`).
    pub bank_account_id: Uuid,
    /// The debiting party.
    pub debtor: Party,
    /// The crediting party.
    pub creditor: Party,
    /// Transfer amount. MUST have at most 2 fractional digits; validated by
    /// [`validate_amount_precision`] before this struct reaches the writer.
    pub amount: Decimal,
    /// ISO 4217 currency code.
    pub currency: String,
    /// Unstructured remittance information.
    pub subject: String,
    /// `ReqdExctnDt`.
    pub requested_execution_date: NaiveDate,
    /// The bank account's current `pain001Counter`, already incremented for
    /// this initiation by the caller under the subscriber mutex.
    pub pain_counter: i64,
    /// Wall-clock time of preparation, used for `CreDtTm` and identifiers.
    pub prepared_at: DateTime<Utc>,
}

/// The four identifiers pain.001 generation assigns to one initiation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedIdentifiers {
    /// `PmtId/EndToEndId`.
    pub end_to_end_id: String,
    /// `GrpHdr/MsgId`.
    pub message_id: String,
    /// `PmtInf/PmtInfId`.
    pub payment_information_id: String,
    /// `PmtId/InstrId`.
    pub instruction_id: String,
}

/// Reject amounts whose decimal representation needs more than 2 fractional
/// digits. The bank side applies ISO 20022's own looser limit, but Nexus's
/// own contract is stricter and catches this before the wire.
pub fn validate_amount_precision(amount: Decimal) -> Result<()> {
    if amount.round_dp(2) != amount {
        return Err(Error::ExcessPrecision(amount.to_string()));
    }
    Ok(())
}

/// Assign the identifier quadruple for one initiation following the
/// `leuf-<role>-<timestampHex>-<painCounterHex>-<accountHex>` template.
pub fn generate_identifiers(data: &PaymentInitiationData) -> GeneratedIdentifiers {
    GeneratedIdentifiers {
        end_to_end_id: generate_identifier("e2e", data),
        message_id: generate_identifier("msg", data),
        payment_information_id: generate_identifier("pmtinf", data),
        instruction_id: generate_identifier("instr", data),
    }
}

fn generate_identifier(role: &str, data: &PaymentInitiationData) -> String {
    format!(
        "leuf-{}-{:x}-{:x}-{:x}",
        role,
        data.prepared_at.timestamp(),
        data.pain_counter,
        account_hex(data.bank_account_id)
    )
}

fn account_hex(account_id: Uuid) -> u64 {
    let bytes = account_id.as_bytes();
    u64::from_be_bytes(bytes[..8].try_into().expect("uuid is 16 bytes"))
}

/// Build a pain.001 document for `data` under `dialect`, returning the
/// serialized XML plus the identifiers assigned to it.
pub fn build(
    dialect: Dialect,
    data: &PaymentInitiationData,
) -> Result<(String, GeneratedIdentifiers)> {
    validate_amount_precision(data.amount)?;
    let ids = generate_identifiers(data);
    let xml = write_document(dialect, data, &ids)?;
    Ok((xml, ids))
}

/// Build a pain.001 document for `data` under `dialect`, reusing an already
/// assigned `ids` quadruple instead of deriving a fresh one. For resubmitting
/// (or re-rendering for upload) an initiation whose identifiers were fixed
/// at creation time and must not drift from what was persisted.
pub fn build_with_identifiers(
    dialect: Dialect,
    data: &PaymentInitiationData,
    ids: &GeneratedIdentifiers,
) -> Result<String> {
    validate_amount_precision(data.amount)?;
    write_document(dialect, data, ids)
}

fn write_document(
    dialect: Dialect,
    data: &PaymentInitiationData,
    ids: &GeneratedIdentifiers,
) -> Result<String> {
    let mut writer = Writer::new(Cursor::new(Vec::new()));

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let mut root = BytesStart::new("Document");
    root.push_attribute(("xmlns", dialect.pain001_namespace()));
    writer.write_event(Event::Start(root))?;

    writer.write_event(Event::Start(BytesStart::new("CstmrCdtTrfInitn")))?;

    write_group_header(&mut writer, data, ids)?;
    write_payment_information(&mut writer, data, ids)?;

    writer.write_event(Event::End(BytesEnd::new("CstmrCdtTrfInitn")))?;
    writer.write_event(Event::End(BytesEnd::new("Document")))?;

    let bytes = writer.into_inner().into_inner();
    String::from_utf8(bytes).map_err(|e| Error::Serialization(e.to_string()))
}

fn write_group_header(
    writer: &mut Writer<Cursor<Vec<u8>>>,
    data: &PaymentInitiationData,
    ids: &GeneratedIdentifiers,
) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new("GrpHdr")))?;
    write_element(writer, "MsgId", &ids.message_id)?;
    write_element(writer, "CreDtTm", &data.prepared_at.to_rfc3339())?;
    write_element(writer, "NbOfTxs", "1")?;
    write_element(writer, "CtrlSum", &format_amount(data.amount))?;
    writer.write_event(Event::Start(BytesStart::new("InitgPty")))?;
    write_element(writer, "Nm", &data.debtor.name)?;
    writer.write_event(Event::End(BytesEnd::new("InitgPty")))?;
    writer.write_event(Event::End(BytesEnd::new("GrpHdr")))?;
    Ok(())
}

fn write_payment_information(
    writer: &mut Writer<Cursor<Vec<u8>>>,
    data: &PaymentInitiationData,
    ids: &GeneratedIdentifiers,
) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new("PmtInf")))?;
    write_element(writer, "PmtInfId", &ids.payment_information_id)?;
    write_element(writer, "PmtMtd", "TRF")?;
    write_element(writer, "BtchBookg", "false")?;
    write_element(writer, "NbOfTxs", "1")?;
    write_element(writer, "CtrlSum", &format_amount(data.amount))?;

    writer.write_event(Event::Start(BytesStart::new("PmtTpInf")))?;
    writer.write_event(Event::Start(BytesStart::new("SvcLvl")))?;
    write_element(writer, "Cd", "SEPA")?;
    writer.write_event(Event::End(BytesEnd::new("SvcLvl")))?;
    writer.write_event(Event::End(BytesEnd::new("PmtTpInf")))?;

    write_element(
        writer,
        "ReqdExctnDt",
        &data.requested_execution_date.format("%Y-%m-%d").to_string(),
    )?;

    writer.write_event(Event::Start(BytesStart::new("Dbtr")))?;
    write_element(writer, "Nm", &data.debtor.name)?;
    writer.write_event(Event::End(BytesEnd::new("Dbtr")))?;

    write_account(writer, "DbtrAcct", &data.debtor.iban)?;
    write_agent(writer, "DbtrAgt", data.debtor.bic.as_deref())?;

    write_element(writer, "ChrgBr", "SLEV")?;

    writer.write_event(Event::Start(BytesStart::new("CdtTrfTxInf")))?;
    writer.write_event(Event::Start(BytesStart::new("PmtId")))?;
    write_element(writer, "InstrId", &ids.instruction_id)?;
    write_element(writer, "EndToEndId", &ids.end_to_end_id)?;
    writer.write_event(Event::End(BytesEnd::new("PmtId")))?;

    writer.write_event(Event::Start(BytesStart::new("Amt")))?;
    let mut instd_amt = BytesStart::new("InstdAmt");
    instd_amt.push_attribute(("Ccy", data.currency.as_str()));
    writer.write_event(Event::Start(instd_amt))?;
    writer.write_event(Event::Text(BytesText::new(&format_amount(data.amount))))?;
    writer.write_event(Event::End(BytesEnd::new("InstdAmt")))?;
    writer.write_event(Event::End(BytesEnd::new("Amt")))?;

    if let Some(bic) = data.creditor.bic.as_deref() {
        write_agent(writer, "CdtrAgt", Some(bic))?;
    }

    writer.write_event(Event::Start(BytesStart::new("Cdtr")))?;
    write_element(writer, "Nm", &data.creditor.name)?;
    writer.write_event(Event::End(BytesEnd::new("Cdtr")))?;

    write_account(writer, "CdtrAcct", &data.creditor.iban)?;

    writer.write_event(Event::Start(BytesStart::new("RmtInf")))?;
    write_element(writer, "Ustrd", &data.subject)?;
    writer.write_event(Event::End(BytesEnd::new("RmtInf")))?;

    writer.write_event(Event::End(BytesEnd::new("CdtTrfTxInf")))?;
    writer.write_event(Event::End(BytesEnd::new("PmtInf")))?;
    Ok(())
}

fn write_account(writer: &mut Writer<Cursor<Vec<u8>>>, tag: &str, iban: &str) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new(tag)))?;
    writer.write_event(Event::Start(BytesStart::new("Id")))?;
    write_element(writer, "IBAN", iban)?;
    writer.write_event(Event::End(BytesEnd::new("Id")))?;
    writer.write_event(Event::End(BytesEnd::new(tag.to_string())))?;
    Ok(())
}

fn write_agent(writer: &mut Writer<Cursor<Vec<u8>>>, tag: &str, bic: Option<&str>) -> Result<()> {
    let Some(bic) = bic else { return Ok(()) };
    writer.write_event(Event::Start(BytesStart::new(tag)))?;
    writer.write_event(Event::Start(BytesStart::new("FinInstnId")))?;
    write_element(writer, "BIC", bic)?;
    writer.write_event(Event::End(BytesEnd::new("FinInstnId")))?;
    writer.write_event(Event::End(BytesEnd::new(tag.to_string())))?;
    Ok(())
}

fn write_element(writer: &mut Writer<Cursor<Vec<u8>>>, tag: &str, text: &str) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new(tag)))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(tag.to_string())))?;
    Ok(())
}

fn format_amount(amount: Decimal) -> String {
    format!("{:.2}", amount)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn sample() -> PaymentInitiationData {
        PaymentInitiationData {
            bank_account_id: Uuid::from_u128(0x1234_5678_9abc_def0_1234_5678_9abc_def0),
            debtor: Party {
                iban: "DE00TESTDEBTOR".into(),
                bic: Some("TESTDEBT".into()),
                name: "Tester".into(),
            },
            creditor: Party {
                iban: "DE00TESTCREDITOR".into(),
                bic: Some("SANDBOXX".into()),
                name: "Creditor".into(),
            },
            amount: Decimal::new(100, 2),
            currency: "EUR".into(),
            subject: "test payment".into(),
            requested_execution_date: NaiveDate::from_ymd_opt(2026, 1, 5).unwrap(),
            pain_counter: 7,
            prepared_at: Utc.with_ymd_and_hms(2026, 1, 5, 10, 0, 0).unwrap(),
        }
    }

    #[test]
    fn rejects_excess_precision() {
        assert!(validate_amount_precision(Decimal::new(1001, 3)).is_err());
    }

    #[test]
    fn accepts_two_fractional_digits() {
        assert!(validate_amount_precision(Decimal::new(1050, 2)).is_ok());
    }

    #[test]
    fn identifiers_differ_by_role() {
        let ids = generate_identifiers(&sample());
        assert_ne!(ids.end_to_end_id, ids.message_id);
        assert_ne!(ids.message_id, ids.payment_information_id);
        assert_ne!(ids.payment_information_id, ids.instruction_id);
    }

    #[test]
    fn successive_counters_yield_distinct_identifiers() {
        let mut a = sample();
        let mut b = sample();
        a.pain_counter = 7;
        b.pain_counter = 8;
        assert_ne!(
            generate_identifiers(&a).end_to_end_id,
            generate_identifiers(&b).end_to_end_id
        );
    }

    #[test]
    fn builds_well_formed_document_containing_amount_and_subject() {
        let (xml, _ids) = build(Dialect::H004, &sample()).unwrap();
        assert!(xml.contains("pain.001.001.03"));
        assert!(xml.contains("<InstdAmt Ccy=\"EUR\">1.00</InstdAmt>"));
        assert!(xml.contains("<Ustrd>test payment</Ustrd>"));
        assert!(xml.contains("<IBAN>DE00TESTCREDITOR</IBAN>"));
    }

    #[test]
    fn h005_dialect_uses_pain_09_namespace() {
        let (xml, _ids) = build(Dialect::H005, &sample()).unwrap();
        assert!(xml.contains("pain.001.001.09"));
    }

    #[test]
    fn build_rejects_excess_precision_before_writing() {
        let mut data = sample();
        data.amount = Decimal::new(1001, 3);
        assert!(build(Dialect::H004, &data).is_err());
    }

    proptest! {
        /// Invariant 3 (spec.md §8): the identifier quadruple for the n-th
        /// initiation of an account differs from the (n-1)-th, for any two
        /// distinct counter values at the same instant.
        #[test]
        fn distinct_counters_yield_distinct_identifiers(
            counter_a in 0i64..1_000_000,
            counter_b in 0i64..1_000_000,
        ) {
            prop_assume!(counter_a != counter_b);
            let mut a = sample();
            let mut b = sample();
            a.pain_counter = counter_a;
            b.pain_counter = counter_b;
            prop_assert_ne!(
                generate_identifiers(&a).end_to_end_id,
                generate_identifiers(&b).end_to_end_id
            );
        }

        /// Amounts with at most 2 fractional digits are always accepted;
        /// amounts with more are always rejected, for any cent value and any
        /// extra sub-cent digit.
        #[test]
        fn amount_precision_contract_is_exact(cents in 0i64..100_000_000, sub_cent in 1u8..10) {
            let two_dp = Decimal::new(cents, 2);
            prop_assert!(validate_amount_precision(two_dp).is_ok());

            let three_dp = Decimal::new(cents * 10 + sub_cent as i64, 3);
            prop_assert!(validate_amount_precision(three_dp).is_err());
        }

        /// Every generated identifier carries its role in the template and
        /// round-trips through the document without truncation.
        #[test]
        fn generated_identifiers_appear_verbatim_in_the_document(counter in 0i64..1_000_000) {
            let mut data = sample();
            data.pain_counter = counter;
            let (xml, ids) = build(Dialect::H004, &data).unwrap();
            prop_assert!(xml.contains(&ids.end_to_end_id));
            prop_assert!(xml.contains(&ids.message_id));
            prop_assert!(xml.contains(&ids.payment_information_id));
            prop_assert!(xml.contains(&ids.instruction_id));
        }
    }
}
