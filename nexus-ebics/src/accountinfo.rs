//! Parsing of the `HTDResponseOrderData` document (the HTD download's
//! payload): the set of accounts a subscriber is authorized to use, reported
//! by the bank so Nexus can offer them for import (spec.md §4.2's
//! `OfferedBankAccount`).

use crate::error::{Error, Result};
use serde::Deserialize;

/// One account the bank reports as available to this subscriber.
#[derive(Debug, Clone)]
pub struct OfferedAccount {
    /// The bank's own identifier for the account, stable across HTD calls.
    pub remote_account_id: String,
    /// IBAN, when the bank reports one.
    pub iban: String,
    /// BIC/bank code.
    pub bank_code: String,
    /// Display name of the account holder.
    pub holder_name: String,
}

#[derive(Debug, Deserialize)]
struct HtdResponseOrderData {
    #[serde(rename = "PartnerInfo")]
    partner_info: PartnerInfo,
}

#[derive(Debug, Deserialize)]
struct PartnerInfo {
    #[serde(rename = "AccountInfo", default)]
    account_info: Vec<AccountInfo>,
}

#[derive(Debug, Deserialize)]
struct AccountInfo {
    #[serde(rename = "@ID")]
    id: String,
    #[serde(rename = "AccountNumber", default)]
    account_number: Vec<IdValue>,
    #[serde(rename = "BankCode", default)]
    bank_code: Vec<IdValue>,
    #[serde(rename = "AccountHolder", default)]
    account_holder: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IdValue {
    #[serde(rename = "@international")]
    international: Option<String>,
    #[serde(rename = "$text")]
    value: String,
}

impl IdValue {
    fn is_international(&self) -> bool {
        self.international.as_deref() == Some("true")
    }
}

fn preferred(values: &[IdValue]) -> Option<&str> {
    values
        .iter()
        .find(|v| v.is_international())
        .or_else(|| values.first())
        .map(|v| v.value.as_str())
}

/// Parse one `HTDResponseOrderData` document into its offered accounts.
/// Accounts missing an `AccountNumber` are dropped with a warning — they
/// can't be matched to an IBAN-keyed `BankAccount` later.
pub fn parse(xml: &str) -> Result<Vec<OfferedAccount>> {
    let doc: HtdResponseOrderData =
        quick_xml::de::from_str(xml).map_err(|e| Error::Framing(format!("HTD response: {e}")))?;

    let mut accounts = Vec::new();
    for info in doc.partner_info.account_info {
        let Some(iban) = preferred(&info.account_number) else {
            tracing::warn!(account_id = %info.id, "HTD account without AccountNumber dropped");
            continue;
        };
        let bank_code = preferred(&info.bank_code).unwrap_or_default();
        accounts.push(OfferedAccount {
            remote_account_id: info.id,
            iban: iban.to_string(),
            bank_code: bank_code.to_string(),
            holder_name: info.account_holder.unwrap_or_default(),
        });
    }
    Ok(accounts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_htd_response() {
        let xml = r#"
            <HTDResponseOrderData>
              <PartnerInfo>
                <AccountInfo ID="A1">
                  <AccountNumber international="true">DE00TESTACCOUNT</AccountNumber>
                  <BankCode international="true">TESTBIC</BankCode>
                  <AccountHolder>Jane Doe</AccountHolder>
                </AccountInfo>
              </PartnerInfo>
            </HTDResponseOrderData>
        "#;
        let accounts = parse(xml).unwrap();
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].remote_account_id, "A1");
        assert_eq!(accounts[0].iban, "DE00TESTACCOUNT");
        assert_eq!(accounts[0].bank_code, "TESTBIC");
        assert_eq!(accounts[0].holder_name, "Jane Doe");
    }

    #[test]
    fn drops_accounts_without_account_number() {
        let xml = r#"
            <HTDResponseOrderData>
              <PartnerInfo>
                <AccountInfo ID="A1">
                  <BankCode>TESTBIC</BankCode>
                </AccountInfo>
              </PartnerInfo>
            </HTDResponseOrderData>
        "#;
        assert!(parse(xml).unwrap().is_empty());
    }
}
