//! The persisted data model (spec.md §3): one struct per table, `FromRow`
//! for direct binding out of `sqlx::query_as`.

use chrono::{DateTime, Utc};
use nexus_iso20022::camt::FetchLevel;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// `CdtDbtInd`, mirrored locally so it can derive `sqlx::Type`; convert to
/// and from [`nexus_iso20022::entry::CreditDebitIndicator`] at the ingestion
/// boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "PascalCase")]
pub enum CreditDebitIndicator {
    /// Money moved into the account.
    Credit,
    /// Money moved out of the account.
    Debit,
}

impl From<nexus_iso20022::entry::CreditDebitIndicator> for CreditDebitIndicator {
    fn from(value: nexus_iso20022::entry::CreditDebitIndicator) -> Self {
        match value {
            nexus_iso20022::entry::CreditDebitIndicator::Credit => CreditDebitIndicator::Credit,
            nexus_iso20022::entry::CreditDebitIndicator::Debit => CreditDebitIndicator::Debit,
        }
    }
}

impl From<CreditDebitIndicator> for nexus_iso20022::entry::CreditDebitIndicator {
    fn from(value: CreditDebitIndicator) -> Self {
        match value {
            CreditDebitIndicator::Credit => nexus_iso20022::entry::CreditDebitIndicator::Credit,
            CreditDebitIndicator::Debit => nexus_iso20022::entry::CreditDebitIndicator::Debit,
        }
    }
}

/// `Sts`, mirrored locally for the same reason as [`CreditDebitIndicator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "PascalCase")]
pub enum EntryStatus {
    /// Booked, final.
    Book,
    /// Pending, not yet final.
    Pending,
    /// Informational only.
    Info,
}

impl From<nexus_iso20022::entry::EntryStatus> for EntryStatus {
    fn from(value: nexus_iso20022::entry::EntryStatus) -> Self {
        match value {
            nexus_iso20022::entry::EntryStatus::Book => EntryStatus::Book,
            nexus_iso20022::entry::EntryStatus::Pending => EntryStatus::Pending,
            nexus_iso20022::entry::EntryStatus::Info => EntryStatus::Info,
        }
    }
}

impl From<EntryStatus> for nexus_iso20022::entry::EntryStatus {
    fn from(value: EntryStatus) -> Self {
        match value {
            EntryStatus::Book => nexus_iso20022::entry::EntryStatus::Book,
            EntryStatus::Pending => nexus_iso20022::entry::EntryStatus::Pending,
            EntryStatus::Info => nexus_iso20022::entry::EntryStatus::Info,
        }
    }
}

/// The only connection type this spec makes a first-class citizen. The
/// column exists so future connection types can be added without a schema
/// migration; nothing else in this crate reads it as anything but `Ebics`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum ConnectionType {
    /// EBICS H004/H005.
    Ebics,
}

/// `BankConnection` — a named relationship with one bank, of one connection
/// type, owned by one operator identity.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BankConnection {
    /// Primary key.
    pub id: Uuid,
    /// Stable, unique name.
    pub name: String,
    /// Connection type; always `Ebics` in this version.
    pub connection_type: ConnectionType,
    /// Dialect tag, e.g. `"H004"` or `"H005"`.
    pub dialect: String,
    /// Owning operator identity.
    pub owner: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// `ebics_ini_state` / `ebics_hia_state`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KeyManagementState {
    /// Not yet sent to the bank.
    NotSent,
    /// Sent.
    Sent,
    /// Indeterminate.
    Unknown,
}

/// `EbicsSubscriber` — one-to-one with a `BankConnection` of type `Ebics`.
///
/// Key material is stored as PKCS#8/SubjectPublicKeyInfo DER, exactly what
/// `nexus_crypto::keys` produces and consumes; at-rest encryption of the
/// private key columns is a deployment concern handled below the database
/// row (see DESIGN.md).
#[derive(Debug, Clone, FromRow)]
pub struct EbicsSubscriber {
    /// Primary key, also the owning `BankConnection`'s id.
    pub connection_id: Uuid,
    /// Bank's EBICS endpoint URL.
    pub url: String,
    /// `HostID`.
    pub host_id: String,
    /// `PartnerID`.
    pub partner_id: String,
    /// `UserID`.
    pub user_id: String,
    /// PKCS#8 DER signing private key.
    pub signing_private_key_der: Vec<u8>,
    /// PKCS#8 DER authentication private key.
    pub authentication_private_key_der: Vec<u8>,
    /// PKCS#8 DER encryption private key.
    pub encryption_private_key_der: Vec<u8>,
    /// SubjectPublicKeyInfo DER of the bank's authentication key, once HPB
    /// has succeeded.
    pub bank_authentication_public_key_der: Option<Vec<u8>>,
    /// SubjectPublicKeyInfo DER of the bank's encryption key, once HPB has
    /// succeeded.
    pub bank_encryption_public_key_der: Option<Vec<u8>>,
    /// INI upload state.
    pub ini_state: KeyManagementState,
    /// HIA upload state.
    pub hia_state: KeyManagementState,
}

/// `BankAccount` — the ledger's unit of ownership for ingested transactions
/// and watermarks.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BankAccount {
    /// Primary key.
    pub id: Uuid,
    /// Stable, unique label.
    pub label: String,
    /// Account holder's display name.
    pub holder_name: String,
    /// IBAN; immutable after the first ingestion.
    pub iban: String,
    /// BIC.
    pub bank_code: String,
    /// Connection used for scheduled fetch/submit, when set.
    pub default_connection_id: Option<Uuid>,
    /// Watermark for camt.052 fetches.
    pub last_report_creation_timestamp: Option<DateTime<Utc>>,
    /// Watermark for camt.053 fetches.
    pub last_statement_creation_timestamp: Option<DateTime<Utc>>,
    /// Watermark for camt.054 fetches.
    pub last_notification_creation_timestamp: Option<DateTime<Utc>>,
    /// Highest `BankMessage.serial_id` ingested so far for this account.
    pub highest_seen_bank_message_serial_id: i64,
    /// Monotonically increasing counter feeding pain.001 identifier
    /// generation; read-modify-written under a row lock.
    pub pain001_counter: i64,
}

impl BankAccount {
    /// The watermark column for a given fetch level.
    pub fn watermark(&self, level: FetchLevel) -> Option<DateTime<Utc>> {
        match level {
            FetchLevel::Report => self.last_report_creation_timestamp,
            FetchLevel::Statement => self.last_statement_creation_timestamp,
            FetchLevel::Notification => self.last_notification_creation_timestamp,
        }
    }
}

/// `OfferedBankAccount` — an account the bank reports as available to this
/// subscriber via HTD/HKD, not yet (or already) imported.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OfferedBankAccount {
    /// Primary key.
    pub id: Uuid,
    /// Owning connection.
    pub connection_id: Uuid,
    /// The bank's own account identifier.
    pub remote_account_id: String,
    /// IBAN.
    pub iban: String,
    /// BIC.
    pub bank_code: String,
    /// Holder name as reported by the bank.
    pub holder_name: String,
    /// Set once this offer has been imported into a `BankAccount`.
    pub imported_account_id: Option<Uuid>,
}

/// `fetch_level` for `BankMessage` and `ScheduledTask` fetch params.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum BankMessageLevel {
    /// camt.052.
    Report,
    /// camt.053.
    Statement,
    /// camt.054.
    Notification,
}

impl From<FetchLevel> for BankMessageLevel {
    fn from(level: FetchLevel) -> Self {
        match level {
            FetchLevel::Report => BankMessageLevel::Report,
            FetchLevel::Statement => BankMessageLevel::Statement,
            FetchLevel::Notification => BankMessageLevel::Notification,
        }
    }
}

impl From<BankMessageLevel> for FetchLevel {
    fn from(level: BankMessageLevel) -> Self {
        match level {
            BankMessageLevel::Report => FetchLevel::Report,
            BankMessageLevel::Statement => FetchLevel::Statement,
            BankMessageLevel::Notification => FetchLevel::Notification,
        }
    }
}

/// `BankMessage` — the raw bytes of one successful bank download response,
/// kept forever for forensics even after its entries are ingested.
#[derive(Debug, Clone, FromRow)]
pub struct BankMessage {
    /// Auto-increment primary key; also what
    /// `highestSeenBankMessageSerialId` tracks.
    pub serial_id: i64,
    /// Owning connection.
    pub connection_id: Uuid,
    /// Which fetch level produced this message.
    pub fetch_level: BankMessageLevel,
    /// The camt `MsgId`, when parsing succeeded far enough to read it.
    pub message_id: Option<String>,
    /// Raw response bytes (decrypted, inflated order data).
    pub raw: Vec<u8>,
    /// Set if parsing this message failed; ingestion moves on to the next
    /// message rather than aborting the whole fetch.
    pub errors: bool,
    /// When this message was received.
    pub received_at: DateTime<Utc>,
}

/// `BankTransactionEntry` — one canonicalized booking entry, deduplicated
/// on `(bank_account_id, transaction_id)`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BankTransactionEntry {
    /// Auto-increment primary key; discovery order, which the facade bus
    /// relies on.
    pub id: i64,
    /// Owning account.
    pub bank_account_id: Uuid,
    /// `"AcctSvcrRef:" + ref`; unique per account.
    pub transaction_id: String,
    /// `CdtDbtInd`.
    pub credit_debit_indicator: CreditDebitIndicator,
    /// ISO 4217 currency.
    pub currency: String,
    /// Always positive.
    pub amount: Decimal,
    /// `Sts`.
    pub status: EntryStatus,
    /// Full parsed entry, for facades and forensics.
    pub transaction_json: serde_json::Value,
    /// Set by a later entry that supersedes this one (status correction);
    /// never set at insert time.
    pub updated_by: Option<i64>,
    /// When this row was inserted.
    pub created_at: DateTime<Utc>,
}

/// `PaymentInitiation` — one outbound credit transfer, one-shot idempotent
/// on `(bank_account_id, uid)`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PaymentInitiation {
    /// Primary key.
    pub id: Uuid,
    /// Debiting account.
    pub bank_account_id: Uuid,
    /// Client-supplied request deduper, when given.
    pub uid: Option<String>,
    /// When this initiation was prepared (pain.001 built).
    pub prepared_at: DateTime<Utc>,
    /// When it was actually uploaded to the bank, if ever.
    pub submission_date: Option<DateTime<Utc>>,
    /// Transfer amount.
    pub amount: Decimal,
    /// ISO 4217 currency.
    pub currency: String,
    /// `PmtId/EndToEndId`.
    pub end_to_end_id: String,
    /// `GrpHdr/MsgId`.
    pub message_id: String,
    /// `PmtInf/PmtInfId`.
    pub payment_information_id: String,
    /// `PmtId/InstrId`.
    pub instruction_id: String,
    /// `RmtInf/Ustrd`.
    pub subject: String,
    /// Creditor IBAN.
    pub creditor_iban: String,
    /// Creditor BIC, when given.
    pub creditor_bic: Option<String>,
    /// Creditor display name.
    pub creditor_name: String,
    /// `true` once the upload transaction has succeeded.
    pub submitted: bool,
    /// Set if validation later proves this initiation can never be
    /// submitted (e.g. an amount precision violation discovered post-hoc).
    pub invalid: bool,
    /// The confirming debit entry, discovered asynchronously by ingestion.
    pub confirmation_transaction_id: Option<i64>,
}

/// `task_type` for `ScheduledTask`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum TaskType {
    /// Runs one or more download transactions, then ingestion.
    Fetch,
    /// Runs `submit_all_pending` for the bound bank account.
    Submit,
}

/// `ScheduledTask` — a cron-bound fetch or submit job against one resource.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ScheduledTask {
    /// Primary key.
    pub id: Uuid,
    /// The resource type this task is bound to, e.g. `"bank-account"`.
    pub resource_type: String,
    /// The resource's id (a `BankAccount.id` in every case this spec uses).
    pub resource_id: Uuid,
    /// Unique within `(resource_type, resource_id)`.
    pub name: String,
    /// `Fetch` or `Submit`.
    pub task_type: TaskType,
    /// Five/six-field cron spec, or the literal `"* * *"`.
    pub cronspec: String,
    /// Task-type-specific parameters.
    pub params: serde_json::Value,
    /// Epoch seconds of the next scheduled run.
    pub next_scheduled_execution_sec: i64,
    /// Epoch seconds of the previous run, if any.
    pub prev_scheduled_execution_sec: Option<i64>,
}
