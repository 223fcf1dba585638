//! The `Database` wrapper: one `PgPool` per process, one method per
//! operation, idempotency and row-locking built into the SQL rather than
//! bolted on above it — the same shape as `token-engine`'s `Database`.

use crate::error::{Error, Result};
use crate::types::{
    BankAccount, BankConnection, BankMessage, BankMessageLevel, BankTransactionEntry,
    ConnectionType, CreditDebitIndicator, EbicsSubscriber, EntryStatus, KeyManagementState,
    OfferedBankAccount, PaymentInitiation, ScheduledTask, TaskType,
};
use chrono::{DateTime, Utc};
use nexus_iso20022::camt::FetchLevel;
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, Transaction};
use std::time::Duration;
use uuid::Uuid;

/// Owns the connection pool and runs every query this crate needs.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Connect and return a `Database`. Does not run migrations; call
    /// [`Database::migrate`] once at startup.
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await?;
        Ok(Database { pool })
    }

    /// The underlying pool, for callers (e.g. nexus-service's health check)
    /// that need a raw connection.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Start a transaction spanning several of this type's `_tx` methods,
    /// for callers that need more than one write to commit or roll back
    /// together (spec.md §5, "Watermarks are updated inside the same
    /// transaction as the new ledger rows").
    pub async fn begin(&self) -> Result<Transaction<'_, Postgres>> {
        Ok(self.pool.begin().await?)
    }

    /// Apply every migration under `migrations/` that has not yet run.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Drop and recreate every table this crate owns, for the `reset-tables`
    /// CLI command. Deliberately blunt: development and test fixtures only.
    pub async fn reset_tables(&self) -> Result<()> {
        sqlx::query(
            r#"
            TRUNCATE bank_transaction_entries, bank_messages, payment_initiations,
                     offered_bank_accounts, scheduled_tasks, bank_accounts,
                     ebics_subscribers, bank_connections
            RESTART IDENTITY CASCADE
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // ---- bank connections ------------------------------------------------

    /// Create a new EBICS bank connection and its (key-less, pre-INI)
    /// subscriber row in one transaction.
    pub async fn create_ebics_connection(
        &self,
        name: &str,
        dialect: &str,
        owner: &str,
        url: &str,
        host_id: &str,
        partner_id: &str,
        user_id: &str,
        signing_private_key_der: &[u8],
        authentication_private_key_der: &[u8],
        encryption_private_key_der: &[u8],
    ) -> Result<(BankConnection, EbicsSubscriber)> {
        let mut tx = self.pool.begin().await?;
        let id = Uuid::new_v4();

        let connection = sqlx::query_as::<_, BankConnection>(
            r#"
            INSERT INTO bank_connections (id, name, connection_type, dialect, owner, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(ConnectionType::Ebics)
        .bind(dialect)
        .bind(owner)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| unique_violation_as(e, || Error::AlreadyExists(format!("connection {name}"))))?;

        let subscriber = sqlx::query_as::<_, EbicsSubscriber>(
            r#"
            INSERT INTO ebics_subscribers
                (connection_id, url, host_id, partner_id, user_id,
                 signing_private_key_der, authentication_private_key_der, encryption_private_key_der,
                 bank_authentication_public_key_der, bank_encryption_public_key_der,
                 ini_state, hia_state)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NULL, NULL, $9, $9)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(url)
        .bind(host_id)
        .bind(partner_id)
        .bind(user_id)
        .bind(signing_private_key_der)
        .bind(authentication_private_key_der)
        .bind(encryption_private_key_der)
        .bind(KeyManagementState::NotSent)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok((connection, subscriber))
    }

    /// Look up a connection by name.
    pub async fn get_connection_by_name(&self, name: &str) -> Result<BankConnection> {
        sqlx::query_as::<_, BankConnection>("SELECT * FROM bank_connections WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound { kind: "bank connection", id: name.to_string() })
    }

    /// Look up a connection by id.
    pub async fn get_connection_by_id(&self, id: Uuid) -> Result<BankConnection> {
        sqlx::query_as::<_, BankConnection>("SELECT * FROM bank_connections WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound { kind: "bank connection", id: id.to_string() })
    }

    /// List every bank connection.
    pub async fn list_connections(&self) -> Result<Vec<BankConnection>> {
        Ok(sqlx::query_as::<_, BankConnection>("SELECT * FROM bank_connections ORDER BY name")
            .fetch_all(&self.pool)
            .await?)
    }

    /// Fetch the subscriber row (key material) for a connection.
    pub async fn get_subscriber(&self, connection_id: Uuid) -> Result<EbicsSubscriber> {
        sqlx::query_as::<_, EbicsSubscriber>("SELECT * FROM ebics_subscribers WHERE connection_id = $1")
            .bind(connection_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound { kind: "ebics subscriber", id: connection_id.to_string() })
    }

    /// Record that INI has been sent.
    pub async fn mark_ini_sent(&self, connection_id: Uuid) -> Result<()> {
        sqlx::query("UPDATE ebics_subscribers SET ini_state = $1 WHERE connection_id = $2")
            .bind(KeyManagementState::Sent)
            .bind(connection_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Record that HIA has been sent.
    pub async fn mark_hia_sent(&self, connection_id: Uuid) -> Result<()> {
        sqlx::query("UPDATE ebics_subscribers SET hia_state = $1 WHERE connection_id = $2")
            .bind(KeyManagementState::Sent)
            .bind(connection_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Store the bank's authentication/encryption public keys after a
    /// successful HPB exchange.
    pub async fn set_bank_keys(
        &self,
        connection_id: Uuid,
        bank_authentication_public_key_der: &[u8],
        bank_encryption_public_key_der: &[u8],
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE ebics_subscribers
            SET bank_authentication_public_key_der = $1, bank_encryption_public_key_der = $2
            WHERE connection_id = $3
            "#,
        )
        .bind(bank_authentication_public_key_der)
        .bind(bank_encryption_public_key_der)
        .bind(connection_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // ---- bank accounts -----------------------------------------------------

    /// Import a new `BankAccount` under a given label.
    pub async fn create_account(
        &self,
        label: &str,
        holder_name: &str,
        iban: &str,
        bank_code: &str,
        default_connection_id: Option<Uuid>,
    ) -> Result<BankAccount> {
        sqlx::query_as::<_, BankAccount>(
            r#"
            INSERT INTO bank_accounts
                (id, label, holder_name, iban, bank_code, default_connection_id,
                 last_report_creation_timestamp, last_statement_creation_timestamp,
                 last_notification_creation_timestamp, highest_seen_bank_message_serial_id,
                 pain001_counter)
            VALUES ($1, $2, $3, $4, $5, $6, NULL, NULL, NULL, 0, 0)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(label)
        .bind(holder_name)
        .bind(iban)
        .bind(bank_code)
        .bind(default_connection_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| unique_violation_as(e, || Error::AlreadyExists(format!("bank account {label}"))))
    }

    /// Look up an account by label.
    pub async fn get_account_by_label(&self, label: &str) -> Result<BankAccount> {
        sqlx::query_as::<_, BankAccount>("SELECT * FROM bank_accounts WHERE label = $1")
            .bind(label)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound { kind: "bank account", id: label.to_string() })
    }

    /// Look up an account by id, locking the row `FOR UPDATE` so callers can
    /// safely read-modify-write the counters on it within their own
    /// transaction.
    pub async fn get_account_for_update(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
    ) -> Result<BankAccount> {
        sqlx::query_as::<_, BankAccount>("SELECT * FROM bank_accounts WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut **tx)
            .await?
            .ok_or_else(|| Error::NotFound { kind: "bank account", id: id.to_string() })
    }

    /// List every account.
    pub async fn list_accounts(&self) -> Result<Vec<BankAccount>> {
        Ok(sqlx::query_as::<_, BankAccount>("SELECT * FROM bank_accounts ORDER BY label")
            .fetch_all(&self.pool)
            .await?)
    }

    /// Advance a fetch-level watermark within `tx`, so it commits atomically
    /// with the ledger rows discovered in the same fetch (spec.md §5).
    /// Callers only move it forward; this method trusts the caller to have
    /// computed the new max already.
    pub async fn update_watermark_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        account_id: Uuid,
        level: FetchLevel,
        creation_timestamp: DateTime<Utc>,
    ) -> Result<()> {
        let column = match level {
            FetchLevel::Report => "last_report_creation_timestamp",
            FetchLevel::Statement => "last_statement_creation_timestamp",
            FetchLevel::Notification => "last_notification_creation_timestamp",
        };
        let sql = format!("UPDATE bank_accounts SET {column} = $1 WHERE id = $2");
        sqlx::query(&sql)
            .bind(creation_timestamp)
            .bind(account_id)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    /// Advance `highest_seen_bank_message_serial_id` within `tx`.
    pub async fn update_highest_seen_serial_id_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        account_id: Uuid,
        serial_id: i64,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE bank_accounts
            SET highest_seen_bank_message_serial_id = $1
            WHERE id = $2 AND highest_seen_bank_message_serial_id < $1
            "#,
        )
        .bind(serial_id)
        .bind(account_id)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// Read-modify-write `pain001_counter` under a row lock within `tx`,
    /// returning the value to embed in the generated identifiers (the
    /// pre-increment value, mirroring `token-engine`'s read-then-bind RMW
    /// style). The caller commits `tx` together with the initiation insert
    /// that consumes this counter value, so the two can never diverge.
    pub async fn next_pain001_counter_tx(&self, tx: &mut Transaction<'_, Postgres>, account_id: Uuid) -> Result<i64> {
        let account = self.get_account_for_update(tx, account_id).await?;
        let next = account.pain001_counter + 1;
        sqlx::query("UPDATE bank_accounts SET pain001_counter = $1 WHERE id = $2")
            .bind(next)
            .bind(account_id)
            .execute(&mut **tx)
            .await?;
        Ok(next)
    }

    // ---- offered accounts ---------------------------------------------------

    /// Replace the set of accounts a connection's bank reports as available
    /// (from an HTD/HKD exchange), preserving `imported_account_id` for
    /// accounts that are still offered.
    pub async fn upsert_offered_account(
        &self,
        connection_id: Uuid,
        remote_account_id: &str,
        iban: &str,
        bank_code: &str,
        holder_name: &str,
    ) -> Result<OfferedBankAccount> {
        sqlx::query_as::<_, OfferedBankAccount>(
            r#"
            INSERT INTO offered_bank_accounts
                (id, connection_id, remote_account_id, iban, bank_code, holder_name, imported_account_id)
            VALUES ($1, $2, $3, $4, $5, $6, NULL)
            ON CONFLICT (connection_id, remote_account_id)
            DO UPDATE SET iban = $4, bank_code = $5, holder_name = $6
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(connection_id)
        .bind(remote_account_id)
        .bind(iban)
        .bind(bank_code)
        .bind(holder_name)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::from)
    }

    /// List the offers for a connection, imported or not.
    pub async fn list_offered_accounts(&self, connection_id: Uuid) -> Result<Vec<OfferedBankAccount>> {
        Ok(sqlx::query_as::<_, OfferedBankAccount>(
            "SELECT * FROM offered_bank_accounts WHERE connection_id = $1 ORDER BY remote_account_id",
        )
        .bind(connection_id)
        .fetch_all(&self.pool)
        .await?)
    }

    /// Mark an offered account as imported into `account_id`.
    pub async fn mark_offered_account_imported(&self, offered_id: Uuid, account_id: Uuid) -> Result<()> {
        sqlx::query("UPDATE offered_bank_accounts SET imported_account_id = $1 WHERE id = $2")
            .bind(account_id)
            .bind(offered_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // ---- bank messages and transaction entries ------------------------------

    /// Store one downloaded message's raw bytes within `tx`, so it commits
    /// atomically with the entries parsed from it and the watermark advance
    /// that follows (spec.md §5).
    pub async fn insert_bank_message_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        connection_id: Uuid,
        fetch_level: BankMessageLevel,
        message_id: Option<&str>,
        raw: &[u8],
        errors: bool,
    ) -> Result<BankMessage> {
        sqlx::query_as::<_, BankMessage>(
            r#"
            INSERT INTO bank_messages (connection_id, fetch_level, message_id, raw, errors, received_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(connection_id)
        .bind(fetch_level)
        .bind(message_id)
        .bind(raw)
        .bind(errors)
        .bind(Utc::now())
        .fetch_one(&mut **tx)
        .await
        .map_err(Error::from)
    }

    /// Insert one parsed entry within `tx`, deduplicating on
    /// `(bank_account_id, transaction_id)`. Returns `None` when the entry
    /// was already known.
    #[allow(clippy::too_many_arguments)]
    pub async fn insert_transaction_entry_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        bank_account_id: Uuid,
        transaction_id: &str,
        credit_debit_indicator: CreditDebitIndicator,
        currency: &str,
        amount: Decimal,
        status: EntryStatus,
        transaction_json: serde_json::Value,
    ) -> Result<Option<BankTransactionEntry>> {
        sqlx::query_as::<_, BankTransactionEntry>(
            r#"
            INSERT INTO bank_transaction_entries
                (bank_account_id, transaction_id, credit_debit_indicator, currency, amount,
                 status, transaction_json, updated_by, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, NULL, $8)
            ON CONFLICT (bank_account_id, transaction_id) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(bank_account_id)
        .bind(transaction_id)
        .bind(credit_debit_indicator)
        .bind(currency)
        .bind(amount)
        .bind(status)
        .bind(transaction_json)
        .bind(Utc::now())
        .fetch_optional(&mut **tx)
        .await
        .map_err(Error::from)
    }

    /// List entries for an account newer than `after_id` (exclusive), in
    /// discovery order — the iteration the facade bus drives.
    pub async fn list_entries_since(&self, bank_account_id: Uuid, after_id: i64) -> Result<Vec<BankTransactionEntry>> {
        Ok(sqlx::query_as::<_, BankTransactionEntry>(
            r#"
            SELECT * FROM bank_transaction_entries
            WHERE bank_account_id = $1 AND id > $2
            ORDER BY id ASC
            "#,
        )
        .bind(bank_account_id)
        .bind(after_id)
        .fetch_all(&self.pool)
        .await?)
    }

    // ---- payment initiations -------------------------------------------------

    /// Create an initiation within `tx`, idempotently on `(bank_account_id,
    /// uid)` when a `uid` is given. Returns the row that now exists for that
    /// key — either the one just inserted, or the pre-existing one if this
    /// is a retry. Callers run this in the same transaction as the
    /// `pain001_counter` RMW that produced this row's identifiers (spec.md
    /// §4.4), so the two commit or roll back together.
    #[allow(clippy::too_many_arguments)]
    pub async fn create_initiation_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        bank_account_id: Uuid,
        uid: Option<&str>,
        amount: Decimal,
        currency: &str,
        end_to_end_id: &str,
        message_id: &str,
        payment_information_id: &str,
        instruction_id: &str,
        subject: &str,
        creditor_iban: &str,
        creditor_bic: Option<&str>,
        creditor_name: &str,
    ) -> Result<PaymentInitiation> {
        let id = Uuid::new_v4();
        let prepared_at = Utc::now();

        let inserted = sqlx::query_as::<_, PaymentInitiation>(
            r#"
            INSERT INTO payment_initiations
                (id, bank_account_id, uid, prepared_at, submission_date, amount, currency,
                 end_to_end_id, message_id, payment_information_id, instruction_id, subject,
                 creditor_iban, creditor_bic, creditor_name, submitted, invalid,
                 confirmation_transaction_id)
            VALUES ($1, $2, $3, $4, NULL, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, FALSE, FALSE, NULL)
            ON CONFLICT (bank_account_id, uid) WHERE uid IS NOT NULL DO NOTHING
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(bank_account_id)
        .bind(uid)
        .bind(prepared_at)
        .bind(amount)
        .bind(currency)
        .bind(end_to_end_id)
        .bind(message_id)
        .bind(payment_information_id)
        .bind(instruction_id)
        .bind(subject)
        .bind(creditor_iban)
        .bind(creditor_bic)
        .bind(creditor_name)
        .fetch_optional(&mut **tx)
        .await?;

        if let Some(initiation) = inserted {
            return Ok(initiation);
        }

        // Conflict: a prior request with the same uid already created a row.
        let uid = uid.expect("ON CONFLICT only fires when uid is Some");
        sqlx::query_as::<_, PaymentInitiation>(
            "SELECT * FROM payment_initiations WHERE bank_account_id = $1 AND uid = $2",
        )
        .bind(bank_account_id)
        .bind(uid)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| Error::NotFound { kind: "payment initiation", id: uid.to_string() })
    }

    /// Mark an initiation submitted after a successful upload transaction.
    pub async fn mark_initiation_submitted(&self, id: Uuid) -> Result<()> {
        sqlx::query("UPDATE payment_initiations SET submitted = TRUE, submission_date = $1 WHERE id = $2")
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Mark an initiation invalid (it will never be submitted).
    pub async fn mark_initiation_invalid(&self, id: Uuid) -> Result<()> {
        sqlx::query("UPDATE payment_initiations SET invalid = TRUE WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Record the debit entry that confirms a submitted initiation.
    pub async fn confirm_initiation(&self, id: Uuid, transaction_entry_id: i64) -> Result<()> {
        sqlx::query("UPDATE payment_initiations SET confirmation_transaction_id = $1 WHERE id = $2")
            .bind(transaction_entry_id)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Initiations prepared but not yet submitted for an account, in
    /// preparation order.
    pub async fn list_pending_initiations(&self, bank_account_id: Uuid) -> Result<Vec<PaymentInitiation>> {
        Ok(sqlx::query_as::<_, PaymentInitiation>(
            r#"
            SELECT * FROM payment_initiations
            WHERE bank_account_id = $1 AND submitted = FALSE AND invalid = FALSE
            ORDER BY prepared_at ASC
            "#,
        )
        .bind(bank_account_id)
        .fetch_all(&self.pool)
        .await?)
    }

    /// Find the initiation a confirming debit entry's `PmtInfId` refers to,
    /// submitted or not (spec.md §4.3 confirmation matching: the initiation
    /// is typically already `submitted=true` by the time its confirmation
    /// arrives).
    pub async fn find_initiation_by_payment_information_id(
        &self,
        bank_account_id: Uuid,
        payment_information_id: &str,
    ) -> Result<Option<PaymentInitiation>> {
        Ok(sqlx::query_as::<_, PaymentInitiation>(
            "SELECT * FROM payment_initiations WHERE bank_account_id = $1 AND payment_information_id = $2",
        )
        .bind(bank_account_id)
        .bind(payment_information_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    // ---- scheduled tasks ----------------------------------------------------

    /// Create (or replace, by name) a scheduled task on a resource.
    pub async fn upsert_task(
        &self,
        resource_type: &str,
        resource_id: Uuid,
        name: &str,
        task_type: TaskType,
        cronspec: &str,
        params: serde_json::Value,
        next_scheduled_execution_sec: i64,
    ) -> Result<ScheduledTask> {
        sqlx::query_as::<_, ScheduledTask>(
            r#"
            INSERT INTO scheduled_tasks
                (id, resource_type, resource_id, name, task_type, cronspec, params,
                 next_scheduled_execution_sec, prev_scheduled_execution_sec)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NULL)
            ON CONFLICT (resource_type, resource_id, name)
            DO UPDATE SET task_type = $5, cronspec = $6, params = $7,
                          next_scheduled_execution_sec = $8
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(resource_type)
        .bind(resource_id)
        .bind(name)
        .bind(task_type)
        .bind(cronspec)
        .bind(params)
        .bind(next_scheduled_execution_sec)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::from)
    }

    /// Tasks whose `next_scheduled_execution_sec` has arrived.
    pub async fn list_due_tasks(&self, now_sec: i64) -> Result<Vec<ScheduledTask>> {
        Ok(sqlx::query_as::<_, ScheduledTask>(
            "SELECT * FROM scheduled_tasks WHERE next_scheduled_execution_sec <= $1",
        )
        .bind(now_sec)
        .fetch_all(&self.pool)
        .await?)
    }

    /// Record a task run and its next scheduled time.
    pub async fn advance_task(&self, id: Uuid, ran_at_sec: i64, next_sec: i64) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE scheduled_tasks
            SET prev_scheduled_execution_sec = $1, next_scheduled_execution_sec = $2
            WHERE id = $3
            "#,
        )
        .bind(ran_at_sec)
        .bind(next_sec)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

/// Remap a unique-constraint violation into a domain-level `AlreadyExists`,
/// leaving every other error to flow through `#[from]` as-is.
fn unique_violation_as(err: sqlx::Error, on_conflict: impl FnOnce() -> Error) -> Error {
    if let sqlx::Error::Database(ref db_err) = err {
        if db_err.is_unique_violation() {
            return on_conflict();
        }
    }
    Error::from(err)
}
