//! Initial schema of the system-of-record.
//!
//! - `users`: principals known to the auth layer, with their API token
//! - `receipts`: one row per upload attempt, never deleted
//! - `transactions`: the confirmed, normalized record of a receipt (at most one)
//! - `currencies`: reference catalog
//! - `exchange_rates`: append-only rate observations

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

// ─────────────────────────────────────────────────────────────────────────────
// Table identifiers
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Iden)]
enum Users {
    Table,
    Id,
    Username,
    DisplayName,
    Role,
    Active,
    ApiToken,
}

#[derive(Iden)]
enum Receipts {
    Table,
    Id,
    UploaderId,
    ImageUrl,
    Status,
    RawAiData,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Transactions {
    Table,
    Id,
    ReceiptId,
    VendorName,
    ReceiptNumber,
    OriginalAmountMinor,
    OriginalCurrency,
    OriginalScale,
    TotalAmountMinor,
    Currency,
    Scale,
    ExchangeRateUsed,
    RateTimestamp,
    RateStale,
    Normalization,
    TransactionDate,
    PayerId,
    PayerName,
    Description,
    CreatedAt,
}

#[derive(Iden)]
enum Currencies {
    Table,
    Code,
    Name,
    Symbol,
    MinorUnits,
    Active,
}

#[derive(Iden)]
enum ExchangeRates {
    Table,
    Id,
    CurrencyCode,
    RateToBase,
    RateFromBase,
    Source,
    Timestamp,
}

// ─────────────────────────────────────────────────────────────────────────────
// Migration implementation
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // ───────────────────────────────────────────────────────────────────
        // 1. Users
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Users::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Users::Username)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Users::DisplayName).string().not_null())
                    .col(ColumnDef::new(Users::Role).string().not_null())
                    .col(
                        ColumnDef::new(Users::Active)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(ColumnDef::new(Users::ApiToken).string().unique_key())
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 2. Receipts
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Receipts::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Receipts::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Receipts::UploaderId).integer().not_null())
                    .col(ColumnDef::new(Receipts::ImageUrl).string().not_null())
                    .col(ColumnDef::new(Receipts::Status).string().not_null())
                    .col(ColumnDef::new(Receipts::RawAiData).json())
                    .col(
                        ColumnDef::new(Receipts::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Receipts::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-receipts-uploader_id")
                            .from(Receipts::Table, Receipts::UploaderId)
                            .to(Users::Table, Users::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-receipts-uploader_id-status")
                    .table(Receipts::Table)
                    .col(Receipts::UploaderId)
                    .col(Receipts::Status)
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 3. Transactions
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Transactions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Transactions::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Transactions::ReceiptId)
                            .integer()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Transactions::VendorName).string().not_null())
                    .col(ColumnDef::new(Transactions::ReceiptNumber).string())
                    .col(
                        ColumnDef::new(Transactions::OriginalAmountMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Transactions::OriginalCurrency)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Transactions::OriginalScale)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Transactions::TotalAmountMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Transactions::Currency).string().not_null())
                    .col(ColumnDef::new(Transactions::Scale).integer().not_null())
                    .col(ColumnDef::new(Transactions::ExchangeRateUsed).double())
                    .col(ColumnDef::new(Transactions::RateTimestamp).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(Transactions::RateStale)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Transactions::Normalization)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Transactions::TransactionDate)
                            .date()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Transactions::PayerId).integer())
                    .col(ColumnDef::new(Transactions::PayerName).string())
                    .col(ColumnDef::new(Transactions::Description).string())
                    .col(
                        ColumnDef::new(Transactions::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-transactions-receipt_id")
                            .from(Transactions::Table, Transactions::ReceiptId)
                            .to(Receipts::Table, Receipts::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-transactions-payer_id-transaction_date")
                    .table(Transactions::Table)
                    .col(Transactions::PayerId)
                    .col(Transactions::TransactionDate)
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 4. Currencies
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Currencies::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Currencies::Code)
                            .string_len(3)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Currencies::Name).string().not_null())
                    .col(ColumnDef::new(Currencies::Symbol).string().not_null())
                    .col(
                        ColumnDef::new(Currencies::MinorUnits)
                            .integer()
                            .not_null()
                            .default(2),
                    )
                    .col(
                        ColumnDef::new(Currencies::Active)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 5. Exchange rates
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(ExchangeRates::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ExchangeRates::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ExchangeRates::CurrencyCode)
                            .string_len(3)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ExchangeRates::RateToBase)
                            .double()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ExchangeRates::RateFromBase)
                            .double()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ExchangeRates::Source).string().not_null())
                    .col(
                        ColumnDef::new(ExchangeRates::Timestamp)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-exchange_rates-currency_code")
                            .from(ExchangeRates::Table, ExchangeRates::CurrencyCode)
                            .to(Currencies::Table, Currencies::Code),
                    )
                    .to_owned(),
            )
            .await?;

        // Latest-rate lookups walk this index backwards.
        manager
            .create_index(
                Index::create()
                    .name("idx-exchange_rates-currency_code-timestamp")
                    .table(ExchangeRates::Table)
                    .col(ExchangeRates::CurrencyCode)
                    .col(ExchangeRates::Timestamp)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Drop in reverse order of creation (respecting FK dependencies)
        manager
            .drop_table(Table::drop().table(ExchangeRates::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Currencies::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Transactions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Receipts::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await?;
        Ok(())
    }
}
