//! Document mirror schema. Lives in its own database, see `MirrorMigrator`.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden)]
enum ReceiptDocuments {
    Table,
    ReceiptId,
    OwnerId,
    ImageUrl,
    Status,
    VendorName,
    ReceiptNumber,
    TotalAmount,
    Currency,
    TransactionDate,
    PayerName,
    TransactionId,
    Extracted,
    Tags,
    Archived,
    ArchivedAt,
    ArchiveReason,
    ArchivedBy,
    CreatedAt,
    UpdatedAt,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ReceiptDocuments::Table)
                    .if_not_exists()
                    // One document per receipt: the key is the receipt id itself.
                    .col(
                        ColumnDef::new(ReceiptDocuments::ReceiptId)
                            .big_integer()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ReceiptDocuments::OwnerId).big_integer().not_null())
                    .col(ColumnDef::new(ReceiptDocuments::ImageUrl).string().not_null())
                    .col(ColumnDef::new(ReceiptDocuments::Status).string().not_null())
                    .col(ColumnDef::new(ReceiptDocuments::VendorName).string())
                    .col(ColumnDef::new(ReceiptDocuments::ReceiptNumber).string())
                    .col(ColumnDef::new(ReceiptDocuments::TotalAmount).string())
                    .col(ColumnDef::new(ReceiptDocuments::Currency).string())
                    .col(ColumnDef::new(ReceiptDocuments::TransactionDate).date())
                    .col(ColumnDef::new(ReceiptDocuments::PayerName).string())
                    .col(ColumnDef::new(ReceiptDocuments::TransactionId).big_integer())
                    .col(ColumnDef::new(ReceiptDocuments::Extracted).json())
                    .col(ColumnDef::new(ReceiptDocuments::Tags).json().not_null())
                    .col(
                        ColumnDef::new(ReceiptDocuments::Archived)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(ReceiptDocuments::ArchivedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(ReceiptDocuments::ArchiveReason).string())
                    .col(ColumnDef::new(ReceiptDocuments::ArchivedBy).big_integer())
                    .col(
                        ColumnDef::new(ReceiptDocuments::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ReceiptDocuments::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-receipt_documents-owner_id-archived")
                    .table(ReceiptDocuments::Table)
                    .col(ReceiptDocuments::OwnerId)
                    .col(ReceiptDocuments::Archived)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-receipt_documents-created_at")
                    .table(ReceiptDocuments::Table)
                    .col(ReceiptDocuments::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ReceiptDocuments::Table).to_owned())
            .await
    }
}
