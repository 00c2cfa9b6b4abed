mod support;

use chrono::{DateTime, Duration, Utc};

use engine::{
    ArchiveOutcome, DocumentPatch, EngineError, Receipt, ReceiptStatus, Synchronizer,
};
use support::{
    LOGGER_ID, OTHER_LOGGER_ID, Script, Setup, admin, broken_mirror_db, cafe_payload, image,
    logger, mirror_db, other_logger,
};

fn receipt(id: i64, owner: i64, created_at: DateTime<Utc>) -> Receipt {
    Receipt {
        id,
        uploader_id: owner,
        image_url: format!("https://cdn.example.com/{id}.jpg"),
        status: ReceiptStatus::PendingConfirmation,
        raw_payload: None,
        created_at,
        updated_at: created_at,
    }
}

async fn synchronizer() -> Synchronizer {
    Synchronizer::new(mirror_db().await)
}

#[tokio::test]
async fn create_is_idempotent() {
    let sync = synchronizer().await;
    let first = sync.mirror_create(&receipt(1, LOGGER_ID, Utc::now())).await.unwrap();
    sync.mirror_update(1, DocumentPatch::status(ReceiptStatus::Cancelled))
        .await
        .unwrap();

    let again = sync.mirror_create(&receipt(1, LOGGER_ID, Utc::now())).await.unwrap();
    assert_eq!(again.receipt_id, first.receipt_id);
    assert_eq!(again.status, ReceiptStatus::Cancelled);
    assert_eq!(sync.stats(None).await.unwrap().total, 1);
}

#[tokio::test]
async fn update_of_a_missing_document_is_not_found() {
    let sync = synchronizer().await;
    assert!(matches!(
        sync.mirror_update(5, DocumentPatch::status(ReceiptStatus::Processed))
            .await,
        Err(EngineError::NotFound(_))
    ));
}

#[tokio::test]
async fn patches_only_touch_given_fields() {
    let sync = synchronizer().await;
    sync.mirror_create(&receipt(3, LOGGER_ID, Utc::now())).await.unwrap();

    sync.mirror_update(
        3,
        DocumentPatch {
            vendor_name: Some("Cafe X".to_string()),
            tags: Some(vec!["coffee".to_string()]),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    let doc = sync
        .mirror_update(3, DocumentPatch::status(ReceiptStatus::Processed))
        .await
        .unwrap();
    assert_eq!(doc.status, ReceiptStatus::Processed);
    assert_eq!(doc.vendor_name.as_deref(), Some("Cafe X"));
    assert_eq!(doc.tags, vec!["coffee".to_string()]);
}

#[tokio::test]
async fn archive_and_unarchive_report_their_outcome() {
    let sync = synchronizer().await;
    sync.mirror_create(&receipt(1, LOGGER_ID, Utc::now())).await.unwrap();

    assert_eq!(
        sync.archive(1, Some("duplicate"), Some(1)).await.unwrap(),
        ArchiveOutcome::Archived
    );
    assert_eq!(
        sync.archive(1, Some("again"), Some(1)).await.unwrap(),
        ArchiveOutcome::AlreadyArchived
    );

    // Archived documents are hidden unless asked for.
    assert!(matches!(
        sync.document(1, false).await,
        Err(EngineError::NotFound(_))
    ));
    let doc = sync.document(1, true).await.unwrap();
    assert!(doc.archived);
    assert_eq!(doc.archive_reason.as_deref(), Some("duplicate"));
    assert_eq!(doc.archived_by, Some(1));
    assert!(doc.archived_at.is_some());

    assert_eq!(sync.unarchive(1).await.unwrap(), ArchiveOutcome::Unarchived);
    assert_eq!(sync.unarchive(1).await.unwrap(), ArchiveOutcome::NotArchived);
    let doc = sync.document(1, false).await.unwrap();
    assert!(!doc.archived);
    assert_eq!(doc.archive_reason, None);

    assert!(matches!(
        sync.archive(99, None, None).await,
        Err(EngineError::NotFound(_))
    ));
    assert!(matches!(
        sync.unarchive(99).await,
        Err(EngineError::NotFound(_))
    ));
}

#[tokio::test]
async fn bulk_archive_honours_age_floor_and_owner() {
    let sync = synchronizer().await;
    let now = Utc::now();
    sync.mirror_create(&receipt(1, LOGGER_ID, now - Duration::days(120)))
        .await
        .unwrap();
    sync.mirror_create(&receipt(2, LOGGER_ID, now - Duration::days(10)))
        .await
        .unwrap();
    sync.mirror_create(&receipt(3, OTHER_LOGGER_ID, now - Duration::days(200)))
        .await
        .unwrap();

    assert!(matches!(
        sync.bulk_archive_older_than(29, None, None, None).await,
        Err(EngineError::Validation(_))
    ));

    let archived = sync
        .bulk_archive_older_than(90, Some(LOGGER_ID), Some("old"), Some(1))
        .await
        .unwrap();
    assert_eq!(archived, 1);
    assert!(sync.document(1, true).await.unwrap().archived);
    assert!(!sync.document(2, false).await.unwrap().archived);
    assert!(!sync.document(3, false).await.unwrap().archived);

    let archived = sync.bulk_archive_older_than(30, None, None, None).await.unwrap();
    assert_eq!(archived, 1);

    let stats = sync.stats(None).await.unwrap();
    assert_eq!(stats.total, 3);
    assert_eq!(stats.archived, 2);
    assert_eq!(stats.active, 1);
    assert_eq!(stats.pending, 3);

    let mine = sync.archived_documents(Some(LOGGER_ID), None).await.unwrap();
    assert_eq!(mine.len(), 1);
    assert!(sync
        .archived_documents(None, Some(1))
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn search_matches_vendor_number_and_tags() {
    let sync = synchronizer().await;
    let now = Utc::now();
    for (id, vendor, number, tags) in [
        (1, "Cafe X", "A-1", vec!["coffee", "takeaway"]),
        (2, "Hardware Store", "B-2", vec!["tools"]),
        (3, "Corner Cafe", "C-3", vec![]),
    ] {
        sync.mirror_create(&receipt(id, LOGGER_ID, now)).await.unwrap();
        sync.mirror_update(
            id,
            DocumentPatch {
                vendor_name: Some(vendor.to_string()),
                receipt_number: Some(number.to_string()),
                tags: Some(tags.into_iter().map(String::from).collect()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    }

    let mut ids: Vec<_> = sync
        .search("cafe", None, false)
        .await
        .unwrap()
        .into_iter()
        .map(|d| d.receipt_id)
        .collect();
    ids.sort_unstable();
    assert_eq!(ids, vec![1, 3]);

    let by_tag = sync.search("tools", None, false).await.unwrap();
    assert_eq!(by_tag.len(), 1);
    assert_eq!(by_tag[0].receipt_id, 2);
    assert_eq!(sync.search("B-2", None, false).await.unwrap().len(), 1);
    assert_eq!(sync.search("takeaway", None, false).await.unwrap().len(), 1);
    for punctuation in ["[", "\"", "]", r#"e","t"#] {
        let found = sync.search(punctuation, None, false).await.unwrap();
        assert!(found.is_empty(), "{punctuation} matched {found:?}");
    }

    sync.archive(1, None, None).await.unwrap();
    assert_eq!(sync.search("cafe", None, false).await.unwrap().len(), 1);
    assert_eq!(sync.search("cafe", None, true).await.unwrap().len(), 2);
    assert!(sync.search("cafe", Some(OTHER_LOGGER_ID), true).await.unwrap().is_empty());

    assert!(matches!(
        sync.search("  ", None, false).await,
        Err(EngineError::Validation(_))
    ));
}

#[tokio::test]
async fn owner_listing_is_newest_first_and_paged() {
    let sync = synchronizer().await;
    let now = Utc::now();
    for id in 1..=5 {
        sync.mirror_create(&receipt(id, LOGGER_ID, now - Duration::days(10 - id)))
            .await
            .unwrap();
    }
    sync.mirror_create(&receipt(6, OTHER_LOGGER_ID, now)).await.unwrap();

    let page: Vec<_> = sync
        .documents_for_owner(LOGGER_ID, false, 2, 1)
        .await
        .unwrap()
        .into_iter()
        .map(|d| d.receipt_id)
        .collect();
    assert_eq!(page, vec![4, 3]);
}

#[tokio::test]
async fn delete_permanently_removes_the_document() {
    let sync = synchronizer().await;
    sync.mirror_create(&receipt(1, LOGGER_ID, Utc::now())).await.unwrap();

    sync.delete_permanently(1).await.unwrap();
    assert!(matches!(
        sync.document(1, true).await,
        Err(EngineError::NotFound(_))
    ));
    assert!(matches!(
        sync.delete_permanently(1).await,
        Err(EngineError::NotFound(_))
    ));
}

#[tokio::test]
async fn mirror_without_schema_is_a_mirror_failure() {
    let sync = Synchronizer::new(broken_mirror_db().await);
    let err = sync
        .mirror_create(&receipt(1, LOGGER_ID, Utc::now()))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::MirrorWrite(_)));
    assert_eq!(err.kind(), "mirror_write_failure");
    assert!(matches!(
        sync.stats(None).await,
        Err(EngineError::MirrorWrite(_))
    ));
    assert!(matches!(
        sync.archive(1, None, None).await,
        Err(EngineError::MirrorWrite(_))
    ));
    assert!(matches!(
        sync.search("cafe", None, false).await,
        Err(EngineError::MirrorWrite(_))
    ));
}

#[tokio::test]
async fn engine_archive_is_scoped_to_owner_or_admin() {
    let h = Setup::new(Script::Payload(cafe_payload())).build().await;
    let id = h.engine.upload_receipt(&logger(), image()).await.unwrap().receipt.id;

    assert!(matches!(
        h.engine.archive_receipt(&other_logger(), id, None).await,
        Err(EngineError::Permission(_))
    ));
    assert_eq!(
        h.engine
            .archive_receipt(&logger(), id, Some("not needed"))
            .await
            .unwrap(),
        ArchiveOutcome::Archived
    );
    assert_eq!(
        h.engine.unarchive_receipt(&admin(), id).await.unwrap(),
        ArchiveOutcome::Unarchived
    );

    // Archival never touches the system-of-record.
    let details = h.engine.receipt(&logger(), id).await.unwrap();
    assert_eq!(details.receipt.status, ReceiptStatus::PendingConfirmation);

    assert!(matches!(
        h.engine.bulk_archive(&logger(), None, None, None).await,
        Err(EngineError::Permission(_))
    ));
    assert_eq!(h.engine.bulk_archive(&admin(), None, None, None).await.unwrap(), 0);
    assert!(matches!(
        h.engine.bulk_archive(&admin(), Some(7), None, None).await,
        Err(EngineError::Validation(_))
    ));

    let own = h.engine.receipt_documents(&logger(), false, 10, 0).await.unwrap();
    assert_eq!(own.len(), 1);
    assert!(h
        .engine
        .receipt_documents(&other_logger(), false, 10, 0)
        .await
        .unwrap()
        .is_empty());

    let stats = h.engine.mirror_stats(&admin()).await.unwrap();
    assert_eq!(stats.total, 1);
    assert_eq!(stats.pending, 1);

    assert!(matches!(
        h.engine.delete_mirror_permanently(&logger(), id).await,
        Err(EngineError::Permission(_))
    ));
    h.engine.delete_mirror_permanently(&admin(), id).await.unwrap();
    assert!(h.engine.mirror_stats(&admin()).await.unwrap().total == 0);
}
