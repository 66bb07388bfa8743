use async_trait::async_trait;
use community_uploads::api::error::AppError;
use community_uploads::config::AppConfig;
use community_uploads::infrastructure::database;
use community_uploads::models::{Category, FileDraft, FileRecord, Principal, Role};
use community_uploads::services::file_service::{
    FileFilter, FilePatch, FileService, NewFileMeta, PageRequest, UploadSource,
};
use community_uploads::services::storage::{LocalStorageService, StorageError, StorageService};
use sea_orm::Database;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tempfile::TempDir;
use tokio::io::AsyncRead;

const PNG_HEADER: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44, 0x52,
];

/// Local storage whose `remove` can be switched to fail.
struct FlakyStorage {
    inner: LocalStorageService,
    fail_removals: AtomicBool,
}

#[async_trait]
impl StorageService for FlakyStorage {
    fn root(&self) -> &Path {
        self.inner.root()
    }

    async fn ensure_dir(&self, relative_dir: &str) -> Result<(), StorageError> {
        self.inner.ensure_dir(relative_dir).await
    }

    async fn write_new<'a>(
        &self,
        relative_path: &str,
        reader: Box<dyn AsyncRead + Unpin + Send + 'a>,
        limit: u64,
    ) -> Result<u64, StorageError> {
        self.inner.write_new(relative_path, reader, limit).await
    }

    async fn remove(&self, relative_path: &str) -> Result<bool, StorageError> {
        if self.fail_removals.load(Ordering::SeqCst) {
            return Err(StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "read-only volume",
            )));
        }
        self.inner.remove(relative_path).await
    }

    async fn exists(&self, relative_path: &str) -> Result<bool, StorageError> {
        self.inner.exists(relative_path).await
    }
}

struct TestContext {
    tmp: TempDir,
    storage: Arc<FlakyStorage>,
    service: FileService,
}

async fn setup() -> TestContext {
    let tmp = TempDir::new().unwrap();
    let db = Database::connect("sqlite::memory:").await.unwrap();
    database::run_migrations(&db).await.unwrap();

    let storage = Arc::new(FlakyStorage {
        inner: LocalStorageService::new(tmp.path()),
        fail_removals: AtomicBool::new(false),
    });
    let service = FileService::new(db, storage.clone(), AppConfig::development(tmp.path()));

    TestContext {
        tmp,
        storage,
        service,
    }
}

fn alice() -> Principal {
    Principal::new("alice", [Role::Editor])
}

fn carol() -> Principal {
    Principal::new("carol", [Role::Editor])
}

fn bob() -> Principal {
    Principal::new("bob", [Role::Member])
}

fn admin() -> Principal {
    Principal::new("root", [Role::Admin])
}

async fn upload_one(
    service: &FileService,
    owner: &Principal,
    category: Category,
    name: &str,
    mime: &str,
    data: Vec<u8>,
    meta: NewFileMeta,
) -> FileRecord {
    let mut records = service
        .upload(
            owner,
            category,
            vec![UploadSource {
                original_name: name.to_string(),
                declared_mime: Some(mime.to_string()),
                reader: std::io::Cursor::new(data),
            }],
            meta,
        )
        .await
        .unwrap();
    records.pop().unwrap()
}

async fn upload_text(service: &FileService, owner: &Principal, name: &str) -> FileRecord {
    upload_one(
        service,
        owner,
        Category::Documents,
        name,
        "text/plain",
        format!("contents of {}", name).into_bytes(),
        NewFileMeta::default(),
    )
    .await
}

fn png(size: usize) -> Vec<u8> {
    let mut data = PNG_HEADER.to_vec();
    data.resize(size, 0);
    data
}

fn ids(records: &[FileRecord]) -> Vec<String> {
    records.iter().map(|r| r.id.clone()).collect()
}

#[tokio::test]
async fn test_create_and_get() {
    let ctx = setup().await;
    let record = upload_one(
        &ctx.service,
        &alice(),
        Category::Images,
        "Team Photo.PNG",
        "image/png",
        png(2048),
        NewFileMeta {
            description: Some("  Summer picnic  ".to_string()),
            tags: vec!["picnic".to_string(), " picnic ".to_string(), String::new()],
            associated_entity_type: Some("event".to_string()),
            associated_entity_id: Some("42".to_string()),
        },
    )
    .await;

    assert!(record.is_active);
    assert_eq!(record.category, Category::Images);
    assert_eq!(record.original_name, "Team Photo.PNG");
    assert_eq!(record.size_bytes, 2048);
    assert_eq!(record.mime_type, "image/png");
    assert_eq!(record.description.as_deref(), Some("Summer picnic"));
    assert_eq!(record.tags, vec!["picnic"]);
    assert_eq!(record.relative_path, format!("images/{}", record.stored_name));
    assert_eq!(record.public_url, format!("/uploads/{}", record.relative_path));

    let fetched = ctx.service.get(&record.id).await.unwrap();
    assert_eq!(fetched, record);
}

#[tokio::test]
async fn test_create_rejects_inconsistent_draft() {
    let ctx = setup().await;
    let draft = FileDraft {
        stored_name: "a-1-ff.png".to_string(),
        original_name: "a.png".to_string(),
        relative_path: "documents/a-1-ff.png".to_string(),
        public_url: "/uploads/documents/a-1-ff.png".to_string(),
        size_bytes: 10,
        mime_type: "image/png".to_string(),
        category: Category::Images,
    };

    let err = ctx
        .service
        .create(draft.clone(), &alice(), NewFileMeta::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let err = ctx
        .service
        .create(
            FileDraft {
                mime_type: String::new(),
                relative_path: "images/a-1-ff.png".to_string(),
                ..draft
            },
            &alice(),
            NewFileMeta::default(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}

#[tokio::test]
async fn test_get_unknown_id_is_not_found() {
    let ctx = setup().await;
    let err = ctx.service.get("does-not-exist").await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_soft_delete_and_restore() {
    let ctx = setup().await;
    let record = upload_text(&ctx.service, &alice(), "agenda.txt").await;

    let deleted = ctx.service.soft_delete(&record.id, &alice()).await.unwrap();
    assert!(!deleted.is_active);
    assert!(ctx.tmp.path().join(&record.relative_path).exists());

    let active = ctx
        .service
        .list(FileFilter::default(), PageRequest::default())
        .await
        .unwrap();
    assert_eq!(active.pagination.total, 0);

    let trashed = ctx
        .service
        .list(
            FileFilter {
                is_active: false,
                ..Default::default()
            },
            PageRequest::default(),
        )
        .await
        .unwrap();
    assert_eq!(ids(&trashed.items), vec![record.id.clone()]);

    let restored = ctx.service.restore(&record.id, &alice()).await.unwrap();
    assert!(restored.is_active);

    // restoring an active record changes nothing
    let again = ctx.service.restore(&record.id, &alice()).await.unwrap();
    assert_eq!(again.updated_at, restored.updated_at);

    let active = ctx
        .service
        .list(FileFilter::default(), PageRequest::default())
        .await
        .unwrap();
    assert_eq!(ids(&active.items), vec![record.id]);
}

#[tokio::test]
async fn test_non_owner_is_forbidden_and_record_unchanged() {
    let ctx = setup().await;
    let record = upload_text(&ctx.service, &carol(), "budget.txt").await;

    for principal in [bob(), alice()] {
        let err = ctx
            .service
            .soft_delete(&record.id, &principal)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let err = ctx
            .service
            .update(
                &record.id,
                FilePatch {
                    description: Some("hijacked".to_string()),
                    ..Default::default()
                },
                &principal,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let err = ctx
            .service
            .permanent_delete(&record.id, &principal)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    let unchanged = ctx.service.get(&record.id).await.unwrap();
    assert_eq!(unchanged, record);
    assert!(ctx.tmp.path().join(&record.relative_path).exists());
}

#[tokio::test]
async fn test_admin_manages_any_file() {
    let ctx = setup().await;
    let record = upload_text(&ctx.service, &carol(), "notice.txt").await;

    let deleted = ctx.service.soft_delete(&record.id, &admin()).await.unwrap();
    assert!(!deleted.is_active);
    assert_eq!(deleted.owner_id, "carol");
}

#[tokio::test]
async fn test_update_metadata() {
    let ctx = setup().await;
    let record = upload_one(
        &ctx.service,
        &alice(),
        Category::Blogs,
        "cover.png",
        "image/png",
        png(512),
        NewFileMeta {
            description: Some("Cover".to_string()),
            tags: vec!["old".to_string()],
            associated_entity_type: Some("blog".to_string()),
            associated_entity_id: Some("7".to_string()),
        },
    )
    .await;

    let updated = ctx
        .service
        .update(
            &record.id,
            FilePatch {
                description: Some(String::new()),
                tags: Some(vec!["new, fresh".to_string()]),
                associated_entity_id: Some("8".to_string()),
                ..Default::default()
            },
            &alice(),
        )
        .await
        .unwrap();

    assert_eq!(updated.description, None);
    assert_eq!(updated.tags, vec!["fresh", "new"]);
    assert_eq!(updated.associated_entity_type.as_deref(), Some("blog"));
    assert_eq!(updated.associated_entity_id.as_deref(), Some("8"));
    assert_eq!(updated.stored_name, record.stored_name);
    assert_eq!(updated.owner_id, record.owner_id);
    assert!(updated.updated_at >= record.updated_at);

    let fetched = ctx.service.get(&record.id).await.unwrap();
    assert_eq!(fetched.tags, vec!["fresh", "new"]);
}

#[tokio::test]
async fn test_permanent_delete_removes_file_and_record() {
    let ctx = setup().await;
    let record = upload_one(
        &ctx.service,
        &alice(),
        Category::General,
        "flyer.txt",
        "text/plain",
        b"Join us".to_vec(),
        NewFileMeta {
            tags: vec!["flyer".to_string()],
            ..Default::default()
        },
    )
    .await;

    ctx.service
        .permanent_delete(&record.id, &alice())
        .await
        .unwrap();

    assert!(matches!(
        ctx.service.get(&record.id).await.unwrap_err(),
        AppError::NotFound(_)
    ));
    assert!(!ctx.tmp.path().join(&record.relative_path).exists());

    let tagged = ctx
        .service
        .list(
            FileFilter {
                tags: vec!["flyer".to_string()],
                ..Default::default()
            },
            PageRequest::default(),
        )
        .await
        .unwrap();
    assert_eq!(tagged.pagination.total, 0);
}

#[tokio::test]
async fn test_permanent_delete_keeps_record_when_removal_fails() {
    let ctx = setup().await;
    let record = upload_text(&ctx.service, &alice(), "keep.txt").await;

    ctx.storage.fail_removals.store(true, Ordering::SeqCst);
    let err = ctx
        .service
        .permanent_delete(&record.id, &alice())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Storage(_)));

    let still_there = ctx.service.get(&record.id).await.unwrap();
    assert_eq!(still_there, record);
    assert!(ctx.tmp.path().join(&record.relative_path).exists());

    ctx.storage.fail_removals.store(false, Ordering::SeqCst);
    ctx.service
        .permanent_delete(&record.id, &alice())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_permanent_delete_tolerates_missing_file() {
    let ctx = setup().await;
    let record = upload_text(&ctx.service, &alice(), "gone.txt").await;
    std::fs::remove_file(ctx.tmp.path().join(&record.relative_path)).unwrap();

    ctx.service
        .permanent_delete(&record.id, &alice())
        .await
        .unwrap();
    assert!(matches!(
        ctx.service.get(&record.id).await.unwrap_err(),
        AppError::NotFound(_)
    ));
}

#[tokio::test]
async fn test_pagination() {
    let ctx = setup().await;
    let mut uploaded = Vec::new();
    for i in 0..25 {
        uploaded.push(upload_text(&ctx.service, &alice(), &format!("doc{}.txt", i)).await);
    }

    let filter = FileFilter {
        category: Some(Category::Documents),
        ..Default::default()
    };

    let first = ctx
        .service
        .list(filter.clone(), PageRequest::new(1, 10))
        .await
        .unwrap();
    assert_eq!(first.items.len(), 10);
    assert_eq!(first.pagination.total, 25);
    assert_eq!(first.pagination.page_count, 3);
    // newest first
    assert_eq!(first.items[0].id, uploaded[24].id);

    let last = ctx
        .service
        .list(filter.clone(), PageRequest::new(3, 10))
        .await
        .unwrap();
    assert_eq!(last.items.len(), 5);
    assert_eq!(last.items[4].id, uploaded[0].id);

    let beyond = ctx
        .service
        .list(filter.clone(), PageRequest::new(4, 10))
        .await
        .unwrap();
    assert!(beyond.items.is_empty());

    let defaults = ctx
        .service
        .list(filter.clone(), PageRequest::default())
        .await
        .unwrap();
    assert_eq!(defaults.pagination.page, 1);
    assert_eq!(defaults.pagination.page_size, 50);
    assert_eq!(defaults.items.len(), 25);

    for bad in [PageRequest::new(0, 10), PageRequest::new(1, 0), PageRequest::new(1, 101)] {
        let err = ctx.service.list(filter.clone(), bad).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}

#[tokio::test]
async fn test_huge_page_numbers_are_rejected() {
    let ctx = setup().await;
    upload_text(&ctx.service, &alice(), "notes.txt").await;

    for bad in [
        PageRequest::new(u64::MAX, 50),
        PageRequest::new(1 << 60, 10),
        PageRequest::new(u64::MAX / 100 + 2, 100),
    ] {
        let err = ctx
            .service
            .list(FileFilter::default(), bad)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    // the largest representable offset is still a valid, empty page
    let edge = ctx
        .service
        .list(FileFilter::default(), PageRequest::new(i64::MAX as u64 / 50, 50))
        .await
        .unwrap();
    assert!(edge.items.is_empty());
    assert_eq!(edge.pagination.total, 1);
}

#[tokio::test]
async fn test_list_filters() {
    let ctx = setup().await;
    let event_photo = upload_one(
        &ctx.service,
        &alice(),
        Category::Gallery,
        "stage.png",
        "image/png",
        png(300),
        NewFileMeta {
            tags: vec!["concert".to_string()],
            associated_entity_type: Some("event".to_string()),
            associated_entity_id: Some("e1".to_string()),
            ..Default::default()
        },
    )
    .await;
    let other_photo = upload_one(
        &ctx.service,
        &carol(),
        Category::Gallery,
        "crowd.png",
        "image/png",
        png(300),
        NewFileMeta {
            tags: vec!["crowd".to_string(), "concert".to_string()],
            ..Default::default()
        },
    )
    .await;
    let doc = upload_text(&ctx.service, &alice(), "setlist.txt").await;

    let by_tag = ctx
        .service
        .list(
            FileFilter {
                tags: vec!["crowd".to_string(), "missing".to_string()],
                ..Default::default()
            },
            PageRequest::default(),
        )
        .await
        .unwrap();
    assert_eq!(ids(&by_tag.items), vec![other_photo.id.clone()]);

    let concert = ctx
        .service
        .list(
            FileFilter {
                tags: vec!["concert".to_string()],
                ..Default::default()
            },
            PageRequest::default(),
        )
        .await
        .unwrap();
    assert_eq!(concert.pagination.total, 2);

    let by_entity = ctx
        .service
        .list(
            FileFilter {
                associated_entity_type: Some("event".to_string()),
                associated_entity_id: Some("e1".to_string()),
                ..Default::default()
            },
            PageRequest::default(),
        )
        .await
        .unwrap();
    assert_eq!(ids(&by_entity.items), vec![event_photo.id.clone()]);

    let by_owner = ctx
        .service
        .list(
            FileFilter {
                owner_id: Some("alice".to_string()),
                ..Default::default()
            },
            PageRequest::default(),
        )
        .await
        .unwrap();
    assert_eq!(ids(&by_owner.items), vec![doc.id.clone(), event_photo.id.clone()]);

    let by_category = ctx
        .service
        .list(
            FileFilter {
                category: Some(Category::Documents),
                ..Default::default()
            },
            PageRequest::default(),
        )
        .await
        .unwrap();
    assert_eq!(ids(&by_category.items), vec![doc.id]);
}

#[tokio::test]
async fn test_stats_by_category() {
    let ctx = setup().await;
    for i in 0..3 {
        upload_one(
            &ctx.service,
            &alice(),
            Category::Images,
            &format!("img{}.png", i),
            "image/png",
            png(100 * 1024),
            NewFileMeta::default(),
        )
        .await;
    }
    for i in 0..2 {
        upload_one(
            &ctx.service,
            &alice(),
            Category::Documents,
            &format!("doc{}.txt", i),
            "text/plain",
            vec![b'a'; 200 * 1024],
            NewFileMeta::default(),
        )
        .await;
    }
    // inactive files are not counted
    let trashed = upload_text(&ctx.service, &alice(), "old.txt").await;
    ctx.service.soft_delete(&trashed.id, &alice()).await.unwrap();

    let stats = ctx.service.stats_by_category().await.unwrap();

    assert_eq!(stats.categories.len(), 2);
    assert_eq!(stats.categories[0].category, Category::Images);
    assert_eq!(stats.categories[0].count, 3);
    assert_eq!(stats.categories[0].total_size, 300 * 1024);
    assert_eq!(stats.categories[1].category, Category::Documents);
    assert_eq!(stats.categories[1].count, 2);
    assert_eq!(stats.categories[1].total_size, 400 * 1024);
    assert_eq!(stats.totals.files, 5);
    assert_eq!(stats.totals.size, 700 * 1024);
}

#[tokio::test]
async fn test_stats_empty() {
    let ctx = setup().await;
    let stats = ctx.service.stats_by_category().await.unwrap();
    assert!(stats.categories.is_empty());
    assert_eq!(stats.totals.files, 0);
    assert_eq!(stats.totals.size, 0);
}
