use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use blog_migrate_core::config::{
    FileErrorPolicy, LedgerPaths, MigrationConfig, RunMode, SiteConfig, StorageConfig,
    TransformOptions,
};
use blog_migrate_core::contract::{
    DryRunPublisher, MockObjectStore, MockPublisher, NewPost, PublishedPost,
};
use blog_migrate_core::error::{MigrateError, PublishError};
use blog_migrate_core::ledger::{load_completed, read_redirects, Ledger};
use blog_migrate_core::migrate::migrate;
use tempfile::{tempdir, TempDir};

struct Blog {
    dir: TempDir,
}

impl Blog {
    fn new() -> Self {
        let dir = tempdir().expect("temp dir");
        fs::create_dir_all(dir.path().join("_posts")).unwrap();
        fs::create_dir_all(dir.path().join("site/img")).unwrap();
        Blog { dir }
    }

    fn post(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.dir.path().join("_posts").join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    fn image(&self, name: &str) {
        fs::write(self.dir.path().join("site/img").join(name), b"image-bytes").unwrap();
    }

    fn ledger_paths(&self) -> LedgerPaths {
        LedgerPaths {
            completed: self.dir.path().join("migrated.txt"),
            redirects: self.dir.path().join("redirects.jsonl"),
        }
    }

    fn config(&self, mode: RunMode, on_file_error: FileErrorPolicy) -> MigrationConfig {
        MigrationConfig {
            site: SiteConfig {
                url: "https://blog.example.com".to_string(),
                posts_glob: format!("{}/_posts/*.md", self.dir.path().display()),
                image_mirror: self.dir.path().join("site"),
            },
            storage: StorageConfig {
                endpoint: "https://nyc3.digitaloceanspaces.com".to_string(),
                bucket: "blog".to_string(),
                region: "nyc3".to_string(),
            },
            publication_id: "pub-1".to_string(),
            mode,
            on_file_error,
            transform: TransformOptions::default(),
        }
    }
}

fn published(post: &NewPost) -> PublishedPost {
    let slug = post.title.to_lowercase().replace(' ', "-");
    PublishedPost {
        id: slug.clone(),
        title: post.title.clone(),
        url: format!("https://medium.com/pub/{slug}"),
    }
}

#[tokio::test]
async fn live_run_uploads_images_publishes_and_records() {
    let blog = Blog::new();
    blog.image("cat.png");
    let first = blog.post(
        "2015-01-01-first.md",
        "---\ntitle: First Post\nauthor: Jane\ndate: 2015-01-01 09:00:00 +0000\nmedia:\n  card:\n    url: /img/cat.png\n---\n\nHello ![inline]({{ site.baseurl }}/img/cat.png)\n\n\n\n![ext](https://i.imgur.com/x.png)\n",
    );
    let draft = blog.post(
        "2015-02-01-draft.md",
        "---\ntitle: Draft\npublished: false\n---\nnot yet",
    );

    let mut store = MockObjectStore::new();
    store
        .expect_put_object()
        .withf(|key, _, content_type| key == "images/cat.png" && content_type == "image/png")
        .times(2)
        .returning(|_, _, _| Ok(()));

    let sent = Arc::new(Mutex::new(Vec::<NewPost>::new()));
    let sent_clone = sent.clone();
    let mut publisher = MockPublisher::new();
    publisher
        .expect_create_post()
        .withf(|publication_id, _| publication_id == "pub-1")
        .times(1)
        .returning(move |_, post| {
            sent_clone.lock().unwrap().push(post.clone());
            Ok(published(post))
        });

    let config = blog.config(RunMode::Live, FileErrorPolicy::Skip);
    let mut ledger = Ledger::open(blog.ledger_paths()).unwrap();
    let report = migrate(&config, &store, &publisher, &mut ledger)
        .await
        .expect("migration should succeed");

    assert_eq!(report.discovered, 2);
    assert_eq!(report.migrated.len(), 1);
    assert_eq!(report.unpublished, vec![draft.clone()]);
    assert!(report.failed.is_empty());

    let sent = sent.lock().unwrap();
    let post = &sent[0];
    assert_eq!(post.title, "First Post");
    assert_eq!(post.content_format, "markdown");
    assert_eq!(post.published_at, "2015-01-01T09:00:00Z");
    assert_eq!(
        post.content,
        "![](https://nyc3.digitaloceanspaces.com/blog/images/cat.png)\n\nBy: Jane\n\nHello ![inline](https://nyc3.digitaloceanspaces.com/blog/images/cat.png)\n\n![ext](https://i.imgur.com/x.png)\n"
    );

    let paths = blog.ledger_paths();
    let completed = load_completed(&paths.completed).unwrap();
    assert!(completed.contains(&first));
    assert!(!completed.contains(&draft));
    let redirects = read_redirects(&paths.redirects).unwrap();
    assert_eq!(redirects.len(), 1);
    assert_eq!(redirects[0].from, "https://blog.example.com/2015/01/01/first.html");
    assert_eq!(redirects[0].to, "https://medium.com/pub/first-post");
}

#[tokio::test]
async fn rerun_skips_everything_already_in_the_ledger() {
    let blog = Blog::new();
    let a = blog.post("2015-01-01-a.md", "---\ntitle: A\n---\na");
    let b = blog.post("2015-01-02-b.md", "---\ntitle: B\n---\nb");
    {
        let mut ledger = Ledger::open(blog.ledger_paths()).unwrap();
        ledger.record_completion(&a).unwrap();
    }

    let store = MockObjectStore::new();
    let mut publisher = MockPublisher::new();
    publisher
        .expect_create_post()
        .withf(|_, post| post.title == "B")
        .times(1)
        .returning(|_, post| Ok(published(post)));

    let config = blog.config(RunMode::Live, FileErrorPolicy::Skip);
    let mut ledger = Ledger::open(blog.ledger_paths()).unwrap();
    let report = migrate(&config, &store, &publisher, &mut ledger).await.unwrap();
    assert_eq!(report.already_migrated, 1);
    assert_eq!(report.migrated.len(), 1);
    assert_eq!(report.migrated[0].source, b);

    let mut publisher = MockPublisher::new();
    publisher.expect_create_post().times(0);
    let report = migrate(&config, &store, &publisher, &mut ledger).await.unwrap();
    assert_eq!(report.already_migrated, 2);
    assert!(report.migrated.is_empty());
}

#[tokio::test]
async fn platform_errors_abort_the_whole_run() {
    let blog = Blog::new();
    let a = blog.post("2015-01-01-a.md", "---\ntitle: A\n---\na");
    let b = blog.post("2015-01-02-b.md", "---\ntitle: B\n---\nb");
    let c = blog.post("2015-01-03-c.md", "---\ntitle: C\n---\nc");

    let store = MockObjectStore::new();
    let mut publisher = MockPublisher::new();
    publisher
        .expect_create_post()
        .withf(|_, post| post.title == "A")
        .times(1)
        .returning(|_, post| Ok(published(post)));
    publisher
        .expect_create_post()
        .withf(|_, post| post.title == "B")
        .times(1)
        .returning(|_, _| {
            Err(PublishError::Rejected {
                messages: vec!["Token was invalid.".to_string()],
            })
        });
    publisher
        .expect_create_post()
        .withf(|_, post| post.title == "C")
        .times(0);

    let config = blog.config(RunMode::Live, FileErrorPolicy::Skip);
    let mut ledger = Ledger::open(blog.ledger_paths()).unwrap();
    let err = migrate(&config, &store, &publisher, &mut ledger)
        .await
        .unwrap_err();
    match err {
        MigrateError::Publish(PublishError::Rejected { messages }) => {
            assert_eq!(messages, vec!["Token was invalid."])
        }
        other => panic!("expected a platform rejection, got {other:?}"),
    }

    let completed = load_completed(&blog.ledger_paths().completed).unwrap();
    assert!(completed.contains(&a));
    assert!(!completed.contains(&b));
    assert!(!completed.contains(&c));
    assert_eq!(read_redirects(&blog.ledger_paths().redirects).unwrap().len(), 1);
}

#[tokio::test]
async fn broken_post_is_skipped_by_default() {
    let blog = Blog::new();
    let broken = blog.post("2015-01-01-broken.md", "---\ntitle: [oops\n---\nbody");
    let missing_image = blog.post(
        "2015-01-02-missing.md",
        "---\ntitle: Missing\n---\n![](/img/not-there.png)",
    );
    let good = blog.post("2015-01-03-good.md", "---\ntitle: Good\n---\nfine");

    let store = MockObjectStore::new();
    let mut publisher = MockPublisher::new();
    publisher
        .expect_create_post()
        .times(1)
        .returning(|_, post| Ok(published(post)));

    let config = blog.config(RunMode::Live, FileErrorPolicy::Skip);
    let mut ledger = Ledger::open(blog.ledger_paths()).unwrap();
    let report = migrate(&config, &store, &publisher, &mut ledger).await.unwrap();

    let failed: Vec<&Path> = report.failed.iter().map(|f| f.source.as_path()).collect();
    assert_eq!(failed, vec![broken.as_path(), missing_image.as_path()]);
    assert_eq!(report.migrated.len(), 1);
    assert_eq!(report.migrated[0].source, good);
    let completed = load_completed(&blog.ledger_paths().completed).unwrap();
    assert_eq!(completed.len(), 1);
}

#[tokio::test]
async fn broken_post_aborts_when_configured() {
    let blog = Blog::new();
    blog.post("2015-01-01-broken.md", "---\ntitle: [oops\n---\nbody");
    blog.post("2015-01-02-good.md", "---\ntitle: Good\n---\nfine");

    let store = MockObjectStore::new();
    let mut publisher = MockPublisher::new();
    publisher.expect_create_post().times(0);

    let config = blog.config(RunMode::Live, FileErrorPolicy::Abort);
    let mut ledger = Ledger::open(blog.ledger_paths()).unwrap();
    let err = migrate(&config, &store, &publisher, &mut ledger)
        .await
        .unwrap_err();
    assert!(matches!(err, MigrateError::Parse(_)), "got {err:?}");
}

#[tokio::test]
async fn dry_run_writes_nothing_remote_and_cleans_up() {
    let blog = Blog::new();
    let post = blog.post(
        "2015-01-01-first.md",
        "---\ntitle: First Post\n---\n![](/img/never-read.png)",
    );

    let mut store = MockObjectStore::new();
    store.expect_put_object().times(0);

    let config = blog.config(RunMode::DryRun, FileErrorPolicy::Skip);
    let live = blog.ledger_paths();
    let mut ledger = Ledger::open_dry_run(&live).unwrap();
    let report = migrate(&config, &store, &DryRunPublisher, &mut ledger)
        .await
        .unwrap();
    assert_eq!(report.migrated.len(), 1);
    assert_eq!(report.migrated[0].to, "https://medium.com/dry-run/first-post");

    let dry_paths = ledger.paths().clone();
    let completed_text = fs::read_to_string(&dry_paths.completed).unwrap();
    assert_eq!(completed_text, format!("{}\n", post.display()));
    let redirect_text = fs::read_to_string(&dry_paths.redirects).unwrap();
    assert_eq!(redirect_text.lines().count(), 1);
    let value: serde_json::Value = serde_json::from_str(redirect_text.trim_end()).unwrap();
    assert_eq!(value["to"], "https://medium.com/dry-run/first-post");

    let dump = ledger.contents().unwrap();
    assert!(dump.contains("first-post"));
    ledger.discard().unwrap();
    assert!(!dry_paths.completed.exists());
    assert!(!dry_paths.redirects.exists());
    assert!(!live.completed.exists());
    assert!(!live.redirects.exists());
}
