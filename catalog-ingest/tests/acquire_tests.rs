//! Archive acquisition tests against a local mock upstream
//!
//! The mock serves a `LATEST` pointer, one snapshot directory, redirect
//! chains and a body without Content-Length.

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{header, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use catalog_ingest::acquire::download::{download_file, get_following_redirects, partial_path};
use catalog_ingest::acquire::{AcquireError, ArchiveAcquirer, ArchiveMember, ArchiveSpec};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

const SNAPSHOT: &str = "20240101-000000";

static SAMPLE_ARCHIVES: &[ArchiveSpec] = &[ArchiveSpec {
    file_name: "sample.tar",
    members: &[
        ArchiveMember::new("mbdump/artist", "artist"),
        ArchiveMember::new("mbdump/cover_art_archive.cover_art", "cover_art"),
    ],
}];

static WITH_MISSING_ARCHIVE: &[ArchiveSpec] = &[
    ArchiveSpec {
        file_name: "absent.tar",
        members: &[ArchiveMember::new("mbdump/tag", "tag")],
    },
    ArchiveSpec {
        file_name: "sample.tar",
        members: &[ArchiveMember::new("mbdump/artist", "artist")],
    },
];

#[derive(Clone, Default)]
struct Upstream {
    files: Arc<HashMap<String, Vec<u8>>>,
    hits: Arc<Mutex<Vec<String>>>,
}

impl Upstream {
    fn hits_for(&self, path: &str) -> usize {
        self.hits.lock().unwrap().iter().filter(|p| p.as_str() == path).count()
    }

    fn total_hits(&self) -> usize {
        self.hits.lock().unwrap().len()
    }
}

fn found(location: String) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
}

async fn serve(State(upstream): State<Upstream>, uri: Uri) -> Response {
    let path = uri.path().to_string();
    upstream.hits.lock().unwrap().push(path.clone());

    let segments: Vec<&str> = path.trim_start_matches('/').split('/').collect();
    match segments.as_slice() {
        ["dump", "LATEST"] => format!("{}\n", SNAPSHOT).into_response(),
        ["dump", snapshot, file] if *snapshot == SNAPSHOT => match upstream.files.get(*file) {
            Some(bytes) => bytes.clone().into_response(),
            None => StatusCode::NOT_FOUND.into_response(),
        },
        ["moved", rest @ ..] => found(format!("/dump/{}", rest.join("/"))),
        ["loop", n] => found(format!("/loop/{}", n.parse::<u32>().unwrap_or(0) + 1)),
        ["no-location"] => StatusCode::FOUND.into_response(),
        ["stream"] => {
            let chunks: Vec<Result<Bytes, std::io::Error>> = (0..4)
                .map(|i| Ok(Bytes::from(format!("chunk-{}\n", i))))
                .collect();
            Body::from_stream(futures::stream::iter(chunks)).into_response()
        }
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Start the mock upstream; returns its root URL
async fn spawn_upstream(upstream: Upstream) -> String {
    let app = Router::new().fallback(serve).with_state(upstream);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

/// Uncompressed tarball with mbdump/{artist, cover_art_archive.cover_art}
fn sample_tarball(dir: &Path) -> Vec<u8> {
    let src = dir.join("src").join("mbdump");
    std::fs::create_dir_all(&src).unwrap();
    std::fs::write(src.join("artist"), "1\tartist-gid\tNirvana\n").unwrap();
    std::fs::write(src.join("cover_art_archive.cover_art"), "80001\t1000\n").unwrap();

    let archive = dir.join("build.tar");
    let status = std::process::Command::new("tar")
        .arg("-c")
        .arg("-f")
        .arg(&archive)
        .arg("-C")
        .arg(dir.join("src"))
        .arg("mbdump")
        .status()
        .unwrap();
    assert!(status.success());
    std::fs::read(&archive).unwrap()
}

fn upstream_with_sample(dir: &Path) -> Upstream {
    let mut files = HashMap::new();
    files.insert("sample.tar".to_string(), sample_tarball(dir));
    Upstream {
        files: Arc::new(files),
        ..Upstream::default()
    }
}

fn no_redirect_client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_resolves_latest_pointer() {
    let root = spawn_upstream(Upstream::default()).await;
    let temp = TempDir::new().unwrap();
    let acquirer = ArchiveAcquirer::new(format!("{}/dump", root), temp.path(), 5).unwrap();

    assert_eq!(acquirer.resolve_snapshot(None).await.unwrap().as_str(), SNAPSHOT);
    assert_eq!(
        acquirer.resolve_snapshot(Some("LATEST")).await.unwrap().as_str(),
        SNAPSHOT
    );
}

#[tokio::test]
async fn test_pointer_behind_relative_redirect() {
    let upstream = Upstream::default();
    let root = spawn_upstream(upstream.clone()).await;
    let temp = TempDir::new().unwrap();
    let acquirer = ArchiveAcquirer::new(format!("{}/moved", root), temp.path(), 5).unwrap();

    let snapshot = acquirer.resolve_snapshot(Some("latest")).await.unwrap();
    assert_eq!(snapshot.as_str(), SNAPSHOT);
    assert_eq!(upstream.hits_for("/moved/LATEST"), 1);
    assert_eq!(upstream.hits_for("/dump/LATEST"), 1);
}

#[tokio::test]
async fn test_redirect_loop_is_bounded() {
    let upstream = Upstream::default();
    let root = spawn_upstream(upstream.clone()).await;

    let err = get_following_redirects(&no_redirect_client(), &format!("{}/loop/0", root), 5)
        .await
        .unwrap_err();

    match err {
        AcquireError::TooManyRedirects { limit, .. } => assert_eq!(limit, 5),
        other => panic!("unexpected error: {:?}", other),
    }
    // Initial request plus five followed redirects
    assert_eq!(upstream.total_hits(), 6);
}

#[tokio::test]
async fn test_redirect_without_location_is_error() {
    let root = spawn_upstream(Upstream::default()).await;

    let err = get_following_redirects(&no_redirect_client(), &format!("{}/no-location", root), 5)
        .await
        .unwrap_err();
    assert!(matches!(err, AcquireError::MissingLocation(_)));
}

#[tokio::test]
async fn test_http_error_status_carries_url() {
    let root = spawn_upstream(Upstream::default()).await;
    let url = format!("{}/dump/{}/absent.tar", root, SNAPSHOT);

    let err = get_following_redirects(&no_redirect_client(), &url, 5)
        .await
        .unwrap_err();
    match err {
        AcquireError::HttpStatus { url: failed, status } => {
            assert_eq!(status, 404);
            assert_eq!(failed, url);
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_download_without_content_length() {
    let root = spawn_upstream(Upstream::default()).await;
    let temp = TempDir::new().unwrap();
    let dest = temp.path().join("streamed.bin");

    let bytes = download_file(
        &no_redirect_client(),
        &format!("{}/stream", root),
        &dest,
        5,
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    let content = std::fs::read_to_string(&dest).unwrap();
    assert_eq!(content, "chunk-0\nchunk-1\nchunk-2\nchunk-3\n");
    assert_eq!(bytes, content.len() as u64);
    assert!(!partial_path(&dest).exists());
}

#[tokio::test]
async fn test_cancelled_download_leaves_no_final_file() {
    let temp = TempDir::new().unwrap();
    let root = spawn_upstream(upstream_with_sample(temp.path())).await;
    let dest = temp.path().join("sample.tar");

    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = download_file(
        &no_redirect_client(),
        &format!("{}/dump/{}/sample.tar", root, SNAPSHOT),
        &dest,
        5,
        &cancel,
    )
    .await
    .unwrap_err();

    assert!(matches!(err, AcquireError::Cancelled));
    assert!(!dest.exists());
}

#[tokio::test]
async fn test_acquire_downloads_and_extracts() {
    let fixtures = TempDir::new().unwrap();
    let upstream = upstream_with_sample(fixtures.path());
    let root = spawn_upstream(upstream.clone()).await;

    let work = TempDir::new().unwrap();
    let acquirer = ArchiveAcquirer::new(format!("{}/dump", root), work.path(), 5)
        .unwrap()
        .with_archives(SAMPLE_ARCHIVES);

    let report = acquirer.acquire(None, &CancellationToken::new()).await.unwrap();

    assert_eq!(report.snapshot.as_str(), SNAPSHOT);
    assert_eq!(report.archives.len(), 1);
    assert!(report.archives[0].downloaded_bytes.is_some());
    assert!(work.path().join("sample.tar").exists());
    assert!(!work.path().join("sample.tar.partial").exists());
    assert_eq!(
        std::fs::read_to_string(work.path().join("artist")).unwrap(),
        "1\tartist-gid\tNirvana\n"
    );
    assert!(work.path().join("cover_art").exists());
    assert!(!work.path().join("cover_art_archive.cover_art").exists());

    // Second run: archive present, members present, nothing downloaded
    let archive_path = format!("/dump/{}/sample.tar", SNAPSHOT);
    assert_eq!(upstream.hits_for(&archive_path), 1);
    let again = acquirer
        .acquire(Some(SNAPSHOT), &CancellationToken::new())
        .await
        .unwrap();
    assert!(again.archives[0].downloaded_bytes.is_none());
    assert_eq!(upstream.hits_for(&archive_path), 1);
}

#[tokio::test]
async fn test_one_failed_archive_fails_run_after_others_finish() {
    let fixtures = TempDir::new().unwrap();
    let upstream = upstream_with_sample(fixtures.path());
    let root = spawn_upstream(upstream.clone()).await;

    let work = TempDir::new().unwrap();
    let acquirer = ArchiveAcquirer::new(format!("{}/dump", root), work.path(), 5)
        .unwrap()
        .with_archives(WITH_MISSING_ARCHIVE);

    let err = acquirer
        .acquire(Some(SNAPSHOT), &CancellationToken::new())
        .await
        .unwrap_err();

    match err {
        AcquireError::HttpStatus { status, url } => {
            assert_eq!(status, 404);
            assert!(url.ends_with("/absent.tar"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
    // The healthy archive still completed
    assert!(work.path().join("sample.tar").exists());
    assert!(work.path().join("artist").exists());
}
