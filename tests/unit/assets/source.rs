use super::*;

#[test]
fn parse_classifies_sources() {
    assert!(matches!(
        SourceRef::parse("https://example.com/a.jpg").unwrap(),
        SourceRef::Url(_)
    ));
    assert!(matches!(
        SourceRef::parse("HTTP://example.com/a.jpg").unwrap(),
        SourceRef::Url(_)
    ));
    assert_eq!(
        SourceRef::parse("file:///tmp/a.png").unwrap(),
        SourceRef::File(PathBuf::from("/tmp/a.png"))
    );
    assert_eq!(
        "photos/b.png".parse::<SourceRef>().unwrap(),
        SourceRef::File(PathBuf::from("photos/b.png"))
    );
    assert!(SourceRef::parse("   ").is_err());
    assert!(SourceRef::parse("https://").is_err());
}

#[test]
fn display_is_human_readable() {
    assert_eq!(SourceRef::blob("song.mp3", vec![1u8, 2]).to_string(), "blob:song.mp3");
    assert_eq!(
        SourceRef::parse("https://example.com/x.png").unwrap().to_string(),
        "https://example.com/x.png"
    );
}

#[test]
fn refused_statuses_trigger_proxy() {
    let refused = FetchError::Status {
        status: 403,
        url: "u".to_owned(),
    };
    assert!(refused.is_refused());
    let missing = FetchError::Status {
        status: 404,
        url: "u".to_owned(),
    };
    assert!(!missing.is_refused());
    let io = FetchError::Io {
        path: PathBuf::from("x"),
        source: std::io::Error::from(std::io::ErrorKind::NotFound),
    };
    assert!(!io.is_refused());
}

#[test]
fn proxy_url_carries_original_url_as_query() {
    let fetcher = Fetcher::new(&FetchConfig::default()).unwrap();
    let original = Url::parse("https://example.com/a.jpg").unwrap();
    let proxied = fetcher.proxy_url(&original).unwrap();
    assert_eq!(proxied.host_str(), Some("corsproxy.io"));
    let (k, v) = proxied.query_pairs().next().unwrap();
    assert_eq!(k, "url");
    assert_eq!(v, "https://example.com/a.jpg");
}

#[test]
fn proxy_url_requires_endpoint() {
    let cfg = FetchConfig {
        proxy_endpoint: None,
        ..FetchConfig::default()
    };
    let fetcher = Fetcher::new(&cfg).unwrap();
    let original = Url::parse("https://example.com/a.jpg").unwrap();
    assert!(matches!(
        fetcher.proxy_url(&original),
        Err(FetchError::ProxyUrl(_))
    ));
}

#[tokio::test]
async fn fetch_reads_blobs_and_files() {
    let fetcher = Fetcher::new(&FetchConfig::default()).unwrap();
    let blob = SourceRef::blob("b", vec![7u8, 8, 9]);
    assert_eq!(fetcher.fetch(&blob).await.unwrap().as_ref(), &[7, 8, 9]);

    let path = crate::foundation::temp::temp_path("fetch_test", "bin");
    let _guard = crate::foundation::temp::TempFileGuard::new(path.clone());
    std::fs::write(&path, b"abc").unwrap();
    let file = SourceRef::File(path);
    assert_eq!(fetcher.fetch(&file).await.unwrap().as_ref(), b"abc");

    let missing = SourceRef::File(PathBuf::from("/definitely/not/here.png"));
    assert!(matches!(
        fetcher.fetch(&missing).await,
        Err(FetchError::Io { .. })
    ));
}
