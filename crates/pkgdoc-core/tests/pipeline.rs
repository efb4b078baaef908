#![allow(clippy::unwrap_used, clippy::expect_used)]

use pkgdoc_core::cache::doc_key;
use pkgdoc_core::{
    CacheConfig, CacheManager, DocService, DurableStore, EntityKind, Error, FetchContext,
    Fetcher, GoSourceBuilder, HttpConfig, MemoryCache, MemoryStore, PACKAGE_VERSION, Resolver,
    ServiceContext, ServiceEndpoints,
};
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn service(server: &MockServer, store: &Arc<MemoryStore>) -> anyhow::Result<DocService> {
    let resolver = Resolver::new(ServiceContext {
        fetcher: Fetcher::new(&HttpConfig::default())?,
        builder: Arc::new(GoSourceBuilder),
        endpoints: ServiceEndpoints::rooted_at(&server.uri()),
    });
    let cache = CacheManager::new(
        Arc::new(MemoryCache::new()),
        store.clone(),
        CacheConfig::default(),
    );
    Ok(DocService::new(resolver, cache))
}

async fn mount_refs(server: &MockServer, status: u16) {
    Mock::given(method("GET"))
        .and(path("/github-api/repos/user/repo/git/refs"))
        .respond_with(ResponseTemplate::new(status).set_body_json(json!([
            {"ref": "refs/heads/master", "object": {"sha": "c0ffee"}}
        ])))
        .mount(server)
        .await;
}

async fn mount_repo(server: &MockServer) {
    mount_refs(server, 200).await;
    Mock::given(method("GET"))
        .and(path("/github-api/repos/user/repo/git/trees/master"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "tree": [
                {"path": "repo.go", "type": "blob", "url": format!("{}/blob/root", server.uri())},
                {"path": "sub/sub.go", "type": "blob", "url": format!("{}/blob/sub", server.uri())},
                {"path": "cmd/tool/main.go", "type": "blob", "url": format!("{}/blob/tool", server.uri())}
            ]
        })))
        .mount(server)
        .await;
    for (name, body) in [
        ("root", "// Package repo is the root package.\npackage repo\n\nfunc Root() {}\n"),
        ("sub", "// Package sub lives below the root.\npackage sub\n\nfunc Sub() {}\n"),
        (
            "tool",
            "// Tool prints things. Run it without arguments.\npackage main\n\nfunc main() {}\n",
        ),
    ] {
        Mock::given(method("GET"))
            .and(path(format!("/blob/{name}")))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(server)
            .await;
    }
}

#[tokio::test]
async fn resolves_and_caches_github_package() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    mount_repo(&server).await;
    let store = Arc::new(MemoryStore::new());
    let docs = service(&server, &store)?;
    let ctx = FetchContext::new();

    let page = docs.get_doc(&ctx, "github.com/user/repo/sub").await?;
    assert_eq!(page.package.name, "sub");
    assert_eq!(page.package.synopsis, "Package sub lives below the root.");
    assert_eq!(page.package.etag, format!("{PACKAGE_VERSION}-c0ffee"));

    let requests = server.received_requests().await.unwrap().len();
    let again = docs.get_doc(&ctx, "github.com/user/repo/sub").await?;
    assert_eq!(again.package, page.package);
    assert_eq!(server.received_requests().await.unwrap().len(), requests);
    Ok(())
}

#[tokio::test]
async fn not_modified_twice_writes_nothing() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    mount_repo(&server).await;
    let store = Arc::new(MemoryStore::new());
    let ctx = FetchContext::new();

    let first = service(&server, &store)?.get_doc(&ctx, "github.com/user/repo").await?;
    let writes = store.writes();
    assert!(writes > 0);

    for _ in 0..2 {
        // A fresh ephemeral tier forces a round trip to the hosting service.
        let page = service(&server, &store)?.get_doc(&ctx, "github.com/user/repo").await?;
        assert_eq!(page.package, first.package);
    }
    assert_eq!(store.writes(), writes);
    Ok(())
}

#[tokio::test]
async fn serves_stored_record_when_host_fails() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    mount_repo(&server).await;
    let store = Arc::new(MemoryStore::new());
    let ctx = FetchContext::new();

    let stored = service(&server, &store)?.get_doc(&ctx, "github.com/user/repo").await?;

    server.reset().await;
    mount_refs(&server, 502).await;

    let page = service(&server, &store)?.get_doc(&ctx, "github.com/user/repo").await?;
    assert_eq!(page.package, stored.package);

    let err = service(&server, &store)?
        .get_doc(&ctx, "github.com/user/repo/never-seen")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Transport { .. }));
    Ok(())
}

#[tokio::test]
async fn failed_build_keeps_stored_record() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    mount_repo(&server).await;
    let store = Arc::new(MemoryStore::new());
    let ctx = FetchContext::new();

    let stored = service(&server, &store)?.get_doc(&ctx, "github.com/user/repo").await?;
    let writes = store.writes();

    // A new commit whose files disagree on the package name.
    server.reset().await;
    Mock::given(method("GET"))
        .and(path("/github-api/repos/user/repo/git/refs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"ref": "refs/heads/master", "object": {"sha": "d00d"}}
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/github-api/repos/user/repo/git/trees/master"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "tree": [
                {"path": "a.go", "type": "blob", "url": format!("{}/blob/a", server.uri())},
                {"path": "b.go", "type": "blob", "url": format!("{}/blob/b", server.uri())}
            ]
        })))
        .mount(&server)
        .await;
    for (name, body) in [("a", "package repo\n"), ("b", "package other\n")] {
        Mock::given(method("GET"))
            .and(path(format!("/blob/{name}")))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&server)
            .await;
    }

    let err = service(&server, &store)?
        .get_doc(&ctx, "github.com/user/repo")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Build(_)));
    assert_eq!(store.writes(), writes);

    let docs = service(&server, &store)?;
    assert_eq!(docs.cache().load_doc("github.com/user/repo").await?, Some(stored.package));
    assert_eq!(docs.package_index().await?.packages.len(), 1);
    Ok(())
}

#[tokio::test]
async fn undecodable_stored_records_are_rebuilt() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    mount_repo(&server).await;
    let store = Arc::new(MemoryStore::new());
    store
        .put(EntityKind::Doc, "github.com/user/repo", b"{\"etag\": \"from an old release\"".to_vec())
        .await?;
    store
        .put(EntityKind::Package, "github.com/user/repo", b"\x00".to_vec())
        .await?;
    let docs = service(&server, &store)?;

    assert!(docs.cache().load_doc("github.com/user/repo").await?.is_none());
    let page = docs.get_doc(&FetchContext::new(), "github.com/user/repo").await?;
    assert_eq!(page.package.name, "repo");
    assert_eq!(docs.cache().load_doc("github.com/user/repo").await?, Some(page.package));
    assert_eq!(docs.package_index().await?.packages.len(), 1);
    Ok(())
}

#[tokio::test]
async fn lists_child_packages_and_commands() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    mount_repo(&server).await;
    let store = Arc::new(MemoryStore::new());
    let docs = service(&server, &store)?;
    let ctx = FetchContext::new();

    docs.get_doc(&ctx, "github.com/user/repo/sub").await?;
    docs.get_doc(&ctx, "github.com/user/repo/cmd/tool").await?;
    let page = docs.get_doc(&ctx, "github.com/user/repo").await?;

    let packages: Vec<_> = page.packages.iter().map(|r| r.import_path.as_str()).collect();
    assert_eq!(packages, vec!["github.com/user/repo/sub"]);
    let commands: Vec<_> = page.commands.iter().map(|r| r.import_path.as_str()).collect();
    assert_eq!(commands, vec!["github.com/user/repo/cmd/tool"]);

    let index = docs.package_index().await?;
    assert_eq!(index.packages.len(), 2);
    assert_eq!(index.commands.len(), 1);
    Ok(())
}

#[tokio::test]
async fn vanished_package_leaves_the_index() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    mount_repo(&server).await;
    let store = Arc::new(MemoryStore::new());
    let docs = service(&server, &store)?;
    let ctx = FetchContext::new();

    docs.get_doc(&ctx, "github.com/user/repo/sub").await?;
    assert_eq!(docs.package_index().await?.packages.len(), 1);

    server.reset().await;
    mount_refs(&server, 404).await;
    docs.reload("github.com/user/repo/sub").await?;

    let err = docs.get_doc(&ctx, "github.com/user/repo/sub").await.unwrap_err();
    assert!(matches!(err, Error::PackageNotFound));
    assert!(docs.package_index().await?.packages.is_empty());
    assert!(docs.cache().load_doc("github.com/user/repo/sub").await?.is_none());
    Ok(())
}

#[tokio::test]
async fn reload_forces_a_rebuild() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    mount_repo(&server).await;
    let store = Arc::new(MemoryStore::new());
    let docs = service(&server, &store)?;
    let ctx = FetchContext::new();

    docs.get_doc(&ctx, "github.com/user/repo").await?;
    docs.reload("github.com/user/repo").await?;

    let cached = docs
        .cache()
        .cache_get::<pkgdoc_core::Package>(&doc_key("github.com/user/repo"))
        .await?;
    assert!(cached.value.is_none());
    assert!(docs.cache().load_doc("github.com/user/repo").await?.is_none());

    let page = docs.get_doc(&ctx, "github.com/user/repo").await?;
    assert_eq!(page.package.name, "repo");
    Ok(())
}

#[tokio::test]
async fn invalid_path_is_rejected() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    let store = Arc::new(MemoryStore::new());
    let err = service(&server, &store)?
        .get_doc(&FetchContext::new(), "not a path")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidImportPath(_)));
    assert_eq!(store.writes(), 0);
    Ok(())
}
