mod common;

use async_trait::async_trait;
use common::{
    article, catalogue_page, detail_page, detail_page_linking, mod_base, CATALOGUE_FIXTURE,
    DETAIL_FIXTURE,
};
use smods_catalogue::{CatalogueClient, CatalogueError, CatalogueQuery, ParseError, SortBy, TimePeriod};
use smods_http::{Form, HttpClient, HttpError, Transport};
use std::sync::{Arc, Mutex};
use url::Url;
use wiremock::matchers::{body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> CatalogueClient {
    CatalogueClient::from_http(HttpClient::new(&server.uri()).unwrap()).unwrap()
}

async fn serve_html(server: &MockServer, route: &str, html: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_string(html))
        .mount(server)
        .await;
}

async fn serve_search(server: &MockServer, keyword: &str, html: String) {
    Mock::given(method("GET"))
        .and(path("/"))
        .and(query_param("s", keyword))
        .respond_with(ResponseTemplate::new(200).set_body_string(html))
        .mount(server)
        .await;
}

#[tokio::test]
async fn search_sends_filters_and_parses_listing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/page/2"))
        .and(query_param("s", "roads"))
        .and(query_param("sort", "highest-rated"))
        .and(query_param("period", "one_month"))
        .respond_with(ResponseTemplate::new(200).set_body_string(CATALOGUE_FIXTURE))
        .expect(1)
        .mount(&server)
        .await;

    let query = CatalogueQuery::new("roads")
        .page(2)
        .sort(SortBy::HighestRated)
        .period(TimePeriod::OneMonth);
    let items = client_for(&server).search(&query).await.unwrap();
    assert_eq!(items.len(), 3);
    assert_eq!(items[0].base.name, "Better Roads");
}

#[tokio::test]
async fn http_failures_surface_as_fetch_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/archives/404"))
        .respond_with(ResponseTemplate::new(404).set_body_string("<html>not found</html>"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(500).set_body_string("oops"))
        .mount(&server)
        .await;

    let client = client_for(&server);

    let err = client.full_mod("404").await.unwrap_err();
    match &err {
        CatalogueError::Fetch(http) => {
            assert_eq!(http.status().map(|s| s.as_u16()), Some(404));
            assert!(http.url().unwrap().ends_with("/archives/404"));
        }
        other => panic!("expected fetch error, got {other:?}"),
    }

    let err = client.search(&CatalogueQuery::new("roads")).await.unwrap_err();
    assert!(matches!(err, CatalogueError::Fetch(_)), "got {err:?}");
}

#[tokio::test]
async fn unrecognisable_page_surfaces_as_parse_error() {
    let server = MockServer::start().await;
    serve_html(
        &server,
        "/",
        "<html><body><p>Down for maintenance</p></body></html>".into(),
    )
    .await;

    let err = client_for(&server)
        .search(&CatalogueQuery::new("roads"))
        .await
        .unwrap_err();
    assert!(
        matches!(err, CatalogueError::Parse(ParseError::ContainerNotFound { .. })),
        "got {err:?}"
    );
}

#[tokio::test]
async fn concurrent_searches_do_not_share_results() {
    let server = MockServer::start().await;
    serve_search(
        &server,
        "roads",
        catalogue_page(&[
            article("1", "Road A", "11", "https://modsbase.com/a/a.zip.html"),
            article("2", "Road B", "22", "https://modsbase.com/b/b.zip.html"),
        ]),
    )
    .await;
    serve_search(
        &server,
        "trees",
        catalogue_page(&[article("3", "Tree C", "33", "https://modsbase.com/c/c.zip.html")]),
    )
    .await;

    let client = client_for(&server);
    let other = client.clone();
    let roads_q = CatalogueQuery::new("roads");
    let trees_q = CatalogueQuery::new("trees");
    let (roads, trees, roads_again) = futures::join!(
        client.search(&roads_q),
        other.search(&trees_q),
        client.search(&roads_q),
    );

    let ids = |items: Vec<smods_catalogue::CatalogueItem>| {
        items.into_iter().map(|i| i.base.id).collect::<Vec<_>>()
    };
    assert_eq!(ids(roads.unwrap()), vec!["1", "2"]);
    assert_eq!(ids(trees.unwrap()), vec!["3"]);
    assert_eq!(ids(roads_again.unwrap()), vec!["1", "2"]);
}

#[tokio::test]
async fn lookups_by_id_and_steam_id() {
    let server = MockServer::start().await;
    serve_html(&server, "/archives/101", DETAIL_FIXTURE.to_string()).await;
    serve_search(
        &server,
        "2881031511",
        catalogue_page(&[article("101", "Better Roads", "2881031511", "https://modsbase.com/k/r.zip.html")]),
    )
    .await;
    serve_search(&server, "404404", catalogue_page(&[])).await;

    let client = client_for(&server);

    let base = client.mod_base("101").await.unwrap();
    assert_eq!(base.name, "Better Roads");
    assert_eq!(base.url(client.base().as_str()), format!("{}/archives/101", server.uri()));

    let full = client
        .full_mod_by_url(&format!("{}/archives/101", server.uri()))
        .await
        .unwrap();
    assert_eq!(full.base, base);
    // relative links are resolved against the catalogue root
    assert_eq!(
        full.image_url,
        Some(format!("{}/wp-content/uploads/2022/11/roads.jpg", server.uri()))
    );

    let (latest, older) = client.revisions("101").await.unwrap();
    assert_eq!(latest.name, "12 Mar, 2023 at 10:15");
    assert_eq!(older.len(), 2);
    assert!(older[0].date < older[1].date);

    assert_eq!(client.mod_id_by_steam_id("2881031511").await.unwrap(), "101");
    let err = client.mod_base_by_steam_id("404404").await.unwrap_err();
    assert!(matches!(err, CatalogueError::NotFound(_)), "got {err:?}");
}

/// Mod 1 requires 2, 3 and an id the catalogue does not know; mod 2 requires
/// 3 and, cyclically, 1; mod 3 requires nothing. No detail page may be
/// fetched twice.
async fn dependency_graph(server: &MockServer) {
    let dl = "https://modsbase.com/x/y.zip.html";
    for (id, steam, required) in [
        ("1", "1001", vec!["2002", "3003", "9999"]),
        ("2", "2002", vec!["3003", "1001"]),
        ("3", "3003", vec![]),
    ] {
        Mock::given(method("GET"))
            .and(path(format!("/archives/{id}")))
            .respond_with(ResponseTemplate::new(200).set_body_string(detail_page(
                id,
                &format!("Mod {id}"),
                steam,
                dl,
                &required,
            )))
            .expect(0..=1)
            .mount(server)
            .await;
        serve_search(
            server,
            steam,
            catalogue_page(&[article(id, &format!("Mod {id}"), steam, dl)]),
        )
        .await;
    }
    serve_search(server, "9999", catalogue_page(&[])).await;
}

fn required_by(deps: &[smods_catalogue::ModDependency], id: &str) -> Vec<String> {
    let dep = deps
        .iter()
        .find(|d| d.base.id == id)
        .unwrap_or_else(|| panic!("no dependency {id}"));
    dep.required_by.iter().map(|m| m.id.clone()).collect()
}

#[tokio::test]
async fn direct_dependencies_skip_unknown_items() {
    let server = MockServer::start().await;
    dependency_graph(&server).await;

    let deps = client_for(&server).dependencies("1").await.unwrap();
    let ids: Vec<&str> = deps.iter().map(|d| d.base.id.as_str()).collect();
    assert_eq!(ids, vec!["2", "3"]);
    assert_eq!(required_by(&deps, "2"), vec!["1"]);
    assert_eq!(required_by(&deps, "3"), vec!["1"]);
}

#[tokio::test]
async fn merged_trees_list_each_requirer_once() {
    let server = MockServer::start().await;
    dependency_graph(&server).await;

    let deps = client_for(&server)
        .dependency_tree(&["1", "2", "1"], false)
        .await
        .unwrap();
    assert_eq!(deps.len(), 3);
    assert_eq!(required_by(&deps, "3"), vec!["1", "2"]);
    assert_eq!(required_by(&deps, "1"), vec!["2"]);
}

#[tokio::test]
async fn recursive_walk_terminates_on_cycles() {
    let server = MockServer::start().await;
    // detail pages are fetched at most once even though 1 and 2 require each other
    dependency_graph(&server).await;

    let deps = client_for(&server)
        .dependency_tree(&["1"], true)
        .await
        .unwrap();
    assert_eq!(deps.len(), 3);
    assert_eq!(required_by(&deps, "2"), vec!["1"]);
    assert_eq!(required_by(&deps, "3"), vec!["1", "2"]);
    assert_eq!(required_by(&deps, "1"), vec!["2"]);
}

#[tokio::test]
async fn requirements_outside_the_catalogue_are_not_searched() {
    let server = MockServer::start().await;
    let dl = "https://modsbase.com/x/y.zip.html";
    serve_html(
        &server,
        "/archives/1",
        detail_page_linking(
            "1",
            "Mod 1",
            "1001",
            dl,
            &[
                "/?s=2002",
                "https://steamcommunity.com/sharedfiles/filedetails/?id=7007",
                "https://mirror.example/?s=3003",
            ],
        ),
    )
    .await;
    serve_search(&server, "2002", catalogue_page(&[article("2", "Mod 2", "2002", dl)])).await;
    for steam in ["7007", "3003"] {
        Mock::given(method("GET"))
            .and(path("/"))
            .and(query_param("s", steam))
            .respond_with(ResponseTemplate::new(200).set_body_string(catalogue_page(&[])))
            .expect(0)
            .mount(&server)
            .await;
    }

    let deps = client_for(&server).dependencies("1").await.unwrap();
    let ids: Vec<&str> = deps.iter().map(|d| d.base.id.as_str()).collect();
    assert_eq!(ids, vec!["2"]);
}

#[tokio::test]
async fn unreadable_dependency_pages_only_fail_requested_roots() {
    let server = MockServer::start().await;
    let dl = "https://modsbase.com/x/y.zip.html";
    serve_html(&server, "/archives/1", detail_page("1", "Mod 1", "1001", dl, &["2002"])).await;
    serve_html(
        &server,
        "/archives/2",
        "<html><body><h1>Checking your browser</h1></body></html>".into(),
    )
    .await;
    serve_search(&server, "2002", catalogue_page(&[article("2", "Mod 2", "2002", dl)])).await;

    let client = client_for(&server);

    // mod 2 is listed, but its own requirements cannot be read
    let deps = client.dependency_tree(&["1"], true).await.unwrap();
    assert_eq!(deps.len(), 1);
    assert_eq!(required_by(&deps, "2"), vec!["1"]);

    let err = client.dependency_tree(&["2"], true).await.unwrap_err();
    assert!(
        matches!(err, CatalogueError::Parse(ParseError::ContainerNotFound { .. })),
        "got {err:?}"
    );
}

#[tokio::test]
async fn malformed_ids_are_rejected_before_any_request() {
    let server = MockServer::start().await;
    let client = client_for(&server);
    for id in ["../wp-admin", "101?s=roads"] {
        let err = client.full_mod(id).await.unwrap_err();
        assert!(matches!(&err, CatalogueError::InvalidId(bad) if bad == id), "got {err:?}");
    }
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn download_posts_form_and_returns_location() {
    let server = MockServer::start().await;
    let archive = format!("{}/k3j4h5/2881031511_BetterRoads.zip.html", server.uri());
    serve_html(
        &server,
        "/archives/101",
        detail_page("101", "Better Roads", "2881031511", &archive, &[]),
    )
    .await;
    Mock::given(method("POST"))
        .and(path("/k3j4h5/2881031511_BetterRoads.zip.html"))
        .and(body_string_contains("op=download2"))
        .and(body_string_contains("id=k3j4h5"))
        .and(body_string_contains("method_free=Free+Download"))
        .respond_with(
            ResponseTemplate::new(302).insert_header("Location", "https://cdn.example/d/BetterRoads.zip"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server).with_download_hosts(["127.0.0.1"]);
    let url = client.download_url_by_id("101").await.unwrap();
    assert_eq!(url.as_str(), "https://cdn.example/d/BetterRoads.zip");
}

#[tokio::test]
async fn download_rejects_unlisted_hosts_without_network() {
    let server = MockServer::start().await;
    let client = client_for(&server);
    let m = mod_base("5", "https://files.example/abc/file.zip.html");
    let err = client.download_url(&m).await.unwrap_err();
    assert!(
        matches!(&err, CatalogueError::UnsupportedHost(host) if host == "files.example"),
        "got {err:?}"
    );
    assert!(server.received_requests().await.unwrap().is_empty());
}

/// In-memory transport answering redirect hops the way the hosting services do.
#[derive(Default)]
struct RecordingTransport {
    hops: Mutex<Vec<(String, Option<String>)>>,
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn fetch_text(&self, url: &Url) -> Result<String, HttpError> {
        Err(HttpError::Network {
            url: url.to_string(),
            message: "offline".into(),
        })
    }

    async fn fetch_location(&self, url: &Url, form: Option<&Form>) -> Result<Url, HttpError> {
        let id = form.and_then(|f| f.iter().find(|(k, _)| *k == "id").map(|(_, v)| v.clone()));
        self.hops
            .lock()
            .unwrap()
            .push((url.to_string(), id.clone()));
        let next = match id {
            None => "https://uploadfiles.eu/f/abc999/file.zip.html",
            Some(_) => "https://dl.uploadfiles.eu/file.zip",
        };
        Ok(Url::parse(next).unwrap())
    }
}

#[tokio::test]
async fn redirecting_host_takes_one_extra_hop() {
    let transport = Arc::new(RecordingTransport::default());
    let client =
        CatalogueClient::new(transport.clone(), Url::parse("https://smods.ru").unwrap()).unwrap();

    let m = mod_base("8", "https://uploadfiles.eu/xyz/file.zip.html");
    let url = client.download_url(&m).await.unwrap();
    assert_eq!(url.as_str(), "https://dl.uploadfiles.eu/file.zip");

    let hops = transport.hops.lock().unwrap().clone();
    assert_eq!(
        hops,
        vec![
            ("https://uploadfiles.eu/xyz/file.zip.html".to_string(), None),
            (
                "https://uploadfiles.eu/f/abc999/file.zip.html".to_string(),
                Some("abc999".to_string())
            ),
        ]
    );
}

#[tokio::test]
async fn in_memory_transport_errors_are_fetch_errors() {
    let client = CatalogueClient::new(
        Arc::new(RecordingTransport::default()),
        Url::parse("https://smods.ru").unwrap(),
    )
    .unwrap();
    let err = client.mod_base("1").await.unwrap_err();
    assert!(matches!(err, CatalogueError::Fetch(HttpError::Network { .. })));
}
