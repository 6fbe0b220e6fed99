//! Markup builders shaped like the live catalogue.
#![allow(dead_code)]

use chrono::NaiveDate;
use smods_catalogue::{ModBase, ModRevision};

pub const CATALOGUE_FIXTURE: &str = include_str!("../fixtures/catalogue.html");
pub const DETAIL_FIXTURE: &str = include_str!("../fixtures/detail.html");

/// One listing entry.
pub fn article(id: &str, name: &str, steam_id: &str, download: &str) -> String {
    format!(
        r##"<article id="post-{id}" class="post-{id} post type-post">
  <h2 class="post-title"><a href="/archives/{id}">{name}</a></h2>
  <div class="skymods-excerpt-meta">
    <p><span class="skymods-item-authors">Author: <a href="#">author-{id}</a></span></p>
    <p>Last revision: <span class="skymods-item-date">1 Feb, 2024 at 12:00 UTC</span></p>
    <p><a href="https://steamcommunity.com/sharedfiles/filedetails/?id={steam_id}">On Steam Workshop</a></p>
  </div>
  <a class="skymods-excerpt-btn" href="{download}">Download</a>
</article>"##
    )
}

pub fn catalogue_page(articles: &[String]) -> String {
    format!(
        r#"<html><body><div id="content">{}</div></body></html>"#,
        articles.join("\n")
    )
}

/// A detail page whose "Required items" box links to catalogue searches for
/// each Steam id in `required`.
pub fn detail_page(id: &str, name: &str, steam_id: &str, download: &str, required: &[&str]) -> String {
    let links: Vec<String> = required.iter().map(|s| format!("/?s={s}")).collect();
    let links: Vec<&str> = links.iter().map(String::as_str).collect();
    detail_page_linking(id, name, steam_id, download, &links)
}

/// Like [`detail_page`] with the "Required items" hrefs given verbatim.
pub fn detail_page_linking(
    id: &str,
    name: &str,
    steam_id: &str,
    download: &str,
    required: &[&str],
) -> String {
    let required_box = if required.is_empty() {
        String::new()
    } else {
        let links: Vec<String> = required
            .iter()
            .enumerate()
            .map(|(n, href)| format!(r#"<a href="{href}">Requirement {n}</a>"#))
            .collect();
        format!(
            r#"<div id="required-items"><div>Required items: {}</div></div>"#,
            links.join(" ")
        )
    };
    format!(
        r#"<html><body><div id="content">
<article id="post-{id}" class="post-{id} post type-post">
  <h1 class="post-title">{name}</h1>
  <div class="skymods-single-before">
    <p>Last revision: <span class="skymods-item-date">1 Feb, 2024 at 12:00 UTC</span></p>
    <p><a href="https://steamcommunity.com/sharedfiles/filedetails/?id={steam_id}">On Steam Workshop</a></p>
  </div>
  <div class="skymods-single-after">
    <a class="skymods-excerpt-btn" href="{download}">Download</a>
    {required_box}
  </div>
</article>
</div></body></html>"#
    )
}

pub fn mod_base(id: &str, download: &str) -> ModBase {
    let date = NaiveDate::from_ymd_opt(2024, 2, 1)
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap();
    ModBase {
        id: id.into(),
        name: format!("Mod {id}"),
        steam_id: format!("9{id}"),
        authors: vec![],
        size: None,
        published_date: None,
        has_dependencies: false,
        latest_revision: ModRevision::new("1 Feb, 2024 at 12:00", date, download),
        category: None,
    }
}
