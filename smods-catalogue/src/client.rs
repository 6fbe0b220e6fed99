//! Caller-facing catalogue operations.
//!
//! Each operation is one or more fetch-then-extract round trips through the
//! shared [`Transport`]. The client holds no mutable state, so clones can be
//! used from any number of tasks at once.
use smods_common::PageKind;
use smods_common::rules::{RuleBook, field};
use smods_http::{HttpClient, HttpError, Transport};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use url::Url;

use crate::error::{CatalogueError, ParseError, Result};
use crate::extract::Extractor;
use crate::types::{CatalogueItem, CatalogueQuery, FullMod, ModBase, ModDependency, ModRevision};

pub const DEFAULT_DOWNLOAD_HOSTS: [&str; 2] = ["modsbase.com", "uploadfiles.eu"];

/// Hosting service that answers the archive page with a redirect to the real one.
const REDIRECTING_HOST: &str = "uploadfiles.eu";

#[derive(Clone)]
pub struct CatalogueClient {
    transport: Arc<dyn Transport>,
    base: Url,
    extractor: Arc<Extractor>,
    download_hosts: Arc<Vec<String>>,
}

impl CatalogueClient {
    /// Client for the catalogue at `base` with the default rule book.
    pub fn new(transport: Arc<dyn Transport>, base: Url) -> Result<Self> {
        let base = with_trailing_slash(base);
        let extractor = Extractor::new(RuleBook::default())?.with_base(base.clone());
        Ok(Self {
            transport,
            base,
            extractor: Arc::new(extractor),
            download_hosts: Arc::new(DEFAULT_DOWNLOAD_HOSTS.iter().map(|h| h.to_string()).collect()),
        })
    }

    /// Use an [`HttpClient`] as transport, anchored at its base URL.
    ///
    /// ```no_run
    /// # async fn demo() -> smods_catalogue::Result<()> {
    /// use smods_catalogue::{CatalogueClient, CatalogueQuery};
    /// use smods_http::HttpClient;
    ///
    /// let catalogue = CatalogueClient::from_http(HttpClient::new("https://smods.ru")?)?;
    /// for item in catalogue.search(&CatalogueQuery::new("roads")).await? {
    ///     println!("{}", item.base);
    /// }
    /// # Ok(()) }
    /// ```
    pub fn from_http(http: HttpClient) -> Result<Self> {
        let base = http.base().clone();
        Self::new(Arc::new(http), base)
    }

    /// Replace the rule book; selectors are validated here.
    pub fn with_rules(mut self, rules: RuleBook) -> Result<Self> {
        let extractor = Extractor::new(rules)?.with_base(self.base.clone());
        self.extractor = Arc::new(extractor);
        Ok(self)
    }

    /// Replace the hosting services download resolution may talk to.
    pub fn with_download_hosts<I, S>(mut self, hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.download_hosts = Arc::new(hosts.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_extractor(mut self, extractor: Extractor) -> Self {
        self.extractor = Arc::new(extractor);
        self
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    pub fn extractor(&self) -> &Extractor {
        &self.extractor
    }

    /// Detail page URL for a Skymods id. Only numeric ids are accepted.
    pub fn mod_url(&self, id: &str) -> Result<Url> {
        if id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) {
            return Err(CatalogueError::InvalidId(id.to_string()));
        }
        self.endpoint(&format!("archives/{id}"))
    }

    // ==============================
    // Lookups
    // ==============================

    /// One page of catalogue results, in site order.
    pub async fn search(&self, query: &CatalogueQuery) -> Result<Vec<CatalogueItem>> {
        let mut url = self.endpoint(&query.path())?;
        let params = query.params();
        if !params.is_empty() {
            url.query_pairs_mut().extend_pairs(params);
        }
        tracing::debug!(url=%url, page = query.page, "catalogue.search");
        let html = self.transport.fetch_text(&url).await?;
        let items = self.extractor.catalogue(&html)?;
        tracing::info!(keyword=%query.keyword, page = query.page, count = items.len(), "catalogue.search.done");
        Ok(items)
    }

    pub async fn mod_base(&self, id: &str) -> Result<ModBase> {
        let url = self.mod_url(id)?;
        let html = self.transport.fetch_text(&url).await?;
        Ok(self.extractor.detail_base(&html)?)
    }

    pub async fn full_mod(&self, id: &str) -> Result<FullMod> {
        let url = self.mod_url(id)?;
        self.fetch_full(&url).await
    }

    /// Like [`full_mod`](Self::full_mod) for a detail page URL.
    pub async fn full_mod_by_url(&self, url: &str) -> Result<FullMod> {
        let url = Url::parse(url).map_err(|e| HttpError::Url(e.to_string()))?;
        self.fetch_full(&url).await
    }

    async fn fetch_full(&self, url: &Url) -> Result<FullMod> {
        let html = self.transport.fetch_text(url).await?;
        let full = self.extractor.full(&html)?;
        tracing::debug!(id=%full.base.id, revisions = full.other_revisions.len(), required = full.required_mods.len(), "catalogue.full_mod");
        Ok(full)
    }

    /// First catalogue match for a Steam workshop id.
    pub async fn mod_base_by_steam_id(&self, steam_id: &str) -> Result<ModBase> {
        self.search(&CatalogueQuery::new(steam_id))
            .await?
            .into_iter()
            .next()
            .map(|item| item.base)
            .ok_or_else(|| CatalogueError::NotFound(format!("no item with steam id {steam_id}")))
    }

    pub async fn mod_id_by_steam_id(&self, steam_id: &str) -> Result<String> {
        Ok(self.mod_base_by_steam_id(steam_id).await?.id)
    }

    /// Latest revision and the older ones, oldest first.
    pub async fn revisions(&self, id: &str) -> Result<(ModRevision, Vec<ModRevision>)> {
        let full = self.full_mod(id).await?;
        Ok((full.base.latest_revision, full.other_revisions))
    }

    // ==============================
    // Dependencies
    // ==============================

    /// Direct dependencies of one mod.
    pub async fn dependencies(&self, id: &str) -> Result<Vec<ModDependency>> {
        self.dependency_tree(&[id], false).await
    }

    /// Dependencies of all `ids`, merged into one list.
    ///
    /// A mod required by several of the walked mods appears once, with every
    /// requirer in `required_by`. With `recursive`, dependencies of
    /// dependencies are walked too; every mod page is fetched at most once, so
    /// cyclic requirements terminate. Required items that cannot be found in
    /// the catalogue are skipped.
    pub async fn dependency_tree<S: AsRef<str>>(
        &self,
        ids: &[S],
        recursive: bool,
    ) -> Result<Vec<ModDependency>> {
        let mut deps: Vec<ModDependency> = Vec::new();
        let mut visited: HashSet<String> = HashSet::new();
        let mut queue: VecDeque<(String, bool)> =
            ids.iter().map(|id| (id.as_ref().to_string(), true)).collect();

        while let Some((id, requested)) = queue.pop_front() {
            if !visited.insert(id.clone()) {
                continue;
            }
            let page = match self.full_mod(&id).await {
                Ok(page) => page,
                Err(CatalogueError::Parse(error)) if !requested => {
                    tracing::warn!(%id, %error, "catalogue.dependency.unreadable");
                    continue;
                }
                Err(e) => return Err(e),
            };
            let root = page.base;

            for required in &page.required_mods {
                if !self.is_catalogue_link(&required.link) {
                    tracing::debug!(name=%required.name, link=%required.link, "catalogue.dependency.external");
                    continue;
                }
                let Some(steam_id) = &required.steam_id else {
                    tracing::debug!(name=%required.name, link=%required.link, "catalogue.dependency.no_steam_id");
                    continue;
                };
                let dep = match self.mod_base_by_steam_id(steam_id).await {
                    Ok(dep) => dep,
                    Err(CatalogueError::NotFound(_)) => {
                        tracing::debug!(%steam_id, "catalogue.dependency.not_found");
                        continue;
                    }
                    Err(e) => return Err(e),
                };

                if recursive {
                    queue.push_back((dep.id.clone(), false));
                }
                merge_dependency(&mut deps, dep, &root);
            }
        }

        tracing::info!(roots = ids.len(), recursive, count = deps.len(), "catalogue.dependency_tree.done");
        Ok(deps)
    }

    fn is_catalogue_link(&self, link: &str) -> bool {
        Url::parse(link)
            .map(|u| u.host_str() == self.base.host_str() && u.port() == self.base.port())
            .unwrap_or(false)
    }

    // ==============================
    // Downloads
    // ==============================

    /// Resolve the final download URL of the latest revision.
    ///
    /// Only hosting services in the configured list are contacted.
    pub async fn download_url(&self, m: &ModBase) -> Result<Url> {
        let page = &m.latest_revision.download_url;
        let mut target = Url::parse(page).map_err(|e| HttpError::Url(e.to_string()))?;
        let host = target.host_str().unwrap_or_default().to_string();
        if !self.download_hosts.iter().any(|h| *h == host) {
            return Err(CatalogueError::UnsupportedHost(host));
        }

        if host == REDIRECTING_HOST {
            target = self.transport.fetch_location(&target, None).await?;
            tracing::debug!(from=%page, to=%target, "catalogue.download.hop");
        }

        let file_id = second_to_last_segment(&target).ok_or_else(|| {
            ParseError::invalid(PageKind::Detail, field::DOWNLOAD_URL, target.as_str())
        })?;
        let form = [
            ("op", "download2".to_string()),
            ("id", file_id),
            ("rand", String::new()),
            ("referer", self.base.to_string()),
            ("method_free", "Free Download".to_string()),
            ("method_premium", String::new()),
        ];
        let url = self.transport.fetch_location(&target, Some(&form[..])).await?;
        tracing::info!(id=%m.id, revision=%m.latest_revision.id(), url=%url, "catalogue.download.resolved");
        Ok(url)
    }

    pub async fn download_url_by_id(&self, id: &str) -> Result<Url> {
        let m = self.mod_base(id).await?;
        self.download_url(&m).await
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self
            .base
            .join(path)
            .map_err(|e| HttpError::Url(e.to_string()))?)
    }
}

/// Add `dep` to the list, or record `root` as one more requirer of the copy already there.
fn merge_dependency(deps: &mut Vec<ModDependency>, dep: ModBase, root: &ModBase) {
    match deps.iter_mut().find(|d| d.base.id == dep.id) {
        Some(existing) => {
            existing.add_required_by(root);
        }
        None => {
            let mut fresh = ModDependency::new(dep);
            fresh.add_required_by(root);
            deps.push(fresh);
        }
    }
}

fn second_to_last_segment(url: &Url) -> Option<String> {
    let segments: Vec<&str> = url.path_segments()?.filter(|s| !s.is_empty()).collect();
    segments
        .len()
        .checked_sub(2)
        .map(|i| segments[i].to_string())
}

fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}
