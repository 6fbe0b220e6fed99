//! Mod records and catalogue query parameters.
//!
//! Every variant embeds a [`ModBase`] value; [`Mod`] tags them for dispatch.
use chrono::NaiveDateTime;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

const STEAM_WORKSHOP_URL: &str = "https://steamcommunity.com/workshop/filedetails/?id=";

/// One uploaded archive of a mod.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModRevision {
    /// Label as shown on the site, `UTC` suffix removed.
    pub name: String,
    pub date: NaiveDateTime,
    /// Hosting-service page of the archive.
    pub download_url: String,
}

impl ModRevision {
    pub fn new(name: impl Into<String>, date: NaiveDateTime, download_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            date,
            download_url: download_url.into(),
        }
    }

    /// Short stable identifier derived from the label.
    ///
    /// ```
    /// use chrono::NaiveDate;
    /// use smods_catalogue::ModRevision;
    ///
    /// let date = NaiveDate::from_ymd_opt(2023, 3, 12).unwrap().and_hms_opt(10, 15, 0).unwrap();
    /// let a = ModRevision::new("12 Mar, 2023 at 10:15", date, "https://modsbase.com/x/a.zip.html");
    /// let b = ModRevision::new("12 Mar, 2023 at 10:15", date, "https://modsbase.com/y/b.zip.html");
    /// assert_eq!(a.id().len(), 10);
    /// assert_eq!(a.id(), b.id());
    /// ```
    pub fn id(&self) -> String {
        let digest = blake3::hash(self.name.as_bytes());
        let mut id = hex::encode(digest.as_bytes());
        id.truncate(10);
        id
    }

    /// Archive file name: last path segment of the download URL without `.html`.
    pub fn filename(&self) -> String {
        let last = self
            .download_url
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or_default();
        last.strip_suffix(".html").unwrap_or(last).trim().to_string()
    }
}

impl fmt::Display for ModRevision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} | {} | {} | {}",
            self.id(),
            self.name,
            self.filename(),
            self.download_url
        )
    }
}

/// The fields every mod record carries, whatever page it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModBase {
    /// Skymods id.
    pub id: String,
    pub name: String,
    pub steam_id: String,
    pub authors: Vec<String>,
    /// As displayed, e.g. `12.3 MB`.
    pub size: Option<String>,
    pub published_date: Option<NaiveDateTime>,
    pub has_dependencies: bool,
    pub latest_revision: ModRevision,
    pub category: Option<String>,
}

impl ModBase {
    /// Detail page of this mod on the catalogue rooted at `base`.
    pub fn url(&self, base: &str) -> String {
        format!("{}/archives/{}", base.trim_end_matches('/'), self.id)
    }

    pub fn steam_url(&self) -> String {
        format!("{STEAM_WORKSHOP_URL}{}", self.steam_id)
    }
}

impl fmt::Display for ModBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} | {}", self.id, self.name)?;
        if let Some(category) = &self.category {
            write!(f, " [{category}]")?;
        }
        Ok(())
    }
}

/// A mod as listed on a catalogue page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogueItem {
    #[serde(flatten)]
    pub base: ModBase,
    pub image_url: Option<String>,
    /// Filled stars, 0 to 5.
    pub rating: u8,
}

/// A mod required by another one, as linked from its detail page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequiredMod {
    pub name: String,
    pub steam_id: Option<String>,
    pub link: String,
}

/// Everything the detail page of a mod shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FullMod {
    #[serde(flatten)]
    pub base: ModBase,
    /// Description markup.
    pub description: Option<String>,
    pub plain_description: Option<String>,
    pub updated_date: Option<NaiveDateTime>,
    pub dlc_requirements: Vec<String>,
    pub required_mods: Vec<RequiredMod>,
    /// Older revisions, oldest first.
    pub other_revisions: Vec<ModRevision>,
    pub tags: Vec<String>,
    pub image_url: Option<String>,
    pub rating: u8,
}

/// A mod other mods depend on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModDependency {
    #[serde(flatten)]
    pub base: ModBase,
    pub required_by: Vec<ModBase>,
}

impl ModDependency {
    pub fn new(base: ModBase) -> Self {
        Self {
            base,
            required_by: Vec::new(),
        }
    }

    /// Record `dependent` unless a mod with the same id is already listed.
    pub fn add_required_by(&mut self, dependent: &ModBase) -> bool {
        if self.required_by.iter().any(|m| m.id == dependent.id) {
            return false;
        }
        self.required_by.push(dependent.clone());
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModKind {
    Base,
    Catalogue,
    Full,
    Dependency,
}

/// Any mod record, tagged by variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Mod {
    Base(ModBase),
    Catalogue(CatalogueItem),
    Full(FullMod),
    Dependency(ModDependency),
}

impl Mod {
    pub fn kind(&self) -> ModKind {
        match self {
            Mod::Base(_) => ModKind::Base,
            Mod::Catalogue(_) => ModKind::Catalogue,
            Mod::Full(_) => ModKind::Full,
            Mod::Dependency(_) => ModKind::Dependency,
        }
    }

    /// The [`ModBase`] projection shared by every variant.
    pub fn base(&self) -> &ModBase {
        match self {
            Mod::Base(base) => base,
            Mod::Catalogue(item) => &item.base,
            Mod::Full(full) => &full.base,
            Mod::Dependency(dep) => &dep.base,
        }
    }

    pub fn into_base(self) -> ModBase {
        match self {
            Mod::Base(base) => base,
            Mod::Catalogue(item) => item.base,
            Mod::Full(full) => full.base,
            Mod::Dependency(dep) => dep.base,
        }
    }
}

impl From<ModBase> for Mod {
    fn from(value: ModBase) -> Self {
        Mod::Base(value)
    }
}

impl From<CatalogueItem> for Mod {
    fn from(value: CatalogueItem) -> Self {
        Mod::Catalogue(value)
    }
}

impl From<FullMod> for Mod {
    fn from(value: FullMod) -> Self {
        Mod::Full(value)
    }
}

impl From<ModDependency> for Mod {
    fn from(value: ModDependency) -> Self {
        Mod::Dependency(value)
    }
}

// ==============================
// Catalogue query
// ==============================

/// Catalogue ordering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SortBy {
    /// Date uploaded, newest first.
    #[default]
    Uploaded,
    /// Date updated, newest first. New items are excluded.
    Updated,
    HighestRated,
    /// Items without enough votes.
    Unrated,
    SmallestFileSize,
    LargestFileSize,
}

impl SortBy {
    pub const ALL: [SortBy; 6] = [
        SortBy::Uploaded,
        SortBy::Updated,
        SortBy::HighestRated,
        SortBy::Unrated,
        SortBy::SmallestFileSize,
        SortBy::LargestFileSize,
    ];

    /// Value of the `sort` query parameter; empty means "not sent".
    pub fn as_param(&self) -> &'static str {
        match self {
            SortBy::Uploaded => "",
            SortBy::Updated => "updated",
            SortBy::HighestRated => "highest-rated",
            SortBy::Unrated => "unrated",
            SortBy::SmallestFileSize => "smallest-file-size",
            SortBy::LargestFileSize => "largest-file-size",
        }
    }
}

impl FromStr for SortBy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "uploaded" => Ok(SortBy::Uploaded),
            other => SortBy::ALL
                .into_iter()
                .find(|v| v.as_param() == other)
                .ok_or_else(|| format!("unknown sort order `{other}`")),
        }
    }
}

/// Catalogue time window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum TimePeriod {
    #[default]
    AllTime,
    OneDay,
    ThreeDays,
    OneWeek,
    TwoWeeks,
    OneMonth,
    SixMonths,
    OneYear,
}

impl TimePeriod {
    pub const ALL: [TimePeriod; 8] = [
        TimePeriod::AllTime,
        TimePeriod::OneDay,
        TimePeriod::ThreeDays,
        TimePeriod::OneWeek,
        TimePeriod::TwoWeeks,
        TimePeriod::OneMonth,
        TimePeriod::SixMonths,
        TimePeriod::OneYear,
    ];

    /// Value of the `period` query parameter; empty means "not sent".
    pub fn as_param(&self) -> &'static str {
        match self {
            TimePeriod::AllTime => "",
            TimePeriod::OneDay => "one_day",
            TimePeriod::ThreeDays => "three_days",
            TimePeriod::OneWeek => "one_week",
            TimePeriod::TwoWeeks => "two_weeks",
            TimePeriod::OneMonth => "one_month",
            TimePeriod::SixMonths => "six_months",
            TimePeriod::OneYear => "one_year",
        }
    }
}

impl FromStr for TimePeriod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "all_time" => Ok(TimePeriod::AllTime),
            other => TimePeriod::ALL
                .into_iter()
                .find(|v| v.as_param() == other)
                .ok_or_else(|| format!("unknown time period `{other}`")),
        }
    }
}

/// One page of catalogue results.
///
/// ```
/// use smods_catalogue::{CatalogueQuery, SortBy};
///
/// let q = CatalogueQuery::new("roads").page(2).sort(SortBy::HighestRated);
/// assert_eq!(q.path(), "page/2");
/// assert_eq!(q.params(), vec![("s", "roads"), ("sort", "highest-rated")]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogueQuery {
    pub keyword: String,
    /// 0 is the first page (no `/page/` segment); any other value is sent as `/page/<n>`.
    pub page: u32,
    pub sort: SortBy,
    pub period: TimePeriod,
}

impl CatalogueQuery {
    pub fn new(keyword: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            ..Default::default()
        }
    }

    pub fn page(mut self, page: u32) -> Self {
        self.page = page;
        self
    }

    pub fn sort(mut self, sort: SortBy) -> Self {
        self.sort = sort;
        self
    }

    pub fn period(mut self, period: TimePeriod) -> Self {
        self.period = period;
        self
    }

    /// Path relative to the catalogue root.
    pub fn path(&self) -> String {
        if self.page == 0 {
            String::new()
        } else {
            format!("page/{}", self.page)
        }
    }

    /// Non-empty query parameters in the order the site expects them.
    pub fn params(&self) -> Vec<(&'static str, &str)> {
        [
            ("s", self.keyword.as_str()),
            ("sort", self.sort.as_param()),
            ("period", self.period.as_param()),
        ]
        .into_iter()
        .filter(|(_, v)| !v.is_empty())
        .collect()
    }
}
