//! Trending-chart acquisition.
//!
//! Regions are walked strictly in the order given, page by page, and every
//! item is flattened into a [`VideoRecord`]. The platform populates its
//! payloads inconsistently, so every optional nested field has a documented
//! default (see [`flatten_item`]); an item that lacks even the required
//! fields is skipped with a warning instead of failing the region.
//!
//! A transport, auth or quota failure aborts the whole fetch. Rows gathered
//! before the failure are discarded rather than returned, so a caller never
//! mistakes a partial dataset for a complete one.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::api::{ApiKey, PAGE_SIZE, PageRequest, TrendingApi};
use crate::error::{PipelineError, Result};
use crate::record::{DEFAULT_CAPTION, NO_DESCRIPTION, UNKNOWN_CATEGORY, VideoRecord};

/// Category id to display name, built for one region. Lookups never fail:
/// anything unknown resolves to `"Unknown"`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryMap {
    region: String,
    names: BTreeMap<i64, String>,
}

impl CategoryMap {
    pub fn new(region: impl Into<String>, names: BTreeMap<i64, String>) -> Self {
        Self {
            region: region.into(),
            names,
        }
    }

    /// Region whose catalog this map was built from.
    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn name(&self, id: Option<i64>) -> &str {
        id.and_then(|id| self.names.get(&id))
            .map(String::as_str)
            .unwrap_or(UNKNOWN_CATEGORY)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (i64, &str)> {
        self.names.iter().map(|(id, name)| (*id, name.as_str()))
    }
}

#[derive(Deserialize)]
struct RawCategory {
    id: String,
    snippet: RawCategorySnippet,
}

#[derive(Deserialize)]
struct RawCategorySnippet {
    title: String,
}

/// Calls the category listing once for `region` and builds the mapping.
/// Items with a non-numeric id or no title are skipped.
pub fn resolve_category_mapping<A: TrendingApi + ?Sized>(
    api: &A,
    key: &ApiKey,
    region: &str,
) -> Result<CategoryMap> {
    let response = api.video_categories(key, region)?;
    let mut names = BTreeMap::new();

    for item in response.items {
        match parse_category(item) {
            Ok((id, name)) => {
                names.insert(id, name);
            }
            Err(err) => warn!(region, "skipping category entry: {err}"),
        }
    }

    info!(region, categories = names.len(), "resolved category mapping");
    Ok(CategoryMap::new(region, names))
}

fn parse_category(item: Value) -> Result<(i64, String)> {
    let raw: RawCategory = serde_json::from_value(item)
        .map_err(|err| PipelineError::data_shape(format!("category item: {err}")))?;
    let id = raw.id.trim().parse::<i64>().map_err(|_| {
        PipelineError::data_shape(format!("category id {:?} is not an integer", raw.id))
    })?;
    Ok((id, raw.snippet.title))
}

/// Fetches up to `max_results` rows across `regions`, naming categories with
/// the single `categories` map.
pub fn fetch_trending<A: TrendingApi + ?Sized>(
    api: &A,
    key: &ApiKey,
    categories: &CategoryMap,
    regions: &[impl AsRef<str>],
    max_results: usize,
) -> Result<Vec<VideoRecord>> {
    fetch_regions(api, key, CategorySource::Shared(categories), regions, max_results)
}

/// Like [`fetch_trending`], but resolves a fresh category map for each region
/// right before fetching it.
pub fn fetch_trending_regional<A: TrendingApi + ?Sized>(
    api: &A,
    key: &ApiKey,
    regions: &[impl AsRef<str>],
    max_results: usize,
) -> Result<Vec<VideoRecord>> {
    fetch_regions(api, key, CategorySource::PerRegion, regions, max_results)
}

#[derive(Clone, Copy)]
enum CategorySource<'a> {
    Shared(&'a CategoryMap),
    PerRegion,
}

fn fetch_regions<A: TrendingApi + ?Sized>(
    api: &A,
    key: &ApiKey,
    source: CategorySource<'_>,
    regions: &[impl AsRef<str>],
    max_results: usize,
) -> Result<Vec<VideoRecord>> {
    let mut records: Vec<VideoRecord> = Vec::new();

    'regions: for region in regions {
        let region: &str = region.as_ref();
        if records.len() >= max_results {
            break;
        }

        let regional;
        let categories = match source {
            CategorySource::Shared(map) => map,
            CategorySource::PerRegion => {
                regional = resolve_category_mapping(api, key, region)
                    .map_err(|err| discard_partial(err, region, records.len()))?;
                &regional
            }
        };

        let mut page_token: Option<String> = None;
        let mut page = 0usize;
        loop {
            let request = PageRequest {
                region,
                page_token: page_token.as_deref(),
                page_size: PAGE_SIZE,
            };
            let response = api
                .most_popular(key, &request)
                .map_err(|err| discard_partial(err, region, records.len()))?;
            page += 1;

            let item_count = response.items.len();
            for item in response.items {
                if records.len() >= max_results {
                    break;
                }
                match flatten_item(item, categories, region) {
                    Ok(record) => records.push(record),
                    Err(err) => warn!(region, page, "skipping item: {err}"),
                }
            }
            info!(region, page, items = item_count, total = records.len(), "fetched page");

            if records.len() >= max_results {
                break 'regions;
            }
            match response.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }
    }

    Ok(records)
}

fn discard_partial(err: PipelineError, region: &str, fetched: usize) -> PipelineError {
    if fetched > 0 {
        warn!(region, discarded = fetched, "fetch aborted, discarding partial results");
    }
    match err {
        PipelineError::RemoteAccess { message } => PipelineError::remote_access(format!(
            "{message} (while fetching region {region}; {fetched} rows fetched so far were discarded)"
        )),
        other => other,
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawVideo {
    id: String,
    snippet: RawSnippet,
    #[serde(default)]
    content_details: RawContentDetails,
    #[serde(default)]
    statistics: RawStatistics,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSnippet {
    title: String,
    #[serde(default)]
    description: Option<String>,
    published_at: String,
    channel_id: String,
    channel_title: String,
    #[serde(default)]
    category_id: Option<Value>,
    #[serde(default)]
    tags: Option<Vec<String>>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct RawContentDetails {
    duration: Option<String>,
    definition: Option<String>,
    caption: Option<String>,
}

/// The platform sends counters as JSON strings; numbers are accepted too.
#[derive(Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
struct RawStatistics {
    view_count: Option<Value>,
    like_count: Option<Value>,
    dislike_count: Option<Value>,
    favorite_count: Option<Value>,
    comment_count: Option<Value>,
}

/// Flattens one listing item into a row.
///
/// Required: `id`, `snippet.title`, `snippet.publishedAt`,
/// `snippet.channelId`, `snippet.channelTitle`. Defaults otherwise:
///
/// | field | when absent |
/// |---|---|
/// | description | `"No description"` |
/// | tags | empty list |
/// | category id / name | none / `"Unknown"` (also for non-numeric ids) |
/// | duration, definition | empty |
/// | caption | `"false"` |
/// | each counter | `0` (an unreadable counter also degrades to `0`) |
pub fn flatten_item(item: Value, categories: &CategoryMap, region: &str) -> Result<VideoRecord> {
    let label = item
        .get("id")
        .and_then(Value::as_str)
        .unwrap_or("<missing id>")
        .to_owned();
    let raw: RawVideo = serde_json::from_value(item)
        .map_err(|err| PipelineError::data_shape(format!("video {label}: {err}")))?;

    let category_id = raw.snippet.category_id.as_ref().and_then(|value| {
        let id = integer_of(value);
        if id.is_none() {
            warn!(video = %raw.id, "unreadable category id {value}");
        }
        id
    });
    let stats = &raw.statistics;
    let counter = |value: &Option<Value>, name: &str| count_or_zero(value.as_ref(), name, &raw.id);

    Ok(VideoRecord {
        view_count: counter(&stats.view_count, "viewCount"),
        like_count: counter(&stats.like_count, "likeCount"),
        dislike_count: counter(&stats.dislike_count, "dislikeCount"),
        favorite_count: counter(&stats.favorite_count, "favoriteCount"),
        comment_count: counter(&stats.comment_count, "commentCount"),
        title: raw.snippet.title,
        description: raw
            .snippet
            .description
            .unwrap_or_else(|| NO_DESCRIPTION.to_owned()),
        published_at: raw.snippet.published_at,
        channel_id: raw.snippet.channel_id,
        channel_title: raw.snippet.channel_title,
        category_id,
        category_name: categories.name(category_id).to_owned(),
        tags: raw.snippet.tags.unwrap_or_default(),
        duration: raw.content_details.duration.unwrap_or_default(),
        definition: raw.content_details.definition.unwrap_or_default(),
        caption: raw
            .content_details
            .caption
            .unwrap_or_else(|| DEFAULT_CAPTION.to_owned()),
        country: Some(region.to_owned()),
        video_id: raw.id,
    })
}

fn integer_of(value: &Value) -> Option<i64> {
    match value {
        Value::String(text) => text.trim().parse().ok(),
        Value::Number(number) => number.as_i64(),
        _ => None,
    }
}

fn count_or_zero(value: Option<&Value>, name: &str, video_id: &str) -> u64 {
    let parsed = match value {
        None | Some(Value::Null) => return 0,
        Some(Value::String(text)) => text.trim().parse::<u64>().ok(),
        Some(Value::Number(number)) => number.as_u64(),
        Some(_) => None,
    };
    parsed.unwrap_or_else(|| {
        warn!(video = video_id, "unreadable {name}, using 0");
        0
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{CategoryListResponse, VideoListResponse};
    use serde_json::json;
    use std::cell::RefCell;
    use std::collections::HashMap;

    /// Serves canned pages. Page tokens are `"p<index>"`.
    #[derive(Default)]
    struct FakeApi {
        categories: HashMap<String, Vec<Value>>,
        pages: HashMap<String, Vec<Vec<Value>>>,
        failing_region: Option<String>,
        requests: RefCell<Vec<(String, Option<String>, u32)>>,
        category_requests: RefCell<Vec<String>>,
    }

    impl FakeApi {
        fn with_pages(mut self, region: &str, pages: Vec<Vec<Value>>) -> Self {
            self.pages.insert(region.to_string(), pages);
            self
        }

        fn with_categories(mut self, region: &str, items: Vec<Value>) -> Self {
            self.categories.insert(region.to_string(), items);
            self
        }
    }

    impl TrendingApi for FakeApi {
        fn video_categories(&self, _key: &ApiKey, region: &str) -> Result<CategoryListResponse> {
            self.category_requests.borrow_mut().push(region.to_string());
            Ok(CategoryListResponse {
                items: self.categories.get(region).cloned().unwrap_or_default(),
            })
        }

        fn most_popular(
            &self,
            _key: &ApiKey,
            request: &PageRequest<'_>,
        ) -> Result<VideoListResponse> {
            self.requests.borrow_mut().push((
                request.region.to_string(),
                request.page_token.map(str::to_string),
                request.page_size,
            ));
            if self.failing_region.as_deref() == Some(request.region) {
                return Err(PipelineError::remote_access("quota exceeded"));
            }
            let pages = self.pages.get(request.region).cloned().unwrap_or_default();
            let index = request
                .page_token
                .and_then(|token| token.strip_prefix('p'))
                .and_then(|n| n.parse::<usize>().ok())
                .unwrap_or(0);
            let items = pages.get(index).cloned().unwrap_or_default();
            let next_page_token = (index + 1 < pages.len()).then(|| format!("p{}", index + 1));
            Ok(VideoListResponse {
                items,
                next_page_token,
            })
        }
    }

    fn video(id: &str) -> Value {
        json!({
            "id": id,
            "snippet": {
                "title": format!("Video {id}"),
                "description": "about",
                "publishedAt": "2024-06-01T12:00:00Z",
                "channelId": "UC1",
                "channelTitle": "Channel One",
                "categoryId": "10",
                "tags": ["music", "live"]
            },
            "contentDetails": {"duration": "PT4M13S", "definition": "hd", "caption": "true"},
            "statistics": {
                "viewCount": "1000",
                "likeCount": "100",
                "dislikeCount": "1",
                "favoriteCount": "0",
                "commentCount": "12"
            }
        })
    }

    fn videos(prefix: &str, count: usize) -> Vec<Value> {
        (0..count).map(|i| video(&format!("{prefix}{i}"))).collect()
    }

    fn music_map() -> CategoryMap {
        CategoryMap::new("US", BTreeMap::from([(10, "Music".to_string())]))
    }

    fn key() -> ApiKey {
        ApiKey::new("test-key")
    }

    #[test]
    fn two_regions_are_capped_in_order() {
        let api = FakeApi::default()
            .with_pages("A", vec![videos("a", 8)])
            .with_pages("B", vec![videos("b", 8)]);

        let rows = fetch_trending(&api, &key(), &music_map(), &["A", "B"], 10).unwrap();

        let ids: Vec<&str> = rows.iter().map(|r| r.video_id.as_str()).collect();
        assert_eq!(
            ids,
            ["a0", "a1", "a2", "a3", "a4", "a5", "a6", "a7", "b0", "b1"]
        );
        assert!(rows[..8].iter().all(|r| r.country.as_deref() == Some("A")));
        assert!(rows[8..].iter().all(|r| r.country.as_deref() == Some("B")));
    }

    #[test]
    fn cap_is_global_and_stops_requesting() {
        let api = FakeApi::default()
            .with_pages("A", vec![videos("a", 50), videos("a", 50)])
            .with_pages("B", vec![videos("b", 50), videos("b", 50)])
            .with_pages("C", vec![videos("c", 50)]);

        let rows = fetch_trending(&api, &key(), &music_map(), &["A", "B", "C"], 120).unwrap();

        assert_eq!(rows.len(), 120);
        let requests = api.requests.borrow();
        let seen: Vec<(&str, Option<&str>)> = requests
            .iter()
            .map(|(region, token, _)| (region.as_str(), token.as_deref()))
            .collect();
        assert_eq!(seen, [("A", None), ("A", Some("p1")), ("B", None)]);
    }

    #[test]
    fn page_size_is_independent_of_cap() {
        let api = FakeApi::default().with_pages("A", vec![videos("a", 3)]);
        fetch_trending(&api, &key(), &music_map(), &["A"], 2).unwrap();
        assert!(api.requests.borrow().iter().all(|(_, _, size)| *size == PAGE_SIZE));
    }

    #[test]
    fn exhausted_regions_return_everything_available() {
        let api = FakeApi::default()
            .with_pages("A", vec![videos("a", 2), videos("x", 1)])
            .with_pages("B", vec![]);
        let rows = fetch_trending(&api, &key(), &music_map(), &["A", "B"], 200).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(api.requests.borrow().len(), 3);
    }

    #[test]
    fn zero_cap_issues_no_requests() {
        let api = FakeApi::default().with_pages("A", vec![videos("a", 5)]);
        let rows = fetch_trending_regional(&api, &key(), &["A"], 0).unwrap();
        assert!(rows.is_empty());
        assert!(api.requests.borrow().is_empty());
        assert!(api.category_requests.borrow().is_empty());
    }

    #[test]
    fn missing_like_count_defaults_to_zero() {
        let mut item = video("v");
        item["statistics"]
            .as_object_mut()
            .unwrap()
            .remove("likeCount");
        let record = flatten_item(item, &music_map(), "US").unwrap();
        assert_eq!(record.like_count, 0);
        assert_eq!(record.view_count, 1000);
    }

    #[test]
    fn sparse_item_takes_documented_defaults() {
        let item = json!({
            "id": "sparse",
            "snippet": {
                "title": "Sparse",
                "publishedAt": "2024-06-01T12:00:00Z",
                "channelId": "UC2",
                "channelTitle": "Two"
            }
        });
        let record = flatten_item(item, &music_map(), "GB").unwrap();
        assert_eq!(record.description, NO_DESCRIPTION);
        assert!(record.tags.is_empty());
        assert_eq!(record.caption, DEFAULT_CAPTION);
        assert_eq!(record.category_id, None);
        assert_eq!(record.category_name, UNKNOWN_CATEGORY);
        assert_eq!(record.duration, "");
        assert_eq!(
            [
                record.view_count,
                record.like_count,
                record.dislike_count,
                record.favorite_count,
                record.comment_count
            ],
            [0; 5]
        );
        assert_eq!(record.country.as_deref(), Some("GB"));
    }

    #[test]
    fn numeric_and_unreadable_values_are_handled() {
        let mut item = video("v");
        item["statistics"]["viewCount"] = json!(42);
        item["statistics"]["commentCount"] = json!("hidden");
        item["snippet"]["categoryId"] = json!("music");
        let record = flatten_item(item, &music_map(), "US").unwrap();
        assert_eq!(record.view_count, 42);
        assert_eq!(record.comment_count, 0);
        assert_eq!(record.category_id, None);
        assert_eq!(record.category_name, UNKNOWN_CATEGORY);
    }

    #[test]
    fn unknown_category_resolves_to_unknown() {
        let mut item = video("v");
        item["snippet"]["categoryId"] = json!("999");
        let record = flatten_item(item, &music_map(), "US").unwrap();
        assert_eq!(record.category_id, Some(999));
        assert_eq!(record.category_name, UNKNOWN_CATEGORY);
    }

    #[test]
    fn malformed_item_is_skipped_without_aborting_region() {
        let mut page = videos("a", 3);
        page[1] = json!({"id": "broken", "statistics": {}});
        let api = FakeApi::default().with_pages("A", vec![page]);

        let rows = fetch_trending(&api, &key(), &music_map(), &["A"], 10).unwrap();
        let ids: Vec<&str> = rows.iter().map(|r| r.video_id.as_str()).collect();
        assert_eq!(ids, ["a0", "a2"]);
    }

    #[test]
    fn remote_failure_discards_partial_results() {
        let api = FakeApi {
            failing_region: Some("B".to_string()),
            ..FakeApi::default()
        }
        .with_pages("A", vec![videos("a", 4)]);

        let err = fetch_trending(&api, &key(), &music_map(), &["A", "B", "C"], 50).unwrap_err();
        match err {
            PipelineError::RemoteAccess { message } => {
                assert!(message.contains("quota exceeded"));
                assert!(message.contains("4 rows"));
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(api.requests.borrow().iter().all(|(region, _, _)| region != "C"));
    }

    #[test]
    fn category_mapping_skips_malformed_entries() {
        let api = FakeApi::default().with_categories(
            "US",
            vec![
                json!({"id": "1", "snippet": {"title": "Film & Animation"}}),
                json!({"id": "ten", "snippet": {"title": "Broken"}}),
                json!({"id": "2"}),
                json!({"id": "10", "snippet": {"title": "Music"}}),
            ],
        );
        let map = resolve_category_mapping(&api, &key(), "US").unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map.region(), "US");
        assert_eq!(map.name(Some(1)), "Film & Animation");
        assert_eq!(map.name(Some(10)), "Music");
        assert_eq!(map.name(Some(2)), UNKNOWN_CATEGORY);
        assert_eq!(map.name(None), UNKNOWN_CATEGORY);
    }

    #[test]
    fn regional_fetch_resolves_map_per_region() {
        let api = FakeApi::default()
            .with_categories("A", vec![json!({"id": "10", "snippet": {"title": "Music"}})])
            .with_categories("B", vec![json!({"id": "10", "snippet": {"title": "Musik"}})])
            .with_pages("A", vec![videos("a", 1)])
            .with_pages("B", vec![videos("b", 1)]);

        let rows = fetch_trending_regional(&api, &key(), &["A", "B"], 10).unwrap();
        assert_eq!(*api.category_requests.borrow(), ["A", "B"]);
        assert_eq!(rows[0].category_name, "Music");
        assert_eq!(rows[1].category_name, "Musik");
    }
}
