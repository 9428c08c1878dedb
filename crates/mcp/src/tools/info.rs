// save_info tool: durable notes, optionally captured from a URL

use crate::notify::{NotificationHub, INFO_CHANGED};
use crate::protocol::{CallToolResult, ToolSchema};
use crate::tools::fetch::PageFetcher;
use crate::tools::{
    json_schema_array, json_schema_enum, json_schema_number, json_schema_object,
    json_schema_string, parse_args, required, Tool, ToolError,
};
use anyhow::Result;
use parley_core::storage::InformationStore;
use parley_core::{format_millis, InfoId, NewInformation, StoredInformation};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;

const ACTIONS: &[&str] = &["save", "get", "search", "search_by_tags", "list", "delete", "stats"];
const PREVIEW_CHARS: usize = 200;

pub struct SaveInfoTool {
    store: Arc<InformationStore>,
    fetcher: Arc<PageFetcher>,
    hub: NotificationHub,
}

impl SaveInfoTool {
    pub fn new(store: Arc<InformationStore>, fetcher: Arc<PageFetcher>, hub: NotificationHub) -> Self {
        Self { store, fetcher, hub }
    }

    fn changed(&self, action: &str, id: &InfoId) {
        self.hub.publish(
            INFO_CHANGED,
            serde_json::json!({ "action": action, "id": id }),
        );
    }

    async fn save(&self, args: SaveInfoArgs) -> Result<CallToolResult> {
        let mut title = args.title.filter(|t| !t.trim().is_empty());
        let mut source = args.source;
        let mut metadata = args.metadata.unwrap_or_default();

        let content = match (args.content, args.url) {
            (Some(content), url) => {
                if source.is_none() {
                    source = url;
                }
                content
            }
            (None, Some(url)) => {
                // Fetch and save are separate, non-atomic steps
                let page = self.fetcher.fetch(&url).await?;
                if title.is_none() {
                    title = page.title.clone();
                }
                if page.truncated {
                    metadata.insert("truncated".to_string(), "true".to_string());
                }
                metadata.insert("fetchedUrl".to_string(), page.url.clone());
                source.get_or_insert(page.url);
                page.content
            }
            (None, None) => return Err(ToolError::MissingArgument("content").into()),
        };

        let title = required(title, "title")?;

        let info = self
            .store
            .save(NewInformation {
                title,
                content,
                source,
                summary: args.summary,
                tags: args.tags.unwrap_or_default(),
                metadata,
            })
            .await?;
        self.changed("save", &info.id);

        Ok(CallToolResult::text(format!(
            "Information saved.\n\n{}",
            describe(&info)
        )))
    }
}

#[derive(Debug, Deserialize)]
struct SaveInfoArgs {
    #[serde(default)]
    action: Option<String>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    tags: Option<Vec<String>>,
    #[serde(default)]
    metadata: Option<BTreeMap<String, String>>,
    #[serde(default)]
    query: Option<String>,
    #[serde(default)]
    limit: Option<usize>,
}

fn describe(info: &StoredInformation) -> String {
    let mut text = format!("{}\nID: {}\nSaved: {}", info.title, info.id, format_millis(info.created_at));
    if let Some(source) = &info.source {
        text.push_str(&format!("\nSource: {}", source));
    }
    if !info.tags.is_empty() {
        let tags: Vec<_> = info.tags.iter().map(String::as_str).collect();
        text.push_str(&format!("\nTags: {}", tags.join(", ")));
    }
    if let Some(summary) = &info.summary {
        text.push_str(&format!("\nSummary: {}", summary));
    }
    text
}

fn preview(info: &StoredInformation) -> String {
    let mut snippet: String = info.content.chars().take(PREVIEW_CHARS).collect();
    if info.content.chars().count() > PREVIEW_CHARS {
        snippet.push_str("...");
    }
    format!("- {} ({})\n  {}", info.title, info.id, snippet.replace('\n', " "))
}

fn render_list(heading: &str, entries: &[StoredInformation]) -> String {
    if entries.is_empty() {
        return format!("{}: nothing found.", heading);
    }
    let lines: Vec<_> = entries.iter().map(preview).collect();
    format!("{} ({}):\n{}", heading, entries.len(), lines.join("\n"))
}

#[async_trait::async_trait]
impl Tool for SaveInfoTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "save_info".to_string(),
            description: Some(
                "Save and retrieve information: notes, fetched web pages, summaries. Searchable by text and tags"
                    .to_string(),
            ),
            input_schema: Some(json_schema_object(
                serde_json::json!({
                    "action": json_schema_enum(ACTIONS, "Action to perform (default: save)"),
                    "id": json_schema_string("Entry id (for get, delete)"),
                    "title": json_schema_string("Entry title"),
                    "content": json_schema_string("Text to save"),
                    "url": json_schema_string("URL to fetch when content is omitted"),
                    "source": json_schema_string("Where the information came from"),
                    "summary": json_schema_string("Short summary"),
                    "tags": json_schema_array(serde_json::json!({"type": "string"}), "Tags"),
                    "metadata": {"type": "object", "description": "String key/value pairs"},
                    "query": json_schema_string("Search text (for search)"),
                    "limit": json_schema_number("Maximum entries to list")
                }),
                vec![],
            )),
        }
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<CallToolResult> {
        let args: SaveInfoArgs = parse_args(arguments)?;
        let action = args.action.clone().unwrap_or_else(|| "save".to_string());

        let text = match action.as_str() {
            "save" => return self.save(args).await,
            "get" => {
                let id = InfoId::new(required(args.id, "id")?);
                match self.store.get(&id).await? {
                    Some(info) => format!("{}\n\n{}", describe(&info), info.content),
                    None => return Ok(CallToolResult::error(format!("Information '{}' not found", id))),
                }
            }
            "search" => {
                let query = required(args.query, "query")?;
                let hits = self.store.search(&query).await?;
                render_list(&format!("Results for '{}'", query), &hits)
            }
            "search_by_tags" => {
                let tags = required(args.tags.filter(|t| !t.is_empty()), "tags")?;
                let hits = self.store.search_by_tags(&tags).await?;
                render_list(&format!("Entries tagged {}", tags.join(", ")), &hits)
            }
            "list" => {
                let entries = self.store.list(args.limit).await?;
                render_list("Saved information", &entries)
            }
            "delete" => {
                let id = InfoId::new(required(args.id, "id")?);
                if !self.store.delete(&id).await? {
                    return Ok(CallToolResult::error(format!("Information '{}' not found", id)));
                }
                self.changed("delete", &id);
                format!("Information '{}' deleted.", id)
            }
            "stats" => {
                let stats = self.store.stats().await?;
                let mut text = format!("Total entries: {}", stats.total);
                if !stats.tags.is_empty() {
                    let tags: Vec<_> = stats
                        .tags
                        .iter()
                        .map(|(tag, count)| format!("{} ({})", tag, count))
                        .collect();
                    text.push_str(&format!("\nTags: {}", tags.join(", ")));
                }
                if !stats.sources.is_empty() {
                    let sources: Vec<_> = stats.sources.keys().map(String::as_str).collect();
                    text.push_str(&format!("\nSources: {}", sources.join(", ")));
                }
                if let Some(newest) = &stats.newest {
                    text.push_str(&format!(
                        "\nNewest: {} ({})",
                        newest.title,
                        format_millis(newest.created_at)
                    ));
                }
                text
            }
            other => {
                return Err(ToolError::UnknownAction {
                    action: other.to_string(),
                    available: "save, get, search, search_by_tags, list, delete, stats",
                }
                .into())
            }
        };

        Ok(CallToolResult::text(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn tool(temp_dir: &TempDir) -> SaveInfoTool {
        let store = Arc::new(InformationStore::new(temp_dir.path().join("information.json")).unwrap());
        let fetcher = Arc::new(PageFetcher::new(Duration::from_secs(5), vec![]).unwrap());
        SaveInfoTool::new(store, fetcher, NotificationHub::default())
    }

    #[tokio::test]
    async fn test_save_defaults_to_save_action() {
        let temp_dir = TempDir::new().unwrap();
        let tool = tool(&temp_dir);

        let result = tool
            .execute(json!({"title": "Note", "content": "Remember this", "tags": ["Personal"]}))
            .await
            .unwrap();
        assert!(!result.is_error);
        assert!(result.first_text().unwrap().contains("Tags: personal"));

        let stored = tool.store.list(None).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].content, "Remember this");
    }

    #[tokio::test]
    async fn test_save_requires_content_or_url() {
        let temp_dir = TempDir::new().unwrap();
        let tool = tool(&temp_dir);

        let err = tool
            .execute(json!({"action": "save", "title": "Empty"}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("content"));
    }

    #[tokio::test]
    async fn test_save_from_url() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/post"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string("<title>Post</title>Interesting text"),
            )
            .mount(&server)
            .await;

        let temp_dir = TempDir::new().unwrap();
        let tool = tool(&temp_dir);
        let url = format!("{}/post", server.uri());

        tool.execute(json!({"action": "save", "url": url}))
            .await
            .unwrap();

        let stored = tool.store.list(None).await.unwrap();
        assert_eq!(stored[0].title, "Post");
        assert_eq!(stored[0].source.as_deref(), Some(url.as_str()));
        assert!(stored[0].content.contains("Interesting text"));
    }

    #[tokio::test]
    async fn test_search_get_delete() {
        let temp_dir = TempDir::new().unwrap();
        let tool = tool(&temp_dir);

        tool.execute(json!({"title": "Axum", "content": "Routers and extractors", "tags": ["rust"]}))
            .await
            .unwrap();
        let id = tool.store.list(None).await.unwrap()[0].id.to_string();

        let search = tool
            .execute(json!({"action": "search", "query": "extractors"}))
            .await
            .unwrap();
        assert!(search.first_text().unwrap().contains("Axum"));

        let by_tag = tool
            .execute(json!({"action": "search_by_tags", "tags": ["RUST"]}))
            .await
            .unwrap();
        assert!(by_tag.first_text().unwrap().contains("(1)"));

        let got = tool.execute(json!({"action": "get", "id": id})).await.unwrap();
        assert!(got.first_text().unwrap().contains("Routers and extractors"));

        let deleted = tool.execute(json!({"action": "delete", "id": id})).await.unwrap();
        assert!(!deleted.is_error);

        let missing = tool.execute(json!({"action": "get", "id": id})).await.unwrap();
        assert!(missing.is_error);
    }

    #[tokio::test]
    async fn test_stats() {
        let temp_dir = TempDir::new().unwrap();
        let tool = tool(&temp_dir);

        tool.execute(json!({"title": "a", "content": "x", "source": "manual", "tags": ["t"]}))
            .await
            .unwrap();

        let stats = tool.execute(json!({"action": "stats"})).await.unwrap();
        let text = stats.first_text().unwrap();
        assert!(text.contains("Total entries: 1"));
        assert!(text.contains("t (1)"));
        assert!(text.contains("Sources: manual"));
    }
}
