use std::sync::Arc;

use crate::command::Route;
use crate::error::{DevbotError, Result};
use crate::markup;
use crate::services::{
    PageRef, SearchHit, Services, ToolCall, ToolOutput, ToolRunner, Wiki, WikiPage,
};

/// Wiki operations for a script, either against the wiki directly or
/// through the tool-integration client.
pub(super) enum WikiAccess {
    Direct(Arc<dyn Wiki>),
    Tool(Arc<dyn ToolRunner>),
}

impl WikiAccess {
    /// Fails with `Disabled` when the integration the route needs is not
    /// configured.
    pub(super) fn resolve(services: &Services, route: Route) -> Result<Self> {
        let access = match route {
            Route::Tool => services.tools.clone().map(WikiAccess::Tool),
            Route::Direct => services.wiki.clone().map(WikiAccess::Direct),
        };
        access.ok_or(DevbotError::Disabled("confluence"))
    }

    /// Create a page from markdown content.
    pub(super) async fn create_page(
        &self,
        space: &str,
        title: &str,
        markdown: &str,
    ) -> Result<PageRef> {
        match self {
            WikiAccess::Direct(wiki) => {
                let html = markup::markdown_to_html(markdown);
                wiki.create_page(space, title, &html, None).await
            }
            WikiAccess::Tool(tools) => {
                let call = ToolCall::CreatePage {
                    space_key: space.to_string(),
                    title: title.to_string(),
                    content: markdown.to_string(),
                    parent_id: None,
                };
                match tools.run_tool(call).await? {
                    ToolOutput::Created(page) => Ok(page),
                    other => Err(unexpected("confluence_create_page", &other)),
                }
            }
        }
    }

    pub(super) async fn get_page(&self, reference: &str) -> Result<WikiPage> {
        match self {
            WikiAccess::Direct(wiki) => wiki.get_page(reference).await,
            WikiAccess::Tool(tools) => {
                let page_id = markup::page_id(reference)?;
                match tools.run_tool(ToolCall::GetPage { page_id }).await? {
                    ToolOutput::Page(page) => Ok(page),
                    other => Err(unexpected("confluence_get_page", &other)),
                }
            }
        }
    }

    pub(super) async fn search(&self, query: &str, space: Option<&str>) -> Result<Vec<SearchHit>> {
        match self {
            WikiAccess::Direct(wiki) => wiki.search(query, space).await,
            WikiAccess::Tool(tools) => {
                let call = ToolCall::Search {
                    query: query.to_string(),
                    space: space.map(str::to_string),
                };
                match tools.run_tool(call).await? {
                    ToolOutput::Search(hits) => Ok(hits),
                    other => Err(unexpected("confluence_search", &other)),
                }
            }
        }
    }
}

fn unexpected(tool: &str, output: &ToolOutput) -> DevbotError {
    DevbotError::service("tool", format!("{tool} returned an unexpected result: {output:?}"))
}
