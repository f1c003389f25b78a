use super::wiki::WikiAccess;
use super::{user_failure, Artifact, Failure, Finished, Reporter, Step};
use crate::command::{DesignRequest, Route};
use crate::prompts;
use crate::services::Services;

pub(super) async fn run(
    services: &Services,
    route: Route,
    text: &str,
    reporter: &Reporter<'_>,
) -> Step<Finished> {
    let wiki = WikiAccess::resolve(services, route).map_err(user_failure)?;
    let request = DesignRequest::parse(text).map_err(user_failure)?;

    reporter
        .send(&format!(
            "📝 `{}`の「{}」の設計ドキュメントを生成します...",
            request.project, request.feature
        ))
        .await;
    let document = services
        .completion
        .complete(&prompts::design_document(&request), services.settings.max_tokens)
        .await
        .map_err(|e| Failure(format!("AIとの通信中にエラーが発生しました: {e}")))?;

    reporter
        .send("📄 設計ドキュメントを生成しました。Confluenceにページを作成します...")
        .await;
    let title = format!("{} - {} 設計書", request.project, request.feature);
    let page = wiki
        .create_page(&services.settings.default_space, &title, &document)
        .await
        .map_err(|e| Failure(format!("❌ Confluenceページの作成中にエラーが発生しました: {e}")))?;

    Ok(Finished {
        message: format!(
            "✅ 設計ドキュメントを作成しました！\nタイトル: {}\nURL: {}",
            page.title, page.url
        ),
        artifact: Artifact::Page {
            url: page.url,
            title: page.title,
        },
    })
}
