use super::wiki::WikiAccess;
use super::{user_failure, Artifact, Failure, Finished, Reporter, Step};
use crate::command::{FromDesignRequest, Route};
use crate::markup::truncate_chars;
use crate::prompts;
use crate::services::Services;

// Repository linking is not implemented: the generated code is only shown to
// the user, who applies it by hand.
pub(super) async fn run(
    services: &Services,
    route: Route,
    text: &str,
    reporter: &Reporter<'_>,
) -> Step<Finished> {
    let wiki = WikiAccess::resolve(services, route).map_err(user_failure)?;
    let request = FromDesignRequest::parse(text).map_err(user_failure)?;

    reporter
        .send(&format!("📖 設計書を取得しています: {}", request.document_url))
        .await;
    let document = wiki
        .get_page(&request.document_url)
        .await
        .map_err(|e| Failure(format!("❌ 設計書の取得中にエラーが発生しました: {e}")))?;

    reporter
        .send(&format!(
            "📄 設計書「{}」を取得しました。`{}`の実装コードを生成します...",
            document.title, request.path
        ))
        .await;
    let code = services
        .completion
        .complete(
            &prompts::code_from_design(&request, &document),
            services.settings.max_tokens,
        )
        .await
        .map_err(|e| Failure(format!("AIとの通信中にエラーが発生しました: {e}")))?;

    let preview = truncate_chars(&code, services.settings.preview_chars);
    Ok(Finished {
        message: format!(
            "✅ `{}`の実装コードを生成しました。\n```\n{}\n```\n\
             ⚠️ リポジトリへの反映は自動では行われません。生成されたコードを手動で適用してください。",
            request.path, preview
        ),
        artifact: Artifact::GeneratedCode {
            path: request.path,
            preview,
        },
    })
}
