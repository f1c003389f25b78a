use tracing::{info, warn};

use super::{user_failure, Failure, Finished, Reporter, Step};
use crate::command::DevelopRequest;
use crate::orchestrator::Artifact;
use crate::prompts;
use crate::services::{ChangeRequest, Services};

const PR_BODY: &str = "AIによって自動生成されたプルリクエストです。";

/// `ai-feature/{first 20 chars of instruction}-{suffix as 4 hex digits}`,
/// with whitespace replaced by hyphens.
pub fn branch_name(instruction: &str, suffix: u16) -> String {
    let stem: String = instruction
        .chars()
        .take(20)
        .map(|c| if c.is_whitespace() { '-' } else { c })
        .collect();
    format!("ai-feature/{stem}-{suffix:04x}")
}

pub(super) async fn run(services: &Services, text: &str, reporter: &Reporter<'_>) -> Step<Finished> {
    let request = DevelopRequest::parse(text).map_err(user_failure)?;
    let DevelopRequest {
        repo,
        path,
        instruction,
    } = &request;

    reporter
        .send(&format!(
            "承知しました。`{repo}`の`{path}`に対する作業を開始します。\nまずは現在のコードを取得します..."
        ))
        .await;

    let current = match services.code_host.fetch_file(repo, path, None).await {
        Ok(file) => file.content,
        Err(e) if e.is_not_found() => {
            info!(repo = %repo, path = %path, "file not found, treating as new");
            reporter
                .send(&format!(
                    "警告: `{repo}`の`{path}`が見つかりませんでした。新規ファイルとして処理を続行します。"
                ))
                .await;
            String::new()
        }
        Err(e) => {
            warn!(repo = %repo, path = %path, error = %e, "fetch failed");
            return Err(Failure(format!(
                "❌ `{repo}`の`{path}`の取得中にエラーが発生しました: {e}"
            )));
        }
    };

    reporter
        .send("コードのコンテキストをAIに渡し、改修案を生成させます...")
        .await;
    let prompt = prompts::develop(&request, &current);
    let new_code = services
        .completion
        .complete(&prompt, services.settings.max_tokens)
        .await
        .map_err(|e| Failure(format!("AIとの通信中にエラーが発生しました: {e}")))?;

    reporter
        .send("新しいコードを元に、GitHubにプルリクエストを作成します...")
        .await;
    let branch = branch_name(instruction, rand::random());
    let change = ChangeRequest {
        repo: repo.clone(),
        branch: branch.clone(),
        path: path.clone(),
        content: new_code,
        commit_message: format!("feat: {instruction}"),
        title: format!("AI提案: {instruction}"),
        body: PR_BODY.to_string(),
    };
    let url = services
        .code_host
        .open_change(&change)
        .await
        .map_err(|e| Failure(format!("❌ プルリクエストの作成中にエラーが発生しました: {e}")))?;

    Ok(Finished {
        message: format!("✅ プルリクエストの作成が完了しました！\nレビューをお願いします: {url}"),
        artifact: Artifact::PullRequest { url, branch },
    })
}
