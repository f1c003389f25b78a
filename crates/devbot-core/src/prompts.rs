//! Prompt text sent to the completion service.

use crate::command::{DesignRequest, DevelopRequest, FromDesignRequest};
use crate::services::WikiPage;

/// Rewrite one file according to an instruction. `current` is empty when
/// the file does not exist yet.
pub fn develop(request: &DevelopRequest, current: &str) -> String {
    format!(
        "あなたはシニアソフトウェアエンジニアです。以下のファイルに対して、指示通りにコードを改修してください。\n\
         \n\
         ファイルパス: `{path}`\n\
         現在のコード:\n\
         ```\n\
         {current}\n\
         ```\n\
         \n\
         指示: 「{instruction}」\n\
         \n\
         改修後のコード全体のみを、コードブロックなしで返してください。\n",
        path = request.path,
        current = current,
        instruction = request.instruction,
    )
}

const DESIGN_SECTIONS: &str = "\
## 📋 概要
[機能の概要と目的、ビジネス価値]

## 🎯 要件
### 機能要件
### 非機能要件

## 🏗️ アーキテクチャ
### システム構成
### データフロー
### コンポーネント設計

## 🔌 API設計
### エンドポイント一覧
### リクエスト/レスポンス

## 🗄️ データベース設計
### テーブル設計
### インデックス設計

## 🔐 セキュリティ設計
### 認証・認可
### データ保護

## 🧪 テスト戦略

## 🚀 実装方針

## 📊 運用設計

## 📋 実装チェックリスト
";

/// Produce a markdown design document for a feature.
pub fn design_document(request: &DesignRequest) -> String {
    format!(
        "あなたはシニアシステムアーキテクトです。以下の要件に基づいて、Confluence向けの詳細な設計ドキュメントを作成してください。\n\
         \n\
         【プロジェクト】: {project}\n\
         【機能】: {feature}\n\
         【要件】: {requirements}\n\
         \n\
         以下のテンプレートに従って、実装に直結する詳細な設計書をMarkdownで作成してください：\n\
         \n\
         # {feature} 設計書\n\
         \n\
         {sections}\n\
         各セクションを詳細に記述し、実装チームが迷わず開発を進められる設計書を作成してください。\n",
        project = request.project,
        feature = request.feature,
        requirements = request.requirements,
        sections = DESIGN_SECTIONS,
    )
}

/// Generate a file implementing a design document.
pub fn code_from_design(request: &FromDesignRequest, document: &WikiPage) -> String {
    let extra = if request.extra.is_empty() {
        "なし"
    } else {
        request.extra.as_str()
    };
    format!(
        "あなたはシニアソフトウェアエンジニアです。以下の設計書に基づいて、指定されたファイルの実装コードを作成してください。\n\
         \n\
         【設計書】: {title}\n\
         ```\n\
         {text}\n\
         ```\n\
         \n\
         【実装ファイル】: `{path}`\n\
         【追加要件】: {extra}\n\
         \n\
         設計書の内容に忠実に、そのまま利用できるコード全体のみを、コードブロックなしで返してください。\n",
        title = document.title,
        text = document.text,
        path = request.path,
        extra = extra,
    )
}
