//! Slash-command grammar and parser.
//!
//! Every command family is described by a [`Grammar`]: an ordered list of
//! literal delimiters and the fields they separate. Parsing walks the
//! delimiters left to right and splits at most once, on the first occurrence
//! of each one. Matching is plain substring search, so a value that itself
//! contains a delimiter is split at the wrong place; commands are short
//! free-form chat text and this is accepted as a known limitation.

use serde::Serialize;
use std::fmt;

use crate::error::{DevbotError, Result};

// ---------------------------------------------------------------------------
// CommandKind / Route
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CommandKind {
    Develop,
    Design,
    DevelopFromDesign,
    Search,
    DesignMcp,
    DevelopFromDesignMcp,
    SearchMcp,
}

/// How the wiki step of a command reaches the document wiki.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Call the wiki adapter directly.
    Direct,
    /// Go through the tool-integration client.
    Tool,
}

impl CommandKind {
    pub const ALL: [CommandKind; 7] = [
        CommandKind::Develop,
        CommandKind::Design,
        CommandKind::DevelopFromDesign,
        CommandKind::Search,
        CommandKind::DesignMcp,
        CommandKind::DevelopFromDesignMcp,
        CommandKind::SearchMcp,
    ];

    /// The slash command that selects this kind.
    pub fn slash(&self) -> &'static str {
        match self {
            CommandKind::Develop => "/develop",
            CommandKind::Design => "/design",
            CommandKind::DevelopFromDesign => "/develop-from-design",
            CommandKind::Search => "/confluence-search",
            CommandKind::DesignMcp => "/design-mcp",
            CommandKind::DevelopFromDesignMcp => "/develop-from-design-mcp",
            CommandKind::SearchMcp => "/confluence-search-mcp",
        }
    }

    /// Resolve a slash command name. The leading `/` is optional.
    pub fn from_slash(name: &str) -> Option<Self> {
        let name = name.trim();
        let name = name.strip_prefix('/').unwrap_or(name);
        Self::ALL
            .into_iter()
            .find(|kind| &kind.slash()[1..] == name)
    }

    pub fn route(&self) -> Route {
        match self {
            CommandKind::DesignMcp | CommandKind::DevelopFromDesignMcp | CommandKind::SearchMcp => {
                Route::Tool
            }
            _ => Route::Direct,
        }
    }

    /// The direct counterpart of a tool-routed kind; direct kinds map to themselves.
    pub fn direct(&self) -> CommandKind {
        match self {
            CommandKind::DesignMcp => CommandKind::Design,
            CommandKind::DevelopFromDesignMcp => CommandKind::DevelopFromDesign,
            CommandKind::SearchMcp => CommandKind::Search,
            other => *other,
        }
    }

    pub fn grammar(&self) -> &'static Grammar {
        match self.direct() {
            CommandKind::Develop => &DEVELOP,
            CommandKind::Design => &DESIGN,
            CommandKind::DevelopFromDesign => &FROM_DESIGN,
            _ => &SEARCH,
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.slash()[1..])
    }
}

// ---------------------------------------------------------------------------
// Grammar table
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct Delimiter {
    pub token: &'static str,
    /// When absent, the remaining text becomes the current field and every
    /// later field is left empty.
    pub optional: bool,
}

#[derive(Debug)]
pub struct Field {
    pub name: &'static str,
    pub required: bool,
}

/// Declarative description of one command family.
///
/// `fields.len()` is always `delimiters.len() + 1`.
#[derive(Debug)]
pub struct Grammar {
    pub delimiters: &'static [Delimiter],
    pub fields: &'static [Field],
    pub usage: &'static str,
}

const fn required(token: &'static str) -> Delimiter {
    Delimiter {
        token,
        optional: false,
    }
}

const fn field(name: &'static str, required: bool) -> Field {
    Field { name, required }
}

pub static DEVELOP: Grammar = Grammar {
    delimiters: &[required(" の "), required(" に ")],
    fields: &[
        field("repo", true),
        field("path", true),
        field("instruction", true),
    ],
    usage: "/develop [リポジトリ名] の [ファイルパス] に [やってほしいこと]",
};

pub static DESIGN: Grammar = Grammar {
    delimiters: &[required(" の "), required(" について ")],
    fields: &[
        field("project", true),
        field("feature", true),
        field("requirements", true),
    ],
    usage: "/design [プロジェクト名] の [機能名] について [要件]",
};

pub static FROM_DESIGN: Grammar = Grammar {
    delimiters: &[required(" の "), required(" に実装")],
    fields: &[
        field("document_url", true),
        field("path", true),
        field("extra", false),
    ],
    usage: "/develop-from-design [設計書URL] の [ファイルパス] に実装 [追加要件]",
};

pub static SEARCH: Grammar = Grammar {
    delimiters: &[Delimiter {
        token: " in:",
        optional: true,
    }],
    fields: &[field("query", true), field("scope", false)],
    usage: "/confluence-search [検索キーワード] in:[スペースキー]",
};

/// Field values in grammar order; `None` for fields whose optional
/// delimiter was absent.
#[derive(Debug, Clone)]
pub struct Fields<'a> {
    grammar: &'static Grammar,
    values: Vec<Option<&'a str>>,
}

impl<'a> Fields<'a> {
    pub fn get(&self, name: &str) -> Option<&'a str> {
        self.grammar
            .fields
            .iter()
            .position(|f| f.name == name)
            .and_then(|i| self.values.get(i).copied().flatten())
    }

    fn require(&self, name: &str) -> String {
        self.get(name).unwrap_or_default().to_string()
    }
}

/// Split `text` according to `grammar`.
///
/// The whole input is trimmed first; field values are the exact substrings
/// between delimiters.
pub fn split_fields<'a>(grammar: &'static Grammar, text: &'a str) -> Result<Fields<'a>> {
    let malformed = || DevbotError::MalformedCommand {
        text: text.to_string(),
        usage: grammar.usage,
    };

    let mut values = Vec::with_capacity(grammar.fields.len());
    let mut rest = Some(text.trim());

    for delimiter in grammar.delimiters {
        let Some(current) = rest else {
            values.push(None);
            continue;
        };
        match current.split_once(delimiter.token) {
            Some((head, tail)) => {
                values.push(Some(head));
                rest = Some(tail);
            }
            None if delimiter.optional => {
                values.push(Some(current));
                rest = None;
            }
            None => return Err(malformed()),
        }
    }
    values.push(rest);

    for (spec, value) in grammar.fields.iter().zip(&values) {
        if spec.required && !matches!(value, Some(v) if !v.trim().is_empty()) {
            return Err(malformed());
        }
    }

    Ok(Fields { grammar, values })
}

// ---------------------------------------------------------------------------
// Typed requests
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DevelopRequest {
    pub repo: String,
    pub path: String,
    pub instruction: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DesignRequest {
    pub project: String,
    pub feature: String,
    pub requirements: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FromDesignRequest {
    pub document_url: String,
    pub path: String,
    /// Additional instructions after `に実装`; empty when none were given.
    pub extra: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchRequest {
    pub query: String,
    pub scope: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    Develop(DevelopRequest),
    Design(DesignRequest),
    FromDesign(FromDesignRequest),
    Search(SearchRequest),
}

impl DevelopRequest {
    pub fn parse(text: &str) -> Result<Self> {
        let fields = split_fields(&DEVELOP, text)?;
        Ok(Self {
            repo: fields.require("repo"),
            path: fields.require("path"),
            instruction: fields.require("instruction"),
        })
    }
}

impl DesignRequest {
    pub fn parse(text: &str) -> Result<Self> {
        let fields = split_fields(&DESIGN, text)?;
        Ok(Self {
            project: fields.require("project"),
            feature: fields.require("feature"),
            requirements: fields.require("requirements"),
        })
    }
}

impl FromDesignRequest {
    pub fn parse(text: &str) -> Result<Self> {
        let fields = split_fields(&FROM_DESIGN, text)?;
        Ok(Self {
            document_url: fields.require("document_url"),
            path: fields.require("path"),
            extra: fields.get("extra").unwrap_or_default().trim().to_string(),
        })
    }
}

impl SearchRequest {
    pub fn parse(text: &str) -> Result<Self> {
        let fields = split_fields(&SEARCH, text)?;
        Ok(Self {
            query: fields.require("query").trim().to_string(),
            scope: fields
                .get("scope")
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        })
    }
}

/// Parse `text` with the grammar of `kind`.
pub fn parse(kind: CommandKind, text: &str) -> Result<Request> {
    let request = match kind.direct() {
        CommandKind::Develop => Request::Develop(DevelopRequest::parse(text)?),
        CommandKind::Design => Request::Design(DesignRequest::parse(text)?),
        CommandKind::DevelopFromDesign => Request::FromDesign(FromDesignRequest::parse(text)?),
        _ => Request::Search(SearchRequest::parse(text)?),
    };
    Ok(request)
}

// ---------------------------------------------------------------------------
// Command
// ---------------------------------------------------------------------------

/// One inbound command: what was typed, which command it was typed into, and
/// where progress should be reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub kind: CommandKind,
    pub text: String,
    pub callback: String,
}

impl Command {
    pub fn new(kind: CommandKind, text: impl Into<String>, callback: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
            callback: callback.into(),
        }
    }

    /// Build a command from a slash command name, e.g. `/develop`.
    pub fn from_slash(
        name: &str,
        text: impl Into<String>,
        callback: impl Into<String>,
    ) -> Result<Self> {
        let kind = CommandKind::from_slash(name)
            .ok_or_else(|| DevbotError::UnknownCommand(name.to_string()))?;
        Ok(Self::new(kind, text, callback))
    }

    pub fn parse(&self) -> Result<Request> {
        parse(self.kind, &self.text)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
