use serde_json::json;

use devbot_core::{CommandKind, Route};

use crate::output::{print_json, print_table};

/// List the slash commands the relay understands.
pub fn run(json: bool) -> anyhow::Result<()> {
    let route = |kind: CommandKind| match kind.route() {
        Route::Direct => "direct",
        Route::Tool => "tool",
    };

    if json {
        let list: Vec<_> = CommandKind::ALL
            .into_iter()
            .map(|kind| {
                json!({
                    "command": kind.slash(),
                    "route": route(kind),
                    "usage": kind.grammar().usage,
                })
            })
            .collect();
        return print_json(&list);
    }

    let rows: Vec<Vec<String>> = CommandKind::ALL
        .into_iter()
        .map(|kind| {
            vec![
                kind.slash().to_string(),
                route(kind).to_string(),
                kind.grammar().usage.to_string(),
            ]
        })
        .collect();
    print_table(&["COMMAND", "ROUTE", "USAGE"], &rows);
    Ok(())
}
