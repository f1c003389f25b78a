use anyhow::Context;
use devbot_core::command::{self, Request};
use devbot_core::CommandKind;

use crate::output::{print_fields, print_json};

/// Parse `text` as the given slash command and show the extracted fields.
pub fn run(command: &str, text: &str, json: bool) -> anyhow::Result<()> {
    let kind = CommandKind::from_slash(command)
        .with_context(|| format!("unknown command '{command}'"))?;
    let request = command::parse(kind, text)?;

    if json {
        return print_json(&request);
    }

    println!("{}", kind.slash());
    match &request {
        Request::Develop(r) => print_fields(&[
            ("repo", r.repo.as_str()),
            ("path", r.path.as_str()),
            ("instruction", r.instruction.as_str()),
        ]),
        Request::Design(r) => print_fields(&[
            ("project", r.project.as_str()),
            ("feature", r.feature.as_str()),
            ("requirements", r.requirements.as_str()),
        ]),
        Request::FromDesign(r) => print_fields(&[
            ("document", r.document_url.as_str()),
            ("path", r.path.as_str()),
            ("extra", r.extra.as_str()),
        ]),
        Request::Search(r) => print_fields(&[
            ("query", r.query.as_str()),
            ("scope", r.scope.as_deref().unwrap_or("(all spaces)")),
        ]),
    }
    Ok(())
}
