//! `kb create` — C6.1.

use crate::cli::{Cli, CreateArgs};
use crate::error::Result;
use crate::store::CreateParams;

/// # Errors
///
/// Propagates any error from [`crate::store::Engine::create`].
pub fn execute(cli: &Cli, args: CreateArgs) -> Result<()> {
    let format = super::effective_format(cli);

    if crate::is_dry_run() {
        println!("would create {} titled {:?}", args.item_type, args.title);
        return Ok(());
    }

    let mut engine = super::open_engine(cli)?;
    let params = CreateParams {
        item_type: args.item_type,
        id: args.id,
        title: args.title,
        description: args.description,
        content: args.content,
        priority: args.priority.map(Into::into),
        status: args.status,
        tags: args.tags.into_iter().collect(),
        start_date: args.start_date,
        end_date: args.end_date,
        start_time: args.start_time,
        related: args.related,
    };
    let item = engine.create(params)?;
    super::print_item(format, &item)
}
