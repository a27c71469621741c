//! `kb update` — C6.3.

use crate::cli::{Cli, UpdateArgs};
use crate::error::Result;
use crate::store::UpdatePatch;

/// # Errors
///
/// Propagates any error from [`crate::store::Engine::update`].
///
/// `--tag`/`--related` are repeatable flags; since an empty repetition is
/// indistinguishable from "not passed", both are treated as "leave
/// unchanged" rather than "clear" when absent.
pub fn execute(cli: &Cli, args: UpdateArgs) -> Result<()> {
    let (item_type, id) = super::split_reference(&args.reference, args.id)?;
    let format = super::effective_format(cli);

    if crate::is_dry_run() {
        println!("would update {item_type}-{id}");
        return Ok(());
    }

    let mut engine = super::open_engine(cli)?;
    let patch = UpdatePatch {
        title: args.title,
        description: super::nullable(args.description),
        content: super::nullable(args.content),
        priority: args.priority.map(Into::into),
        status: args.status,
        start_date: super::nullable(args.start_date),
        end_date: super::nullable(args.end_date),
        start_time: super::nullable(args.start_time),
        tags: (!args.tags.is_empty()).then(|| args.tags.into_iter().collect()),
        related: (!args.related.is_empty()).then_some(args.related),
    };
    let item = engine.update(&item_type, &id, patch)?;
    super::print_item(format, &item)
}
