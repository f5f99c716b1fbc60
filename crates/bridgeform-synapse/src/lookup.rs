//! Picking single entities out of a freshly created set.

use crate::error::LookupError;
use crate::model::{same_id, Entity, EntityKind};

/// The only entity matching `predicate`; zero or several matches are errors.
pub fn find_unique<'a, P>(
    entities: &'a [Entity],
    what: impl FnOnce() -> String,
    predicate: P,
) -> Result<&'a Entity, LookupError>
where
    P: Fn(&Entity) -> bool,
{
    let mut matches = entities.iter().filter(|e| predicate(e));
    let first = matches.next();
    let rest = matches.count();
    match (first, rest) {
        (Some(entity), 0) => Ok(entity),
        (Some(_), rest) => Err(LookupError::Ambiguous {
            what: what(),
            count: rest + 1,
        }),
        (None, _) => Err(LookupError::NotFound { what: what() }),
    }
}

/// The created folder called `name`.
pub fn find_folder<'a>(entities: &'a [Entity], name: &str) -> Result<&'a Entity, LookupError> {
    find_unique(
        entities,
        || format!("created folder named `{name}`"),
        |e| e.is(EntityKind::Folder) && e.name == name,
    )
}

/// The created entity view whose scope is exactly `folder_id`.
pub fn find_scoped_view<'a>(
    entities: &'a [Entity],
    folder_id: &str,
) -> Result<&'a Entity, LookupError> {
    find_unique(
        entities,
        || format!("created entity view scoped to {folder_id}"),
        |e| {
            e.is(EntityKind::EntityView)
                && e.scope_ids.len() == 1
                && same_id(&e.scope_ids[0], folder_id)
        },
    )
}
