//! Keyword trigger matching.

use tracing::debug;

use crate::action::Action;

/// Select the action a query triggers.
///
/// Active actions are scanned in the given order and the first one with a
/// keyword contained in the query (case-insensitively) wins. There is no
/// scoring: precedence is the stored order.
pub fn match_action<'a>(actions: &'a [Action], query: &str) -> Option<&'a Action> {
    let query_lower = query.to_lowercase();
    let matched = actions
        .iter()
        .filter(|action| action.is_active)
        .find(|action| action.is_triggered_by(&query_lower));

    match matched {
        Some(action) => debug!("Query triggered action '{}'", action.name),
        None => debug!("No action triggered among {} configured", actions.len()),
    }
    matched
}
