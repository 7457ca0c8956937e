//! Interactive choice among generated candidates.

use dialoguer::Select;

use crate::engine::GenerationCandidate;
use crate::error::SelectError;

const ERROR_MARKER: &str = "✗";

/// Menu lines, one per candidate. Error candidates carry a marker.
pub fn menu_items(candidates: &[GenerationCandidate]) -> Vec<String> {
    candidates
        .iter()
        .map(|c| {
            if c.is_error {
                format!("{} {}", ERROR_MARKER, c.label)
            } else {
                c.label.clone()
            }
        })
        .collect()
}

/// The first candidate that is not an error.
pub fn first_selectable(candidates: &[GenerationCandidate]) -> Option<&GenerationCandidate> {
    candidates.iter().find(|c| !c.is_error)
}

/// Let the user pick a message.
///
/// Error candidates are listed but cannot be chosen; picking one re-prompts.
pub fn choose(candidates: &[GenerationCandidate]) -> Result<&GenerationCandidate, SelectError> {
    let Some(first) = candidates.iter().position(|c| !c.is_error) else {
        return Err(SelectError::NothingSelectable);
    };

    let items = menu_items(candidates);
    let mut default = first;
    loop {
        let picked = Select::new()
            .with_prompt("Pick a commit message to use")
            .items(items.as_slice())
            .default(default)
            .interact_opt()
            .map_err(|_| SelectError::Cancelled)?
            .ok_or(SelectError::Cancelled)?;

        match candidates.get(picked) {
            Some(candidate) if !candidate.is_error => return Ok(candidate),
            _ => {
                eprintln!("That backend failed; pick another message.");
                default = picked;
            }
        }
    }
}
