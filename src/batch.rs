//! Keyword batching.
//!
//! The provider accepts at most 20 keywords per group and 5 groups per
//! request, so a flat keyword list is split twice: into groups, then into
//! batches of groups. Order is preserved at both levels.

use crate::domain::{Batch, KeywordGroup, MAX_CHUNK_SIZE, MAX_GROUP_SIZE};
use crate::error::AppError;

pub const DEFAULT_CHUNK_SIZE: usize = MAX_CHUNK_SIZE;
pub const DEFAULT_GROUP_SIZE: usize = MAX_GROUP_SIZE;

/// Split `keywords` into batches of at most `chunk_size` groups, each group
/// holding at most `group_size` consecutive keywords.
///
/// Group names are the group's first keyword; two groups may end up with the
/// same name and that is not resolved here. An empty keyword list produces no
/// batches.
///
/// Zero sizes are treated as 1.
pub fn chunk(keywords: &[String], chunk_size: usize, group_size: usize) -> Vec<Batch> {
    let groups: Vec<KeywordGroup> = keywords
        .chunks(group_size.max(1))
        .filter_map(|members| KeywordGroup::new(members.to_vec()))
        .collect();

    groups
        .chunks(chunk_size.max(1))
        .map(|groups| Batch {
            groups: groups.to_vec(),
        })
        .collect()
}

/// Validate batching sizes against the provider limits.
pub fn validate_sizes(chunk_size: usize, group_size: usize) -> Result<(), AppError> {
    if chunk_size == 0 || chunk_size > MAX_CHUNK_SIZE {
        return Err(AppError::new(
            2,
            format!("Chunk size must be between 1 and {MAX_CHUNK_SIZE} groups per request (got {chunk_size})."),
        ));
    }
    if group_size == 0 || group_size > MAX_GROUP_SIZE {
        return Err(AppError::new(
            2,
            format!("Group size must be between 1 and {MAX_GROUP_SIZE} keywords per group (got {group_size})."),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn keywords(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("kw{i}")).collect()
    }

    #[test]
    fn empty_input_yields_no_batches() {
        assert!(chunk(&[], 5, 20).is_empty());
    }

    #[test]
    fn alphabet_fits_in_one_batch_of_two_groups() {
        let alphabet: Vec<String> = ('a'..='z').map(|c| c.to_string()).collect();
        let batches = chunk(&alphabet, 5, 20);

        assert_eq!(batches.len(), 1);
        let groups = &batches[0].groups;
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].members().len(), 20);
        assert_eq!(groups[1].members().len(), 6);
        assert_eq!(groups[0].name(), "a");
        assert_eq!(groups[1].name(), "u");
        assert_eq!(batches[0].keyword_count(), 26);
    }

    #[test]
    fn trailing_group_can_hold_a_single_keyword() {
        let batches = chunk(&keywords(21), 5, 20);
        let groups = &batches[0].groups;
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[1].members(), ["kw20"]);
    }

    #[test]
    fn groups_spill_into_a_partial_last_batch() {
        let batches = chunk(&keywords(20 * 7), 5, 20);
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].groups.len(), 5);
        assert_eq!(batches[1].groups.len(), 2);
        assert_eq!(batches[1].group_names(), ["kw100", "kw120"]);
    }

    #[test]
    fn duplicate_first_keywords_are_not_renamed() {
        let kws: Vec<String> = ["x", "y", "x", "z"].iter().map(|s| s.to_string()).collect();
        let batches = chunk(&kws, 5, 2);
        assert_eq!(batches[0].group_names(), ["x", "x"]);
    }

    #[test]
    fn provider_limits_are_enforced() {
        assert!(validate_sizes(5, 20).is_ok());
        assert!(validate_sizes(1, 1).is_ok());
        assert_eq!(validate_sizes(0, 20).unwrap_err().exit_code(), 2);
        assert!(validate_sizes(6, 20).is_err());
        assert!(validate_sizes(5, 21).is_err());
    }

    proptest! {
        #[test]
        fn group_and_batch_counts_follow_ceiling_division(n in 0usize..500) {
            let kws = keywords(n);
            let batches = chunk(&kws, 5, 20);

            let groups = n.div_ceil(20);
            let total_groups: usize = batches.iter().map(|b| b.groups.len()).sum();
            prop_assert_eq!(total_groups, groups);
            prop_assert_eq!(batches.len(), groups.div_ceil(5));

            let flattened: Vec<String> = batches
                .iter()
                .flat_map(|b| b.groups.iter())
                .flat_map(|g| g.members().iter().cloned())
                .collect();
            prop_assert_eq!(flattened, kws);
        }

        #[test]
        fn chunking_is_deterministic(n in 0usize..200, chunk_size in 1usize..=5, group_size in 1usize..=20) {
            let kws = keywords(n);
            prop_assert_eq!(chunk(&kws, chunk_size, group_size), chunk(&kws, chunk_size, group_size));
        }
    }
}
