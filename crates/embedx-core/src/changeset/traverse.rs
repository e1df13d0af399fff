//! Error traversal across a changeset tree.

use std::collections::BTreeMap;

use super::{Change, Changeset, EmbedChange};

/// Collect the errors of a changeset and every nested changeset
///
/// Keys are field paths: `name` for the changeset's own fields,
/// `profile.bio` for a single nested entity and `addresses[1].city` for the
/// second entry of a nested collection. Nested errors are read in place;
/// nothing is copied into the parent changeset.
pub fn traverse_errors(changeset: &Changeset) -> BTreeMap<String, Vec<String>> {
    let mut collected = BTreeMap::new();
    collect(changeset, "", &mut collected);
    collected
}

fn collect(changeset: &Changeset, prefix: &str, out: &mut BTreeMap<String, Vec<String>>) {
    for error in &changeset.errors {
        out.entry(format!("{}{}", prefix, error.field))
            .or_insert_with(Vec::new)
            .push(error.message.clone());
    }

    for (field, change) in &changeset.changes {
        match change {
            Change::Embed(EmbedChange::One(Some(nested))) => {
                collect(nested, &format!("{}{}.", prefix, field), out);
            }
            Change::Embed(EmbedChange::Many(nested)) => {
                for (index, entry) in nested.iter().enumerate() {
                    collect(entry, &format!("{}{}[{}].", prefix, field, index), out);
                }
            }
            Change::Embed(EmbedChange::One(None)) | Change::Value(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changeset::Action;
    use crate::model::Entity;

    #[test]
    fn test_nested_errors_are_keyed_by_path() {
        let mut bad_city = Changeset::new(Entity::new("address")).with_action(Action::Insert);
        bad_city.add_error("city", "can't be blank", Some("required"));
        let good = Changeset::new(Entity::new("address")).with_action(Action::Insert);

        let mut bad_bio = Changeset::new(Entity::new("profile")).with_action(Action::Insert);
        bad_bio.add_error("bio", "is too long", None);

        let mut parent = Changeset::new(Entity::new("person"));
        parent.add_error("name", "can't be blank", Some("required"));
        parent.changes.insert(
            "addresses".into(),
            Change::Embed(EmbedChange::Many(vec![good, bad_city])),
        );
        parent.changes.insert(
            "profile".into(),
            Change::Embed(EmbedChange::One(Some(Box::new(bad_bio)))),
        );

        let errors = traverse_errors(&parent);
        assert_eq!(errors.len(), 3);
        assert_eq!(errors["name"], vec!["can't be blank".to_string()]);
        assert_eq!(errors["addresses[1].city"], vec!["can't be blank".to_string()]);
        assert_eq!(errors["profile.bio"], vec!["is too long".to_string()]);
    }

    #[test]
    fn test_valid_tree_has_no_errors() {
        let parent = Changeset::new(Entity::new("person"));
        assert!(traverse_errors(&parent).is_empty());
    }
}
