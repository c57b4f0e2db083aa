//! Person source consumed by the room coordinators, plus the in-memory catalog backing it.

use std::collections::BTreeSet;
use std::sync::Arc;

use futures::future::BoxFuture;
use rand::{rng, seq::SliceRandom};

use crate::dao::{models::PersonEntity, storage::StorageResult};

/// Category code that draws from every person of the catalog.
pub const MIX_CATEGORY: &str = "mix";

/// Read-only access to the persons rooms are built from.
pub trait PersonSource: Send + Sync {
    /// Look a person up by id.
    fn find_person(&self, id: String) -> BoxFuture<'static, StorageResult<Option<PersonEntity>>>;
    /// Draw up to `count` distinct person ids for `category`, in random order.
    fn random_person_ids(
        &self,
        category: String,
        count: usize,
    ) -> BoxFuture<'static, StorageResult<Vec<String>>>;
    /// Known category codes, `mix` first.
    fn categories(&self) -> BoxFuture<'static, StorageResult<Vec<String>>>;
}

/// Person source answering from a fixed list loaded at startup.
#[derive(Clone)]
pub struct PersonCatalog {
    persons: Arc<[PersonEntity]>,
}

impl PersonCatalog {
    /// Catalog over `persons`, in the given order.
    pub fn new(persons: Vec<PersonEntity>) -> Self {
        Self {
            persons: persons.into(),
        }
    }

    fn ids_for(&self, category: &str) -> Vec<String> {
        let category = category.trim().to_lowercase();
        self.persons
            .iter()
            .filter(|person| {
                category == MIX_CATEGORY
                    || person
                        .categories
                        .iter()
                        .any(|code| code.to_lowercase() == category)
            })
            .map(|person| person.id.clone())
            .collect()
    }
}

impl PersonSource for PersonCatalog {
    fn find_person(&self, id: String) -> BoxFuture<'static, StorageResult<Option<PersonEntity>>> {
        let found = self.persons.iter().find(|person| person.id == id).cloned();
        Box::pin(async move { Ok(found) })
    }

    fn random_person_ids(
        &self,
        category: String,
        count: usize,
    ) -> BoxFuture<'static, StorageResult<Vec<String>>> {
        let mut ids = self.ids_for(&category);
        ids.shuffle(&mut rng());
        ids.truncate(count);
        Box::pin(async move { Ok(ids) })
    }

    fn categories(&self) -> BoxFuture<'static, StorageResult<Vec<String>>> {
        let mut codes = BTreeSet::new();
        for person in self.persons.iter() {
            codes.extend(person.categories.iter().map(|code| code.to_lowercase()));
        }
        let mut categories = vec![MIX_CATEGORY.to_string()];
        categories.extend(codes.into_iter().filter(|code| code != MIX_CATEGORY));
        Box::pin(async move { Ok(categories) })
    }
}

/// Render the "answer shape" hint of a name.
///
/// Letters become `_`, spaces stay spaces, anything else is kept, and every
/// symbol is separated by a single space so word gaps end up three spaces wide.
pub fn mask_name(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_alphabetic() { '_' } else { c })
        .map(String::from)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person(id: &str, categories: &[&str]) -> PersonEntity {
        PersonEntity {
            id: id.into(),
            name: format!("Person {id}"),
            categories: categories.iter().map(|c| c.to_string()).collect(),
            occupation: "tester".into(),
            hints: vec!["first".into()],
        }
    }

    fn catalog() -> PersonCatalog {
        PersonCatalog::new(vec![
            person("a", &["science"]),
            person("b", &["Science", "art"]),
            person("c", &["art"]),
            person("d", &["music"]),
        ])
    }

    #[test]
    fn masks_letters_and_preserves_hyphen() {
        assert_eq!(mask_name("Ada-Lovelace"), "_ _ _ - _ _ _ _ _ _ _ _");
    }

    #[test]
    fn word_gaps_become_three_spaces() {
        assert_eq!(mask_name("A B"), "_   _");
    }

    #[test]
    fn keeps_digits_and_punctuation() {
        assert_eq!(mask_name("R2D2!"), "_ 2 _ 2 !");
    }

    #[test]
    fn masks_non_ascii_letters() {
        assert_eq!(mask_name("Łukasz"), "_ _ _ _ _ _");
    }

    #[tokio::test]
    async fn category_draw_is_case_insensitive() {
        let mut ids = catalog()
            .random_person_ids("SCIENCE".into(), 10)
            .await
            .unwrap();
        ids.sort();
        assert_eq!(ids, vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn mix_draw_is_truncated_without_duplicates() {
        let ids = catalog().random_person_ids("mix".into(), 3).await.unwrap();
        assert_eq!(ids.len(), 3);
        let unique: BTreeSet<_> = ids.iter().collect();
        assert_eq!(unique.len(), 3);
    }

    #[tokio::test]
    async fn unknown_category_draws_nothing() {
        let ids = catalog()
            .random_person_ids("sports".into(), 5)
            .await
            .unwrap();
        assert!(ids.is_empty());
    }

    #[tokio::test]
    async fn categories_start_with_mix() {
        let categories = catalog().categories().await.unwrap();
        assert_eq!(categories, vec!["mix", "art", "music", "science"]);
    }

    #[tokio::test]
    async fn find_person_by_id() {
        let catalog = catalog();
        assert_eq!(
            catalog.find_person("c".into()).await.unwrap().map(|p| p.id),
            Some("c".to_string())
        );
        assert!(catalog.find_person("zzz".into()).await.unwrap().is_none());
    }
}
