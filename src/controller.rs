use crate::card::{render_page, RecipeCard};
use crate::db::{RecipeStore, Result, Storage};
use crate::recipe::Recipe;

/// Keeps the visible card list in step with the recipe store.
///
/// The store is the source of truth: every submission re-reads the stored
/// collection before writing it back, rather than trusting `main`.
pub struct RecipeList<S: Storage> {
    store: RecipeStore<S>,
    main: Vec<RecipeCard>,
}

impl<S: Storage> RecipeList<S> {
    /// Loads every stored recipe and renders one card per recipe, in order.
    pub fn init(store: RecipeStore<S>) -> Result<Self> {
        let recipes = store.load()?;
        log::info!("Loaded {} stored recipes", recipes.len());
        let mut list = RecipeList {
            store,
            main: Vec::new(),
        };
        list.add_recipes(recipes);
        Ok(list)
    }

    /// Entries without data get a blank card.
    fn add_recipes(&mut self, recipes: Vec<Option<Recipe>>) {
        for recipe in recipes {
            let mut card = RecipeCard::new();
            if let Some(recipe) = recipe {
                card.set_data(recipe);
            }
            self.main.push(card);
        }
    }

    /// Handles a form submission: shows a card for the new recipe, then
    /// appends the recipe to the stored collection.
    pub fn submit<I, K, V>(&mut self, form: I) -> Result<&RecipeCard>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let recipe = Recipe::from_form(form);
        self.main.push(RecipeCard::from(recipe.clone()));

        let mut existing = self.store.load()?;
        existing.push(Some(recipe));
        self.store.save(&existing)?;
        log::info!("Stored recipe #{}", existing.len());

        Ok(&self.main[self.main.len() - 1])
    }

    /// Empties the storage partition and the visible list.
    pub fn clear(&mut self) -> Result<()> {
        self.store.clear()?;
        self.main.clear();
        Ok(())
    }

    pub fn cards(&self) -> &[RecipeCard] {
        &self.main
    }

    pub fn render_page(&self) -> String {
        render_page(&self.main)
    }

    pub fn store(&self) -> &RecipeStore<S> {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{MemoryStorage, SqliteStorage, StoreError, DEFAULT_KEY};

    fn stored(titles: &[&str]) -> RecipeStore<MemoryStorage> {
        let mut store = RecipeStore::new(MemoryStorage::default());
        let recipes: Vec<Option<Recipe>> = titles
            .iter()
            .map(|t| {
                Some(Recipe {
                    title_txt: Some(t.to_string()),
                    ..Default::default()
                })
            })
            .collect();
        store.save(&recipes).unwrap();
        store
    }

    fn titles<S: Storage>(list: &RecipeList<S>) -> Vec<String> {
        list.cards()
            .iter()
            .filter_map(|c| c.data().and_then(|r| r.title_txt.clone()))
            .collect()
    }

    #[test]
    fn test_init_empty() {
        let list = RecipeList::init(RecipeStore::new(MemoryStorage::default())).unwrap();
        assert!(list.cards().is_empty());
    }

    #[test]
    fn test_init_renders_in_order() {
        let list = RecipeList::init(stored(&["Soup", "Stew", "Pie"])).unwrap();
        assert_eq!(titles(&list), vec!["Soup", "Stew", "Pie"]);
    }

    #[test]
    fn test_init_fails_on_malformed_json() {
        let mut storage = MemoryStorage::default();
        storage.set_item(DEFAULT_KEY, "not json").unwrap();
        let result = RecipeList::init(RecipeStore::new(storage));
        assert!(matches!(result, Err(StoreError::Json(_))));
    }

    #[test]
    fn test_submit_appends_one() {
        let mut list = RecipeList::init(stored(&["Stew"])).unwrap();
        let before = list.store().load().unwrap().len();
        let card = list.submit([("titleTxt", "Soup"), ("rating", "4")]).unwrap();
        assert_eq!(card.data().and_then(|r| r.rating), Some(4.0));

        let after = list.store().load().unwrap();
        assert_eq!(after.len(), before + 1);
        let last = after.last().unwrap().as_ref().unwrap();
        assert_eq!(last.title_txt.as_deref(), Some("Soup"));
        assert_eq!(list.cards().len(), 2);
    }

    #[test]
    fn test_submissions_keep_order() {
        let mut list = RecipeList::init(RecipeStore::new(MemoryStorage::default())).unwrap();
        list.submit([("titleTxt", "First")]).unwrap();
        list.submit([("titleTxt", "Second")]).unwrap();
        let stored: Vec<_> = list
            .store()
            .load()
            .unwrap()
            .into_iter()
            .flatten()
            .filter_map(|r| r.title_txt)
            .collect();
        assert_eq!(stored, vec!["First", "Second"]);
        assert_eq!(titles(&list), vec!["First", "Second"]);
    }

    #[test]
    fn test_submit_without_fields() {
        let mut list = RecipeList::init(RecipeStore::new(MemoryStorage::default())).unwrap();
        let form: Vec<(String, String)> = Vec::new();
        list.submit(form).unwrap();
        assert_eq!(list.store().load().unwrap(), vec![Some(Recipe::default())]);
        assert!(list.cards()[0].article().contains(r#"<p class="ingredients"></p>"#));
    }

    #[test]
    fn test_null_entry_is_blank_card() {
        let mut storage = MemoryStorage::default();
        storage
            .set_item(DEFAULT_KEY, r#"[null, {"titleTxt":"Soup","servings":2}]"#)
            .unwrap();
        let mut list = RecipeList::init(RecipeStore::new(storage)).unwrap();
        assert_eq!(list.cards().len(), 2);
        assert_eq!(list.cards()[0], RecipeCard::new());
        assert_eq!(list.cards()[0].article(), "<article></article>");

        list.submit([("titleTxt", "Stew")]).unwrap();
        let stored = list.store().load().unwrap();
        assert_eq!(stored.len(), 3);
        assert_eq!(stored[0], None);
        let soup = stored[1].as_ref().unwrap();
        assert_eq!(soup.extra.get("servings"), Some(&serde_json::Value::from(2)));
    }

    #[test]
    fn test_clear() {
        let mut list = RecipeList::init(stored(&["Soup", "Stew"])).unwrap();
        list.submit([("titleTxt", "Pie")]).unwrap();
        list.clear().unwrap();
        assert!(list.store().load().unwrap().is_empty());
        assert!(list.cards().is_empty());
        assert_eq!(list.render_page().matches("<article>").count(), 0);
    }

    #[test]
    fn test_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recipes.db");
        {
            let store = RecipeStore::new(SqliteStorage::open(&path).unwrap());
            let mut list = RecipeList::init(store).unwrap();
            list.submit([("titleTxt", "Soup"), ("numRatings", "3")]).unwrap();
            list.submit([("titleTxt", "Stew")]).unwrap();
        }
        let store = RecipeStore::new(SqliteStorage::open(&path).unwrap());
        let list = RecipeList::init(store).unwrap();
        assert_eq!(titles(&list), vec!["Soup", "Stew"]);
        assert_eq!(list.cards()[0].data().and_then(|r| r.num_ratings), Some(3));
    }
}
