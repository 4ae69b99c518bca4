use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Colour used for tasks whose category name matches nothing.
pub const FALLBACK_CATEGORY_COLOR: &str = "#6B7280";

/// Category the creation form falls back to when none are loaded.
pub const FALLBACK_CATEGORY_NAME: &str = "Work";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub color: String,
    pub icon: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewCategory {
    pub name: String,
    pub color: String,
    pub icon: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct CategoryPatch {
    pub name: Option<String>,
    pub color: Option<String>,
    pub icon: Option<String>,
}

impl Category {
    pub fn from_new(new: NewCategory) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: new.name,
            color: new.color,
            icon: new.icon,
        }
    }

    pub fn apply_patch(&mut self, patch: CategoryPatch) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(color) = patch.color {
            self.color = color;
        }
        if let Some(icon) = patch.icon {
            self.icon = icon;
        }
    }
}

/// Seed set written into an empty category collection.
pub fn default_categories() -> Vec<NewCategory> {
    [
        ("Work", "#3B82F6", "briefcase"),
        ("Personal", "#10B981", "user"),
        ("Shopping", "#F59E0B", "shopping-cart"),
        ("Health", "#EF4444", "heart"),
    ]
    .into_iter()
    .map(|(name, color, icon)| NewCategory {
        name: name.to_string(),
        color: color.to_string(),
        icon: icon.to_string(),
    })
    .collect()
}

/// Display colour for the category called `name`.
pub fn category_color<'a>(categories: &'a [Category], name: &str) -> &'a str {
    categories
        .iter()
        .find(|category| category.name == name)
        .map(|category| category.color.as_str())
        .unwrap_or(FALLBACK_CATEGORY_COLOR)
}

#[cfg(test)]
mod tests {
    use super::{Category, FALLBACK_CATEGORY_COLOR, category_color, default_categories};

    #[test]
    fn colour_lookup_falls_back_for_unknown_names() {
        let categories: Vec<Category> = default_categories()
            .into_iter()
            .map(Category::from_new)
            .collect();

        assert_eq!(category_color(&categories, "Work"), "#3B82F6");
        assert_eq!(category_color(&categories, "Errands"), FALLBACK_CATEGORY_COLOR);
    }

    #[test]
    fn default_names_are_unique() {
        let mut names: Vec<String> = default_categories().into_iter().map(|c| c.name).collect();
        let before = names.len();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), before);
    }
}
