//! Ordering and pagination of query results.

use serde_json::{json, Value};

use fedbox_vocab::Item;

use crate::filter::Filters;

/// One page of a query result.
///
/// `total_items` counts every match before truncation so clients can
/// compute the number of pages.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Page {
    pub items: Vec<Item>,
    pub total_items: usize,
    /// The collection IRI, when the target resolved to a collection.
    pub collection: Option<String>,
}

impl Page {
    /// Order, filter and truncate the members of a collection.
    pub fn from_members(filters: &Filters, collection: &str, mut members: Vec<Item>) -> Self {
        sort_by_published(&mut members);
        let matching: Vec<Item> = members.into_iter().filter(|m| filters.accepts_member(m)).collect();
        let total_items = matching.len();
        Self {
            items: paginate(matching, filters.page, filters.max_items),
            total_items,
            collection: Some(collection.to_string()),
        }
    }

    /// A single resolved item, subject to the filter's predicates.
    pub fn from_item(filters: &Filters, item: Item) -> Self {
        if filters.matches(&item) {
            Self {
                items: vec![item],
                total_items: 1,
                collection: None,
            }
        } else {
            Self::default()
        }
    }

    pub fn is_collection(&self) -> bool {
        self.collection.is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn first(&self) -> Option<&Item> {
        self.items.first()
    }

    /// Render as an `OrderedCollectionPage` document.
    pub fn to_collection_page(&self, filters: &Filters) -> Item {
        let members: Vec<Value> = self.items.iter().map(|i| i.as_value().clone()).collect();
        let mut page = json!({
            "id": filters.target,
            "type": "OrderedCollectionPage",
            "totalItems": self.total_items,
            "orderedItems": members,
        });
        if let Some(collection) = &self.collection {
            page["partOf"] = Value::String(collection.clone());
        }
        Item::try_from(page).unwrap_or_else(|_| Item::link(filters.target.clone()))
    }
}

/// Newest first by `published`; undated items last. The sort is stable, so
/// ties keep storage order.
pub fn sort_by_published(items: &mut [Item]) {
    items.sort_by(|a, b| b.published().cmp(&a.published()));
}

/// Select the 1-based `page` of length `max_items`; `None` keeps everything.
pub fn paginate<T>(items: Vec<T>, page: usize, max_items: Option<usize>) -> Vec<T> {
    let Some(max) = max_items else {
        return items;
    };
    let offset = page.max(1).saturating_sub(1).saturating_mul(max);
    items.into_iter().skip(offset).take(max).collect()
}
