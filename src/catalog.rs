/// A purchasable item, priced in Telegram Stars.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogItem {
    pub id: &'static str,
    pub name: &'static str,
    pub price: u32,
    pub description: &'static str,
}

/// Telegram Stars currency code.
pub const STARS_CURRENCY: &str = "XTR";

/// Everything the game sells, in display order. Prices are in Stars.
pub const CATALOG: &[CatalogItem] = &[
    CatalogItem {
        id: "flask_one",
        name: "1 Flask",
        price: 1,
        description: "One Flask for 1 Star",
    },
    CatalogItem {
        id: "flask_5",
        name: "5 Flasks",
        price: 2,
        description: "5 Flasks for 2 Stars",
    },
    CatalogItem {
        id: "flask_10",
        name: "10 Flasks",
        price: 5,
        description: "10 Flasks for 5 Stars",
    },
    CatalogItem {
        id: "flask_50",
        name: "50 Flasks",
        price: 20,
        description: "50 Flasks for 20 Stars",
    },
];

/// Looks an item up by its id. Ids are case-sensitive.
pub fn find_item(id: &str) -> Option<&'static CatalogItem> {
    CATALOG.iter().find(|item| item.id == id)
}

/// Invoice payload binding an item to the player it is bought for.
pub fn invoice_payload(item: &CatalogItem, player_id: i64) -> String {
    format!("{}_{}", item.id, player_id)
}
