//! Shop price tables and display strings.
//!
//! Every purchasable type has a fixed price; selling back pays half the
//! price (rounded down). Map fragments are never sold by the shop and buy
//! back for a nominal coin.

use crate::progress::types::{AvatarId, ItemType, Player};

/// Buy-back value of a map fragment, which was never purchased.
pub const MAP_FRAGMENT_SELL_PRICE: u64 = 1;

/// Types listed in the shop, in display order
pub const SHOP_ITEMS: [ItemType; 5] = [
    ItemType::Chips,
    ItemType::ChipsLimited,
    ItemType::Soda,
    ItemType::SodaLimited,
    ItemType::Lunch,
];

/// Purchase price, `None` when the type cannot be bought.
pub fn price(item_type: ItemType) -> Option<u64> {
    match item_type {
        ItemType::Chips => Some(5),
        ItemType::ChipsLimited => Some(20),
        ItemType::Soda => Some(5),
        ItemType::SodaLimited => Some(15),
        ItemType::Lunch => Some(10),
        ItemType::MapFragment => None,
    }
}

pub fn sell_price(item_type: ItemType) -> u64 {
    match price(item_type) {
        Some(cost) => cost / 2,
        None => MAP_FRAGMENT_SELL_PRICE,
    }
}

/// Inventory label given to a freshly bought item.
pub fn item_label(item_type: ItemType) -> &'static str {
    match item_type {
        ItemType::Chips => "Bag of Chips",
        ItemType::ChipsLimited => "Premium Bag of Chips",
        ItemType::Soda => "Can of Soda",
        ItemType::SodaLimited => "Premium Can of Soda",
        ItemType::Lunch => "Choice of Lunch",
        ItemType::MapFragment => "Map Fragment",
    }
}

/// Market name themed after the player's avatar.
pub fn shop_name(avatar: AvatarId) -> &'static str {
    match avatar {
        AvatarId::Pirate => "Pirate's Market",
        AvatarId::Explorer => "Adventure's Market",
        AvatarId::Wizard => "Diagon Alley",
        AvatarId::Knight => "Emporium",
        AvatarId::Archer => "Traveler's Market",
        AvatarId::Ninja => "Black Market",
    }
}

/// Why a purchase would be refused, if it would be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurchaseBlock {
    NotForSale,
    AlreadyPurchased,
    InsufficientCoins { price: u64, balance: u64 },
}

pub fn purchase_block(player: &Player, item_type: ItemType) -> Option<PurchaseBlock> {
    let Some(cost) = price(item_type) else {
        return Some(PurchaseBlock::NotForSale);
    };
    if item_type.is_limited() && player.has_purchased(item_type) {
        return Some(PurchaseBlock::AlreadyPurchased);
    }
    if player.coins < cost {
        return Some(PurchaseBlock::InsufficientCoins {
            price: cost,
            balance: player.coins,
        });
    }
    None
}

/// One line per shop item with price and availability for `player`.
pub fn format_shop_listing(player: &Player) -> String {
    let mut out = format!("{} ({} coins)\n", shop_name(player.avatar), player.coins);
    for item_type in SHOP_ITEMS {
        let cost = price(item_type).unwrap_or_default();
        let kind = if item_type.is_limited() {
            "limited"
        } else {
            "unlimited"
        };
        let status = match purchase_block(player, item_type) {
            None => String::from("available"),
            Some(PurchaseBlock::AlreadyPurchased) => String::from("sold out"),
            Some(PurchaseBlock::InsufficientCoins { price, .. }) => format!("need {} coins", price),
            Some(PurchaseBlock::NotForSale) => String::from("not for sale"),
        };
        out.push_str(&format!(
            "  {:<14} {:>3}c  {:<22} [{}] {}\n",
            item_type.as_str(),
            cost,
            item_label(item_type),
            kind,
            status
        ));
    }
    out
}
