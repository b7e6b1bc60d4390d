use super::card::NetworkCards;
use super::namespace::ContainerIpTable;

/// Fills the addresses of cards that have none locally from `table`.
///
/// A card is only filled if both of its address sets are empty. The table is looked
/// up by the card's ifindex first and, for paired cards, by its iflink after that.
/// Returns the number of filled cards.
pub fn correlate(cards: &mut NetworkCards, table: &ContainerIpTable) -> usize {
    let mut filled = 0;
    for card in cards.values_mut() {
        if card.has_addresses() || card.ifindex == 0 {
            continue;
        }
        let found = table.get(&card.ifindex).or_else(|| {
            card.is_paired()
                .then(|| table.get(&card.iflink))
                .flatten()
        });
        let Some(found) = found.filter(|set| !set.is_empty()) else {
            continue;
        };
        card.addresses = found.clone();
        log::debug!(
            "card `{}` (ifindex {}, iflink {}) takes {} container addresses",
            card.real_name,
            card.ifindex,
            card.iflink,
            card.addresses.len()
        );
        filled += 1;
    }
    filled
}
