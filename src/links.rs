use crate::item::{Item, Link};

pub const SELF_REL: &str = "self";
pub const CANONICAL_REL: &str = "canonical";

/// Points the item's `self` and `canonical` links at `href`.
///
/// Existing links with either relation are dropped, then `self` and
/// `canonical` are inserted at the front (in that order). All other links keep
/// their relative order, so applying this twice with the same href is a no-op.
pub fn rewrite(mut item: Item, href: &str) -> Item {
    item.links
        .retain(|link| link.rel != SELF_REL && link.rel != CANONICAL_REL);
    item.links.insert(0, Link::new(CANONICAL_REL, href).json());
    item.links.insert(0, Link::new(SELF_REL, href).json());
    item
}
