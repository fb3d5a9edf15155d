use crate::{BoardItem, ItemId, Placement, Pod, PodAction};

pub(super) fn reduce(action: &PodAction, pod: &mut Pod) -> bool {
    match action {
        PodAction::SetParam { target, value } => match pod.param_mut(*target) {
            Some(param) => {
                param.value = *value;
                true
            }
            None => false,
        },
        PodAction::SetParamBound { item, param, bound, value } => {
            match pod.item_mut(*item).and_then(|i| i.param_mut(*param)) {
                Some(p) => {
                    p.set_bound(*bound, *value);
                    true
                }
                None => false,
            }
        }
        PodAction::SetActive { item, active } => match pod.item_mut(*item) {
            Some(i) => {
                i.active = *active;
                true
            }
            None => false,
        },
        PodAction::ReplaceItem { item, state } => match pod.item_mut(*item) {
            Some(i) => {
                *i = state.clone();
                true
            }
            None => false,
        },
        PodAction::SetLayout { placements } => {
            // applied to a copy first; the board keeps positions 0..n
            let mut items = pod.items.clone();
            for (id, placement) in placements {
                match items.get_mut(id.index()) {
                    Some(i) => i.placement = *placement,
                    None => return false,
                }
            }
            if !is_contiguous(&items) {
                return false;
            }
            pod.items = items;
            true
        }
        PodAction::SetDt { dt, setting } => match pod.dt.get_mut(dt.get() as usize) {
            Some(ch) => {
                ch.apply(*setting);
                true
            }
            None => false,
        },
        PodAction::RenameCurrent { name } => {
            pod.name = name.clone();
            true
        }
        _ => false,
    }
}

/// Placements after moving `item` to `target`: the item is taken out of the
/// chain and reinserted at `target.position`, and every item is renumbered so
/// positions stay unique and contiguous. Returns `None` for an unknown item or
/// a position past the end of the board.
pub fn plan_move(
    items: &[BoardItem],
    item: ItemId,
    target: Placement,
) -> Option<Vec<(ItemId, Placement)>> {
    if item.index() >= items.len() || target.position as usize >= items.len() {
        return None;
    }
    let mut chain: Vec<ItemId> = (0..items.len() as u16).map(ItemId::new).collect();
    chain.sort_by_key(|id| items[id.index()].placement.position);
    chain.retain(|id| *id != item);
    chain.insert(target.position as usize, item);

    Some(
        chain
            .into_iter()
            .enumerate()
            .map(|(pos, id)| {
                let path = if id == item { target.path } else { items[id.index()].placement.path };
                (id, Placement::new(pos as u16, path))
            })
            .collect(),
    )
}

/// Whether item positions are exactly `0..items.len()`.
pub fn is_contiguous(items: &[BoardItem]) -> bool {
    let mut seen = vec![false; items.len()];
    for item in items {
        match seen.get_mut(item.placement.position as usize) {
            Some(slot) if !*slot => *slot = true,
            _ => return false,
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{reduce::reduce_action, Catalog, Path};

    #[test]
    fn move_forward_renumbers_chain() {
        let mut pod = Pod::new(&Catalog::pod_hd());
        let placements = plan_move(&pod.items, ItemId::new(4), Placement::new(9, Path::Post)).unwrap();
        assert!(reduce_action(&PodAction::SetLayout { placements }, &mut pod));

        assert_eq!(pod.items[4].placement, Placement::new(9, Path::Post));
        // items that sat after the moved one shift up by one
        assert_eq!(pod.items[5].placement.position, 4);
        assert_eq!(pod.items[9].placement.position, 8);
        assert_eq!(pod.items[10].placement.position, 10);
        assert!(is_contiguous(&pod.items));
    }

    #[test]
    fn move_backward() {
        let mut pod = Pod::new(&Catalog::pod_hd());
        let placements = plan_move(&pod.items, ItemId::new(11), Placement::new(0, Path::Pre)).unwrap();
        reduce_action(&PodAction::SetLayout { placements }, &mut pod);
        assert_eq!(pod.chain()[0], ItemId::new(11));
        assert_eq!(pod.items[0].placement.position, 1);
        assert!(is_contiguous(&pod.items));
    }

    #[test]
    fn layout_with_gap_is_refused() {
        let mut pod = Pod::new(&Catalog::pod_hd());
        let before = pod.items.clone();
        let placements = vec![(ItemId::new(0), Placement::new(5, Path::Pre))];
        assert!(!reduce_action(&PodAction::SetLayout { placements }, &mut pod));
        assert_eq!(pod.items, before);
        assert!(!pod.dirty);

        // a swap keeps the chain whole
        let swap = vec![
            (ItemId::new(0), before[1].placement),
            (ItemId::new(1), before[0].placement),
        ];
        assert!(reduce_action(&PodAction::SetLayout { placements: swap }, &mut pod));
        assert_eq!(pod.chain()[0], ItemId::new(1));
    }

    #[test]
    fn move_out_of_range() {
        let pod = Pod::new(&Catalog::pod_hd());
        assert!(plan_move(&pod.items, ItemId::new(4), Placement::new(12, Path::Pre)).is_none());
        assert!(plan_move(&pod.items, ItemId::new(12), Placement::new(0, Path::Pre)).is_none());
    }
}
