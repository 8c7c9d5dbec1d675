//! Snapshot diffing.
//!
//! [`diff`] computes the minimal [`Delta`] turning one snapshot into
//! another. It is pure and total: any two snapshots, including empty ones,
//! produce a delta, and the same inputs always produce the same output.
//!
//! A spot counts as changed when it is new or when its `status`,
//! `spot_number` or `floor_level` differs. A lot appears in the delta when
//! it is new, or when at least one of its spots changed or disappeared.
//! Lot names are carried in every entry but are not themselves compared.
//!
//! [`apply_delta`] is the inverse used by clients: applying
//! `diff(prev, next, v)` to `prev` reconstructs `next`.

use std::collections::{BTreeMap, BTreeSet};

use parkfeed_types::{ChangedLot, Delta, LotId, LotSnapshot, Snapshot, SpotId, SpotSnapshot};

/// Compute the delta from `prev` to `next`, stamped with `version`.
///
/// Lots are emitted in `next`'s order, spots in each lot's order, and
/// removed ids in `prev`'s order.
pub fn diff(prev: &Snapshot, next: &Snapshot, version: u64) -> Delta {
    let prev_lots: BTreeMap<LotId, &LotSnapshot> =
        prev.lots().iter().map(|lot| (lot.id, lot)).collect();
    let next_ids: BTreeSet<LotId> = next.lots().iter().map(|lot| lot.id).collect();

    let removed_lot_ids = prev
        .lots()
        .iter()
        .map(|lot| lot.id)
        .filter(|id| !next_ids.contains(id))
        .collect();

    let lots = next
        .lots()
        .iter()
        .filter_map(|lot| match prev_lots.get(&lot.id) {
            None => Some(ChangedLot {
                id: lot.id,
                name: Some(lot.name.clone()),
                spots: lot.spots.clone(),
                removed_spot_ids: Vec::new(),
            }),
            Some(old) => diff_lot(old, lot),
        })
        .collect();

    Delta {
        version,
        lots,
        removed_lot_ids,
    }
}

/// Compare the spots of one lot present in both snapshots.
fn diff_lot(prev: &LotSnapshot, next: &LotSnapshot) -> Option<ChangedLot> {
    let prev_spots: BTreeMap<SpotId, &SpotSnapshot> =
        prev.spots.iter().map(|spot| (spot.id, spot)).collect();
    let next_ids: BTreeSet<SpotId> = next.spots.iter().map(|spot| spot.id).collect();

    let spots: Vec<SpotSnapshot> = next
        .spots
        .iter()
        .filter(|spot| {
            prev_spots
                .get(&spot.id)
                .is_none_or(|old| old.differs_from(spot))
        })
        .cloned()
        .collect();

    let removed_spot_ids: Vec<SpotId> = prev
        .spots
        .iter()
        .map(|spot| spot.id)
        .filter(|id| !next_ids.contains(id))
        .collect();

    if spots.is_empty() && removed_spot_ids.is_empty() {
        return None;
    }

    Some(ChangedLot {
        id: next.id,
        name: Some(next.name.clone()),
        spots,
        removed_spot_ids,
    })
}

/// Apply `delta` to `prev`: drop removed lots, then for each changed lot
/// delete its removed spots and upsert its changed spots.
///
/// The result is canonical (lots and spots ordered by id).
pub fn apply_delta(prev: &Snapshot, delta: &Delta) -> Snapshot {
    let mut lots: BTreeMap<LotId, LotSnapshot> = prev
        .lots()
        .iter()
        .map(|lot| (lot.id, lot.clone()))
        .collect();

    for id in &delta.removed_lot_ids {
        lots.remove(id);
    }

    for changed in &delta.lots {
        let lot = lots.entry(changed.id).or_insert_with(|| LotSnapshot {
            id: changed.id,
            name: String::new(),
            spots: Vec::new(),
        });
        if let Some(name) = &changed.name {
            lot.name.clone_from(name);
        }

        let mut spots: BTreeMap<SpotId, SpotSnapshot> = std::mem::take(&mut lot.spots)
            .into_iter()
            .map(|spot| (spot.id, spot))
            .collect();
        for id in &changed.removed_spot_ids {
            spots.remove(id);
        }
        for spot in &changed.spots {
            spots.insert(spot.id, spot.clone());
        }
        lot.spots = spots.into_values().collect();
    }

    Snapshot::new(lots.into_values().collect())
}

#[cfg(test)]
mod tests {
    use parkfeed_types::SpotStatus;

    use super::*;

    fn spot(id: i64, status: SpotStatus) -> SpotSnapshot {
        SpotSnapshot {
            id: SpotId(id),
            status,
            spot_number: format!("S-{id}"),
            floor_level: 1,
        }
    }

    fn lot(id: i64, spots: Vec<SpotSnapshot>) -> LotSnapshot {
        LotSnapshot::new(LotId(id), format!("Lot {id}"), spots)
    }

    fn sample() -> Snapshot {
        Snapshot::new(vec![
            lot(
                1,
                vec![
                    spot(10, SpotStatus::Available),
                    spot(12, SpotStatus::Occupied),
                ],
            ),
            lot(2, vec![spot(20, SpotStatus::Reserved)]),
        ])
    }

    /// Deterministic generator so the round-trip check covers many shapes
    /// without pulling in a randomness crate.
    struct Lcg(u64);

    impl Lcg {
        fn next(&mut self, bound: u64) -> u64 {
            self.0 = self
                .0
                .wrapping_mul(6_364_136_223_846_793_005)
                .wrapping_add(1_442_695_040_888_963_407);
            (self.0 >> 33) % bound
        }

        fn snapshot(&mut self) -> Snapshot {
            let statuses = [
                SpotStatus::Available,
                SpotStatus::Occupied,
                SpotStatus::Reserved,
                SpotStatus::Maintenance,
            ];
            let mut lots = Vec::new();
            for lot_id in 1..=5_i64 {
                if self.next(4) == 0 {
                    continue;
                }
                let mut spots = Vec::new();
                for spot_id in 1..=6_i64 {
                    if self.next(3) == 0 {
                        continue;
                    }
                    let status = statuses
                        .get(usize::try_from(self.next(4)).unwrap_or(0))
                        .copied()
                        .unwrap_or(SpotStatus::Available);
                    spots.push(SpotSnapshot {
                        id: SpotId(lot_id * 100 + spot_id),
                        status,
                        spot_number: format!("N{}", self.next(2)),
                        floor_level: i32::try_from(self.next(3)).unwrap_or(0) - 1,
                    });
                }
                lots.push(lot(lot_id, spots));
            }
            Snapshot::new(lots)
        }
    }

    #[test]
    fn identical_snapshots_produce_no_change() {
        let a = sample();
        assert!(diff(&a, &a, 3).is_empty());
        assert!(diff(&Snapshot::empty(), &Snapshot::empty(), 1).is_empty());
    }

    #[test]
    fn from_empty_every_lot_is_added() {
        let a = sample();
        let delta = diff(&Snapshot::empty(), &a, 1);
        assert!(delta.removed_lot_ids.is_empty());
        assert_eq!(delta.lots.len(), 2);
        for (changed, original) in delta.lots.iter().zip(a.lots()) {
            assert_eq!(changed.id, original.id);
            assert_eq!(changed.spots, original.spots);
            assert_eq!(changed.name.as_deref(), Some(original.name.as_str()));
            assert!(changed.removed_spot_ids.is_empty());
        }
    }

    #[test]
    fn to_empty_every_lot_is_removed() {
        let delta = diff(&sample(), &Snapshot::empty(), 5);
        assert!(delta.lots.is_empty());
        assert_eq!(delta.removed_lot_ids, vec![LotId(1), LotId(2)]);
        assert_eq!(delta.version, 5);
    }

    #[test]
    fn spot_change_addition_and_removal() {
        let prev = Snapshot::new(vec![lot(
            1,
            vec![
                spot(10, SpotStatus::Available),
                spot(12, SpotStatus::Available),
            ],
        )]);
        let next = Snapshot::new(vec![lot(
            1,
            vec![
                spot(10, SpotStatus::Occupied),
                spot(11, SpotStatus::Available),
            ],
        )]);

        let delta = diff(&prev, &next, 2);

        assert!(delta.removed_lot_ids.is_empty());
        assert_eq!(delta.lots.len(), 1);
        let changed = delta.lots.first();
        assert_eq!(changed.map(|c| c.id), Some(LotId(1)));
        assert_eq!(
            changed.map(|c| c.spots.clone()),
            Some(vec![
                spot(10, SpotStatus::Occupied),
                spot(11, SpotStatus::Available)
            ])
        );
        assert_eq!(
            changed.map(|c| c.removed_spot_ids.clone()),
            Some(vec![SpotId(12)])
        );
    }

    #[test]
    fn unchanged_lots_are_omitted() {
        let prev = sample();
        let mut lots = prev.clone().into_lots();
        if let Some(second) = lots.get_mut(1) {
            second.spots = vec![spot(20, SpotStatus::Available)];
        }
        let next = Snapshot::new(lots);

        let delta = diff(&prev, &next, 9);
        let ids: Vec<LotId> = delta.lots.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![LotId(2)]);
    }

    #[test]
    fn floor_and_number_changes_count() {
        let prev = Snapshot::new(vec![lot(1, vec![spot(10, SpotStatus::Available)])]);
        let mut moved = spot(10, SpotStatus::Available);
        moved.floor_level = -2;
        let next = Snapshot::new(vec![lot(1, vec![moved.clone()])]);
        assert_eq!(
            diff(&prev, &next, 1).lots.first().map(|c| c.spots.clone()),
            Some(vec![moved])
        );

        let mut relabelled = spot(10, SpotStatus::Available);
        relabelled.spot_number = String::from("X-1");
        let next = Snapshot::new(vec![lot(1, vec![relabelled])]);
        assert!(!diff(&prev, &next, 1).is_empty());
    }

    #[test]
    fn name_only_change_is_not_a_change() {
        let prev = Snapshot::new(vec![lot(1, vec![spot(10, SpotStatus::Available)])]);
        let next = Snapshot::new(vec![LotSnapshot::new(
            LotId(1),
            "Renamed",
            vec![spot(10, SpotStatus::Available)],
        )]);
        assert!(diff(&prev, &next, 1).is_empty());
    }

    #[test]
    fn diff_is_deterministic() {
        let mut rng = Lcg(7);
        let a = rng.snapshot();
        let b = rng.snapshot();
        assert_eq!(diff(&a, &b, 1), diff(&a, &b, 1));
    }

    #[test]
    fn applying_the_delta_reconstructs_next() {
        let mut rng = Lcg(42);
        for _ in 0..300 {
            let prev = rng.snapshot();
            let next = rng.snapshot();
            let delta = diff(&prev, &next, 1);
            assert_eq!(apply_delta(&prev, &delta), next);
        }
    }

    #[test]
    fn applying_an_empty_delta_is_identity() {
        let a = sample();
        assert_eq!(apply_delta(&a, &Delta::default()), a);
    }
}
