//! Registration — a provider's place in a network point's waiting queue —
//! and [`Queue`], the ordered set of registrations for one point.
//!
//! Queue invariants, upheld by every [`Queue`] mutation:
//! - positions are exactly `0..len`, ascending, without gaps or duplicates;
//! - when non-empty, exactly one entry is `current` and it sits at position 0.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::id::{NetworkPointId, ProviderId, RegistrationId};
use crate::time::Date;

/// A provider's entry in a network point queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    pub id: RegistrationId,
    pub network_point_id: NetworkPointId,
    pub provider_id: ProviderId,
    pub start_date: Date,
    pub end_date: Date,
    /// 0-based; position 0 is the operating provider.
    pub queue_position: u32,
    pub current: bool,
}

impl Registration {
    /// Whether this entry is the operating head of its queue.
    #[must_use]
    pub fn is_head(&self) -> bool {
        self.current && self.queue_position == 0
    }

    /// Whether the registration period ended before `today`.
    #[must_use]
    pub fn is_expired(&self, today: Date) -> bool {
        self.end_date < today
    }

    /// Overwrite the supplied dates, leaving the others untouched.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::NoDatesSupplied`] when both are `None`.
    pub fn apply_dates(
        &mut self,
        start: Option<Date>,
        end: Option<Date>,
    ) -> Result<(), ValidationError> {
        if start.is_none() && end.is_none() {
            return Err(ValidationError::NoDatesSupplied);
        }
        if let Some(start) = start {
            self.start_date = start;
        }
        if let Some(end) = end {
            self.end_date = end;
        }
        Ok(())
    }
}

/// Ordered registrations of a single network point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Queue {
    point_id: NetworkPointId,
    entries: Vec<Registration>,
}

impl Queue {
    /// Build a queue from stored rows, ordering them by position.
    ///
    /// Stored positions are trusted for ordering only; call [`Queue::reindex`]
    /// to repair gaps.
    #[must_use]
    pub fn new(point_id: NetworkPointId, mut entries: Vec<Registration>) -> Self {
        entries.sort_by_key(|reg| reg.queue_position);
        Self { point_id, entries }
    }

    #[must_use]
    pub fn point_id(&self) -> NetworkPointId {
        self.point_id
    }

    #[must_use]
    pub fn entries(&self) -> &[Registration] {
        &self.entries
    }

    #[must_use]
    pub fn into_entries(self) -> Vec<Registration> {
        self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The operating registration, if any.
    #[must_use]
    pub fn current(&self) -> Option<&Registration> {
        self.entries.first().filter(|reg| reg.is_head())
    }

    /// Provider the point's owner must equal.
    #[must_use]
    pub fn head_provider(&self) -> Option<ProviderId> {
        self.current().map(|reg| reg.provider_id)
    }

    /// Providers appearing anywhere in the queue, without duplicates.
    #[must_use]
    pub fn providers(&self) -> Vec<ProviderId> {
        let mut seen = HashSet::new();
        self.entries
            .iter()
            .map(|reg| reg.provider_id)
            .filter(|id| seen.insert(*id))
            .collect()
    }

    /// Append a registration at the tail. It becomes current only when the
    /// queue was empty.
    pub fn push(&mut self, provider_id: ProviderId, start: Date, end: Date) -> &Registration {
        let was_empty = self.entries.is_empty();
        let position = u32::try_from(self.entries.len()).unwrap_or(u32::MAX);
        self.entries.push(Registration {
            id: RegistrationId::new(),
            network_point_id: self.point_id,
            provider_id,
            start_date: start,
            end_date: end,
            queue_position: position,
            current: was_empty,
        });
        &self.entries[self.entries.len() - 1]
    }

    /// Remove a registration and close the gap it leaves.
    ///
    /// The removed entry is returned as it was before removal, so the caller
    /// can tell whether it was the head. Promotion is left to the caller.
    pub fn remove(&mut self, id: RegistrationId) -> Option<Registration> {
        let index = self.entries.iter().position(|reg| reg.id == id)?;
        let removed = self.entries.remove(index);
        self.reindex();
        Some(removed)
    }

    /// Renumber positions `0..len` keeping the relative order.
    pub fn reindex(&mut self) {
        for (index, reg) in self.entries.iter_mut().enumerate() {
            reg.queue_position = u32::try_from(index).unwrap_or(u32::MAX);
        }
    }

    /// Clear `current` everywhere, then make the lowest-position entry the head.
    pub fn promote_head(&mut self) {
        for reg in &mut self.entries {
            reg.current = false;
        }
        if let Some(first) = self.entries.first_mut() {
            first.current = true;
            first.queue_position = 0;
        }
    }

    /// Rearrange the queue to follow `ordered`. Index 0 becomes current.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] unless `ordered` is exactly the set of
    /// registration ids already in the queue.
    pub fn reorder(&mut self, ordered: &[RegistrationId]) -> Result<(), ValidationError> {
        if ordered.is_empty() {
            return Err(ValidationError::EmptyReorder);
        }
        if ordered.len() != self.entries.len() {
            return Err(ValidationError::ReorderCountMismatch {
                expected: self.entries.len(),
                given: ordered.len(),
            });
        }
        let mut seen = HashSet::with_capacity(ordered.len());
        for id in ordered {
            if !seen.insert(*id) {
                return Err(ValidationError::DuplicateRegistration(*id));
            }
            if !self.entries.iter().any(|reg| reg.id == *id) {
                return Err(ValidationError::ForeignRegistration(*id));
            }
        }

        let mut remaining = std::mem::take(&mut self.entries);
        for id in ordered {
            if let Some(index) = remaining.iter().position(|reg| reg.id == *id) {
                self.entries.push(remaining.swap_remove(index));
            }
        }
        self.reindex();
        for (index, reg) in self.entries.iter_mut().enumerate() {
            reg.current = index == 0;
        }
        Ok(())
    }

    /// Whether the positional and head invariants hold.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        let contiguous = self
            .entries
            .iter()
            .enumerate()
            .all(|(index, reg)| usize::try_from(reg.queue_position).ok() == Some(index));
        let currents = self.entries.iter().filter(|reg| reg.current).count();
        let head_ok = match self.entries.first() {
            None => currents == 0,
            Some(first) => first.current && currents == 1,
        };
        contiguous && head_ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn day(d: u32) -> Date {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
    }

    fn queue_of(providers: &[ProviderId]) -> Queue {
        let mut queue = Queue::new(NetworkPointId::new(), Vec::new());
        for provider in providers {
            queue.push(*provider, day(1), day(20));
        }
        queue
    }

    #[test]
    fn should_make_first_pushed_entry_current() {
        let a = ProviderId::new();
        let queue = queue_of(&[a]);

        let head = queue.current().unwrap();
        assert_eq!(head.provider_id, a);
        assert_eq!(head.queue_position, 0);
        assert!(queue.is_consistent());
    }

    #[test]
    fn should_append_later_entries_as_waiting() {
        let (a, b) = (ProviderId::new(), ProviderId::new());
        let queue = queue_of(&[a, b]);

        let second = &queue.entries()[1];
        assert_eq!(second.provider_id, b);
        assert_eq!(second.queue_position, 1);
        assert!(!second.current);
        assert_eq!(queue.head_provider(), Some(a));
    }

    #[test]
    fn should_reindex_and_leave_no_head_when_current_removed() {
        let (a, b, c) = (ProviderId::new(), ProviderId::new(), ProviderId::new());
        let mut queue = queue_of(&[a, b, c]);
        let head_id = queue.entries()[0].id;

        let removed = queue.remove(head_id).unwrap();
        assert!(removed.is_head());
        assert!(queue.current().is_none());
        assert_eq!(
            queue
                .entries()
                .iter()
                .map(|r| r.queue_position)
                .collect::<Vec<_>>(),
            vec![0, 1]
        );

        queue.promote_head();
        assert_eq!(queue.head_provider(), Some(b));
        assert!(queue.is_consistent());
    }

    #[test]
    fn should_keep_head_when_waiting_entry_removed() {
        let (a, b, c) = (ProviderId::new(), ProviderId::new(), ProviderId::new());
        let mut queue = queue_of(&[a, b, c]);
        let middle = queue.entries()[1].id;

        let removed = queue.remove(middle).unwrap();
        assert!(!removed.is_head());
        assert_eq!(queue.head_provider(), Some(a));
        assert_eq!(queue.entries()[1].provider_id, c);
        assert!(queue.is_consistent());
    }

    #[test]
    fn should_return_none_when_removing_unknown_id() {
        let mut queue = queue_of(&[ProviderId::new()]);
        assert!(queue.remove(RegistrationId::new()).is_none());
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn should_leave_empty_queue_without_head_after_promotion() {
        let mut queue = queue_of(&[]);
        queue.promote_head();
        assert!(queue.is_empty());
        assert!(queue.current().is_none());
        assert!(queue.is_consistent());
    }

    #[test]
    fn should_switch_head_when_reordered() {
        let (a, b) = (ProviderId::new(), ProviderId::new());
        let mut queue = queue_of(&[a, b]);
        let ids: Vec<_> = queue.entries().iter().map(|r| r.id).collect();

        queue.reorder(&[ids[1], ids[0]]).unwrap();

        assert_eq!(queue.head_provider(), Some(b));
        let a_entry = queue.entries().iter().find(|r| r.provider_id == a).unwrap();
        assert_eq!(a_entry.queue_position, 1);
        assert!(!a_entry.current);
        assert!(queue.is_consistent());
    }

    #[test]
    fn should_reject_reorder_when_no_ids_given() {
        let mut empty = Queue::new(NetworkPointId::new(), Vec::new());
        assert_eq!(empty.reorder(&[]), Err(ValidationError::EmptyReorder));

        let mut queue = queue_of(&[ProviderId::new()]);
        assert_eq!(queue.reorder(&[]), Err(ValidationError::EmptyReorder));
        assert!(queue.is_consistent());
    }

    #[test]
    fn should_reject_reorder_with_wrong_count() {
        let mut queue = queue_of(&[ProviderId::new(), ProviderId::new()]);
        let first = queue.entries()[0].id;
        assert_eq!(
            queue.reorder(&[first]),
            Err(ValidationError::ReorderCountMismatch {
                expected: 2,
                given: 1
            })
        );
    }

    #[test]
    fn should_reject_reorder_with_foreign_id() {
        let mut queue = queue_of(&[ProviderId::new(), ProviderId::new()]);
        let first = queue.entries()[0].id;
        let stranger = RegistrationId::new();
        assert_eq!(
            queue.reorder(&[first, stranger]),
            Err(ValidationError::ForeignRegistration(stranger))
        );
    }

    #[test]
    fn should_reject_reorder_with_duplicate_id() {
        let mut queue = queue_of(&[ProviderId::new(), ProviderId::new()]);
        let first = queue.entries()[0].id;
        assert_eq!(
            queue.reorder(&[first, first]),
            Err(ValidationError::DuplicateRegistration(first))
        );
        assert!(queue.is_consistent());
    }

    #[test]
    fn should_sort_stored_rows_by_position() {
        let queue = queue_of(&[ProviderId::new(), ProviderId::new()]);
        let point = queue.point_id();
        let mut rows = queue.into_entries();
        rows.reverse();

        let rebuilt = Queue::new(point, rows);
        assert_eq!(rebuilt.entries()[0].queue_position, 0);
        assert!(rebuilt.is_consistent());
    }

    #[test]
    fn should_list_each_provider_once() {
        let a = ProviderId::new();
        let queue = queue_of(&[a, a, ProviderId::new()]);
        assert_eq!(queue.providers().len(), 2);
    }

    #[test]
    fn should_require_at_least_one_date() {
        let mut queue = queue_of(&[ProviderId::new()]);
        let mut reg = queue.remove(queue.entries()[0].id).unwrap();
        assert_eq!(
            reg.apply_dates(None, None),
            Err(ValidationError::NoDatesSupplied)
        );
        reg.apply_dates(None, Some(day(30))).unwrap();
        assert_eq!(reg.end_date, day(30));
        assert_eq!(reg.start_date, day(1));
    }
}
