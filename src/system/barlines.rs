//! Barline bookkeeping: the sorted interior collection plus the start and
//! end sentinels.
//!
//! The start bar always sits at position 0 and the end bar at the position
//! count; neither is ever stored among the interior barlines.

use log::{debug, warn};

use super::*;

impl System {
    pub fn start_bar(&self) -> &Barline {
        &self.start_bar
    }

    pub fn end_bar(&self) -> &Barline {
        &self.end_bar
    }

    pub fn interior_barlines(&self) -> &[Barline] {
        &self.barlines
    }

    pub fn barline_count(&self) -> usize {
        self.barlines.len()
    }

    /// Interior barline by index.
    pub fn barline(&self, index: usize) -> Option<&Barline> {
        self.barlines.get(index)
    }

    /// The barline at exactly `position`, sentinels included.
    pub fn barline_at(&self, position: u32) -> Option<&Barline> {
        if position == 0 {
            return Some(&self.start_bar);
        }
        if let Some(bar) = self.barlines.iter().find(|b| b.position == position) {
            return Some(bar);
        }
        if position == self.position_count() {
            return Some(&self.end_bar);
        }
        None
    }

    /// Nearest barline at or before `position`.
    pub fn preceding_barline(&self, position: u32) -> &Barline {
        self.barlines
            .iter()
            .rev()
            .find(|b| b.position <= position)
            .unwrap_or(&self.start_bar)
    }

    /// Nearest barline strictly after `position`.
    pub fn next_barline(&self, position: u32) -> &Barline {
        self.barlines
            .iter()
            .find(|b| b.position > position)
            .unwrap_or(&self.end_bar)
    }

    /// Start bar, interior barlines, end bar.
    pub fn barlines(&self) -> Vec<&Barline> {
        std::iter::once(&self.start_bar)
            .chain(self.barlines.iter())
            .chain(std::iter::once(&self.end_bar))
            .collect()
    }

    /// All barlines (sentinels included) with `start <= position <= end`.
    pub fn barlines_in_range(&self, start: u32, end: u32) -> Vec<&Barline> {
        debug_assert!(start <= end, "invalid barline range {start}..={end}");
        self.barlines()
            .into_iter()
            .filter(|b| (start..=end).contains(&b.position))
            .collect()
    }

    /// Inserts an interior barline, keeping the collection sorted.
    ///
    /// Rejected when the position belongs to a sentinel or lies past the
    /// end, when a barline is already there, or when the barline's key/time
    /// signature would squeeze the existing content off the end.
    pub fn insert_barline(&mut self, barline: Barline) -> SystemResult<()> {
        let count = self.position_count();
        if barline.position == 0 || barline.position >= count {
            return Err(SystemError::InvalidPosition {
                position: barline.position as i64,
                count,
            });
        }

        let position = barline.position;
        self.edit_checked(|system| {
            insert_sorted(
                &mut system.barlines,
                barline,
                |b| b.position,
                ContainerKind::Barline,
            )
        })??;

        debug!("inserted barline at position {position}");
        Ok(())
    }

    /// Removes the interior barline at `position`.
    pub fn remove_barline(&mut self, position: u32) -> SystemResult<Barline> {
        let idx = self
            .barlines
            .iter()
            .position(|b| b.position == position)
            .ok_or(SystemError::BarlineNotFound(position))?;

        let removed = self.barlines.remove(idx);
        self.mirror_hidden_keys();
        self.sync_end_bar();
        debug!("removed barline at position {position}");
        Ok(removed)
    }

    /// Edits the barline at `position` (sentinels included) in place.
    ///
    /// The barline keeps its position whatever the closure does. The edit is
    /// rolled back if its signatures no longer leave room for the content.
    pub fn update_barline<R>(
        &mut self,
        position: u32,
        edit: impl FnOnce(&mut Barline) -> R,
    ) -> SystemResult<R> {
        let end = self.end_bar.position;
        let idx = self.barlines.iter().position(|b| b.position == position);
        if position != 0 && position != end && idx.is_none() {
            return Err(SystemError::BarlineNotFound(position));
        }

        self.edit_checked(|system| {
            let bar = match idx {
                Some(i) => &mut system.barlines[i],
                None if position == 0 => &mut system.start_bar,
                None => &mut system.end_bar,
            };
            let result = edit(bar);
            bar.position = position;
            result
        })
    }

    pub fn update_start_bar<R>(&mut self, edit: impl FnOnce(&mut Barline) -> R) -> SystemResult<R> {
        self.update_barline(0, edit)
    }

    /// True if any barline, sentinels included, carries a rehearsal sign.
    pub fn has_rehearsal_sign(&self) -> bool {
        self.start_bar.rehearsal_sign.is_set()
            || self.end_bar.rehearsal_sign.is_set()
            || self.barlines.iter().any(|b| b.rehearsal_sign.is_set())
    }

    /// Measure count of the multi-bar rest in the bar starting at
    /// `bar_position`, if any staff voice holds one.
    pub fn has_multi_bar_rest(&self, bar_position: u32) -> Option<u8> {
        let start = self.barline_at(bar_position)?.position;
        let end = self.next_barline(start).position;

        self.staves.iter().find_map(|staff| {
            (0..crate::staff::NUM_STAFF_VOICES).find_map(|voice| {
                staff
                    .positions_in_range(voice, start, end)
                    .iter()
                    .find_map(|p| p.multibar_rest)
            })
        })
    }

    /// Makes every hidden interior key signature mirror the nearest shown
    /// key to its left.
    pub(crate) fn mirror_hidden_keys(&mut self) {
        let mut active = self.start_bar.key_signature.clone();
        for bar in &mut self.barlines {
            let key = &mut bar.key_signature;
            if key.shown {
                active = key.clone();
            } else if !key.same_key(&active) {
                key.set_key(active.key_type, active.accidentals);
                key.cancellation = false;
            }
        }
    }

    /// The end bar's position is derived from the layout; re-derive it.
    pub(crate) fn sync_end_bar(&mut self) {
        self.end_bar.position = self.position_count();
    }

    /// Runs `edit`, then restores the invariants: hidden keys mirrored,
    /// spacing tightened if the content no longer fits, end bar synced.
    /// If nothing fits, the whole system is restored and the edit rejected.
    pub(crate) fn edit_checked<R>(&mut self, edit: impl FnOnce(&mut Self) -> R) -> SystemResult<R> {
        let saved = self.clone();
        let result = edit(self);

        self.mirror_hidden_keys();
        if !self.is_valid_spacing(self.position_spacing as i32) {
            if let Err(err) = self.adjust_spacing() {
                warn!("edit rejected: {err}");
                *self = saved;
                return Err(err);
            }
        }
        self.sync_end_bar();
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn system_with_bars(positions: &[u32]) -> System {
        let mut system = System::new();
        for &p in positions {
            system.insert_barline(Barline::new(p, BarType::Bar)).unwrap();
        }
        system
    }

    #[test]
    fn preceding_is_inclusive_next_is_exclusive() {
        let system = system_with_bars(&[4, 8]);

        assert_eq!(system.preceding_barline(3).position, 0);
        assert_eq!(system.preceding_barline(4).position, 4);
        assert_eq!(system.preceding_barline(7).position, 4);
        assert_eq!(system.preceding_barline(30).position, 8);

        assert_eq!(system.next_barline(0).position, 4);
        assert_eq!(system.next_barline(4).position, 8);
        assert_eq!(system.next_barline(8).position, system.position_count());
    }

    #[test]
    fn barline_at_finds_sentinels() {
        let system = system_with_bars(&[6]);
        assert!(std::ptr::eq(system.barline_at(0).unwrap(), system.start_bar()));
        assert!(std::ptr::eq(
            system.barline_at(system.position_count()).unwrap(),
            system.end_bar()
        ));
        assert_eq!(system.barline_at(6).map(|b| b.position), Some(6));
        assert!(system.barline_at(5).is_none());
    }

    #[test]
    fn insert_rejects_sentinel_and_duplicate_positions() {
        let mut system = system_with_bars(&[6]);
        let count = system.position_count();

        assert!(matches!(
            system.insert_barline(Barline::new(0, BarType::Bar)),
            Err(SystemError::InvalidPosition { .. })
        ));
        assert!(matches!(
            system.insert_barline(Barline::new(count, BarType::Bar)),
            Err(SystemError::InvalidPosition { .. })
        ));
        assert!(matches!(
            system.insert_barline(Barline::new(6, BarType::DoubleBar)),
            Err(SystemError::DuplicatePosition { .. })
        ));
        assert_eq!(system.barline_count(), 1);
        assert_eq!(system.barline(0).unwrap().bar_type, BarType::Bar);
    }

    #[test]
    fn range_includes_both_ends() {
        let system = system_with_bars(&[4, 8, 12]);
        let found: Vec<u32> = system
            .barlines_in_range(4, 8)
            .iter()
            .map(|b| b.position)
            .collect();
        assert_eq!(found, vec![4, 8]);

        let all: Vec<u32> = system
            .barlines_in_range(0, system.position_count())
            .iter()
            .map(|b| b.position)
            .collect();
        assert_eq!(all, vec![0, 4, 8, 12, system.position_count()]);
    }

    #[test]
    fn hidden_keys_follow_the_last_shown_key() {
        let mut system = system_with_bars(&[4, 8]);

        let mut shown = Barline::new(2, BarType::Bar);
        shown.key_signature = KeySignature::shown(KeyType::Minor, 3);
        system.insert_barline(shown).unwrap();

        for bar in &system.interior_barlines()[1..] {
            assert!(!bar.key_signature.shown);
            assert_eq!(bar.key_signature.key_type, KeyType::Minor);
            assert_eq!(bar.key_signature.accidentals, 3);
        }

        system.remove_barline(2).unwrap();
        for bar in system.interior_barlines() {
            assert!(bar.key_signature.same_key(&system.start_bar().key_signature));
        }
    }

    #[test]
    fn update_keeps_position_and_resyncs_end_bar() {
        let mut system = system_with_bars(&[6]);
        let before = system.position_count();

        system
            .update_barline(6, |bar| {
                bar.position = 99;
                bar.time_signature.shown = true;
            })
            .unwrap();

        assert_eq!(system.barline(0).unwrap().position, 6);
        assert!(system.position_count() < before);
        assert_eq!(system.end_bar().position, system.position_count());
        assert_eq!(
            system.update_barline(7, |_| ()),
            Err(SystemError::BarlineNotFound(7))
        );
    }

    #[test]
    fn rehearsal_sign_on_any_bar() {
        let mut system = system_with_bars(&[6]);
        assert!(!system.has_rehearsal_sign());

        let end = system.end_bar().position;
        system
            .update_barline(end, |bar| bar.rehearsal_sign = RehearsalSign::new('A', "Intro"))
            .unwrap();
        assert!(system.has_rehearsal_sign());
    }

    #[test]
    fn start_bar_signatures_narrow_the_system() {
        let mut system = System::new();
        let before = system.position_count();

        system
            .update_start_bar(|bar| bar.key_signature = KeySignature::shown(KeyType::Major, 4))
            .unwrap();

        assert_eq!(system.start_bar().position, 0);
        assert!(system.position_count() < before);
        assert_eq!(system.end_bar().position, system.position_count());
    }
}
