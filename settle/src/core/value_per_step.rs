//! Sparse per-step storage sized to a formatter's step list.
//!
//! Most formatting passes record nothing at all, or a single failure or lint
//! set. Storage therefore starts empty, holds one entry inline, and only
//! allocates a full slot vector once a second distinct index is written.

#[derive(Debug, Clone, PartialEq, Eq)]
enum Slots<T> {
    Empty,
    Single(usize, T),
    Many(Vec<Option<T>>),
}

/// Fixed-capacity map from step index to an optional value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValuePerStep<T> {
    size: usize,
    slots: Slots<T>,
}

impl<T> ValuePerStep<T> {
    /// Create storage for `size` steps (usually `formatter.steps().len()`).
    pub fn new(size: usize) -> Self {
        Self {
            size,
            slots: Slots::Empty,
        }
    }

    /// Number of steps this storage was created for.
    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Store `value` at `index`, returning whatever was there before.
    ///
    /// # Panics
    ///
    /// Panics if `index >= self.len()`.
    pub fn set(&mut self, index: usize, value: T) -> Option<T> {
        self.check_bounds(index);
        match std::mem::replace(&mut self.slots, Slots::Empty) {
            Slots::Empty => {
                self.slots = Slots::Single(index, value);
                None
            }
            Slots::Single(existing, previous) if existing == index => {
                self.slots = Slots::Single(index, value);
                Some(previous)
            }
            Slots::Single(existing, other) => {
                let mut many: Vec<Option<T>> = (0..self.size).map(|_| None).collect();
                many[existing] = Some(other);
                many[index] = Some(value);
                self.slots = Slots::Many(many);
                None
            }
            Slots::Many(mut many) => {
                let previous = many[index].replace(value);
                self.slots = Slots::Many(many);
                previous
            }
        }
    }

    /// Remove and return the value at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= self.len()`.
    pub fn take(&mut self, index: usize) -> Option<T> {
        self.check_bounds(index);
        match std::mem::replace(&mut self.slots, Slots::Empty) {
            Slots::Empty => None,
            Slots::Single(existing, value) if existing == index => Some(value),
            single @ Slots::Single(..) => {
                self.slots = single;
                None
            }
            Slots::Many(mut many) => {
                let previous = many[index].take();
                self.slots = Slots::Many(many);
                previous
            }
        }
    }

    /// Borrow the value at `index`, if any.
    ///
    /// # Panics
    ///
    /// Panics if `index >= self.len()`.
    pub fn get(&self, index: usize) -> Option<&T> {
        self.check_bounds(index);
        match &self.slots {
            Slots::Empty => None,
            Slots::Single(existing, value) => (*existing == index).then_some(value),
            Slots::Many(many) => many[index].as_ref(),
        }
    }

    /// Index of the lowest step holding a value, or `None` when empty.
    pub fn index_of_first_value(&self) -> Option<usize> {
        match &self.slots {
            Slots::Empty => None,
            Slots::Single(index, _) => Some(*index),
            Slots::Many(many) => many.iter().position(Option::is_some),
        }
    }

    /// Iterate `(index, value)` pairs in step order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &T)> {
        let (single, many) = match &self.slots {
            Slots::Empty => (None, None),
            Slots::Single(index, value) => (Some((*index, value)), None),
            Slots::Many(many) => (None, Some(many)),
        };
        single.into_iter().chain(
            many.into_iter()
                .flat_map(|many| many.iter().enumerate())
                .filter_map(|(index, value)| value.as_ref().map(|value| (index, value))),
        )
    }

    fn check_bounds(&self, index: usize) {
        assert!(
            index < self.size,
            "step index {index} out of range for {} steps",
            self.size
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_has_no_first_value() {
        let values: ValuePerStep<&str> = ValuePerStep::new(3);
        assert_eq!(values.index_of_first_value(), None);
        assert_eq!(values.get(2), None);
        assert_eq!(values.iter().count(), 0);
    }

    #[test]
    fn single_value_stays_inline() {
        let mut values = ValuePerStep::new(4);
        assert_eq!(values.set(2, "a"), None);
        assert_eq!(values.slots, Slots::Single(2, "a"));
        assert_eq!(values.set(2, "b"), Some("a"));
        assert_eq!(values.get(2), Some(&"b"));
        assert_eq!(values.get(1), None);
        assert_eq!(values.index_of_first_value(), Some(2));
    }

    #[test]
    fn second_index_promotes_to_many() {
        let mut values = ValuePerStep::new(4);
        values.set(3, "late");
        values.set(1, "early");
        assert!(matches!(values.slots, Slots::Many(_)));
        assert_eq!(values.index_of_first_value(), Some(1));
        assert_eq!(values.set(3, "later"), Some("late"));
        let pairs: Vec<(usize, &&str)> = values.iter().collect();
        assert_eq!(pairs, vec![(1, &"early"), (3, &"later")]);
    }

    #[test]
    fn take_clears_slot() {
        let mut values = ValuePerStep::new(2);
        values.set(0, 10);
        assert_eq!(values.take(1), None);
        assert_eq!(values.take(0), Some(10));
        assert_eq!(values.index_of_first_value(), None);

        values.set(0, 1);
        values.set(1, 2);
        assert_eq!(values.take(0), Some(1));
        assert_eq!(values.index_of_first_value(), Some(1));
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn set_out_of_range_panics() {
        let mut values = ValuePerStep::new(2);
        values.set(2, ());
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn get_out_of_range_panics() {
        let values: ValuePerStep<()> = ValuePerStep::new(0);
        values.get(0);
    }
}
