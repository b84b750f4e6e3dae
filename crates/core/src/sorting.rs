use std::cmp::Ordering;

use crate::result_set::{CellValue, TabularResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl SortDirection {
    #[must_use]
    pub fn flipped(self) -> Self {
        match self {
            Self::Ascending => Self::Descending,
            Self::Descending => Self::Ascending,
        }
    }
}

/// Which column the results grid is ordered by, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SortState {
    pub column: Option<usize>,
    pub direction: SortDirection,
}

impl SortState {
    #[must_use]
    pub fn by(column: usize, direction: SortDirection) -> Self {
        Self {
            column: Some(column),
            direction,
        }
    }

    /// Header click: the sorted column flips direction, any other column
    /// becomes the sort column in ascending order.
    pub fn toggle(&mut self, column: usize) {
        if self.column == Some(column) {
            self.direction = self.direction.flipped();
        } else {
            self.column = Some(column);
            self.direction = SortDirection::Ascending;
        }
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Ascending order of two cells: nulls first, then numbers when both sides
/// coerce, then case-insensitive text. A value that coerces to a number
/// always sorts before one that does not, which keeps the order total on
/// columns mixing both.
#[must_use]
pub fn compare_cells(left: &CellValue, right: &CellValue) -> Ordering {
    match (left.is_null(), right.is_null()) {
        (true, true) => return Ordering::Equal,
        (true, false) => return Ordering::Less,
        (false, true) => return Ordering::Greater,
        (false, false) => {}
    }

    match (left.as_number(), right.as_number()) {
        (Some(left_number), Some(right_number)) => left_number.total_cmp(&right_number),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => left
            .display_text()
            .to_lowercase()
            .cmp(&right.display_text().to_lowercase()),
    }
}

#[must_use]
pub fn compare_cells_directed(
    left: &CellValue,
    right: &CellValue,
    direction: SortDirection,
) -> Ordering {
    let ordering = compare_cells(left, right);
    match direction {
        SortDirection::Ascending => ordering,
        SortDirection::Descending => ordering.reverse(),
    }
}

/// Row indices in display order. Ties keep their original relative order;
/// an unset or out-of-range column yields the natural order.
#[must_use]
pub fn sorted_order(result: &TabularResult, state: SortState) -> Vec<usize> {
    let mut order = (0..result.row_count()).collect::<Vec<_>>();
    let Some(column) = state.column.filter(|column| *column < result.column_count()) else {
        return order;
    };

    let rows = result.rows();
    order.sort_by(|left, right| {
        compare_cells_directed(&rows[*left][column], &rows[*right][column], state.direction)
    });
    order
}

#[must_use]
pub fn sorted_rows(result: &TabularResult, state: SortState) -> Vec<&[CellValue]> {
    sorted_order(result, state)
        .into_iter()
        .map(|index| result.rows()[index].as_slice())
        .collect()
}

#[cfg(test)]
mod tests {
    use std::cmp::Ordering;

    use super::{compare_cells, sorted_order, sorted_rows, SortDirection, SortState};
    use crate::result_set::{CellValue, TabularResult};

    fn result(columns: &[&str], rows: Vec<Vec<CellValue>>) -> TabularResult {
        TabularResult::new(columns.iter().map(|c| (*c).to_string()).collect(), rows)
            .expect("valid result")
    }

    #[test]
    fn toggle_flips_same_column_and_resets_on_new_column() {
        let mut state = SortState::default();
        state.toggle(2);
        assert_eq!(state, SortState::by(2, SortDirection::Ascending));
        state.toggle(2);
        assert_eq!(state, SortState::by(2, SortDirection::Descending));
        state.toggle(0);
        assert_eq!(state, SortState::by(0, SortDirection::Ascending));
        state.clear();
        assert_eq!(state.column, None);
    }

    #[test]
    fn unsorted_state_keeps_natural_order() {
        let data = result(
            &["id"],
            vec![vec![3.into()], vec![1.into()], vec![2.into()]],
        );
        assert_eq!(sorted_order(&data, SortState::default()), vec![0, 1, 2]);
        assert_eq!(
            sorted_order(&data, SortState::by(5, SortDirection::Ascending)),
            vec![0, 1, 2]
        );
    }

    #[test]
    fn ties_keep_original_relative_order() {
        let data = result(
            &["id", "name"],
            vec![
                vec![2.into(), "b".into()],
                vec![1.into(), "a".into()],
                vec![1.into(), "c".into()],
            ],
        );

        let rows = sorted_rows(&data, SortState::by(0, SortDirection::Ascending));
        assert_eq!(rows[0], &[CellValue::from(1), CellValue::from("a")]);
        assert_eq!(rows[1], &[CellValue::from(1), CellValue::from("c")]);
        assert_eq!(rows[2], &[CellValue::from(2), CellValue::from("b")]);
    }

    #[test]
    fn descending_is_exact_reverse_without_ties() {
        let data = result(
            &["name"],
            vec![
                vec!["delta".into()],
                vec!["Alpha".into()],
                vec![CellValue::Null],
                vec!["charlie".into()],
                vec!["Bravo".into()],
            ],
        );

        let ascending = sorted_order(&data, SortState::by(0, SortDirection::Ascending));
        let mut descending = sorted_order(&data, SortState::by(0, SortDirection::Descending));
        descending.reverse();
        assert_eq!(ascending, descending);
        assert_eq!(ascending, vec![2, 1, 4, 3, 0]);
    }

    #[test]
    fn nulls_sort_first_ascending_and_last_descending() {
        let data = result(
            &["total"],
            vec![vec![5.into()], vec![CellValue::Null], vec![1.into()]],
        );

        assert_eq!(
            sorted_order(&data, SortState::by(0, SortDirection::Ascending)),
            vec![1, 2, 0]
        );
        assert_eq!(
            sorted_order(&data, SortState::by(0, SortDirection::Descending)),
            vec![0, 2, 1]
        );
    }

    #[test]
    fn numeric_text_compares_numerically() {
        assert_eq!(
            compare_cells(&CellValue::from("10"), &CellValue::from(9)),
            Ordering::Greater
        );
        assert_eq!(
            compare_cells(&CellValue::from(99.99), &CellValue::from("249.50")),
            Ordering::Less
        );
    }

    #[test]
    fn mixed_text_falls_back_to_case_insensitive_compare() {
        assert_eq!(
            compare_cells(&CellValue::from("apple"), &CellValue::from("Banana")),
            Ordering::Less
        );
        assert_eq!(
            compare_cells(&CellValue::from("10"), &CellValue::from("abc")),
            Ordering::Less
        );
        assert_eq!(
            compare_cells(&CellValue::from("ABC"), &CellValue::from("abc")),
            Ordering::Equal
        );
    }

    #[test]
    fn numbers_sort_before_non_numeric_text() {
        let nine = CellValue::from("9");
        let ten = CellValue::from(10);
        let one_a = CellValue::from("1a");

        assert_eq!(compare_cells(&nine, &ten), Ordering::Less);
        assert_eq!(compare_cells(&ten, &one_a), Ordering::Less);
        assert_eq!(compare_cells(&nine, &one_a), Ordering::Less);
    }

    #[test]
    fn large_mixed_column_sorts_into_a_consistent_order() {
        let mut seed = 7_u64;
        let rows = (0..400)
            .map(|index| {
                seed = seed.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
                let pick = (seed >> 33) % 100;
                let cell = match index % 4 {
                    0 => CellValue::from(i64::try_from(pick).expect("small value")),
                    1 => CellValue::from(pick.to_string()),
                    2 => {
                        let letter = b'a' + u8::try_from(pick % 26).expect("letter offset");
                        CellValue::from(format!("{}{}", pick % 10, char::from(letter)))
                    }
                    _ => CellValue::Null,
                };
                vec![cell]
            })
            .collect::<Vec<_>>();
        let data = result(&["mixed"], rows);

        for direction in [SortDirection::Ascending, SortDirection::Descending] {
            let sorted = sorted_rows(&data, SortState::by(0, direction));
            assert_eq!(sorted.len(), 400);
            for pair in sorted.windows(2) {
                let ordering = compare_cells(&pair[0][0], &pair[1][0]);
                match direction {
                    SortDirection::Ascending => assert_ne!(ordering, Ordering::Greater),
                    SortDirection::Descending => assert_ne!(ordering, Ordering::Less),
                }
            }
        }
    }

    #[test]
    fn sorting_never_mutates_the_result() {
        let data = result(&["id"], vec![vec![2.into()], vec![1.into()]]);
        let before = data.clone();
        let _ = sorted_rows(&data, SortState::by(0, SortDirection::Ascending));
        assert_eq!(data, before);
    }
}
