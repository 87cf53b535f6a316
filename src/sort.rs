/// Stable merge sort driven by a strict "less than" predicate.
///
/// Unlike `slice::sort_by`, this never panics when `less` is not a strict weak
/// ordering. The output is still a permutation of the input, in some order.
pub(crate) fn merge_sort_by_less<T, F>(items: Vec<T>, less: &mut F) -> Vec<T>
where
    F: FnMut(&T, &T) -> bool,
{
    if items.len() <= 1 {
        return items;
    }

    let mut left = items;
    let right = left.split_off(left.len() / 2);

    let left = merge_sort_by_less(left, less);
    let right = merge_sort_by_less(right, less);

    merge(left, right, less)
}

fn merge<T, F>(left: Vec<T>, right: Vec<T>, less: &mut F) -> Vec<T>
where
    F: FnMut(&T, &T) -> bool,
{
    let mut merged = Vec::with_capacity(left.len() + right.len());
    let mut left = left.into_iter().peekable();
    let mut right = right.into_iter().peekable();

    loop {
        let take_right = match (left.peek(), right.peek()) {
            // Ties go left to keep the sort stable.
            (Some(l), Some(r)) => less(r, l),
            (Some(_), None) => false,
            (None, Some(_)) => true,
            (None, None) => break,
        };

        let next = if take_right { right.next() } else { left.next() };
        merged.extend(next);
    }

    merged
}
