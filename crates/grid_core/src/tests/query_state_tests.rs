use super::*;
use serde_json::json;

fn filters(entries: &[(&str, Option<Value>)]) -> BTreeMap<String, Option<Value>> {
    entries
        .iter()
        .map(|(key, value)| (key.to_string(), value.clone()))
        .collect()
}

fn sort_strings(query: &QueryState) -> Vec<String> {
    query.sort.iter().map(ToString::to_string).collect()
}

#[test]
fn three_sort_taps_return_to_unsorted() {
    let mut query = QueryState::default();
    query.toggle_sort("name");
    assert!(query.is_asc("name"));
    query.toggle_sort("name");
    assert!(query.is_desc("name"));
    assert!(!query.is_asc("name"));
    query.toggle_sort("name");
    assert!(query.sort.is_empty());
}

#[test]
fn sort_cycle_on_one_key_leaves_other_keys_alone() {
    let mut query = QueryState::default();
    query.toggle_sort("id");
    let before = sort_strings(&query);
    for _ in 0..3 {
        query.toggle_sort("email");
    }
    assert_eq!(sort_strings(&query), before);
}

#[test]
fn descending_key_moves_to_lowest_priority() {
    let mut query = QueryState::default();
    query.toggle_sort("name");
    query.toggle_sort("email");
    query.toggle_sort("name");
    assert_eq!(sort_strings(&query), vec!["email:asc", "name:desc"]);
}

#[test]
fn sort_tap_always_restarts_from_first_page() {
    let mut query = QueryState {
        pagination: Some(PaginationInfo {
            size: 10,
            current: 4,
            max: 9,
        }),
        ..QueryState::default()
    };
    assert_eq!(query.toggle_sort("name"), Refetch::FirstPage);
    assert_eq!(
        query.first_page_window(),
        Some(PageWindow {
            limit: 10,
            offset: 0
        })
    );
    assert_eq!(
        query.current_window(),
        Some(PageWindow {
            limit: 10,
            offset: 30
        })
    );
}

#[test]
fn unpaginated_query_has_no_window() {
    let query = QueryState::default();
    assert_eq!(query.first_page_window(), None);
    assert_eq!(query.current_window(), None);
}

#[test]
fn search_queries_replace_and_drop_nulls() {
    let mut query = QueryState::with_cross_filters(&filters(&[("role", Some(json!("admin")))]));
    let mut incoming = Map::new();
    incoming.insert("name".into(), json!("al"));
    incoming.insert("email".into(), Value::Null);

    assert_eq!(query.set_search_queries(incoming), Refetch::FirstPage);
    assert_eq!(query.search_queries.len(), 1);
    assert_eq!(query.search_queries["name"], json!("al"));
    assert!(query.has_search_queries());
}

#[test]
fn column_filter_keeps_declared_order() {
    let columns = vec![
        ColumnDescriptor::new("id", Map::new()),
        ColumnDescriptor::new("name", Map::new()),
        ColumnDescriptor::new("email", Map::new()),
    ];
    let mut query = QueryState::default();
    assert_eq!(query.filtered_columns(&columns).len(), 3);

    let refetch = query.set_visible_columns(Some(vec!["email".into(), "id".into()]));
    assert_eq!(refetch, Refetch::Current);
    let keys: Vec<String> = query
        .filtered_columns(&columns)
        .into_iter()
        .map(|column| column.key)
        .collect();
    assert_eq!(keys, vec!["id", "email"]);

    query.set_visible_columns(None);
    assert_eq!(query.filtered_columns(&columns).len(), 3);
}

#[test]
fn initial_cross_filters_seed_defined_values_only() {
    let query = QueryState::with_cross_filters(&filters(&[
        ("role", Some(json!("viewer"))),
        ("name", None),
    ]));
    assert_eq!(query.search_queries.len(), 1);
    assert_eq!(query.search_queries["role"], json!("viewer"));
}

#[test]
fn identical_cross_filters_do_not_refetch() {
    let initial = filters(&[("a", Some(json!(1)))]);
    let mut query = QueryState::with_cross_filters(&initial);
    let mut tracker = CrossFilterTracker::new(initial.clone());

    assert_eq!(tracker.merge(initial, &mut query), Refetch::Skip);
}

#[test]
fn changed_cross_filter_value_refetches_first_page() {
    let initial = filters(&[("a", Some(json!(1)))]);
    let mut query = QueryState::with_cross_filters(&initial);
    let mut tracker = CrossFilterTracker::new(initial);

    let refetch = tracker.merge(filters(&[("a", Some(json!(2)))]), &mut query);
    assert_eq!(refetch, Refetch::FirstPage);
    assert_eq!(query.search_queries["a"], json!(2));
}

#[test]
fn shrinking_cross_filters_count_as_change() {
    let initial = filters(&[("a", Some(json!(1)))]);
    let mut query = QueryState::with_cross_filters(&initial);
    let mut tracker = CrossFilterTracker::new(initial);

    assert_eq!(tracker.merge(BTreeMap::new(), &mut query), Refetch::FirstPage);
    // keys the parent no longer mentions are left as they were
    assert_eq!(query.search_queries["a"], json!(1));
}

#[test]
fn undefined_cross_filter_removes_search_key() {
    let initial = filters(&[("a", Some(json!(1))), ("b", Some(json!("x")))]);
    let mut query = QueryState::with_cross_filters(&initial);
    let mut tracker = CrossFilterTracker::new(initial);

    let refetch = tracker.merge(filters(&[("a", Some(json!(1))), ("b", None)]), &mut query);
    assert_eq!(refetch, Refetch::FirstPage);
    assert!(!query.search_queries.contains_key("b"));
    assert_eq!(query.search_queries["a"], json!(1));
}

#[test]
fn snapshot_is_recaptured_after_each_merge() {
    let mut query = QueryState::default();
    let mut tracker = CrossFilterTracker::new(BTreeMap::new());

    let next = filters(&[("a", Some(json!(3)))]);
    assert_eq!(tracker.merge(next.clone(), &mut query), Refetch::FirstPage);
    assert_eq!(tracker.merge(next, &mut query), Refetch::Skip);
}
