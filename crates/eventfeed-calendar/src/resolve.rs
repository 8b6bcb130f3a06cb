//! Joins occurrences, events, tags and tag groups into [`EventView`]s.
//!
//! Missing relationships never fail the feed: an unresolvable event leaves
//! its dependent fields empty, unresolvable tags are dropped and a tag with
//! no known group is reported with `group: null`.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::types::{Event, EventView, Occurrence, ResolvedTag, Tag, TagGroup};

/// Title used when an occurrence has no display name.
pub const UNTITLED_EVENT: &str = "Untitled Event";

/// Flatten `occurrences` into views, preserving input order.
pub fn resolve(
    occurrences: &[Occurrence],
    events: &[Event],
    tags: &[Tag],
    tag_groups: &[TagGroup],
) -> Vec<EventView> {
    let events_by_id: HashMap<&str, &Event> = events.iter().map(|e| (e.id.as_str(), e)).collect();
    let tags_by_id: HashMap<&str, &Tag> = tags.iter().map(|t| (t.id.as_str(), t)).collect();
    let group_names = group_index(tags, tag_groups);

    occurrences
        .iter()
        .map(|occurrence| {
            let event = occurrence
                .event_id
                .as_deref()
                .and_then(|id| events_by_id.get(id).copied());
            flatten(occurrence, event, &tags_by_id, &group_names)
        })
        .collect()
}

fn flatten(
    occurrence: &Occurrence,
    event: Option<&Event>,
    tags_by_id: &HashMap<&str, &Tag>,
    group_names: &HashMap<&str, &str>,
) -> EventView {
    let title = occurrence
        .name
        .as_deref()
        .filter(|name| !name.trim().is_empty())
        .unwrap_or(UNTITLED_EVENT)
        .to_string();

    let tags = event
        .map(|e| {
            e.tag_ids
                .iter()
                .filter_map(|id| tags_by_id.get(id.as_str()))
                .map(|tag| ResolvedTag {
                    name: tag.name.clone(),
                    color: tag.color.clone(),
                    group: group_names.get(tag.id.as_str()).map(|g| g.to_string()),
                })
                .collect()
        })
        .unwrap_or_default();

    EventView {
        id: occurrence.id.clone(),
        title,
        start_time: present(&occurrence.published_starts_at, &occurrence.starts_at),
        end_time: present(&occurrence.published_ends_at, &occurrence.ends_at),
        location: occurrence.location.clone(),
        description: event.and_then(|e| e.summary.clone()).unwrap_or_default(),
        image_url: event.and_then(|e| e.image_url.clone()),
        registration_url: event.and_then(|e| e.registration_url.clone()),
        church_center_url: occurrence.church_center_url.clone(),
        tags,
    }
}

/// First non-empty value of `preferred`, then `fallback`.
fn present(preferred: &Option<String>, fallback: &Option<String>) -> Option<String> {
    [preferred, fallback]
        .into_iter()
        .flatten()
        .find(|value| !value.is_empty())
        .cloned()
}

/// Map tag id to owning group name.
///
/// Groups are walked in ascending id order and the first group listing a tag
/// keeps it. Tags listed by no group fall back to their own `tag_group`
/// reference when that group is known.
fn group_index<'a>(tags: &'a [Tag], tag_groups: &'a [TagGroup]) -> HashMap<&'a str, &'a str> {
    let mut ordered: Vec<&TagGroup> = tag_groups.iter().collect();
    ordered.sort_by(|a, b| compare_ids(&a.id, &b.id));

    let mut index: HashMap<&str, &str> = HashMap::new();
    let mut names_by_group: HashMap<&str, &str> = HashMap::new();
    for group in ordered {
        names_by_group
            .entry(group.id.as_str())
            .or_insert(group.name.as_str());
        for tag_id in &group.tag_ids {
            index.entry(tag_id.as_str()).or_insert(group.name.as_str());
        }
    }

    for tag in tags {
        let Some(group_id) = tag.group_id.as_deref() else {
            continue;
        };
        if let Some(name) = names_by_group.get(group_id) {
            index.entry(tag.id.as_str()).or_insert(*name);
        }
    }

    index
}

/// Numeric order when both ids are integers, lexicographic otherwise.
fn compare_ids(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
        _ => a.cmp(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn occurrence(id: &str, name: &str, event_id: &str) -> Occurrence {
        Occurrence {
            id: id.into(),
            name: Some(name.into()),
            starts_at: Some("2026-01-14T18:00:00Z".into()),
            event_id: Some(event_id.into()),
            ..Default::default()
        }
    }

    fn event(id: &str, summary: &str, tag_ids: &[&str]) -> Event {
        Event {
            id: id.into(),
            summary: Some(summary.into()),
            image_url: Some(format!("https://img.example/{}.png", id)),
            registration_url: Some(format!("https://register.example/{}", id)),
            tag_ids: tag_ids.iter().map(|t| t.to_string()).collect(),
        }
    }

    fn tag(id: &str, name: &str, color: &str) -> Tag {
        Tag {
            id: id.into(),
            name: name.into(),
            color: Some(color.into()),
            group_id: None,
        }
    }

    fn group(id: &str, name: &str, tag_ids: &[&str]) -> TagGroup {
        TagGroup {
            id: id.into(),
            name: name.into(),
            tag_ids: tag_ids.iter().map(|t| t.to_string()).collect(),
        }
    }

    #[test]
    fn test_untitled_occurrence_with_ungrouped_tag() {
        let views = resolve(
            &[occurrence("occ1", "", "ev1")],
            &[Event {
                id: "ev1".into(),
                summary: Some("desc".into()),
                tag_ids: vec!["tg1".into()],
                ..Default::default()
            }],
            &[tag("tg1", "Youth", "#fff")],
            &[],
        );

        assert_eq!(views.len(), 1);
        let view = &views[0];
        assert_eq!(view.id, "occ1");
        assert_eq!(view.title, UNTITLED_EVENT);
        assert_eq!(view.start_time.as_deref(), Some("2026-01-14T18:00:00Z"));
        assert_eq!(view.end_time, None);
        assert_eq!(view.description, "desc");
        assert_eq!(
            view.tags,
            vec![ResolvedTag {
                name: "Youth".into(),
                color: Some("#fff".into()),
                group: None,
            }]
        );
    }

    #[test]
    fn test_missing_parent_event_keeps_occurrence_fields() {
        let mut occ = occurrence("occ2", "Prayer Breakfast", "gone");
        occ.ends_at = Some("2026-01-15T09:00:00Z".into());
        occ.location = Some("Cafe".into());

        let views = resolve(&[occ], &[event("ev1", "other", &["tg1"])], &[], &[]);

        let view = &views[0];
        assert_eq!(view.title, "Prayer Breakfast");
        assert_eq!(view.start_time.as_deref(), Some("2026-01-14T18:00:00Z"));
        assert_eq!(view.end_time.as_deref(), Some("2026-01-15T09:00:00Z"));
        assert_eq!(view.location.as_deref(), Some("Cafe"));
        assert_eq!(view.description, "");
        assert_eq!(view.image_url, None);
        assert_eq!(view.registration_url, None);
        assert!(view.tags.is_empty());
    }

    #[test]
    fn test_occurrence_without_event_reference() {
        let occ = Occurrence {
            id: "occ3".into(),
            ..Default::default()
        };
        let views = resolve(&[occ], &[], &[], &[]);
        assert_eq!(views[0].title, UNTITLED_EVENT);
        assert_eq!(views[0].start_time, None);
    }

    #[test]
    fn test_published_times_take_precedence() {
        let mut occ = occurrence("occ1", "Concert", "ev1");
        occ.ends_at = Some("2026-01-14T20:00:00Z".into());
        occ.published_starts_at = Some("2026-01-14T18:30:00Z".into());
        occ.published_ends_at = Some(String::new());

        let views = resolve(&[occ], &[], &[], &[]);

        assert_eq!(views[0].start_time.as_deref(), Some("2026-01-14T18:30:00Z"));
        assert_eq!(views[0].end_time.as_deref(), Some("2026-01-14T20:00:00Z"));
    }

    #[test]
    fn test_unknown_tags_dropped_and_groups_resolved() {
        let views = resolve(
            &[occurrence("occ1", "Camp", "ev1")],
            &[event("ev1", "Summer camp", &["tg1", "missing", "tg2"])],
            &[tag("tg1", "Youth", "#fff"), tag("tg2", "Outdoors", "#0f0")],
            &[group("10", "Ministries", &["tg1"])],
        );

        let tags = &views[0].tags;
        assert_eq!(tags.len(), 2);
        assert_eq!(tags[0].name, "Youth");
        assert_eq!(tags[0].group.as_deref(), Some("Ministries"));
        assert_eq!(tags[1].name, "Outdoors");
        assert_eq!(tags[1].color.as_deref(), Some("#0f0"));
        assert_eq!(tags[1].group, None);
    }

    #[test]
    fn test_tag_in_several_groups_uses_lowest_group_id() {
        let groups = [
            group("20", "Campus", &["tg1"]),
            group("3", "Audience", &["tg1"]),
            group("100", "Ministries", &["tg1"]),
        ];
        let views = resolve(
            &[occurrence("occ1", "Night", "ev1")],
            &[event("ev1", "", &["tg1"])],
            &[tag("tg1", "Youth", "#fff")],
            &groups,
        );

        assert_eq!(views[0].tags[0].group.as_deref(), Some("Audience"));

        let mut reversed = groups.to_vec();
        reversed.reverse();
        let again = resolve(
            &[occurrence("occ1", "Night", "ev1")],
            &[event("ev1", "", &["tg1"])],
            &[tag("tg1", "Youth", "#fff")],
            &reversed,
        );
        assert_eq!(again, views);
    }

    #[test]
    fn test_tag_back_reference_used_when_unlisted() {
        let mut kids = tag("tg5", "Kids", "#00f");
        kids.group_id = Some("7".into());

        let views = resolve(
            &[occurrence("occ1", "Story Time", "ev1")],
            &[event("ev1", "", &["tg5"])],
            &[kids],
            &[group("7", "Audience", &[])],
        );

        assert_eq!(views[0].tags[0].group.as_deref(), Some("Audience"));
    }

    #[test]
    fn test_output_preserves_input_order() {
        let mut late = occurrence("late", "Late", "ev1");
        late.starts_at = Some("2026-03-01T00:00:00Z".into());
        let early = occurrence("early", "Early", "ev1");

        let views = resolve(&[late, early], &[event("ev1", "", &[])], &[], &[]);

        let ids: Vec<&str> = views.iter().map(|v| v.id.as_str()).collect();
        assert_eq!(ids, vec!["late", "early"]);
    }

    #[test]
    fn test_compare_ids() {
        assert_eq!(compare_ids("9", "10"), Ordering::Less);
        assert_eq!(compare_ids("abc", "abd"), Ordering::Less);
        assert_eq!(compare_ids("10", "10"), Ordering::Equal);
    }
}
